//! Scoped ownership of EDSDK references.

use crate::sdk::{CameraSdk, EdsRef};
use std::fmt;
use std::sync::Arc;

/// An EDSDK reference released exactly once, when the guard is dropped.
///
/// Guards created later in a scope drop first, so declaring the memory
/// stream before the image ref that views it releases them view-first.
pub struct OwnedRef<S: CameraSdk> {
    sdk: Arc<S>,
    raw: EdsRef,
    kind: &'static str,
}

impl<S: CameraSdk> OwnedRef<S> {
    /// Take ownership of `raw`; it will be released through `sdk`.
    pub fn new(sdk: Arc<S>, raw: EdsRef, kind: &'static str) -> Self {
        tracing::trace!(kind, "Acquired EDSDK reference");
        Self { sdk, raw, kind }
    }

    /// The underlying reference, still owned by this guard.
    pub fn get(&self) -> EdsRef {
        self.raw
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn sdk(&self) -> &S {
        &self.sdk
    }
}

impl<S: CameraSdk> Drop for OwnedRef<S> {
    fn drop(&mut self) {
        let remaining = self.sdk.release(self.raw);
        tracing::trace!(kind = self.kind, remaining, "Released EDSDK reference");
    }
}

impl<S: CameraSdk> fmt::Debug for OwnedRef<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedRef")
            .field("kind", &self.kind)
            .field("raw", &self.raw)
            .finish()
    }
}
