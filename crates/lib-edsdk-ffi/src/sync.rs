//! Mutex helpers.

use std::sync::{Mutex, MutexGuard};

/// Helper trait to recover from poisoned mutexes.
///
/// A panic caught at the foreign-call boundary poisons whatever lock it
/// held. The guarded state is still structurally valid (every transition
/// assigns whole fields), so later calls keep going with it.
pub trait RecoverMutex<T> {
    fn lock_recover(&self) -> MutexGuard<'_, T>;
}

impl<T> RecoverMutex<T> for Mutex<T> {
    fn lock_recover(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Mutex was poisoned, recovering data");
            poisoned.into_inner()
        })
    }
}
