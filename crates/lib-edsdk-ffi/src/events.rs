//! Property-change notifications.
//!
//! When the library exports `EdsSetPropertyEventHandler`, the session
//! registers [`property_event_trampoline`] with a [`PropertyEvents`] log as
//! its context. The camera reports, among others, the moment the live-view
//! output device actually switches, which is when frames start flowing.

use lib_types::{EdsCode, PropertyEvent, PropertyId};
use std::ffi::c_void;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Sentinel for "no property changed yet".
const NO_PROPERTY: u32 = u32::MAX;

/// Counters updated from the SDK's event callback.
#[derive(Debug)]
pub struct PropertyEvents {
    changes: AtomicU64,
    routing_changes: AtomicU64,
    last_property: AtomicU32,
}

impl Default for PropertyEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyEvents {
    pub fn new() -> Self {
        Self {
            changes: AtomicU64::new(0),
            routing_changes: AtomicU64::new(0),
            last_property: AtomicU32::new(NO_PROPERTY),
        }
    }

    /// Record one event from the camera.
    pub fn record(&self, event: PropertyEvent, property: PropertyId) {
        if event != PropertyEvent::PropertyChanged {
            return;
        }
        self.changes.fetch_add(1, Ordering::SeqCst);
        self.last_property.store(property.0, Ordering::SeqCst);
        if property == PropertyId::EVF_OUTPUT_DEVICE {
            self.routing_changes.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Total property-changed events seen.
    pub fn change_count(&self) -> u64 {
        self.changes.load(Ordering::SeqCst)
    }

    /// Property-changed events for `Evf_OutputDevice`.
    pub fn routing_change_count(&self) -> u64 {
        self.routing_changes.load(Ordering::SeqCst)
    }

    pub fn last_property(&self) -> Option<PropertyId> {
        match self.last_property.load(Ordering::SeqCst) {
            NO_PROPERTY => None,
            raw => Some(PropertyId(raw)),
        }
    }
}

/// Handler registered with `EdsSetPropertyEventHandler`.
///
/// # Safety
///
/// `context` must be null or point to a live [`PropertyEvents`]. Called from
/// the SDK's event dispatch; never unwinds.
pub unsafe extern "system" fn property_event_trampoline(
    event: u32,
    property: u32,
    _param: u32,
    context: *mut c_void,
) -> u32 {
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        if context.is_null() {
            return;
        }
        let Some(event) = PropertyEvent::from_raw(event) else {
            return;
        };
        // SAFETY: the session keeps the log alive while registered.
        let events = unsafe { &*context.cast::<PropertyEvents>() };
        events.record(event, PropertyId(property));
        tracing::debug!(property = %PropertyId(property), "Camera property changed");
    }));
    if outcome.is_err() {
        return EdsCode::INTERNAL_ERROR.0;
    }
    EdsCode::OK.0
}
