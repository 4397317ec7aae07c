//! The EDSDK capability surface.
//!
//! [`CameraSdk`] exposes exactly the vendor operations the session manager
//! and the live-view engine need. [`crate::loader::EdsdkLibrary`] is the
//! production implementation; tests use [`crate::mock::MockSdk`].

use lib_types::{EdsCode, PropertyEvent, PropertyId, StatusCommand};
use std::ffi::c_void;
use std::ptr::NonNull;

/// Opaque, non-null EDSDK object reference (`EdsBaseRef` and friends).
///
/// The pointer is never dereferenced on the Rust side; it is only handed
/// back to the library that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct EdsRef(NonNull<c_void>);

impl EdsRef {
    /// Wrap a raw reference, returning `None` for null.
    pub fn from_raw(raw: *mut c_void) -> Option<Self> {
        NonNull::new(raw).map(Self)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

// EdsRef is an opaque token owned by the SDK; moving it between threads
// does not touch the referenced object.
unsafe impl Send for EdsRef {}
unsafe impl Sync for EdsRef {}

/// Property event handler signature (`EdsPropertyEventHandler`).
pub type PropertyEventCallback = unsafe extern "system" fn(
    event: u32,
    property: u32,
    param: u32,
    context: *mut c_void,
) -> u32;

/// Vendor operations used by the bridge.
///
/// Methods mirror single EDSDK calls. Calls that produce an object return
/// `Err` with the vendor status on failure; a success status paired with
/// a null object is reported as [`EdsCode::INVALID_HANDLE`].
///
/// The last four methods wrap optional entry points and return `None`
/// when the loaded library does not export them.
pub trait CameraSdk: Send + Sync {
    /// `EdsInitializeSDK`.
    fn initialize(&self) -> EdsCode;

    /// `EdsTerminateSDK`.
    fn terminate(&self) -> EdsCode;

    /// `EdsGetCameraList`.
    fn camera_list(&self) -> Result<EdsRef, EdsCode>;

    /// `EdsGetChildCount`.
    fn child_count(&self, parent: EdsRef) -> Result<u32, EdsCode>;

    /// `EdsGetChildAtIndex`.
    fn child_at(&self, parent: EdsRef, index: i32) -> Result<EdsRef, EdsCode>;

    /// `EdsOpenSession`.
    fn open_session(&self, camera: EdsRef) -> EdsCode;

    /// `EdsCloseSession`.
    fn close_session(&self, camera: EdsRef) -> EdsCode;

    /// `EdsRelease`. Returns the remaining reference count.
    fn release(&self, object: EdsRef) -> u32;

    /// `EdsGetPropertyData` for a 32-bit property.
    fn get_property_u32(&self, object: EdsRef, property: PropertyId, param: i32)
        -> Result<u32, EdsCode>;

    /// `EdsSetPropertyData` for a 32-bit property.
    fn set_property_u32(&self, object: EdsRef, property: PropertyId, param: i32, value: u32)
        -> EdsCode;

    /// `EdsCreateMemoryStream`. A capacity of 0 lets the SDK grow the buffer.
    fn create_memory_stream(&self, capacity: u64) -> Result<EdsRef, EdsCode>;

    /// `EdsCreateEvfImageRef`.
    fn create_evf_image_ref(&self, stream: EdsRef) -> Result<EdsRef, EdsCode>;

    /// `EdsDownloadEvfImage`.
    fn download_evf_image(&self, camera: EdsRef, image: EdsRef) -> EdsCode;

    /// `EdsGetPointer`. The pointer is valid until the stream is released.
    fn stream_pointer(&self, stream: EdsRef) -> Result<*const u8, EdsCode>;

    /// `EdsGetLength`.
    fn stream_length(&self, stream: EdsRef) -> Result<u64, EdsCode>;

    /// `EdsSendStatusCommand`.
    fn send_status_command(&self, _camera: EdsRef, _command: StatusCommand) -> Option<EdsCode> {
        None
    }

    /// `EdsSendCommand`.
    fn send_command(&self, _camera: EdsRef, _command: u32, _param: i32) -> Option<EdsCode> {
        None
    }

    /// `EdsSetPropertyEventHandler`. Passing `None` unregisters.
    ///
    /// # Safety
    ///
    /// `handler` receives `context` on every delivered event. `context` must
    /// be valid for whatever `handler` does with it until the handler is
    /// unregistered or the camera reference is released.
    unsafe fn set_property_event_handler(
        &self,
        _camera: EdsRef,
        _event: PropertyEvent,
        _handler: Option<PropertyEventCallback>,
        _context: *mut c_void,
    ) -> Option<EdsCode> {
        None
    }

    /// `EdsGetEvent`.
    fn get_event(&self) -> Option<EdsCode> {
        None
    }
}
