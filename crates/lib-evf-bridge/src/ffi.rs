//! Exported C symbols.
//!
//! All functions return an `int32_t` [`ResultCode`]; 0 is success. None of
//! them unwind: a panic anywhere below is reported as
//! [`ResultCode::InternalFault`].
//!
//! Calls that share a handle are serialized internally. The EDSDK's own
//! thread-affinity rules (on Windows, the thread that initialized it) are
//! the caller's to honour.

use crate::abi::{self, guarded};
use crate::bridge::EvfBridge;
use crate::codes::ResultCode;
use crate::logging;
use lib_edsdk_ffi::EdsdkLibrary;
use std::ffi::c_char;

/// Load the EDSDK, open a session with the first camera and return a
/// context handle through `out_handle`.
///
/// `config_json` is a JSON [`crate::BridgeConfig`]; null or empty selects
/// the defaults.
///
/// # Safety
///
/// `config_json` must be null or NUL-terminated; `out_handle` must be
/// writable.
#[no_mangle]
pub unsafe extern "C" fn evf_initialize(
    config_json: *const c_char,
    out_handle: *mut *mut EvfBridge,
) -> i32 {
    guarded("evf_initialize", || {
        logging::init();
        unsafe {
            abi::initialize(config_json, out_handle, |config| {
                EdsdkLibrary::load(&config.library_path)
            })
        }
    })
}

/// Restore routing, close the session, terminate the SDK and free the
/// handle. Null is a no-op.
///
/// # Safety
///
/// `handle` must be null or a live handle; it is invalid afterwards.
#[no_mangle]
pub unsafe extern "C" fn evf_terminate(handle: *mut EvfBridge) -> i32 {
    guarded("evf_terminate", || unsafe { abi::terminate(handle) })
}

/// Route live view to the host and allow frame fetching.
///
/// # Safety
///
/// `handle` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn evf_start_liveview(handle: *mut EvfBridge) -> i32 {
    guarded("evf_start_liveview", || unsafe { abi::start_liveview(handle) })
}

/// Stop live view and restore the camera's previous output routing.
///
/// # Safety
///
/// `handle` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn evf_stop_liveview(handle: *mut EvfBridge) -> i32 {
    guarded("evf_stop_liveview", || unsafe { abi::stop_liveview(handle) })
}

/// Fetch one JPEG live-view frame.
///
/// On success `*out_buf` points to `*out_len` bytes owned by the caller,
/// to be released with [`evf_free_buffer`]. May block for the retry
/// window while the camera reports busy/not ready.
///
/// # Safety
///
/// `handle` must be null or a live handle; `out_buf` and `out_len` must be
/// writable.
#[no_mangle]
pub unsafe extern "C" fn evf_get_frame(
    handle: *mut EvfBridge,
    out_buf: *mut *mut u8,
    out_len: *mut usize,
) -> i32 {
    guarded("evf_get_frame", || unsafe {
        abi::get_frame(handle, out_buf, out_len)
    })
}

/// Free a buffer returned by [`evf_get_frame`]. Null is a no-op.
///
/// # Safety
///
/// `buf` must be null or a buffer from [`evf_get_frame`] not yet freed.
/// Freeing twice, or freeing any other pointer, is undefined behaviour.
#[no_mangle]
pub unsafe extern "C" fn evf_free_buffer(buf: *mut u8) {
    let _ = guarded("evf_free_buffer", || {
        unsafe { abi::free_buffer(buf) };
        ResultCode::Ok
    });
}

/// Lock (`locked != 0`) or unlock the camera's own controls.
///
/// # Safety
///
/// `handle` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn evf_lock_ui(handle: *mut EvfBridge, locked: i32) -> i32 {
    guarded("evf_lock_ui", || unsafe { abi::lock_ui(handle, locked != 0) })
}

/// Move the shutter button: 0 off, 1 halfway, 3 completely. A half press
/// wakes a camera that has gone to sleep.
///
/// # Safety
///
/// `handle` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn evf_press_shutter(handle: *mut EvfBridge, button: i32) -> i32 {
    guarded("evf_press_shutter", || unsafe {
        abi::press_shutter(handle, button)
    })
}

/// Dispatch pending EDSDK events on the calling thread.
///
/// # Safety
///
/// `handle` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn evf_pump_events(handle: *mut EvfBridge) -> i32 {
    guarded("evf_pump_events", || unsafe { abi::pump_events(handle) })
}

/// Static description of a result code; never null, never freed.
#[no_mangle]
pub extern "C" fn evf_result_message(code: i32) -> *const c_char {
    ResultCode::from_raw(code)
        .map_or(c"unknown result code", ResultCode::message)
        .as_ptr()
}
