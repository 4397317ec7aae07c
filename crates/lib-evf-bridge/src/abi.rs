//! Raw-handle operations behind the exported `evf_*` symbols.
//!
//! These are generic over the SDK so the exact pointer contract (null
//! handles, null out-parameters, handle ownership) can be exercised
//! against the mock. The exported functions in [`crate::ffi`] only pick
//! the real library and add the panic guard.

use crate::bridge::Bridge;
use crate::buffer::free_frame_buffer;
use crate::codes::ResultCode;
use crate::config::BridgeConfig;
use lib_edsdk_ffi::{CameraSdk, EdsdkError, EdsdkResult};
use lib_types::ShutterButton;
use std::any::Any;
use std::ffi::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;

/// Run one boundary operation, turning a panic into
/// [`ResultCode::InternalFault`].
pub fn guarded<F>(op: &'static str, f: F) -> i32
where
    F: FnOnce() -> ResultCode,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(code) => code.into(),
        Err(payload) => {
            let error = EdsdkError::Panicked(panic_message(payload.as_ref()));
            tracing::error!(op, error = %error, "Panic caught at boundary");
            ResultCode::InternalFault.into()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Map an operation result onto a code, logging failures.
fn report(op: &'static str, result: EdsdkResult<()>) -> ResultCode {
    match result {
        Ok(()) => ResultCode::Ok,
        Err(e) => {
            let code = ResultCode::from(&e);
            tracing::warn!(op, error = %e, code = code as i32, "Bridge call failed");
            code
        }
    }
}

/// Borrow the context behind a handle, or fail with `missing`.
unsafe fn context<'a, S: CameraSdk>(
    handle: *const Bridge<S>,
    missing: ResultCode,
) -> Result<&'a Bridge<S>, ResultCode> {
    // SAFETY: non-null handles come from `initialize` and are live until
    // `terminate`; that is the caller's contract.
    unsafe { handle.as_ref() }.ok_or(missing)
}

/// Parse the config, bind the SDK with `bind` and open a session.
///
/// On success `*out_handle` owns the new context; on failure it is null
/// and nothing is left loaded or open.
///
/// # Safety
///
/// `config_json` must be null or a NUL-terminated string. `out_handle`
/// must be null or writable.
pub unsafe fn initialize<S, F>(
    config_json: *const c_char,
    out_handle: *mut *mut Bridge<S>,
    bind: F,
) -> ResultCode
where
    S: CameraSdk,
    F: FnOnce(&BridgeConfig) -> EdsdkResult<Arc<S>>,
{
    if out_handle.is_null() {
        return ResultCode::InvalidArgument;
    }
    unsafe { out_handle.write(ptr::null_mut()) };

    let opened = unsafe { BridgeConfig::from_c_str(config_json) }.and_then(|config| {
        tracing::debug!(library = %config.library_path.display(), "Initializing bridge");
        let sdk = bind(&config)?;
        Bridge::open(sdk, &config)
    });
    match opened {
        Ok(bridge) => {
            unsafe { out_handle.write(Box::into_raw(Box::new(bridge))) };
            ResultCode::Ok
        }
        Err(e) => report("initialize", Err(e)),
    }
}

/// Tear down and free a context. Null is a no-op.
///
/// The handle is invalid afterwards whatever the result; a non-zero code
/// only reports that part of the best-effort cleanup failed.
///
/// # Safety
///
/// `handle` must be null or a live handle from [`initialize`].
pub unsafe fn terminate<S: CameraSdk>(handle: *mut Bridge<S>) -> ResultCode {
    if handle.is_null() {
        return ResultCode::Ok;
    }
    // SAFETY: ownership returns from the caller to us here.
    let bridge = unsafe { Box::from_raw(handle) };
    report("terminate", bridge.shutdown())
}

/// # Safety
///
/// `handle` must be null or a live handle from [`initialize`].
pub unsafe fn start_liveview<S: CameraSdk>(handle: *const Bridge<S>) -> ResultCode {
    match unsafe { context(handle, ResultCode::NoSession) } {
        Ok(bridge) => report("start_liveview", bridge.start_live_view()),
        Err(code) => code,
    }
}

/// # Safety
///
/// `handle` must be null or a live handle from [`initialize`].
pub unsafe fn stop_liveview<S: CameraSdk>(handle: *const Bridge<S>) -> ResultCode {
    match unsafe { context(handle, ResultCode::NoSession) } {
        Ok(bridge) => report("stop_liveview", bridge.stop_live_view()),
        Err(code) => code,
    }
}

/// Fetch one frame into a new buffer owned by the caller.
///
/// Out-parameters are cleared first, so they are null/0 on any failure.
///
/// # Safety
///
/// `handle` must be null or a live handle from [`initialize`]; `out_buf`
/// and `out_len` must be null or writable.
pub unsafe fn get_frame<S: CameraSdk>(
    handle: *const Bridge<S>,
    out_buf: *mut *mut u8,
    out_len: *mut usize,
) -> ResultCode {
    if out_buf.is_null() || out_len.is_null() {
        return ResultCode::InvalidArgument;
    }
    unsafe {
        out_buf.write(ptr::null_mut());
        out_len.write(0);
    }
    let bridge = match unsafe { context(handle, ResultCode::NotActive) } {
        Ok(bridge) => bridge,
        Err(code) => return code,
    };
    match bridge.fetch_frame_buffer() {
        Ok((buf, len)) => {
            unsafe {
                out_buf.write(buf.as_ptr());
                out_len.write(len);
            }
            ResultCode::Ok
        }
        Err(e) => report("get_frame", Err(e)),
    }
}

/// # Safety
///
/// `buf` must be null or an unfreed buffer from [`get_frame`].
pub unsafe fn free_buffer(buf: *mut u8) {
    unsafe { free_frame_buffer(buf) }
}

/// # Safety
///
/// `handle` must be null or a live handle from [`initialize`].
pub unsafe fn lock_ui<S: CameraSdk>(handle: *const Bridge<S>, locked: bool) -> ResultCode {
    match unsafe { context(handle, ResultCode::NoSession) } {
        Ok(bridge) => report("lock_ui", bridge.lock_ui(locked)),
        Err(code) => code,
    }
}

/// # Safety
///
/// `handle` must be null or a live handle from [`initialize`].
pub unsafe fn press_shutter<S: CameraSdk>(handle: *const Bridge<S>, button: i32) -> ResultCode {
    let Some(button) = ShutterButton::from_raw(button) else {
        return ResultCode::InvalidArgument;
    };
    match unsafe { context(handle, ResultCode::NoSession) } {
        Ok(bridge) => report("press_shutter", bridge.press_shutter(button)),
        Err(code) => code,
    }
}

/// # Safety
///
/// `handle` must be null or a live handle from [`initialize`].
pub unsafe fn pump_events<S: CameraSdk>(handle: *const Bridge<S>) -> ResultCode {
    match unsafe { context(handle, ResultCode::NoSession) } {
        Ok(bridge) => report("pump_events", bridge.pump_events()),
        Err(code) => code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_catches_panics() {
        let code = guarded("test", || panic!("vendor exploded"));
        assert_eq!(code, ResultCode::InternalFault as i32);

        let code = guarded("test", || ResultCode::NotActive);
        assert_eq!(code, -20);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "Unknown panic");
    }
}
