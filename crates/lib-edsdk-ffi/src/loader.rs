//! Dynamic library loading for the EDSDK.
//!
//! This module loads the vendor-supplied shared library and resolves the
//! entry points the bridge uses into a typed function table.

use crate::error::{EdsdkError, EdsdkResult};
use crate::sdk::{CameraSdk, EdsRef, PropertyEventCallback};
use lib_types::{EdsCode, PropertyEvent, PropertyId, StatusCommand};
use libloading::Library;
use std::ffi::c_void;
use std::mem::size_of;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::Arc;

/// `EdsError EdsInitializeSDK(void)` and `EdsTerminateSDK`, `EdsGetEvent`.
pub type EdsVoidFn = unsafe extern "system" fn() -> u32;

/// `EdsError EdsGetCameraList(EdsCameraListRef *outCameraListRef)`.
pub type EdsGetCameraListFn = unsafe extern "system" fn(out_list: *mut *mut c_void) -> u32;

/// `EdsError EdsGetChildCount(EdsBaseRef inRef, EdsUInt32 *outCount)`.
pub type EdsGetChildCountFn =
    unsafe extern "system" fn(parent: *mut c_void, out_count: *mut u32) -> u32;

/// `EdsError EdsGetChildAtIndex(EdsBaseRef inRef, EdsInt32 inIndex, EdsBaseRef *outRef)`.
pub type EdsGetChildAtIndexFn =
    unsafe extern "system" fn(parent: *mut c_void, index: i32, out_child: *mut *mut c_void) -> u32;

/// `EdsOpenSession`, `EdsCloseSession`: `EdsError (EdsCameraRef inCameraRef)`.
pub type EdsCameraFn = unsafe extern "system" fn(camera: *mut c_void) -> u32;

/// `EdsUInt32 EdsRelease(EdsBaseRef inRef)`.
pub type EdsReleaseFn = unsafe extern "system" fn(object: *mut c_void) -> u32;

/// ```c
/// EdsError EdsGetPropertyData(
///     EdsBaseRef    inRef,
///     EdsPropertyID inPropertyID,
///     EdsInt32      inParam,
///     EdsUInt32     inPropertySize,
///     EdsVoid      *outPropertyData
/// );
/// ```
pub type EdsGetPropertyDataFn = unsafe extern "system" fn(
    object: *mut c_void,
    property: u32,
    param: i32,
    size: u32,
    out_data: *mut c_void,
) -> u32;

/// `EdsSetPropertyData`, same layout as the getter with a const input.
pub type EdsSetPropertyDataFn = unsafe extern "system" fn(
    object: *mut c_void,
    property: u32,
    param: i32,
    size: u32,
    data: *const c_void,
) -> u32;

/// `EdsError EdsCreateMemoryStream(EdsUInt64 inBufferSize, EdsStreamRef *outStream)`.
pub type EdsCreateMemoryStreamFn =
    unsafe extern "system" fn(buffer_size: u64, out_stream: *mut *mut c_void) -> u32;

/// `EdsError EdsCreateEvfImageRef(EdsStreamRef inStreamRef, EdsEvfImageRef *outEvfImageRef)`.
pub type EdsCreateEvfImageRefFn =
    unsafe extern "system" fn(stream: *mut c_void, out_image: *mut *mut c_void) -> u32;

/// `EdsError EdsDownloadEvfImage(EdsCameraRef inCameraRef, EdsEvfImageRef inEvfImageRef)`.
pub type EdsDownloadEvfImageFn =
    unsafe extern "system" fn(camera: *mut c_void, image: *mut c_void) -> u32;

/// `EdsError EdsGetPointer(EdsStreamRef inStream, EdsVoid **outPointer)`.
pub type EdsGetPointerFn =
    unsafe extern "system" fn(stream: *mut c_void, out_pointer: *mut *mut c_void) -> u32;

/// `EdsError EdsGetLength(EdsStreamRef inStream, EdsUInt64 *outLength)`.
pub type EdsGetLengthFn = unsafe extern "system" fn(stream: *mut c_void, out_length: *mut u64) -> u32;

/// `EdsSendStatusCommand` and `EdsSendCommand`:
/// `EdsError (EdsCameraRef, EdsUInt32 inCommand, EdsInt32 inParam)`.
pub type EdsCommandFn = unsafe extern "system" fn(camera: *mut c_void, command: u32, param: i32) -> u32;

/// ```c
/// EdsError EdsSetPropertyEventHandler(
///     EdsCameraRef            inCameraRef,
///     EdsPropertyEvent        inEvent,
///     EdsPropertyEventHandler inPropertyEventHandler,
///     EdsVoid                *inContext
/// );
/// ```
pub type EdsSetPropertyEventHandlerFn = unsafe extern "system" fn(
    camera: *mut c_void,
    event: u32,
    handler: Option<PropertyEventCallback>,
    context: *mut c_void,
) -> u32;

/// Entry points the bridge cannot work without.
pub const REQUIRED_SYMBOLS: [&str; 15] = [
    "EdsInitializeSDK",
    "EdsTerminateSDK",
    "EdsGetCameraList",
    "EdsGetChildCount",
    "EdsGetChildAtIndex",
    "EdsOpenSession",
    "EdsCloseSession",
    "EdsRelease",
    "EdsGetPropertyData",
    "EdsSetPropertyData",
    "EdsCreateMemoryStream",
    "EdsCreateEvfImageRef",
    "EdsDownloadEvfImage",
    "EdsGetPointer",
    "EdsGetLength",
];

/// Entry points used when present.
pub const OPTIONAL_SYMBOLS: [&str; 4] = [
    "EdsSendStatusCommand",
    "EdsSendCommand",
    "EdsSetPropertyEventHandler",
    "EdsGetEvent",
];

/// Resolved EDSDK function table.
struct EdsdkFunctions {
    initialize_sdk: EdsVoidFn,
    terminate_sdk: EdsVoidFn,
    get_camera_list: EdsGetCameraListFn,
    get_child_count: EdsGetChildCountFn,
    get_child_at_index: EdsGetChildAtIndexFn,
    open_session: EdsCameraFn,
    close_session: EdsCameraFn,
    release: EdsReleaseFn,
    get_property_data: EdsGetPropertyDataFn,
    set_property_data: EdsSetPropertyDataFn,
    create_memory_stream: EdsCreateMemoryStreamFn,
    create_evf_image_ref: EdsCreateEvfImageRefFn,
    download_evf_image: EdsDownloadEvfImageFn,
    get_pointer: EdsGetPointerFn,
    get_length: EdsGetLengthFn,

    send_status_command: Option<EdsCommandFn>,
    send_command: Option<EdsCommandFn>,
    set_property_event_handler: Option<EdsSetPropertyEventHandlerFn>,
    get_event: Option<EdsVoidFn>,
}

/// Loaded EDSDK library with extracted function pointers.
pub struct EdsdkLibrary {
    /// The underlying dynamic library handle. Must outlive `fns`.
    #[allow(dead_code)]
    library: Library,

    /// Path to the library file.
    pub path: String,

    fns: EdsdkFunctions,
}

impl EdsdkLibrary {
    /// Load the EDSDK from a shared library file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to `EDSDK.dll`, `libEDSDK.so` or the framework binary
    ///
    /// Fails if the library cannot be opened or any entry point in
    /// [`REQUIRED_SYMBOLS`] is missing. Optional entry points are resolved
    /// when present.
    pub fn load<P: AsRef<Path>>(path: P) -> EdsdkResult<Arc<Self>> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        // SAFETY: loading runs the library's initializers; the EDSDK's are
        // trusted to the same degree as the rest of the vendor code.
        let library =
            unsafe { Library::new(path) }.map_err(|e| EdsdkError::load_error(&path_str, e))?;

        // SAFETY: each symbol is resolved with the signature documented in
        // the EDSDK headers; see the type aliases above.
        let fns = unsafe {
            EdsdkFunctions {
                initialize_sdk: required(&library, "EdsInitializeSDK")?,
                terminate_sdk: required(&library, "EdsTerminateSDK")?,
                get_camera_list: required(&library, "EdsGetCameraList")?,
                get_child_count: required(&library, "EdsGetChildCount")?,
                get_child_at_index: required(&library, "EdsGetChildAtIndex")?,
                open_session: required(&library, "EdsOpenSession")?,
                close_session: required(&library, "EdsCloseSession")?,
                release: required(&library, "EdsRelease")?,
                get_property_data: required(&library, "EdsGetPropertyData")?,
                set_property_data: required(&library, "EdsSetPropertyData")?,
                create_memory_stream: required(&library, "EdsCreateMemoryStream")?,
                create_evf_image_ref: required(&library, "EdsCreateEvfImageRef")?,
                download_evf_image: required(&library, "EdsDownloadEvfImage")?,
                get_pointer: required(&library, "EdsGetPointer")?,
                get_length: required(&library, "EdsGetLength")?,
                send_status_command: optional(&library, "EdsSendStatusCommand"),
                send_command: optional(&library, "EdsSendCommand"),
                set_property_event_handler: optional(&library, "EdsSetPropertyEventHandler"),
                get_event: optional(&library, "EdsGetEvent"),
            }
        };

        tracing::info!(
            path = %path_str,
            has_status_command = fns.send_status_command.is_some(),
            has_command = fns.send_command.is_some(),
            has_event_handler = fns.set_property_event_handler.is_some(),
            has_get_event = fns.get_event.is_some(),
            "Loaded EDSDK library"
        );

        Ok(Arc::new(Self {
            library,
            path: path_str,
            fns,
        }))
    }

    /// Report which entry points a library exports, without failing on
    /// missing ones.
    pub fn inspect<P: AsRef<Path>>(path: P) -> EdsdkResult<LibraryInfo> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        // SAFETY: see `load`.
        let library =
            unsafe { Library::new(path) }.map_err(|e| EdsdkError::load_error(&path_str, e))?;

        let probe = |name: &'static str| {
            // SAFETY: the symbol is only checked for presence, never called.
            let present = unsafe { library.get::<*const c_void>(name.as_bytes()).is_ok() };
            (name, present)
        };

        Ok(LibraryInfo {
            format: LibraryFormat::from_path(path),
            path: path_str,
            required: REQUIRED_SYMBOLS.iter().map(|&name| probe(name)).collect(),
            optional: OPTIONAL_SYMBOLS.iter().map(|&name| probe(name)).collect(),
        })
    }

    /// Release `raw` if the SDK handed back an object alongside a failure.
    fn discard_on_failure(&self, code: EdsCode, raw: *mut c_void) -> Result<EdsRef, EdsCode> {
        match (code.is_ok(), EdsRef::from_raw(raw)) {
            (true, Some(object)) => Ok(object),
            (true, None) => Err(EdsCode::INVALID_HANDLE),
            (false, Some(object)) => {
                tracing::debug!(%code, "Releasing object returned with a failed call");
                self.release(object);
                Err(code)
            }
            (false, None) => Err(code),
        }
    }
}

impl CameraSdk for EdsdkLibrary {
    fn initialize(&self) -> EdsCode {
        // SAFETY: no arguments.
        EdsCode(unsafe { (self.fns.initialize_sdk)() })
    }

    fn terminate(&self) -> EdsCode {
        // SAFETY: no arguments.
        EdsCode(unsafe { (self.fns.terminate_sdk)() })
    }

    fn camera_list(&self) -> Result<EdsRef, EdsCode> {
        let mut list = ptr::null_mut();
        // SAFETY: `list` is a valid out-pointer for the duration of the call.
        let code = EdsCode(unsafe { (self.fns.get_camera_list)(&mut list) });
        self.discard_on_failure(code, list)
    }

    fn child_count(&self, parent: EdsRef) -> Result<u32, EdsCode> {
        let mut count = 0u32;
        // SAFETY: `parent` came from this library; `count` is a valid out-pointer.
        let code = EdsCode(unsafe { (self.fns.get_child_count)(parent.as_ptr(), &mut count) });
        code.into_result().map(|()| count)
    }

    fn child_at(&self, parent: EdsRef, index: i32) -> Result<EdsRef, EdsCode> {
        let mut child = ptr::null_mut();
        // SAFETY: `parent` came from this library; `child` is a valid out-pointer.
        let code = EdsCode(unsafe {
            (self.fns.get_child_at_index)(parent.as_ptr(), index, &mut child)
        });
        self.discard_on_failure(code, child)
    }

    fn open_session(&self, camera: EdsRef) -> EdsCode {
        // SAFETY: `camera` came from this library.
        EdsCode(unsafe { (self.fns.open_session)(camera.as_ptr()) })
    }

    fn close_session(&self, camera: EdsRef) -> EdsCode {
        // SAFETY: `camera` came from this library.
        EdsCode(unsafe { (self.fns.close_session)(camera.as_ptr()) })
    }

    fn release(&self, object: EdsRef) -> u32 {
        // SAFETY: `object` came from this library and is released once by its owner.
        unsafe { (self.fns.release)(object.as_ptr()) }
    }

    fn get_property_u32(
        &self,
        object: EdsRef,
        property: PropertyId,
        param: i32,
    ) -> Result<u32, EdsCode> {
        let mut value = 0u32;
        // SAFETY: `value` is a writable u32 and its size is passed alongside.
        let code = EdsCode(unsafe {
            (self.fns.get_property_data)(
                object.as_ptr(),
                property.0,
                param,
                size_of::<u32>() as u32,
                (&mut value as *mut u32).cast(),
            )
        });
        code.into_result().map(|()| value)
    }

    fn set_property_u32(
        &self,
        object: EdsRef,
        property: PropertyId,
        param: i32,
        value: u32,
    ) -> EdsCode {
        // SAFETY: `value` lives across the call and its size is passed alongside.
        EdsCode(unsafe {
            (self.fns.set_property_data)(
                object.as_ptr(),
                property.0,
                param,
                size_of::<u32>() as u32,
                (&value as *const u32).cast(),
            )
        })
    }

    fn create_memory_stream(&self, capacity: u64) -> Result<EdsRef, EdsCode> {
        let mut stream = ptr::null_mut();
        // SAFETY: `stream` is a valid out-pointer.
        let code = EdsCode(unsafe { (self.fns.create_memory_stream)(capacity, &mut stream) });
        self.discard_on_failure(code, stream)
    }

    fn create_evf_image_ref(&self, stream: EdsRef) -> Result<EdsRef, EdsCode> {
        let mut image = ptr::null_mut();
        // SAFETY: `stream` came from this library; `image` is a valid out-pointer.
        let code =
            EdsCode(unsafe { (self.fns.create_evf_image_ref)(stream.as_ptr(), &mut image) });
        self.discard_on_failure(code, image)
    }

    fn download_evf_image(&self, camera: EdsRef, image: EdsRef) -> EdsCode {
        // SAFETY: both references came from this library and are alive.
        EdsCode(unsafe { (self.fns.download_evf_image)(camera.as_ptr(), image.as_ptr()) })
    }

    fn stream_pointer(&self, stream: EdsRef) -> Result<*const u8, EdsCode> {
        let mut pointer = ptr::null_mut();
        // SAFETY: `stream` came from this library; `pointer` is a valid out-pointer.
        let code = EdsCode(unsafe { (self.fns.get_pointer)(stream.as_ptr(), &mut pointer) });
        code.into_result().map(|()| pointer.cast_const().cast::<u8>())
    }

    fn stream_length(&self, stream: EdsRef) -> Result<u64, EdsCode> {
        let mut length = 0u64;
        // SAFETY: `stream` came from this library; `length` is a valid out-pointer.
        let code = EdsCode(unsafe { (self.fns.get_length)(stream.as_ptr(), &mut length) });
        code.into_result().map(|()| length)
    }

    fn send_status_command(&self, camera: EdsRef, command: StatusCommand) -> Option<EdsCode> {
        let send = self.fns.send_status_command?;
        // SAFETY: `camera` came from this library.
        Some(EdsCode(unsafe { send(camera.as_ptr(), command as u32, 0) }))
    }

    fn send_command(&self, camera: EdsRef, command: u32, param: i32) -> Option<EdsCode> {
        let send = self.fns.send_command?;
        // SAFETY: `camera` came from this library.
        Some(EdsCode(unsafe { send(camera.as_ptr(), command, param) }))
    }

    unsafe fn set_property_event_handler(
        &self,
        camera: EdsRef,
        event: PropertyEvent,
        handler: Option<PropertyEventCallback>,
        context: *mut c_void,
    ) -> Option<EdsCode> {
        let register = self.fns.set_property_event_handler?;
        // SAFETY: the caller upholds the context lifetime contract.
        Some(EdsCode(unsafe {
            register(camera.as_ptr(), event as u32, handler, context)
        }))
    }

    fn get_event(&self) -> Option<EdsCode> {
        let pump = self.fns.get_event?;
        // SAFETY: no arguments.
        Some(EdsCode(unsafe { pump() }))
    }
}

// EdsdkLibrary is Send + Sync because we only store function pointers
// and the Library handle, which are thread-safe to access.
unsafe impl Send for EdsdkLibrary {}
unsafe impl Sync for EdsdkLibrary {}

/// Resolve a required entry point.
///
/// # Safety
/// `T` must be the function pointer type matching the symbol's C signature.
unsafe fn required<T: Copy>(library: &Library, symbol: &'static str) -> EdsdkResult<T> {
    // SAFETY: upheld by the caller.
    unsafe {
        library
            .get::<T>(symbol.as_bytes())
            .map(|s| *s)
            .map_err(|_| EdsdkError::symbol_not_found(symbol))
    }
}

/// Resolve an optional entry point.
///
/// # Safety
/// Same contract as [`required`].
unsafe fn optional<T: Copy>(library: &Library, symbol: &'static str) -> Option<T> {
    // SAFETY: upheld by the caller.
    let resolved = unsafe { library.get::<T>(symbol.as_bytes()).ok().map(|s| *s) };
    if resolved.is_none() {
        tracing::debug!(symbol, "Optional EDSDK entry point not exported");
    }
    resolved
}

/// Entry-point availability of a library file.
#[derive(Clone, Debug)]
pub struct LibraryInfo {
    /// Path to the library.
    pub path: String,

    /// Platform-specific library format.
    pub format: LibraryFormat,

    /// Required entry points and whether each resolved.
    pub required: Vec<(&'static str, bool)>,

    /// Optional entry points and whether each resolved.
    pub optional: Vec<(&'static str, bool)>,
}

impl LibraryInfo {
    /// Whether [`EdsdkLibrary::load`] would accept this library.
    pub fn is_loadable(&self) -> bool {
        self.required.iter().all(|&(_, present)| present)
    }

    pub fn missing_required(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.required
            .iter()
            .filter(|&&(_, present)| !present)
            .map(|&(name, _)| name)
    }
}

/// Platform-specific library format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LibraryFormat {
    /// Windows DLL.
    Dll,
    /// Linux/Unix shared object.
    So,
    /// macOS dynamic library or framework binary.
    Dylib,
    /// Unknown format.
    Unknown,
}

impl LibraryFormat {
    /// Detect format from file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("dll") | Some("DLL") => Self::Dll,
            Some("so") => Self::So,
            Some("dylib") => Self::Dylib,
            None if path.components().any(|c| c.as_os_str() == "EDSDK.framework") => Self::Dylib,
            _ => Self::Unknown,
        }
    }
}

/// Default location of the EDSDK for the current platform, resolved
/// through the loader's normal search path.
#[cfg(target_os = "windows")]
pub fn default_library_path() -> PathBuf {
    PathBuf::from("EDSDK.dll")
}

#[cfg(target_os = "macos")]
pub fn default_library_path() -> PathBuf {
    PathBuf::from("EDSDK.framework/EDSDK")
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub fn default_library_path() -> PathBuf {
    PathBuf::from("libEDSDK.so")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_format_detection() {
        assert_eq!(LibraryFormat::from_path("EDSDK.dll"), LibraryFormat::Dll);
        assert_eq!(LibraryFormat::from_path("libEDSDK.so"), LibraryFormat::So);
        assert_eq!(
            LibraryFormat::from_path("libEDSDK.dylib"),
            LibraryFormat::Dylib
        );
        assert_eq!(
            LibraryFormat::from_path("/Library/Frameworks/EDSDK.framework/EDSDK"),
            LibraryFormat::Dylib
        );
        assert_eq!(LibraryFormat::from_path("EDSDK.txt"), LibraryFormat::Unknown);
    }

    #[test]
    fn test_missing_library_is_a_load_error() {
        let err = EdsdkLibrary::load("/nonexistent/libEDSDK.so").err();
        assert!(matches!(err, Some(EdsdkError::LoadError { .. })));
    }

    #[test]
    fn test_symbol_tables_are_disjoint() {
        for name in OPTIONAL_SYMBOLS {
            assert!(!REQUIRED_SYMBOLS.contains(&name));
        }
    }

    #[test]
    fn test_library_info_missing_required() {
        let info = LibraryInfo {
            path: "EDSDK.dll".to_string(),
            format: LibraryFormat::Dll,
            required: vec![("EdsInitializeSDK", true), ("EdsGetLength", false)],
            optional: vec![("EdsGetEvent", false)],
        };
        assert!(!info.is_loadable());
        assert_eq!(info.missing_required().collect::<Vec<_>>(), vec!["EdsGetLength"]);
    }
}
