//! Integer result codes returned across the C boundary.

use lib_edsdk_ffi::EdsdkError;
use std::ffi::CStr;
use std::fmt;

/// Status of an `evf_*` call. Zero is success, everything else negative.
///
/// Codes are grouped by the stage that failed: initialization (-1..-9),
/// session (-10..-19), live view (-20..-29), optional features (-30..) and
/// the reserved internal fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ResultCode {
    Ok = 0,

    LibraryLoad = -1,
    SdkInit = -2,
    CameraList = -3,
    NoCamera = -4,
    DeviceAcquire = -5,
    SessionOpen = -6,
    InvalidConfig = -7,

    NoSession = -10,
    PropertyRead = -11,
    PropertyWrite = -12,
    SessionClose = -13,
    Terminate = -14,

    NotActive = -20,
    InvalidArgument = -21,
    StreamCreate = -22,
    ImageRefCreate = -23,
    RetryExhausted = -24,
    DeviceError = -25,
    EmptyFrame = -26,
    AllocationFailed = -27,
    StreamAccess = -28,

    NotSupported = -30,
    CommandFailed = -31,

    InternalFault = -999,
}

impl ResultCode {
    pub const ALL: [ResultCode; 25] = [
        Self::Ok,
        Self::LibraryLoad,
        Self::SdkInit,
        Self::CameraList,
        Self::NoCamera,
        Self::DeviceAcquire,
        Self::SessionOpen,
        Self::InvalidConfig,
        Self::NoSession,
        Self::PropertyRead,
        Self::PropertyWrite,
        Self::SessionClose,
        Self::Terminate,
        Self::NotActive,
        Self::InvalidArgument,
        Self::StreamCreate,
        Self::ImageRefCreate,
        Self::RetryExhausted,
        Self::DeviceError,
        Self::EmptyFrame,
        Self::AllocationFailed,
        Self::StreamAccess,
        Self::NotSupported,
        Self::CommandFailed,
        Self::InternalFault,
    ];

    pub fn from_raw(raw: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|code| *code as i32 == raw)
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// Static, NUL-terminated description for `evf_result_message`.
    pub fn message(self) -> &'static CStr {
        match self {
            Self::Ok => c"success",
            Self::LibraryLoad => c"EDSDK library could not be loaded or is missing a required symbol",
            Self::SdkInit => c"EdsInitializeSDK failed",
            Self::CameraList => c"camera enumeration failed",
            Self::NoCamera => c"no camera connected",
            Self::DeviceAcquire => c"could not acquire the camera",
            Self::SessionOpen => c"could not open a session with the camera",
            Self::InvalidConfig => c"invalid configuration",
            Self::NoSession => c"no open camera session",
            Self::PropertyRead => c"reading a camera property failed",
            Self::PropertyWrite => c"writing a camera property failed",
            Self::SessionClose => c"closing the camera session failed",
            Self::Terminate => c"EdsTerminateSDK failed",
            Self::NotActive => c"live view is not active",
            Self::InvalidArgument => c"invalid argument",
            Self::StreamCreate => c"could not create a memory stream",
            Self::ImageRefCreate => c"could not create a live-view image reference",
            Self::RetryExhausted => c"camera stayed busy or not ready for every attempt",
            Self::DeviceError => c"live-view download failed",
            Self::EmptyFrame => c"camera returned an empty frame",
            Self::AllocationFailed => c"could not allocate the frame buffer",
            Self::StreamAccess => c"could not read the memory stream",
            Self::NotSupported => c"operation not supported by the loaded EDSDK",
            Self::CommandFailed => c"camera command failed",
            Self::InternalFault => c"internal fault",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message().to_string_lossy(), *self as i32)
    }
}

impl From<ResultCode> for i32 {
    fn from(code: ResultCode) -> Self {
        code as i32
    }
}

impl From<&EdsdkError> for ResultCode {
    fn from(err: &EdsdkError) -> Self {
        match err {
            EdsdkError::LoadError { .. } | EdsdkError::SymbolNotFound { .. } => Self::LibraryLoad,
            EdsdkError::SdkInitFailed { .. } => Self::SdkInit,
            EdsdkError::CameraListFailed { .. } => Self::CameraList,
            EdsdkError::NoCamera => Self::NoCamera,
            EdsdkError::DeviceAcquireFailed { .. } => Self::DeviceAcquire,
            EdsdkError::SessionOpenFailed { .. } => Self::SessionOpen,
            EdsdkError::SessionCloseFailed { .. } => Self::SessionClose,
            EdsdkError::TerminateFailed { .. } => Self::Terminate,
            EdsdkError::InvalidState { .. } | EdsdkError::NoSession { .. } => Self::NoSession,
            EdsdkError::PropertyReadFailed { .. } => Self::PropertyRead,
            EdsdkError::PropertyWriteFailed { .. } => Self::PropertyWrite,
            EdsdkError::NotActive => Self::NotActive,
            EdsdkError::StreamCreateFailed { .. } => Self::StreamCreate,
            EdsdkError::ImageRefCreateFailed { .. } => Self::ImageRefCreate,
            EdsdkError::RetryExhausted { .. } => Self::RetryExhausted,
            EdsdkError::DeviceError { .. } => Self::DeviceError,
            EdsdkError::StreamAccessFailed { .. } => Self::StreamAccess,
            EdsdkError::EmptyFrame => Self::EmptyFrame,
            EdsdkError::AllocationFailed { .. } => Self::AllocationFailed,
            EdsdkError::CommandFailed { .. } => Self::CommandFailed,
            EdsdkError::NotSupported { .. } => Self::NotSupported,
            EdsdkError::InvalidConfig { .. } => Self::InvalidConfig,
            EdsdkError::Panicked(_) => Self::InternalFault,
        }
    }
}

impl From<EdsdkError> for ResultCode {
    fn from(err: EdsdkError) -> Self {
        Self::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::EdsCode;

    #[test]
    fn test_codes_are_unique_and_non_positive() {
        let mut seen = std::collections::HashSet::new();
        for code in ResultCode::ALL.iter() {
            assert!(*code as i32 <= 0);
            assert!(seen.insert(*code as i32), "duplicate {code:?}");
            assert_eq!(ResultCode::from_raw(*code as i32), Some(*code));
        }
        assert_eq!(ResultCode::from_raw(1), None);
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(ResultCode::from(&EdsdkError::NoCamera), ResultCode::NoCamera);
        assert_eq!(ResultCode::from(&EdsdkError::NotActive), ResultCode::NotActive);
        let exhausted = EdsdkError::RetryExhausted {
            attempts: 6,
            last: EdsCode::OBJECT_NOTREADY,
        };
        assert_eq!(ResultCode::from(&exhausted), ResultCode::RetryExhausted);
        let hard = EdsdkError::DeviceError {
            code: EdsCode::COMM_DISCONNECTED,
        };
        assert_eq!(ResultCode::from(hard), ResultCode::DeviceError);
        assert_eq!(
            ResultCode::from(&EdsdkError::Panicked("boom".into())),
            ResultCode::InternalFault
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(ResultCode::Ok.message().to_str().unwrap(), "success");
        assert_eq!(ResultCode::NoCamera.to_string(), "no camera connected (-4)");
    }
}
