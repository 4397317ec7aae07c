//! EDSDK status codes.
//!
//! Every EDSDK entry point returns an `EdsError` (a `u32`). Zero is success;
//! everything else is a failure, of which exactly two are worth retrying.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw status code returned by an EDSDK call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct EdsCode(pub u32);

impl EdsCode {
    pub const OK: Self = Self(0x0000_0000);
    pub const UNIMPLEMENTED: Self = Self(0x0000_0001);
    pub const INTERNAL_ERROR: Self = Self(0x0000_0002);
    pub const MEM_ALLOC_FAILED: Self = Self(0x0000_0003);
    pub const NOT_SUPPORTED: Self = Self(0x0000_0007);
    pub const UNEXPECTED_EXCEPTION: Self = Self(0x0000_0008);
    pub const INVALID_PARAMETER: Self = Self(0x0000_0060);
    pub const INVALID_HANDLE: Self = Self(0x0000_0061);
    pub const INVALID_POINTER: Self = Self(0x0000_0062);
    pub const DEVICE_NOT_FOUND: Self = Self(0x0000_0080);
    /// Device momentarily busy; retry later.
    pub const DEVICE_BUSY: Self = Self(0x0000_0081);
    pub const DEVICE_INVALID: Self = Self(0x0000_0082);
    pub const DEVICE_INTERNAL_ERROR: Self = Self(0x0000_0085);
    pub const COMM_PORT_IS_IN_USE: Self = Self(0x0000_00C0);
    pub const COMM_DISCONNECTED: Self = Self(0x0000_00C1);
    pub const SESSION_NOT_OPEN: Self = Self(0x0000_2003);
    /// Live-view frame not produced yet; retry later.
    pub const OBJECT_NOTREADY: Self = Self(0x0000_A102);

    /// Whether the call succeeded.
    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    /// Whether the device may accept the same request after a short wait.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::DEVICE_BUSY | Self::OBJECT_NOTREADY)
    }

    /// Convert into a `Result`, keeping the failing code as the error.
    pub fn into_result(self) -> Result<(), EdsCode> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Symbolic SDK name, if the code is one we know.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::OK => "EDS_ERR_OK",
            Self::UNIMPLEMENTED => "EDS_ERR_UNIMPLEMENTED",
            Self::INTERNAL_ERROR => "EDS_ERR_INTERNAL_ERROR",
            Self::MEM_ALLOC_FAILED => "EDS_ERR_MEM_ALLOC_FAILED",
            Self::NOT_SUPPORTED => "EDS_ERR_NOT_SUPPORTED",
            Self::UNEXPECTED_EXCEPTION => "EDS_ERR_UNEXPECTED_EXCEPTION",
            Self::INVALID_PARAMETER => "EDS_ERR_INVALID_PARAMETER",
            Self::INVALID_HANDLE => "EDS_ERR_INVALID_HANDLE",
            Self::INVALID_POINTER => "EDS_ERR_INVALID_POINTER",
            Self::DEVICE_NOT_FOUND => "EDS_ERR_DEVICE_NOT_FOUND",
            Self::DEVICE_BUSY => "EDS_ERR_DEVICE_BUSY",
            Self::DEVICE_INVALID => "EDS_ERR_DEVICE_INVALID",
            Self::DEVICE_INTERNAL_ERROR => "EDS_ERR_DEVICE_INTERNAL_ERROR",
            Self::COMM_PORT_IS_IN_USE => "EDS_ERR_COMM_PORT_IS_IN_USE",
            Self::COMM_DISCONNECTED => "EDS_ERR_COMM_DISCONNECTED",
            Self::SESSION_NOT_OPEN => "EDS_ERR_SESSION_NOT_OPEN",
            Self::OBJECT_NOTREADY => "EDS_ERR_OBJECT_NOTREADY",
            _ => return None,
        };
        Some(name)
    }
}

impl From<u32> for EdsCode {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for EdsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:08X})", name, self.0),
            None => write!(f, "EDSDK error 0x{:08X}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(EdsCode::DEVICE_BUSY.is_transient());
        assert!(EdsCode::OBJECT_NOTREADY.is_transient());
        assert!(!EdsCode::OK.is_transient());
        assert!(!EdsCode::COMM_DISCONNECTED.is_transient());
    }

    #[test]
    fn test_display_names_known_codes() {
        assert_eq!(
            EdsCode::OBJECT_NOTREADY.to_string(),
            "EDS_ERR_OBJECT_NOTREADY (0x0000A102)"
        );
        assert_eq!(EdsCode(0xDEAD).to_string(), "EDSDK error 0x0000DEAD");
    }

    #[test]
    fn test_into_result() {
        assert!(EdsCode::OK.into_result().is_ok());
        assert_eq!(EdsCode::DEVICE_BUSY.into_result(), Err(EdsCode::DEVICE_BUSY));
    }
}
