//! Error types for EDSDK operations.

use lib_types::{EdsCode, PropertyId, SessionState};
use thiserror::Error;

/// Errors that can occur while driving the EDSDK.
#[derive(Debug, Error)]
pub enum EdsdkError {
    /// Failed to load the shared library.
    #[error("Failed to load library '{path}': {source}")]
    LoadError {
        path: String,
        #[source]
        source: libloading::Error,
    },

    /// Required symbol not found in library.
    #[error("Symbol '{symbol}' not found in library")]
    SymbolNotFound { symbol: &'static str },

    /// EdsInitializeSDK returned an error.
    #[error("EdsInitializeSDK failed: {code}")]
    SdkInitFailed { code: EdsCode },

    /// EdsGetCameraList or EdsGetChildCount returned an error.
    #[error("Camera enumeration failed: {code}")]
    CameraListFailed { code: EdsCode },

    /// Enumeration succeeded but reported zero cameras.
    #[error("No camera found")]
    NoCamera,

    /// EdsGetChildAtIndex returned an error or a null reference.
    #[error("Failed to acquire camera at index {index}: {code}")]
    DeviceAcquireFailed { index: i32, code: EdsCode },

    /// EdsOpenSession returned an error.
    #[error("EdsOpenSession failed: {code}")]
    SessionOpenFailed { code: EdsCode },

    /// EdsCloseSession returned an error.
    #[error("EdsCloseSession failed: {code}")]
    SessionCloseFailed { code: EdsCode },

    /// EdsTerminateSDK returned an error.
    #[error("EdsTerminateSDK failed: {code}")]
    TerminateFailed { code: EdsCode },

    /// Invalid session state for operation.
    #[error("Invalid session state: expected {expected}, got {actual}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },

    /// A property or capture call was made without an open session.
    #[error("No open session (state: {state})")]
    NoSession { state: SessionState },

    /// EdsGetPropertyData returned an error.
    #[error("Reading {property} failed: {code}")]
    PropertyReadFailed { property: PropertyId, code: EdsCode },

    /// EdsSetPropertyData returned an error.
    #[error("Writing {property} failed: {code}")]
    PropertyWriteFailed { property: PropertyId, code: EdsCode },

    /// Frame requested while live view is not running.
    #[error("Live view is not active")]
    NotActive,

    /// EdsCreateMemoryStream failed.
    #[error("EdsCreateMemoryStream failed: {code}")]
    StreamCreateFailed { code: EdsCode },

    /// EdsCreateEvfImageRef failed.
    #[error("EdsCreateEvfImageRef failed: {code}")]
    ImageRefCreateFailed { code: EdsCode },

    /// The device kept reporting busy/not-ready until the retry ceiling.
    #[error("Live-view download still unavailable after {attempts} attempts (last: {last})")]
    RetryExhausted { attempts: u32, last: EdsCode },

    /// EdsDownloadEvfImage failed with a non-transient status.
    #[error("EdsDownloadEvfImage failed: {code}")]
    DeviceError { code: EdsCode },

    /// EdsGetPointer or EdsGetLength failed on the memory stream.
    #[error("Reading the memory stream failed: {code}")]
    StreamAccessFailed { code: EdsCode },

    /// Download succeeded but the stream held no bytes.
    #[error("Downloaded frame is empty")]
    EmptyFrame,

    /// Memory allocation failed.
    #[error("Failed to allocate {len} bytes")]
    AllocationFailed { len: u64 },

    /// A status or camera command returned an error.
    #[error("Command '{command}' failed: {code}")]
    CommandFailed { command: &'static str, code: EdsCode },

    /// Optional entry point absent from the loaded library.
    #[error("Operation '{operation}' not supported by this library")]
    NotSupported { operation: &'static str },

    /// Invalid configuration value.
    #[error("Invalid configuration '{name}': {reason}")]
    InvalidConfig { name: String, reason: String },

    /// A panic was caught before it could cross a foreign-call boundary.
    #[error("Internal fault: {0}")]
    Panicked(String),
}

impl EdsdkError {
    /// Create a load error.
    pub fn load_error(path: impl Into<String>, source: libloading::Error) -> Self {
        Self::LoadError {
            path: path.into(),
            source,
        }
    }

    /// Create a symbol not found error.
    pub fn symbol_not_found(symbol: &'static str) -> Self {
        Self::SymbolNotFound { symbol }
    }

    /// Create an invalid state error.
    pub fn invalid_state(expected: SessionState, actual: SessionState) -> Self {
        Self::InvalidState { expected, actual }
    }

    /// Create an invalid config error.
    pub fn invalid_config(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Check if retrying the whole call later could succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RetryExhausted { .. } | Self::EmptyFrame | Self::StreamCreateFailed { .. }
        )
    }

    /// Check if the initialize sequence must be restarted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::LoadError { .. }
                | Self::SymbolNotFound { .. }
                | Self::SdkInitFailed { .. }
                | Self::CameraListFailed { .. }
                | Self::NoCamera
                | Self::DeviceAcquireFailed { .. }
                | Self::SessionOpenFailed { .. }
                | Self::Panicked(_)
        )
    }

    /// The vendor status behind this error, if there was one.
    pub fn vendor_code(&self) -> Option<EdsCode> {
        match self {
            Self::SdkInitFailed { code }
            | Self::CameraListFailed { code }
            | Self::DeviceAcquireFailed { code, .. }
            | Self::SessionOpenFailed { code }
            | Self::SessionCloseFailed { code }
            | Self::TerminateFailed { code }
            | Self::PropertyReadFailed { code, .. }
            | Self::PropertyWriteFailed { code, .. }
            | Self::StreamCreateFailed { code }
            | Self::ImageRefCreateFailed { code }
            | Self::DeviceError { code }
            | Self::StreamAccessFailed { code }
            | Self::CommandFailed { code, .. } => Some(*code),
            Self::RetryExhausted { last, .. } => Some(*last),
            _ => None,
        }
    }
}

/// Result type for EDSDK operations.
pub type EdsdkResult<T> = Result<T, EdsdkError>;
