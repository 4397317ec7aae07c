//! Device session states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a device session.
///
/// States advance strictly left to right; any failure jumps to
/// `Terminated` once held references are released.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// SDK not initialized.
    Unloaded,
    /// EdsInitializeSDK succeeded.
    Initialized,
    /// Camera list obtained and non-empty.
    DeviceListed,
    /// First camera reference taken from the list.
    DeviceAcquired,
    /// EdsOpenSession succeeded; properties may be used.
    SessionOpen,
    /// EdsCloseSession has been called.
    SessionClosed,
    /// References released and EdsTerminateSDK called.
    Terminated,
}

impl SessionState {
    /// Whether the SDK has been initialized and not yet terminated.
    pub fn holds_sdk(self) -> bool {
        !matches!(self, Self::Unloaded | Self::Terminated)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unloaded => "unloaded",
            Self::Initialized => "initialized",
            Self::DeviceListed => "device-listed",
            Self::DeviceAcquired => "device-acquired",
            Self::SessionOpen => "session-open",
            Self::SessionClosed => "session-closed",
            Self::Terminated => "terminated",
        };
        f.write_str(s)
    }
}
