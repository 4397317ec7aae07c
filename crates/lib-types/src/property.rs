//! Camera property identifiers and command constants.
//!
//! Only the subset the live-view bridge touches is defined here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// EDSDK property identifier (`EdsPropertyID`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PropertyId(pub u32);

impl PropertyId {
    pub const BATTERY_LEVEL: Self = Self(0x0000_0008);
    pub const SAVE_TO: Self = Self(0x0000_000B);
    /// Where the live-view feed is delivered (`kEdsPropID_Evf_OutputDevice`).
    pub const EVF_OUTPUT_DEVICE: Self = Self(0x0000_0500);
    pub const EVF_MODE: Self = Self(0x0000_0501);

    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::BATTERY_LEVEL => Some("BatteryLevel"),
            Self::SAVE_TO => Some("SaveTo"),
            Self::EVF_OUTPUT_DEVICE => Some("Evf_OutputDevice"),
            Self::EVF_MODE => Some("Evf_Mode"),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:08X})", name, self.0),
            None => write!(f, "property 0x{:08X}", self.0),
        }
    }
}

/// Bits of the `Evf_OutputDevice` property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct EvfOutputDevice(pub u32);

impl EvfOutputDevice {
    /// Camera's own rear screen.
    pub const TFT: u32 = 0x0000_0001;
    /// Host computer.
    pub const PC: u32 = 0x0000_0002;

    pub fn routes_to_host(self) -> bool {
        self.0 & Self::PC != 0
    }

    /// Same routing with the host bit set; other bits untouched.
    pub fn with_host(self) -> Self {
        Self(self.0 | Self::PC)
    }

    /// Same routing with the host bit cleared; other bits untouched.
    pub fn without_host(self) -> Self {
        Self(self.0 & !Self::PC)
    }
}

/// Camera status commands (`EdsSendStatusCommand`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum StatusCommand {
    UiLock = 0x0000_0000,
    UiUnlock = 0x0000_0001,
}

/// `kEdsCameraCommand_PressShutterButton`.
pub const COMMAND_PRESS_SHUTTER_BUTTON: u32 = 0x0000_0004;

/// Shutter button positions for the press-shutter command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum ShutterButton {
    Off = 0,
    Halfway = 1,
    Completely = 3,
}

impl ShutterButton {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Off),
            1 => Some(Self::Halfway),
            3 => Some(Self::Completely),
            _ => None,
        }
    }
}

/// Property event kinds delivered to a registered handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum PropertyEvent {
    /// Registration mask covering every property event.
    All = 0x0000_0100,
    PropertyChanged = 0x0000_0101,
    PropertyDescChanged = 0x0000_0102,
}

impl PropertyEvent {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0x0000_0100 => Some(Self::All),
            0x0000_0101 => Some(Self::PropertyChanged),
            0x0000_0102 => Some(Self::PropertyDescChanged),
            _ => None,
        }
    }
}
