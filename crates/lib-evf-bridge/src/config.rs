//! Bridge configuration, passed as JSON to `evf_initialize`.

use lib_edsdk_ffi::{default_library_path, EdsdkError, EdsdkResult, RetryPolicy, SessionOptions};
use serde::{Deserialize, Serialize};
use std::ffi::{c_char, CStr};
use std::path::PathBuf;

/// Settings for one bridge context.
///
/// Every field is optional in the JSON form:
///
/// ```json
/// { "library_path": "/opt/edsdk/libEDSDK.so",
///   "retry": { "max_attempts": 10, "delay_ms": 30 },
///   "lock_ui": true }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Path to the EDSDK shared library.
    pub library_path: PathBuf,

    /// Download retry for busy/not-ready frames.
    pub retry: RetryPolicy,

    /// Lock the camera's controls while the session is open.
    pub lock_ui: bool,

    /// Subscribe to property-change events when supported.
    pub property_events: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let session = SessionOptions::default();
        Self {
            library_path: default_library_path(),
            retry: RetryPolicy::default(),
            lock_ui: session.lock_ui,
            property_events: session.property_events,
        }
    }
}

impl BridgeConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> EdsdkResult<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EdsdkError::invalid_config("config_json", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read the config from a C string; null means defaults.
    ///
    /// # Safety
    ///
    /// `raw` must be null or point to a NUL-terminated string.
    pub unsafe fn from_c_str(raw: *const c_char) -> EdsdkResult<Self> {
        if raw.is_null() {
            return Ok(Self::default());
        }
        let json = unsafe { CStr::from_ptr(raw) }
            .to_str()
            .map_err(|e| EdsdkError::invalid_config("config_json", e.to_string()))?;
        Self::from_json(json)
    }

    pub fn validate(&self) -> EdsdkResult<()> {
        if self.library_path.as_os_str().is_empty() {
            return Err(EdsdkError::invalid_config("library_path", "must not be empty"));
        }
        self.retry.validate()
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            lock_ui: self.lock_ui,
            property_events: self.property_events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_default() {
        assert_eq!(BridgeConfig::from_json("").unwrap(), BridgeConfig::default());
        assert_eq!(BridgeConfig::from_json("  \n").unwrap(), BridgeConfig::default());
        assert_eq!(BridgeConfig::from_json("{}").unwrap(), BridgeConfig::default());
        let null = unsafe { BridgeConfig::from_c_str(std::ptr::null()) }.unwrap();
        assert_eq!(null, BridgeConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = BridgeConfig::from_json(
            r#"{"library_path": "/opt/EDSDK/libEDSDK.so", "retry": {"max_attempts": 10}}"#,
        )
        .unwrap();
        assert_eq!(config.library_path, PathBuf::from("/opt/EDSDK/libEDSDK.so"));
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.retry.delay_ms, 50);
        assert!(config.property_events);
        assert!(!config.session_options().lock_ui);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            BridgeConfig::from_json("{not json"),
            Err(EdsdkError::InvalidConfig { .. })
        ));
        assert!(matches!(
            BridgeConfig::from_json(r#"{"retry": {"max_attempts": 0}}"#),
            Err(EdsdkError::InvalidConfig { .. })
        ));
        assert!(BridgeConfig::from_json(r#"{"library_path": ""}"#).is_err());
    }

    #[test]
    fn test_c_string() {
        let raw = c"{\"lock_ui\": true}";
        let config = unsafe { BridgeConfig::from_c_str(raw.as_ptr()) }.unwrap();
        assert!(config.lock_ui);
    }
}
