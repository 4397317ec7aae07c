//! Probe configuration loading and validation.

use anyhow::{Context, Result};
use lib_edsdk_ffi::{default_library_path, RetryPolicy, SessionOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level probe configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Path to the EDSDK shared library.
    #[serde(default = "default_library_path")]
    pub library: PathBuf,

    /// Session behaviour.
    #[serde(default)]
    pub session: SessionOptions,

    /// Live-view acquisition parameters.
    #[serde(default)]
    pub liveview: LiveViewParams,
}

/// Live-view acquisition parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiveViewParams {
    /// Number of frames to grab.
    #[serde(default = "default_frames")]
    pub frames: u32,

    /// Pause between frames, in milliseconds.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Half-press the shutter before starting, to wake a sleeping body.
    #[serde(default)]
    pub wake: bool,

    /// Download retry for busy/not-ready frames.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_frames() -> u32 { 20 }
fn default_frame_interval_ms() -> u64 { 60 }

impl Default for LiveViewParams {
    fn default() -> Self {
        Self {
            frames: default_frames(),
            frame_interval_ms: default_frame_interval_ms(),
            wake: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            library: default_library_path(),
            session: SessionOptions::default(),
            liveview: LiveViewParams::default(),
        }
    }
}

/// Load configuration from a file.
pub fn load_config(path: &Path) -> Result<ProbeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content, path.extension().map_or(false, |e| e == "json"))?;
    validate_config(&config)?;

    Ok(config)
}

fn parse_config(content: &str, json: bool) -> Result<ProbeConfig> {
    let config = if json {
        serde_json::from_str(content).with_context(|| "Failed to parse config as JSON")?
    } else {
        // Assume TOML
        toml::from_str(content).with_context(|| "Failed to parse config as TOML")?
    };
    Ok(config)
}

/// Validate configuration.
pub fn validate_config(config: &ProbeConfig) -> Result<()> {
    if config.library.as_os_str().is_empty() {
        anyhow::bail!("Library path must not be empty");
    }

    if config.liveview.frames == 0 {
        anyhow::bail!("Frame count must be at least 1");
    }

    if config.liveview.retry.max_attempts == 0 {
        anyhow::bail!(
            "Invalid retry.max_attempts: {}. Must be at least 1",
            config.liveview.retry.max_attempts
        );
    }

    if config.liveview.retry.max_wait().as_secs() > 30 {
        tracing::warn!(
            "Retry window of {:?} per frame is unusually long",
            config.liveview.retry.max_wait()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_defaults() {
        let config = parse_config("", false).unwrap();
        assert_eq!(config, ProbeConfig::default());
        assert_eq!(config.liveview.frames, 20);
        assert!(config.session.property_events);
    }

    #[test]
    fn test_toml_overrides() {
        let toml = r#"
            library = "/opt/EDSDK/libEDSDK.so"

            [session]
            lock_ui = true

            [liveview]
            frames = 5
            wake = true

            [liveview.retry]
            max_attempts = 10
        "#;
        let config = parse_config(toml, false).unwrap();
        assert_eq!(config.library, PathBuf::from("/opt/EDSDK/libEDSDK.so"));
        assert!(config.session.lock_ui);
        assert!(config.session.property_events);
        assert_eq!(config.liveview.frames, 5);
        assert!(config.liveview.wake);
        assert_eq!(config.liveview.retry.max_attempts, 10);
        assert_eq!(config.liveview.retry.delay_ms, 50);
        validate_config(&config).unwrap();
    }

    #[test]
    fn test_json() {
        let config = parse_config(r#"{"liveview": {"frames": 3, "frame_interval_ms": 0}}"#, true)
            .unwrap();
        assert_eq!(config.liveview.frames, 3);
        assert_eq!(config.liveview.frame_interval_ms, 0);
    }

    #[test]
    fn test_validation() {
        let mut config = ProbeConfig::default();
        config.liveview.frames = 0;
        assert!(validate_config(&config).is_err());

        let mut config = ProbeConfig::default();
        config.liveview.retry.max_attempts = 0;
        assert!(validate_config(&config).is_err());

        let mut config = ProbeConfig::default();
        config.library = PathBuf::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("evf-probe-{}.toml", std::process::id()));
        std::fs::write(&path, "[liveview]\nframes = 2\n").unwrap();
        let config = load_config(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.liveview.frames, 2);

        assert!(load_config(Path::new("/nonexistent/probe.toml")).is_err());
    }
}
