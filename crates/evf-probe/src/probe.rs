//! Live-view probe run.

use crate::config::ProbeConfig;
use anyhow::{Context, Result};
use lib_edsdk_ffi::{CameraSdk, EdsdkError, LiveViewCamera};
use lib_types::{PropertyId, ShutterButton};
use serde::Serialize;
use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of one frame attempt.
#[derive(Clone, Debug, Serialize)]
pub struct FrameReport {
    pub index: u32,
    pub size: usize,
    pub attempts: u32,
    /// Decoded from the JPEG header, when it parses.
    pub dimensions: Option<(u32, u32)>,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

impl FrameReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Results of a probe run.
#[derive(Clone, Debug, Serialize)]
pub struct ProbeReport {
    pub library: String,
    pub battery_level: Option<u32>,
    pub frames: Vec<FrameReport>,
    /// Output-device changes the camera reported, if events were enabled.
    pub routing_changes: Option<u64>,
}

impl ProbeReport {
    pub fn succeeded(&self) -> usize {
        self.frames.iter().filter(|f| f.is_ok()).count()
    }
}

/// Probe driver.
pub struct Probe {
    config: ProbeConfig,
}

impl Probe {
    /// Create a new probe.
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Open the camera, stream frames, and tear everything down.
    ///
    /// Session failures abort the run; per-frame failures are recorded and
    /// the run continues.
    pub fn run<S: CameraSdk>(&self, sdk: Arc<S>) -> Result<ProbeReport> {
        let params = &self.config.liveview;
        let mut camera = LiveViewCamera::open(sdk, self.config.session.clone(), params.retry)
            .context("Failed to open camera session")?;
        tracing::info!("Camera session open");

        let battery_level = camera
            .session()
            .get_property(PropertyId::BATTERY_LEVEL)
            .map_err(|e| tracing::debug!(error = %e, "Battery level unavailable"))
            .ok();

        if params.wake {
            self.wake(&camera);
        }

        if let Err(e) = camera.start_live_view() {
            // Tear down before reporting; the start error is the one that matters.
            if let Err(cleanup) = camera.shutdown() {
                tracing::warn!(error = %cleanup, "Error during teardown");
            }
            return Err(e).context("Failed to start live view");
        }

        let frames = (0..params.frames)
            .map(|index| {
                let report = grab_frame(&mut camera, index);
                if index + 1 < params.frames && params.frame_interval_ms > 0 {
                    std::thread::sleep(Duration::from_millis(params.frame_interval_ms));
                }
                report
            })
            .collect();

        let routing_changes = camera
            .session()
            .property_events()
            .map(|events| events.routing_change_count());

        if let Err(e) = camera.stop_live_view() {
            tracing::warn!(error = %e, "Failed to restore live-view routing");
        }
        let library = self.config.library.display().to_string();
        camera.shutdown().context("Teardown failed")?;

        Ok(ProbeReport {
            library,
            battery_level,
            frames,
            routing_changes,
        })
    }

    fn wake<S: CameraSdk>(&self, camera: &LiveViewCamera<S>) {
        let result = camera
            .press_shutter(ShutterButton::Halfway)
            .and_then(|()| camera.press_shutter(ShutterButton::Off));
        match result {
            Ok(()) => tracing::info!("Camera woken with a half press"),
            Err(EdsdkError::NotSupported { .. }) => {
                tracing::debug!("Shutter command not exported; skipping wake")
            }
            Err(e) => tracing::warn!(error = %e, "Wake failed"),
        }
    }
}

fn grab_frame<S: CameraSdk>(camera: &mut LiveViewCamera<S>, index: u32) -> FrameReport {
    let started = Instant::now();
    let outcome = camera.fetch_frame_with(|bytes, attempts| {
        Ok((bytes.len(), attempts, jpeg_dimensions(bytes)))
    });
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok((size, attempts, dimensions)) => {
            tracing::info!(index, size, attempts, ?dimensions, "Frame received");
            FrameReport {
                index,
                size,
                attempts,
                dimensions,
                elapsed_ms,
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(index, error = %e, "Frame failed");
            FrameReport {
                index,
                size: 0,
                attempts: 0,
                dimensions: None,
                elapsed_ms,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Width and height from an encoded image header, without decoding pixels.
pub fn jpeg_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_edsdk_ffi::mock::{MockSdk, MockStep};
    use lib_edsdk_ffi::RetryPolicy;
    use lib_types::{EdsCode, EvfOutputDevice};

    fn tiny_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([40, 80, 120]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Jpeg)
            .unwrap();
        out
    }

    fn config(frames: u32) -> ProbeConfig {
        let mut config = ProbeConfig::default();
        config.liveview.frames = frames;
        config.liveview.frame_interval_ms = 0;
        config.liveview.retry = RetryPolicy {
            max_attempts: 6,
            delay_ms: 0,
        };
        config
    }

    #[test]
    fn test_jpeg_dimensions() {
        assert_eq!(jpeg_dimensions(&tiny_jpeg(16, 8)), Some((16, 8)));
        assert_eq!(jpeg_dimensions(b"not an image"), None);
    }

    #[test]
    fn test_probe_reports_every_frame() {
        let sdk = Arc::new(MockSdk::new().with_payload(tiny_jpeg(32, 24)));
        let report = Probe::new(config(4)).run(Arc::clone(&sdk)).unwrap();

        assert_eq!(report.frames.len(), 4);
        assert_eq!(report.succeeded(), 4);
        assert_eq!(report.frames[0].dimensions, Some((32, 24)));
        assert_eq!(report.battery_level, Some(100));
        assert_eq!(report.routing_changes, Some(1));
        assert_eq!(sdk.routing(), EvfOutputDevice::TFT);
        assert_eq!(sdk.live_ref_count(), 0);
    }

    #[test]
    fn test_probe_continues_past_frame_failures() {
        let sdk = Arc::new(MockSdk::new().with_downloads([EdsCode::COMM_DISCONNECTED]));
        let report = Probe::new(config(3)).run(Arc::clone(&sdk)).unwrap();

        assert_eq!(report.frames.len(), 3);
        assert!(!report.frames[0].is_ok());
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.frames[1].dimensions, None);
    }

    #[test]
    fn test_probe_wake_and_session_failure() {
        let mut wake = config(1);
        wake.liveview.wake = true;
        let sdk = Arc::new(MockSdk::new());
        Probe::new(wake).run(Arc::clone(&sdk)).unwrap();
        assert_eq!(sdk.calls().commands, 2);

        let sdk = Arc::new(MockSdk::new().with_camera_count(0));
        let err = Probe::new(config(1)).run(sdk).unwrap_err();
        assert!(format!("{err:#}").contains("No camera found"));
    }

    #[test]
    fn test_start_failure_tears_down() {
        let sdk = Arc::new(MockSdk::new().failing(MockStep::SetProperty, EdsCode::DEVICE_BUSY));
        assert!(Probe::new(config(1)).run(Arc::clone(&sdk)).is_err());
        assert_eq!(sdk.calls().terminate, 1);
        assert_eq!(sdk.live_ref_count(), 0);
    }
}
