//! A camera session with its live-view engine.

use crate::error::EdsdkResult;
use crate::lifecycle::{DeviceSession, SessionOptions, SessionState};
use crate::liveview::{LiveView, RetryPolicy};
use crate::sdk::CameraSdk;
use lib_types::{Frame, ShutterButton};
use std::sync::Arc;

/// An open session plus live view, torn down together.
///
/// This is the unit the boundary layer holds per context handle.
pub struct LiveViewCamera<S: CameraSdk> {
    session: DeviceSession<S>,
    live: LiveView,
}

impl<S: CameraSdk> LiveViewCamera<S> {
    /// Initialize the SDK and open a session with the first camera.
    pub fn open(sdk: Arc<S>, options: SessionOptions, policy: RetryPolicy) -> EdsdkResult<Self> {
        policy.validate()?;
        let mut session = DeviceSession::with_options(sdk, options);
        session.open()?;
        Ok(Self {
            session,
            live: LiveView::new(policy),
        })
    }

    pub fn session(&self) -> &DeviceSession<S> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DeviceSession<S> {
        &mut self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_live(&self) -> bool {
        self.live.is_active()
    }

    pub fn frames_fetched(&self) -> u64 {
        self.live.frames_fetched()
    }

    pub fn start_live_view(&mut self) -> EdsdkResult<()> {
        self.live.enable(&mut self.session)
    }

    pub fn stop_live_view(&mut self) -> EdsdkResult<()> {
        self.live.disable(&mut self.session)
    }

    pub fn fetch_frame(&mut self) -> EdsdkResult<Frame> {
        self.live.fetch_frame(&self.session)
    }

    /// See [`LiveView::fetch_frame_with`].
    pub fn fetch_frame_with<T, F>(&mut self, consume: F) -> EdsdkResult<T>
    where
        F: FnOnce(&[u8], u32) -> EdsdkResult<T>,
    {
        self.live.fetch_frame_with(&self.session, consume)
    }

    pub fn lock_ui(&mut self, locked: bool) -> EdsdkResult<()> {
        self.session.lock_ui(locked)
    }

    pub fn press_shutter(&self, button: ShutterButton) -> EdsdkResult<()> {
        self.session.press_shutter(button)
    }

    pub fn pump_events(&self) -> EdsdkResult<()> {
        self.session.pump_events()
    }

    /// Mark live view inactive, then close the session and terminate the SDK.
    ///
    /// No routing write happens here; closing the session restores any saved
    /// output routing. Teardown is best-effort and the first error is
    /// returned.
    pub fn shutdown(mut self) -> EdsdkResult<()> {
        self.live.deactivate();
        // Routing is restored by the session close.
        self.session.terminate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EdsdkError;
    use crate::mock::{MockSdk, MockStep};
    use lib_types::{EdsCode, EvfOutputDevice};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            delay_ms: 0,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn test_full_run() {
        let sdk = Arc::new(MockSdk::new());
        let mut camera = LiveViewCamera::open(Arc::clone(&sdk), SessionOptions::default(), fast())
            .unwrap();

        camera.start_live_view().unwrap();
        assert!(camera.is_live());
        for expected in 0..3 {
            let frame = camera.fetch_frame().unwrap();
            assert_eq!(frame.sequence, expected);
            assert!(frame.looks_like_jpeg());
        }
        camera.stop_live_view().unwrap();
        camera.shutdown().unwrap();

        let calls = sdk.calls();
        assert_eq!(calls.download, 3);
        assert_eq!(calls.terminate, 1);
        assert_eq!(sdk.live_ref_count(), 0);
        assert_eq!(sdk.routing(), EvfOutputDevice::TFT);
    }

    #[test]
    fn test_shutdown_while_live_restores_routing() {
        let sdk = Arc::new(MockSdk::new());
        let mut camera = LiveViewCamera::open(Arc::clone(&sdk), SessionOptions::default(), fast())
            .unwrap();
        camera.start_live_view().unwrap();
        assert_eq!(sdk.calls().set_property, 1);
        camera.shutdown().unwrap();

        // Only the session close writes routing back.
        assert_eq!(sdk.calls().set_property, 2);
        assert_eq!(sdk.routing(), EvfOutputDevice::TFT);
        assert_eq!(sdk.live_ref_count(), 0);
        assert!(!sdk.is_initialized());
    }

    #[test]
    fn test_invalid_policy_rejected_before_sdk_calls() {
        let sdk = Arc::new(MockSdk::new());
        let policy = RetryPolicy {
            max_attempts: 0,
            delay_ms: 0,
        };
        let result = LiveViewCamera::open(Arc::clone(&sdk), SessionOptions::default(), policy);
        assert!(matches!(result, Err(EdsdkError::InvalidConfig { .. })));
        assert_eq!(sdk.calls().total, 0);
    }

    #[test]
    fn test_open_failure_propagates() {
        let sdk = Arc::new(MockSdk::new().failing(MockStep::OpenSession, EdsCode::DEVICE_BUSY));
        let result = LiveViewCamera::open(Arc::clone(&sdk), SessionOptions::default(), fast());
        assert!(matches!(result, Err(EdsdkError::SessionOpenFailed { .. })));
        assert_eq!(sdk.calls().terminate, 1);
    }
}
