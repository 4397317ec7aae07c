//! Live-view (EVF) frame acquisition.
//!
//! Each fetch builds a fresh memory stream and an EVF image ref bound to
//! it, downloads one frame with bounded retry on busy/not-ready, copies
//! the bytes out and releases both references, view first, on every path.

use crate::error::{EdsdkError, EdsdkResult};
use crate::handle::OwnedRef;
use crate::lifecycle::DeviceSession;
use crate::sdk::{CameraSdk, EdsRef};
use lib_types::{EdsCode, Frame};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Bounded retry for transient download failures.
///
/// The camera needs a moment between routing live view to the host and
/// producing its first frame, and reports busy now and then mid-stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Download attempts per frame, including the first.
    pub max_attempts: u32,

    /// Sleep between attempts, in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            delay_ms: 50,
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Longest time a single fetch can spend sleeping.
    pub fn max_wait(&self) -> Duration {
        self.delay() * self.max_attempts.saturating_sub(1)
    }

    pub fn validate(&self) -> EdsdkResult<()> {
        if self.max_attempts == 0 {
            return Err(EdsdkError::invalid_config(
                "retry.max_attempts",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// The live-view engine.
///
/// Holds only the `active` flag and counters; the session it drives is
/// passed into every call.
#[derive(Debug, Default)]
pub struct LiveView {
    policy: RetryPolicy,
    active: bool,
    frames: u64,
}

impl LiveView {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            active: false,
            frames: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Frames successfully fetched since creation.
    pub fn frames_fetched(&self) -> u64 {
        self.frames
    }

    /// Route live view to the host and allow fetching.
    pub fn enable<S: CameraSdk>(&mut self, session: &mut DeviceSession<S>) -> EdsdkResult<()> {
        session.route_evf_to_host()?;
        self.active = true;
        tracing::info!("Live view started");
        Ok(())
    }

    /// Stop fetching and restore the routing saved by [`enable`](Self::enable).
    ///
    /// With no open session live view is already stopped; that is not an
    /// error.
    pub fn disable<S: CameraSdk>(&mut self, session: &mut DeviceSession<S>) -> EdsdkResult<()> {
        self.active = false;
        if !session.is_open() {
            tracing::debug!(state = %session.state(), "Live view stop without open session");
            return Ok(());
        }
        session.restore_evf_routing()?;
        tracing::info!(frames = self.frames, "Live view stopped");
        Ok(())
    }

    /// Clear the active flag without touching the camera.
    pub(crate) fn deactivate(&mut self) {
        self.active = false;
    }

    /// Download one frame into an owned [`Frame`].
    pub fn fetch_frame<S: CameraSdk>(&mut self, session: &DeviceSession<S>) -> EdsdkResult<Frame> {
        let sequence = self.frames;
        self.fetch_frame_with(session, move |bytes, attempts| {
            Ok(Frame::new(sequence, attempts, bytes.to_vec()))
        })
    }

    /// Download one frame and hand its bytes to `consume` while the SDK's
    /// memory stream is still alive.
    ///
    /// `consume` receives the payload and the number of download attempts
    /// used. It is the only place the bytes can be copied; the stream is
    /// released as soon as it returns.
    pub fn fetch_frame_with<S, T, F>(
        &mut self,
        session: &DeviceSession<S>,
        consume: F,
    ) -> EdsdkResult<T>
    where
        S: CameraSdk,
        F: FnOnce(&[u8], u32) -> EdsdkResult<T>,
    {
        if !self.active {
            return Err(EdsdkError::NotActive);
        }
        let camera = session.camera().map_err(|_| EdsdkError::NotActive)?;
        let sdk = session.sdk();

        // Declared sink first so the image ref drops before it.
        let stream = sdk
            .create_memory_stream(0)
            .map_err(|code| EdsdkError::StreamCreateFailed { code })?;
        let stream = OwnedRef::new(Arc::clone(sdk), stream, "memory stream");

        let image = sdk
            .create_evf_image_ref(stream.get())
            .map_err(|code| EdsdkError::ImageRefCreateFailed { code })?;
        let image = OwnedRef::new(Arc::clone(sdk), image, "evf image");

        let attempts = self.download(sdk.as_ref(), camera, image.get())?;
        let output = consume(read_stream(&stream)?, attempts)?;

        drop(image);
        drop(stream);

        self.frames += 1;
        tracing::trace!(frame = self.frames, attempts, "Live-view frame fetched");
        Ok(output)
    }

    /// Attempt the download until it succeeds, fails hard, or the retry
    /// ceiling is reached. Returns the attempt count on success.
    fn download<S: CameraSdk>(&self, sdk: &S, camera: EdsRef, image: EdsRef) -> EdsdkResult<u32> {
        let mut last = EdsCode::OK;
        for attempt in 1..=self.policy.max_attempts {
            let code = sdk.download_evf_image(camera, image);
            if code.is_ok() {
                return Ok(attempt);
            }
            if !code.is_transient() {
                tracing::warn!(%code, attempt, "Live-view download failed");
                return Err(EdsdkError::DeviceError { code });
            }
            last = code;
            tracing::debug!(%code, attempt, "Live-view frame not ready, retrying");
            if attempt < self.policy.max_attempts {
                std::thread::sleep(self.policy.delay());
            }
        }
        Err(EdsdkError::RetryExhausted {
            attempts: self.policy.max_attempts,
            last,
        })
    }
}

/// Borrow the bytes held by a memory stream.
fn read_stream<S: CameraSdk>(stream: &OwnedRef<S>) -> EdsdkResult<&[u8]> {
    let sdk = stream.sdk();
    let pointer = sdk
        .stream_pointer(stream.get())
        .map_err(|code| EdsdkError::StreamAccessFailed { code })?;
    let length = sdk
        .stream_length(stream.get())
        .map_err(|code| EdsdkError::StreamAccessFailed { code })?;

    if pointer.is_null() || length == 0 {
        return Err(EdsdkError::EmptyFrame);
    }
    let len = usize::try_from(length).map_err(|_| EdsdkError::AllocationFailed { len: length })?;

    // SAFETY: the SDK guarantees `length` readable bytes at `pointer` until
    // the stream is released; the slice borrows the guard that releases it.
    Ok(unsafe { std::slice::from_raw_parts(pointer, len) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockSdk, MockStep, RefKind};
    use lib_types::EvfOutputDevice;

    const FAST: RetryPolicy = RetryPolicy {
        max_attempts: 6,
        delay_ms: 0,
    };

    fn open(sdk: &Arc<MockSdk>) -> (DeviceSession<MockSdk>, LiveView) {
        let mut session = DeviceSession::new(Arc::clone(sdk));
        session.open().unwrap();
        (session, LiveView::new(FAST))
    }

    fn assert_transients_balanced(sdk: &MockSdk) {
        for kind in [RefKind::MemoryStream, RefKind::EvfImage] {
            assert_eq!(sdk.created(kind), sdk.released(kind), "{kind:?} leaked");
        }
        assert_eq!(sdk.double_releases(), 0);
    }

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 6);
        assert_eq!(policy.delay(), Duration::from_millis(50));
        assert_eq!(policy.max_wait(), Duration::from_millis(250));
        assert!(policy.validate().is_ok());
        assert!(RetryPolicy { max_attempts: 0, ..policy }.validate().is_err());
    }

    #[test]
    fn test_fetch_while_inactive_makes_no_vendor_calls() {
        let sdk = Arc::new(MockSdk::new());
        let (session, mut live) = open(&sdk);
        let before = sdk.calls().total;

        let err = live.fetch_frame(&session).unwrap_err();
        assert!(matches!(err, EdsdkError::NotActive));
        assert_eq!(sdk.calls().total, before);
    }

    #[test]
    fn test_fetch_returns_exact_payload() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(4099).collect();
        let sdk = Arc::new(MockSdk::new().with_payload(payload.clone()));
        let (mut session, mut live) = open(&sdk);

        live.enable(&mut session).unwrap();
        let frame = live.fetch_frame(&session).unwrap();

        assert_eq!(frame.len(), payload.len());
        assert_eq!(frame.data, payload);
        assert_eq!(frame.sequence, 0);
        assert_eq!(frame.attempts, 1);
        assert_eq!(live.frames_fetched(), 1);
        assert_transients_balanced(&sdk);
    }

    #[test]
    fn test_view_released_before_sink() {
        let sdk = Arc::new(MockSdk::new());
        let (mut session, mut live) = open(&sdk);
        live.enable(&mut session).unwrap();
        live.fetch_frame(&session).unwrap();

        let order = sdk.release_order();
        let tail: Vec<_> = order.iter().rev().take(2).rev().copied().collect();
        assert_eq!(tail, vec![RefKind::EvfImage, RefKind::MemoryStream]);
    }

    #[test]
    fn test_five_not_ready_then_success() {
        let sdk = Arc::new(MockSdk::new().with_downloads([EdsCode::OBJECT_NOTREADY; 5]));
        let (mut session, mut live) = open(&sdk);
        live.enable(&mut session).unwrap();

        let frame = live.fetch_frame(&session).unwrap();
        assert_eq!(frame.attempts, 6);
        assert_eq!(sdk.calls().download, 6);
        assert_transients_balanced(&sdk);
    }

    #[test]
    fn test_six_not_ready_exhausts_retries() {
        let sdk = Arc::new(MockSdk::new().with_downloads([EdsCode::OBJECT_NOTREADY; 6]));
        let (mut session, mut live) = open(&sdk);
        live.enable(&mut session).unwrap();

        let err = live.fetch_frame(&session).unwrap_err();
        assert!(matches!(
            err,
            EdsdkError::RetryExhausted { attempts: 6, last } if last == EdsCode::OBJECT_NOTREADY
        ));
        assert_eq!(sdk.calls().download, 6);
        assert_eq!(live.frames_fetched(), 0);
        assert_transients_balanced(&sdk);
    }

    #[test]
    fn test_busy_exhausts_retries() {
        let sdk = Arc::new(MockSdk::new().with_downloads([EdsCode::DEVICE_BUSY; 6]));
        let (mut session, mut live) = open(&sdk);
        live.enable(&mut session).unwrap();

        let err = live.fetch_frame(&session).unwrap_err();
        assert!(matches!(err, EdsdkError::RetryExhausted { last, .. } if last == EdsCode::DEVICE_BUSY));
        assert_transients_balanced(&sdk);
    }

    #[test]
    fn test_hard_error_aborts_immediately() {
        let sdk = Arc::new(MockSdk::new().with_downloads([
            EdsCode::DEVICE_BUSY,
            EdsCode::COMM_DISCONNECTED,
            EdsCode::OK,
        ]));
        let (mut session, mut live) = open(&sdk);
        live.enable(&mut session).unwrap();

        let err = live.fetch_frame(&session).unwrap_err();
        assert!(matches!(err, EdsdkError::DeviceError { code } if code == EdsCode::COMM_DISCONNECTED));
        assert_eq!(sdk.calls().download, 2);
        assert_transients_balanced(&sdk);
    }

    #[test]
    fn test_sink_creation_failure() {
        let sdk = Arc::new(
            MockSdk::new().failing(MockStep::CreateMemoryStream, EdsCode::MEM_ALLOC_FAILED),
        );
        let (mut session, mut live) = open(&sdk);
        live.enable(&mut session).unwrap();

        let err = live.fetch_frame(&session).unwrap_err();
        assert!(matches!(err, EdsdkError::StreamCreateFailed { .. }));
        assert_eq!(sdk.created(RefKind::MemoryStream), 0);
        assert_eq!(sdk.calls().download, 0);
        assert_transients_balanced(&sdk);
    }

    #[test]
    fn test_image_ref_creation_failure_releases_sink() {
        let sdk = Arc::new(
            MockSdk::new().failing(MockStep::CreateEvfImageRef, EdsCode::INVALID_HANDLE),
        );
        let (mut session, mut live) = open(&sdk);
        live.enable(&mut session).unwrap();

        let err = live.fetch_frame(&session).unwrap_err();
        assert!(matches!(err, EdsdkError::ImageRefCreateFailed { .. }));
        assert_eq!(sdk.created(RefKind::MemoryStream), 1);
        assert_eq!(sdk.released(RefKind::MemoryStream), 1);
        assert_transients_balanced(&sdk);
    }

    #[test]
    fn test_empty_payload() {
        let sdk = Arc::new(MockSdk::new().with_payload(Vec::new()));
        let (mut session, mut live) = open(&sdk);
        live.enable(&mut session).unwrap();

        let err = live.fetch_frame(&session).unwrap_err();
        assert!(matches!(err, EdsdkError::EmptyFrame));
        assert_transients_balanced(&sdk);
    }

    #[test]
    fn test_consumer_error_still_releases() {
        let sdk = Arc::new(MockSdk::new());
        let (mut session, mut live) = open(&sdk);
        live.enable(&mut session).unwrap();

        let result: EdsdkResult<()> = live.fetch_frame_with(&session, |bytes, _| {
            Err(EdsdkError::AllocationFailed {
                len: bytes.len() as u64,
            })
        });
        assert!(matches!(result, Err(EdsdkError::AllocationFailed { .. })));
        assert_transients_balanced(&sdk);
    }

    #[test]
    fn test_routing_round_trip_over_a_run() {
        let initial = EvfOutputDevice::TFT;
        let sdk = Arc::new(MockSdk::new().with_routing(initial));
        let (mut session, mut live) = open(&sdk);

        live.enable(&mut session).unwrap();
        assert_eq!(sdk.routing(), initial | EvfOutputDevice::PC);
        for _ in 0..3 {
            live.fetch_frame(&session).unwrap();
        }
        live.enable(&mut session).unwrap();
        live.disable(&mut session).unwrap();

        assert_eq!(sdk.routing(), initial);
        assert!(!live.is_active());
        assert_eq!(live.frames_fetched(), 3);
    }

    #[test]
    fn test_routing_already_host_is_left_alone() {
        let initial = EvfOutputDevice::PC;
        let sdk = Arc::new(MockSdk::new().with_routing(initial));
        let (mut session, mut live) = open(&sdk);

        live.enable(&mut session).unwrap();
        live.disable(&mut session).unwrap();
        assert_eq!(sdk.routing(), initial);
    }

    #[test]
    fn test_disable_without_session_is_ok() {
        let sdk = Arc::new(MockSdk::new());
        let (mut session, mut live) = open(&sdk);
        live.enable(&mut session).unwrap();
        session.terminate().unwrap();

        live.disable(&mut session).unwrap();
        assert!(!live.is_active());
        assert!(matches!(live.fetch_frame(&session), Err(EdsdkError::NotActive)));
    }

    #[test]
    fn test_enable_failure_leaves_inactive() {
        let sdk = Arc::new(
            MockSdk::new().failing(MockStep::SetProperty, EdsCode::DEVICE_BUSY),
        );
        let (mut session, mut live) = open(&sdk);

        let err = live.enable(&mut session).unwrap_err();
        assert!(matches!(err, EdsdkError::PropertyWriteFailed { .. }));
        assert!(!live.is_active());
        assert!(!session.is_routed_to_host());
    }
}
