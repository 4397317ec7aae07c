//! The context object behind an `evf_*` handle.

use crate::buffer::alloc_frame_buffer;
use crate::config::BridgeConfig;
use lib_edsdk_ffi::{
    CameraSdk, EdsdkLibrary, EdsdkResult, LiveViewCamera, RecoverMutex, SessionState,
};
use lib_types::{Frame, ShutterButton};
use std::ptr::NonNull;
use std::sync::{Arc, Mutex, PoisonError};

/// One camera session and its live-view state behind a single lock.
///
/// Every operation takes the lock for its whole duration, so concurrent
/// callers sharing a handle are serialized.
pub struct Bridge<S: CameraSdk> {
    camera: Mutex<LiveViewCamera<S>>,
}

/// The bridge over the real vendor library.
pub type EvfBridge = Bridge<EdsdkLibrary>;

impl EvfBridge {
    /// Load the library named by `config` and open a session.
    pub fn initialize(config: &BridgeConfig) -> EdsdkResult<Self> {
        config.validate()?;
        let sdk = EdsdkLibrary::load(&config.library_path)?;
        Self::open(sdk, config)
    }
}

impl<S: CameraSdk> Bridge<S> {
    /// Open a session on an already bound SDK.
    pub fn open(sdk: Arc<S>, config: &BridgeConfig) -> EdsdkResult<Self> {
        let camera = LiveViewCamera::open(sdk, config.session_options(), config.retry)?;
        tracing::info!("Bridge context ready");
        Ok(Self {
            camera: Mutex::new(camera),
        })
    }

    pub fn state(&self) -> SessionState {
        self.camera.lock_recover().state()
    }

    pub fn is_live(&self) -> bool {
        self.camera.lock_recover().is_live()
    }

    pub fn frames_fetched(&self) -> u64 {
        self.camera.lock_recover().frames_fetched()
    }

    pub fn start_live_view(&self) -> EdsdkResult<()> {
        self.camera.lock_recover().start_live_view()
    }

    pub fn stop_live_view(&self) -> EdsdkResult<()> {
        self.camera.lock_recover().stop_live_view()
    }

    /// Fetch one frame straight into a caller-owned buffer.
    ///
    /// The bytes are copied once, from the SDK's stream into the new
    /// buffer. Returns the payload pointer and length.
    pub fn fetch_frame_buffer(&self) -> EdsdkResult<(NonNull<u8>, usize)> {
        self.camera
            .lock_recover()
            .fetch_frame_with(|bytes, _attempts| Ok((alloc_frame_buffer(bytes)?, bytes.len())))
    }

    /// Fetch one frame into an owned [`Frame`].
    pub fn fetch_frame(&self) -> EdsdkResult<Frame> {
        self.camera.lock_recover().fetch_frame()
    }

    pub fn lock_ui(&self, locked: bool) -> EdsdkResult<()> {
        self.camera.lock_recover().lock_ui(locked)
    }

    pub fn press_shutter(&self, button: ShutterButton) -> EdsdkResult<()> {
        self.camera.lock_recover().press_shutter(button)
    }

    pub fn pump_events(&self) -> EdsdkResult<()> {
        self.camera.lock_recover().pump_events()
    }

    /// Restore routing, close the session and terminate the SDK.
    pub fn shutdown(self) -> EdsdkResult<()> {
        let camera = self
            .camera
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        camera.shutdown()
    }
}
