//! Camera session lifecycle management.
//!
//! This module owns the device session state machine:
//! - SDK initialization (EdsInitializeSDK)
//! - Device enumeration and acquisition of the first camera
//! - Session open/close and property access
//! - Teardown (release references, EdsTerminateSDK)
//!
//! Each step failure is reported with its own error and is never retried.
//! However the state machine is left, every reference acquired along the
//! way is released exactly once.

use crate::error::{EdsdkError, EdsdkResult};
use crate::events::{property_event_trampoline, PropertyEvents};
use crate::handle::OwnedRef;
use crate::sdk::{CameraSdk, EdsRef};
use lib_types::{
    EvfOutputDevice, PropertyEvent, PropertyId, ShutterButton, StatusCommand,
    COMMAND_PRESS_SHUTTER_BUTTON,
};
use serde::{Deserialize, Serialize};
use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

pub use lib_types::SessionState;

/// Camera index taken from the enumeration.
const CAMERA_INDEX: i32 = 0;

/// Optional behaviour applied once the session is open.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Lock the camera's own UI for the lifetime of the session.
    pub lock_ui: bool,

    /// Register for property-change events when the library supports it.
    pub property_events: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            lock_ui: false,
            property_events: true,
        }
    }
}

/// A session with the first attached camera.
///
/// All vendor state reachable from here (the camera reference, the saved
/// output routing, the registered event handler) is torn down by
/// [`DeviceSession::terminate`], which also runs on drop.
pub struct DeviceSession<S: CameraSdk> {
    /// The bound SDK.
    sdk: Arc<S>,

    /// Current session state.
    state: SessionState,

    options: SessionOptions,

    /// Camera reference from the enumeration.
    camera: Option<OwnedRef<S>>,

    /// `Evf_OutputDevice` as it was before live view first routed to the host.
    saved_routing: Option<EvfOutputDevice>,

    /// Event log registered with the SDK, if any.
    events: Option<Arc<PropertyEvents>>,

    ui_locked: bool,
}

impl<S: CameraSdk> DeviceSession<S> {
    /// Create a session in the `Unloaded` state.
    pub fn new(sdk: Arc<S>) -> Self {
        Self::with_options(sdk, SessionOptions::default())
    }

    /// Create a session with custom options.
    pub fn with_options(sdk: Arc<S>, options: SessionOptions) -> Self {
        Self {
            sdk,
            state: SessionState::Unloaded,
            options,
            camera: None,
            saved_routing: None,
            events: None,
            ui_locked: false,
        }
    }

    /// Get the current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::SessionOpen
    }

    pub fn sdk(&self) -> &Arc<S> {
        &self.sdk
    }

    /// Whether live view has changed the output routing and not restored it.
    pub fn is_routed_to_host(&self) -> bool {
        self.saved_routing.is_some()
    }

    /// Property-change log, when registration succeeded.
    pub fn property_events(&self) -> Option<&PropertyEvents> {
        self.events.as_deref()
    }

    /// Run the whole open sequence: initialize, enumerate, acquire, open.
    ///
    /// On failure everything acquired so far is released, the SDK is
    /// terminated if it was initialized, and the session ends `Terminated`.
    pub fn open(&mut self) -> EdsdkResult<()> {
        if self.state != SessionState::Unloaded {
            return Err(EdsdkError::invalid_state(
                SessionState::Unloaded,
                self.state,
            ));
        }

        if let Err(e) = self.open_sequence() {
            tracing::error!(error = %e, state = %self.state, "Camera open sequence failed");
            if let Err(cleanup) = self.terminate() {
                tracing::warn!(error = %cleanup, "Error during failed-open cleanup");
            }
            return Err(e);
        }

        if self.options.property_events {
            self.subscribe_property_events();
        }
        if self.options.lock_ui {
            if let Err(e) = self.lock_ui(true) {
                tracing::warn!(error = %e, "Could not lock camera UI");
            }
        }
        Ok(())
    }

    fn open_sequence(&mut self) -> EdsdkResult<()> {
        let code = self.sdk.initialize();
        if !code.is_ok() {
            return Err(EdsdkError::SdkInitFailed { code });
        }
        self.state = SessionState::Initialized;

        let list = self
            .sdk
            .camera_list()
            .map_err(|code| EdsdkError::CameraListFailed { code })?;
        let list = OwnedRef::new(Arc::clone(&self.sdk), list, "camera list");

        let count = self
            .sdk
            .child_count(list.get())
            .map_err(|code| EdsdkError::CameraListFailed { code })?;
        if count == 0 {
            return Err(EdsdkError::NoCamera);
        }
        self.state = SessionState::DeviceListed;

        let camera = self
            .sdk
            .child_at(list.get(), CAMERA_INDEX)
            .map_err(|code| EdsdkError::DeviceAcquireFailed {
                index: CAMERA_INDEX,
                code,
            })?;
        self.camera = Some(OwnedRef::new(Arc::clone(&self.sdk), camera, "camera"));
        drop(list);
        self.state = SessionState::DeviceAcquired;

        let code = self.sdk.open_session(camera);
        if !code.is_ok() {
            return Err(EdsdkError::SessionOpenFailed { code });
        }
        self.state = SessionState::SessionOpen;

        tracing::info!(camera_count = count, "Camera session opened");
        Ok(())
    }

    /// The open camera, or `NoSession`.
    pub fn camera(&self) -> EdsdkResult<EdsRef> {
        match (&self.camera, self.state) {
            (Some(camera), SessionState::SessionOpen) => Ok(camera.get()),
            _ => Err(EdsdkError::NoSession { state: self.state }),
        }
    }

    /// Read a 32-bit property of the open camera.
    pub fn get_property(&self, property: PropertyId) -> EdsdkResult<u32> {
        let camera = self.camera()?;
        self.sdk
            .get_property_u32(camera, property, 0)
            .map_err(|code| EdsdkError::PropertyReadFailed { property, code })
    }

    /// Write a 32-bit property of the open camera.
    pub fn set_property(&self, property: PropertyId, value: u32) -> EdsdkResult<()> {
        let camera = self.camera()?;
        self.sdk
            .set_property_u32(camera, property, 0, value)
            .into_result()
            .map_err(|code| EdsdkError::PropertyWriteFailed { property, code })
    }

    /// Set the host bit of `Evf_OutputDevice`, remembering the prior value
    /// the first time.
    pub fn route_evf_to_host(&mut self) -> EdsdkResult<()> {
        let current = EvfOutputDevice(self.get_property(PropertyId::EVF_OUTPUT_DEVICE)?);
        self.set_property(PropertyId::EVF_OUTPUT_DEVICE, current.with_host().0)?;
        if self.saved_routing.is_none() {
            self.saved_routing = Some(current);
        }
        tracing::debug!(previous = current.0, "Live-view output routed to host");
        Ok(())
    }

    /// Write back the `Evf_OutputDevice` value saved by
    /// [`route_evf_to_host`](Self::route_evf_to_host). No-op if nothing was saved.
    pub fn restore_evf_routing(&mut self) -> EdsdkResult<()> {
        let Some(saved) = self.saved_routing else {
            return Ok(());
        };
        self.set_property(PropertyId::EVF_OUTPUT_DEVICE, saved.0)?;
        self.saved_routing = None;
        tracing::debug!(restored = saved.0, "Live-view output routing restored");
        Ok(())
    }

    /// Lock or unlock the camera's own controls (`EdsSendStatusCommand`).
    pub fn lock_ui(&mut self, locked: bool) -> EdsdkResult<()> {
        let camera = self.camera()?;
        let (command, name) = if locked {
            (StatusCommand::UiLock, "UILock")
        } else {
            (StatusCommand::UiUnlock, "UIUnLock")
        };
        let code = self
            .sdk
            .send_status_command(camera, command)
            .ok_or(EdsdkError::NotSupported {
                operation: "EdsSendStatusCommand",
            })?;
        code.into_result()
            .map_err(|code| EdsdkError::CommandFailed {
                command: name,
                code,
            })?;
        self.ui_locked = locked;
        Ok(())
    }

    /// Move the shutter button; a half press wakes a sleeping body.
    pub fn press_shutter(&self, button: ShutterButton) -> EdsdkResult<()> {
        let camera = self.camera()?;
        let code = self
            .sdk
            .send_command(camera, COMMAND_PRESS_SHUTTER_BUTTON, button as i32)
            .ok_or(EdsdkError::NotSupported {
                operation: "EdsSendCommand",
            })?;
        code.into_result().map_err(|code| EdsdkError::CommandFailed {
            command: "PressShutterButton",
            code,
        })
    }

    /// Dispatch pending SDK events (`EdsGetEvent`).
    pub fn pump_events(&self) -> EdsdkResult<()> {
        self.camera()?;
        let code = self.sdk.get_event().ok_or(EdsdkError::NotSupported {
            operation: "EdsGetEvent",
        })?;
        code.into_result().map_err(|code| EdsdkError::CommandFailed {
            command: "GetEvent",
            code,
        })
    }

    fn subscribe_property_events(&mut self) {
        let Ok(camera) = self.camera() else {
            return;
        };
        let events = Arc::new(PropertyEvents::new());
        let context = Arc::as_ptr(&events).cast_mut().cast::<c_void>();
        // SAFETY: `self.events` keeps the log alive until close unregisters
        // the handler.
        let result = unsafe {
            self.sdk.set_property_event_handler(
                camera,
                PropertyEvent::All,
                Some(property_event_trampoline),
                context,
            )
        };
        match result {
            Some(code) if code.is_ok() => {
                tracing::debug!("Registered property event handler");
                self.events = Some(events);
            }
            Some(code) => tracing::warn!(%code, "Property event registration failed"),
            None => tracing::debug!("Property events not supported by this library"),
        }
    }

    fn unsubscribe_property_events(&mut self, camera: EdsRef) {
        if self.events.is_none() {
            return;
        }
        // SAFETY: unregistering; no context is handed out.
        let result = unsafe {
            self.sdk
                .set_property_event_handler(camera, PropertyEvent::All, None, ptr::null_mut())
        };
        if let Some(code) = result.filter(|code| !code.is_ok()) {
            tracing::warn!(%code, "Property event handler could not be removed");
        }
    }

    /// Close the session.
    ///
    /// Output routing is restored first if live view ever changed it; the
    /// UI lock and event handler are removed. Those steps are best-effort.
    pub fn close(&mut self) -> EdsdkResult<()> {
        let camera = self.camera()?;

        if let Err(e) = self.restore_evf_routing() {
            tracing::warn!(error = %e, "Could not restore live-view output routing");
        }
        if self.ui_locked {
            if let Err(e) = self.lock_ui(false) {
                tracing::warn!(error = %e, "Could not unlock camera UI");
            }
        }
        self.unsubscribe_property_events(camera);

        let code = self.sdk.close_session(camera);
        self.state = SessionState::SessionClosed;
        code.into_result()
            .map_err(|code| EdsdkError::SessionCloseFailed { code })?;

        tracing::info!("Camera session closed");
        Ok(())
    }

    /// Release everything and terminate the SDK.
    ///
    /// Runs from any state. Each step is attempted even if an earlier one
    /// failed; the first failure is returned. Idempotent.
    pub fn terminate(&mut self) -> EdsdkResult<()> {
        if self.state == SessionState::Terminated {
            return Ok(());
        }

        let mut first_error = None;

        if self.state == SessionState::SessionOpen {
            if let Err(e) = self.close() {
                tracing::warn!(error = %e, "Error while closing session during teardown");
                first_error.get_or_insert(e);
            }
        }

        // Camera is released before the SDK goes away.
        self.camera = None;

        if self.state.holds_sdk() {
            let code = self.sdk.terminate();
            if !code.is_ok() {
                first_error.get_or_insert(EdsdkError::TerminateFailed { code });
            }
        }

        self.events = None;
        self.saved_routing = None;
        self.state = SessionState::Terminated;
        tracing::debug!("EDSDK terminated");

        first_error.map_or(Ok(()), Err)
    }
}

impl<S: CameraSdk> Drop for DeviceSession<S> {
    fn drop(&mut self) {
        if self.state.holds_sdk() {
            // Best-effort teardown, log but don't propagate errors
            if let Err(e) = self.terminate() {
                tracing::warn!(error = %e, "Error during session cleanup");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockSdk, MockStep, RefKind};
    use lib_types::EdsCode;

    fn open_session(sdk: &Arc<MockSdk>) -> DeviceSession<MockSdk> {
        let mut session = DeviceSession::new(Arc::clone(sdk));
        session.open().unwrap();
        session
    }

    #[test]
    fn test_open_walks_to_session_open() {
        let sdk = Arc::new(MockSdk::new());
        let session = open_session(&sdk);

        assert_eq!(session.state(), SessionState::SessionOpen);
        let calls = sdk.calls();
        assert_eq!(calls.initialize, 1);
        assert_eq!(calls.open_session, 1);
        // Camera list released once the camera is taken.
        assert_eq!(sdk.live_refs(RefKind::CameraList), 0);
        assert_eq!(sdk.live_refs(RefKind::Camera), 1);
    }

    #[test]
    fn test_zero_cameras_reports_no_camera_without_opening() {
        let sdk = Arc::new(MockSdk::new().with_camera_count(0));
        let mut session = DeviceSession::new(Arc::clone(&sdk));

        let err = session.open().unwrap_err();
        assert!(matches!(err, EdsdkError::NoCamera));
        assert_eq!(session.state(), SessionState::Terminated);

        let calls = sdk.calls();
        assert_eq!(calls.open_session, 0);
        assert_eq!(calls.terminate, 1);
        assert_eq!(sdk.live_ref_count(), 0);
    }

    #[test]
    fn test_init_failure_does_not_terminate() {
        let sdk = Arc::new(MockSdk::new().failing(MockStep::Initialize, EdsCode::INTERNAL_ERROR));
        let mut session = DeviceSession::new(Arc::clone(&sdk));

        let err = session.open().unwrap_err();
        assert!(matches!(err, EdsdkError::SdkInitFailed { code } if code == EdsCode::INTERNAL_ERROR));
        assert_eq!(sdk.calls().terminate, 0);
        assert_eq!(session.state(), SessionState::Terminated);
    }

    #[test]
    fn test_each_open_step_failure_is_distinct_and_releases() {
        let cases = [
            (MockStep::CameraList, "list"),
            (MockStep::ChildAtIndex, "acquire"),
            (MockStep::OpenSession, "open"),
        ];
        for (step, label) in cases {
            let sdk = Arc::new(MockSdk::new().failing(step, EdsCode::DEVICE_INVALID));
            let mut session = DeviceSession::new(Arc::clone(&sdk));
            let err = session.open().unwrap_err();

            match step {
                MockStep::CameraList => {
                    assert!(matches!(err, EdsdkError::CameraListFailed { .. }), "{label}")
                }
                MockStep::ChildAtIndex => {
                    assert!(matches!(err, EdsdkError::DeviceAcquireFailed { index: 0, .. }), "{label}")
                }
                MockStep::OpenSession => {
                    assert!(matches!(err, EdsdkError::SessionOpenFailed { .. }), "{label}")
                }
                _ => unreachable!(),
            }
            assert_eq!(sdk.live_ref_count(), 0, "{label}: leaked references");
            assert_eq!(sdk.calls().terminate, 1, "{label}: SDK not terminated");
            assert_eq!(sdk.double_releases(), 0, "{label}");
        }
    }

    #[test]
    fn test_open_twice_is_invalid_state() {
        let sdk = Arc::new(MockSdk::new());
        let mut session = open_session(&sdk);
        let err = session.open().unwrap_err();
        assert!(matches!(
            err,
            EdsdkError::InvalidState {
                expected: SessionState::Unloaded,
                actual: SessionState::SessionOpen
            }
        ));
    }

    #[test]
    fn test_properties_require_open_session() {
        let sdk = Arc::new(MockSdk::new());
        let session = DeviceSession::new(Arc::clone(&sdk));

        let err = session.get_property(PropertyId::EVF_OUTPUT_DEVICE).unwrap_err();
        assert!(matches!(err, EdsdkError::NoSession { state: SessionState::Unloaded }));
        assert!(session.set_property(PropertyId::EVF_OUTPUT_DEVICE, 2).is_err());
        assert_eq!(sdk.calls().total, 0);
    }

    #[test]
    fn test_routing_restored_on_close() {
        let sdk = Arc::new(MockSdk::new().with_routing(EvfOutputDevice::TFT));
        let mut session = open_session(&sdk);

        session.route_evf_to_host().unwrap();
        assert_eq!(sdk.routing(), EvfOutputDevice::TFT | EvfOutputDevice::PC);
        // A second routing call keeps the original value.
        session.route_evf_to_host().unwrap();

        session.close().unwrap();
        assert_eq!(sdk.routing(), EvfOutputDevice::TFT);
        assert_eq!(session.state(), SessionState::SessionClosed);
    }

    #[test]
    fn test_terminate_releases_everything_once() {
        let sdk = Arc::new(MockSdk::new());
        let mut session = open_session(&sdk);
        session.route_evf_to_host().unwrap();

        session.terminate().unwrap();
        session.terminate().unwrap();

        let calls = sdk.calls();
        assert_eq!(calls.close_session, 1);
        assert_eq!(calls.terminate, 1);
        assert_eq!(sdk.live_ref_count(), 0);
        assert_eq!(sdk.double_releases(), 0);
        assert_eq!(sdk.routing(), EvfOutputDevice::TFT);
    }

    #[test]
    fn test_drop_tears_down() {
        let sdk = Arc::new(MockSdk::new());
        {
            let mut session = open_session(&sdk);
            session.route_evf_to_host().unwrap();
        }
        assert_eq!(sdk.calls().terminate, 1);
        assert_eq!(sdk.live_ref_count(), 0);
        assert_eq!(sdk.routing(), EvfOutputDevice::TFT);
    }

    #[test]
    fn test_property_events_registered_and_removed() {
        let sdk = Arc::new(MockSdk::new());
        let mut session = open_session(&sdk);
        assert!(sdk.has_event_handler());

        session.route_evf_to_host().unwrap();
        let events = session.property_events().unwrap();
        assert_eq!(events.routing_change_count(), 1);

        session.close().unwrap();
        assert!(!sdk.has_event_handler());
    }

    #[test]
    fn test_optional_entry_points_absent() {
        let sdk = Arc::new(MockSdk::new().without_optional_entry_points());
        let mut session = open_session(&sdk);

        assert!(session.property_events().is_none());
        assert!(matches!(
            session.lock_ui(true),
            Err(EdsdkError::NotSupported { operation: "EdsSendStatusCommand" })
        ));
        assert!(matches!(
            session.press_shutter(ShutterButton::Halfway),
            Err(EdsdkError::NotSupported { .. })
        ));
        assert!(matches!(session.pump_events(), Err(EdsdkError::NotSupported { .. })));
    }

    #[test]
    fn test_ui_lock_released_on_close() {
        let sdk = Arc::new(MockSdk::new());
        let options = SessionOptions {
            lock_ui: true,
            ..Default::default()
        };
        let mut session = DeviceSession::with_options(Arc::clone(&sdk), options);
        session.open().unwrap();
        assert_eq!(sdk.calls().status_commands, 1);

        session.close().unwrap();
        assert_eq!(sdk.calls().status_commands, 2);
    }
}
