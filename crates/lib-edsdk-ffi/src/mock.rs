//! Scripted in-memory EDSDK for testing without a camera.
//!
//! [`MockSdk`] hands out integer-backed references, counts every call and
//! every release, and plays back a scripted sequence of download results.
//! It keeps enough state (open session, output routing, event handler) to
//! behave like a single attached body.

use crate::sdk::{CameraSdk, EdsRef, PropertyEventCallback};
use crate::sync::RecoverMutex;
use lib_types::{EdsCode, EvfOutputDevice, PropertyEvent, PropertyId, StatusCommand};
use std::collections::{HashMap, VecDeque};
use std::ffi::c_void;
use std::sync::Mutex;

/// Kinds of reference the mock hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    CameraList,
    Camera,
    MemoryStream,
    EvfImage,
}

/// Vendor calls that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockStep {
    Initialize,
    Terminate,
    CameraList,
    ChildCount,
    ChildAtIndex,
    OpenSession,
    CloseSession,
    GetProperty,
    SetProperty,
    CreateMemoryStream,
    CreateEvfImageRef,
    StreamPointer,
    StreamLength,
    StatusCommand,
    SendCommand,
    GetEvent,
}

/// Call counters for the entry points whose call counts matter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockCalls {
    pub initialize: u32,
    pub terminate: u32,
    pub open_session: u32,
    pub close_session: u32,
    pub set_property: u32,
    pub download: u32,
    pub status_commands: u32,
    pub commands: u32,
    /// Every vendor call, counted or not.
    pub total: u32,
}

#[derive(Debug)]
struct MockObject {
    kind: RefKind,
    /// Payload of a memory stream.
    data: Vec<u8>,
    /// Stream an EVF image ref writes into.
    target: Option<usize>,
}

#[derive(Debug)]
struct MockState {
    calls: MockCalls,
    failures: HashMap<MockStep, EdsCode>,
    downloads: VecDeque<EdsCode>,
    payload: Vec<u8>,
    camera_count: u32,
    optional: bool,

    next_id: usize,
    objects: HashMap<usize, MockObject>,
    created: HashMap<RefKind, u32>,
    released: HashMap<RefKind, u32>,
    release_order: Vec<RefKind>,
    double_releases: u32,

    initialized: bool,
    session_open: bool,
    routing: u32,
    properties: HashMap<u32, u32>,
    /// Handler and its context, stored as an address.
    handler: Option<(PropertyEventCallback, usize)>,
}

impl MockState {
    fn count(&mut self, counter: impl FnOnce(&mut MockCalls) -> &mut u32) {
        *counter(&mut self.calls) += 1;
        self.tick();
    }

    fn tick(&mut self) {
        self.calls.total += 1;
    }

    fn scripted(&self, step: MockStep) -> Option<EdsCode> {
        self.failures.get(&step).copied()
    }

    fn create(&mut self, kind: RefKind, target: Option<usize>) -> Result<EdsRef, EdsCode> {
        let id = self.next_id;
        let raw = EdsRef::from_raw(id as *mut c_void).ok_or(EdsCode::INTERNAL_ERROR)?;
        self.next_id += 1;
        self.objects.insert(
            id,
            MockObject {
                kind,
                data: Vec::new(),
                target,
            },
        );
        *self.created.entry(kind).or_default() += 1;
        Ok(raw)
    }

    fn object(&self, object: EdsRef, kind: RefKind) -> Result<&MockObject, EdsCode> {
        match self.objects.get(&(object.as_ptr() as usize)) {
            Some(found) if found.kind == kind => Ok(found),
            _ => Err(EdsCode::INVALID_HANDLE),
        }
    }

    fn check_camera(&self, camera: EdsRef) -> Result<(), EdsCode> {
        self.object(camera, RefKind::Camera)?;
        if !self.session_open {
            return Err(EdsCode::SESSION_NOT_OPEN);
        }
        Ok(())
    }
}

/// In-memory stand-in for the vendor library.
#[derive(Debug)]
pub struct MockSdk {
    state: Mutex<MockState>,
}

impl Default for MockSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSdk {
    /// One camera, live view on the rear screen, all optional entry points
    /// present, and a small JPEG-looking payload.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                calls: MockCalls::default(),
                failures: HashMap::new(),
                downloads: VecDeque::new(),
                payload: vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xFF, 0xD9],
                camera_count: 1,
                optional: true,
                next_id: 1,
                objects: HashMap::new(),
                created: HashMap::new(),
                released: HashMap::new(),
                release_order: Vec::new(),
                double_releases: 0,
                initialized: false,
                session_open: false,
                routing: EvfOutputDevice::TFT,
                properties: HashMap::from([(PropertyId::BATTERY_LEVEL.0, 100)]),
                handler: None,
            }),
        }
    }

    #[must_use]
    pub fn with_camera_count(self, count: u32) -> Self {
        self.state.lock_recover().camera_count = count;
        self
    }

    /// Initial `Evf_OutputDevice` value.
    #[must_use]
    pub fn with_routing(self, routing: u32) -> Self {
        self.state.lock_recover().routing = routing;
        self
    }

    /// Bytes placed in the stream by every successful download.
    #[must_use]
    pub fn with_payload(self, payload: Vec<u8>) -> Self {
        self.state.lock_recover().payload = payload;
        self
    }

    /// Results of the next downloads, in order. Once exhausted every
    /// download succeeds.
    #[must_use]
    pub fn with_downloads(self, codes: impl IntoIterator<Item = EdsCode>) -> Self {
        self.state.lock_recover().downloads.extend(codes);
        self
    }

    /// Make every call of `step` fail with `code`.
    #[must_use]
    pub fn failing(self, step: MockStep, code: EdsCode) -> Self {
        self.state.lock_recover().failures.insert(step, code);
        self
    }

    /// Behave like a library without the optional entry points.
    #[must_use]
    pub fn without_optional_entry_points(self) -> Self {
        self.state.lock_recover().optional = false;
        self
    }

    pub fn calls(&self) -> MockCalls {
        self.state.lock_recover().calls
    }

    /// Unreleased references of one kind.
    pub fn live_refs(&self, kind: RefKind) -> usize {
        let state = self.state.lock_recover();
        state.objects.values().filter(|o| o.kind == kind).count()
    }

    /// Unreleased references of any kind.
    pub fn live_ref_count(&self) -> usize {
        self.state.lock_recover().objects.len()
    }

    pub fn created(&self, kind: RefKind) -> u32 {
        let state = self.state.lock_recover();
        state.created.get(&kind).copied().unwrap_or(0)
    }

    pub fn released(&self, kind: RefKind) -> u32 {
        let state = self.state.lock_recover();
        state.released.get(&kind).copied().unwrap_or(0)
    }

    /// Kinds in the order they were released.
    pub fn release_order(&self) -> Vec<RefKind> {
        self.state.lock_recover().release_order.clone()
    }

    /// Releases of references that were already released or never issued.
    pub fn double_releases(&self) -> u32 {
        self.state.lock_recover().double_releases
    }

    /// Current `Evf_OutputDevice` value.
    pub fn routing(&self) -> u32 {
        self.state.lock_recover().routing
    }

    pub fn has_event_handler(&self) -> bool {
        self.state.lock_recover().handler.is_some()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock_recover().initialized
    }
}

impl CameraSdk for MockSdk {
    fn initialize(&self) -> EdsCode {
        let mut state = self.state.lock_recover();
        state.count(|c| &mut c.initialize);
        if let Some(code) = state.scripted(MockStep::Initialize) {
            return code;
        }
        state.initialized = true;
        EdsCode::OK
    }

    fn terminate(&self) -> EdsCode {
        let mut state = self.state.lock_recover();
        state.count(|c| &mut c.terminate);
        state.initialized = false;
        state.session_open = false;
        state.scripted(MockStep::Terminate).unwrap_or(EdsCode::OK)
    }

    fn camera_list(&self) -> Result<EdsRef, EdsCode> {
        let mut state = self.state.lock_recover();
        state.tick();
        if let Some(code) = state.scripted(MockStep::CameraList) {
            return Err(code);
        }
        if !state.initialized {
            return Err(EdsCode::INTERNAL_ERROR);
        }
        state.create(RefKind::CameraList, None)
    }

    fn child_count(&self, parent: EdsRef) -> Result<u32, EdsCode> {
        let mut state = self.state.lock_recover();
        state.tick();
        if let Some(code) = state.scripted(MockStep::ChildCount) {
            return Err(code);
        }
        state.object(parent, RefKind::CameraList)?;
        Ok(state.camera_count)
    }

    fn child_at(&self, parent: EdsRef, index: i32) -> Result<EdsRef, EdsCode> {
        let mut state = self.state.lock_recover();
        state.tick();
        if let Some(code) = state.scripted(MockStep::ChildAtIndex) {
            return Err(code);
        }
        state.object(parent, RefKind::CameraList)?;
        match u32::try_from(index) {
            Ok(i) if i < state.camera_count => state.create(RefKind::Camera, None),
            _ => Err(EdsCode::INVALID_PARAMETER),
        }
    }

    fn open_session(&self, camera: EdsRef) -> EdsCode {
        let mut state = self.state.lock_recover();
        state.count(|c| &mut c.open_session);
        if let Some(code) = state.scripted(MockStep::OpenSession) {
            return code;
        }
        if let Err(code) = state.object(camera, RefKind::Camera) {
            return code;
        }
        state.session_open = true;
        EdsCode::OK
    }

    fn close_session(&self, camera: EdsRef) -> EdsCode {
        let mut state = self.state.lock_recover();
        state.count(|c| &mut c.close_session);
        if let Err(code) = state.check_camera(camera) {
            return code;
        }
        state.session_open = false;
        state.scripted(MockStep::CloseSession).unwrap_or(EdsCode::OK)
    }

    fn release(&self, object: EdsRef) -> u32 {
        let mut state = self.state.lock_recover();
        state.tick();
        match state.objects.remove(&(object.as_ptr() as usize)) {
            Some(removed) => {
                *state.released.entry(removed.kind).or_default() += 1;
                state.release_order.push(removed.kind);
            }
            None => state.double_releases += 1,
        }
        0
    }

    fn get_property_u32(
        &self,
        object: EdsRef,
        property: PropertyId,
        _param: i32,
    ) -> Result<u32, EdsCode> {
        let mut state = self.state.lock_recover();
        state.tick();
        if let Some(code) = state.scripted(MockStep::GetProperty) {
            return Err(code);
        }
        state.check_camera(object)?;
        if property == PropertyId::EVF_OUTPUT_DEVICE {
            return Ok(state.routing);
        }
        state
            .properties
            .get(&property.0)
            .copied()
            .ok_or(EdsCode::NOT_SUPPORTED)
    }

    fn set_property_u32(
        &self,
        object: EdsRef,
        property: PropertyId,
        _param: i32,
        value: u32,
    ) -> EdsCode {
        let handler = {
            let mut state = self.state.lock_recover();
            state.count(|c| &mut c.set_property);
            if let Some(code) = state.scripted(MockStep::SetProperty) {
                return code;
            }
            if let Err(code) = state.check_camera(object) {
                return code;
            }
            if property == PropertyId::EVF_OUTPUT_DEVICE {
                state.routing = value;
            } else {
                state.properties.insert(property.0, value);
            }
            state.handler
        };

        // Delivered without the lock held, as the SDK would from its own
        // dispatch.
        if let Some((callback, context)) = handler {
            unsafe {
                callback(
                    PropertyEvent::PropertyChanged as u32,
                    property.0,
                    0,
                    context as *mut c_void,
                );
            }
        }
        EdsCode::OK
    }

    fn create_memory_stream(&self, _capacity: u64) -> Result<EdsRef, EdsCode> {
        let mut state = self.state.lock_recover();
        state.tick();
        if let Some(code) = state.scripted(MockStep::CreateMemoryStream) {
            return Err(code);
        }
        state.create(RefKind::MemoryStream, None)
    }

    fn create_evf_image_ref(&self, stream: EdsRef) -> Result<EdsRef, EdsCode> {
        let mut state = self.state.lock_recover();
        state.tick();
        if let Some(code) = state.scripted(MockStep::CreateEvfImageRef) {
            return Err(code);
        }
        state.object(stream, RefKind::MemoryStream)?;
        state.create(RefKind::EvfImage, Some(stream.as_ptr() as usize))
    }

    fn download_evf_image(&self, camera: EdsRef, image: EdsRef) -> EdsCode {
        let mut state = self.state.lock_recover();
        state.count(|c| &mut c.download);
        if let Err(code) = state.check_camera(camera) {
            return code;
        }
        let target = match state.object(image, RefKind::EvfImage) {
            Ok(found) => found.target,
            Err(code) => return code,
        };
        if let Some(code) = state.downloads.pop_front() {
            if !code.is_ok() {
                return code;
            }
        }
        if !EvfOutputDevice(state.routing).routes_to_host() {
            return EdsCode::OBJECT_NOTREADY;
        }
        let payload = state.payload.clone();
        match target.and_then(|id| state.objects.get_mut(&id)) {
            Some(stream) => {
                stream.data = payload;
                EdsCode::OK
            }
            None => EdsCode::INVALID_HANDLE,
        }
    }

    fn stream_pointer(&self, stream: EdsRef) -> Result<*const u8, EdsCode> {
        let mut state = self.state.lock_recover();
        state.tick();
        if let Some(code) = state.scripted(MockStep::StreamPointer) {
            return Err(code);
        }
        // The buffer stays put until the stream is released.
        Ok(state.object(stream, RefKind::MemoryStream)?.data.as_ptr())
    }

    fn stream_length(&self, stream: EdsRef) -> Result<u64, EdsCode> {
        let mut state = self.state.lock_recover();
        state.tick();
        if let Some(code) = state.scripted(MockStep::StreamLength) {
            return Err(code);
        }
        Ok(state.object(stream, RefKind::MemoryStream)?.data.len() as u64)
    }

    fn send_status_command(&self, camera: EdsRef, _command: StatusCommand) -> Option<EdsCode> {
        let mut state = self.state.lock_recover();
        if !state.optional {
            return None;
        }
        state.count(|c| &mut c.status_commands);
        if let Err(code) = state.check_camera(camera) {
            return Some(code);
        }
        Some(state.scripted(MockStep::StatusCommand).unwrap_or(EdsCode::OK))
    }

    fn send_command(&self, camera: EdsRef, _command: u32, _param: i32) -> Option<EdsCode> {
        let mut state = self.state.lock_recover();
        if !state.optional {
            return None;
        }
        state.count(|c| &mut c.commands);
        if let Err(code) = state.check_camera(camera) {
            return Some(code);
        }
        Some(state.scripted(MockStep::SendCommand).unwrap_or(EdsCode::OK))
    }

    unsafe fn set_property_event_handler(
        &self,
        camera: EdsRef,
        _event: PropertyEvent,
        handler: Option<PropertyEventCallback>,
        context: *mut c_void,
    ) -> Option<EdsCode> {
        let mut state = self.state.lock_recover();
        if !state.optional {
            return None;
        }
        state.tick();
        if let Err(code) = state.check_camera(camera) {
            return Some(code);
        }
        state.handler = handler.map(|callback| (callback, context as usize));
        Some(EdsCode::OK)
    }

    fn get_event(&self) -> Option<EdsCode> {
        let mut state = self.state.lock_recover();
        if !state.optional {
            return None;
        }
        state.tick();
        Some(state.scripted(MockStep::GetEvent).unwrap_or(EdsCode::OK))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_tracking() {
        let sdk = MockSdk::new();
        assert!(sdk.initialize().is_ok());
        let list = sdk.camera_list().unwrap();
        assert_eq!(sdk.live_refs(RefKind::CameraList), 1);

        sdk.release(list);
        sdk.release(list);
        assert_eq!(sdk.live_ref_count(), 0);
        assert_eq!(sdk.released(RefKind::CameraList), 1);
        assert_eq!(sdk.double_releases(), 1);
    }

    #[test]
    fn test_properties_need_open_session() {
        let sdk = MockSdk::new();
        sdk.initialize();
        let list = sdk.camera_list().unwrap();
        let camera = sdk.child_at(list, 0).unwrap();

        assert_eq!(
            sdk.get_property_u32(camera, PropertyId::EVF_OUTPUT_DEVICE, 0),
            Err(EdsCode::SESSION_NOT_OPEN)
        );
        assert!(sdk.open_session(camera).is_ok());
        assert_eq!(
            sdk.get_property_u32(camera, PropertyId::EVF_OUTPUT_DEVICE, 0),
            Ok(EvfOutputDevice::TFT)
        );
        assert_eq!(sdk.child_at(list, 1), Err(EdsCode::INVALID_PARAMETER));
    }

    #[test]
    fn test_download_not_ready_until_routed() {
        let sdk = MockSdk::new();
        sdk.initialize();
        let list = sdk.camera_list().unwrap();
        let camera = sdk.child_at(list, 0).unwrap();
        sdk.open_session(camera);

        let stream = sdk.create_memory_stream(0).unwrap();
        let image = sdk.create_evf_image_ref(stream).unwrap();
        assert_eq!(sdk.download_evf_image(camera, image), EdsCode::OBJECT_NOTREADY);

        sdk.set_property_u32(camera, PropertyId::EVF_OUTPUT_DEVICE, 0, EvfOutputDevice::PC);
        assert_eq!(sdk.download_evf_image(camera, image), EdsCode::OK);
        assert_eq!(sdk.stream_length(stream), Ok(8));
    }

    #[test]
    fn test_handler_receives_registered_context() {
        use crate::events::{property_event_trampoline, PropertyEvents};

        let sdk = MockSdk::new();
        sdk.initialize();
        let list = sdk.camera_list().unwrap();
        let camera = sdk.child_at(list, 0).unwrap();
        sdk.open_session(camera);

        let events = PropertyEvents::new();
        let context = (&events as *const PropertyEvents).cast_mut().cast::<c_void>();
        // SAFETY: `events` outlives the registration, which is removed below.
        let code = unsafe {
            sdk.set_property_event_handler(
                camera,
                PropertyEvent::All,
                Some(property_event_trampoline),
                context,
            )
        };
        assert_eq!(code, Some(EdsCode::OK));

        sdk.set_property_u32(camera, PropertyId::EVF_OUTPUT_DEVICE, 0, EvfOutputDevice::PC);
        assert_eq!(events.routing_change_count(), 1);
        assert_eq!(events.last_property(), Some(PropertyId::EVF_OUTPUT_DEVICE));

        let code = unsafe {
            sdk.set_property_event_handler(camera, PropertyEvent::All, None, std::ptr::null_mut())
        };
        assert_eq!(code, Some(EdsCode::OK));
        assert!(!sdk.has_event_handler());

        sdk.set_property_u32(camera, PropertyId::EVF_OUTPUT_DEVICE, 0, EvfOutputDevice::TFT);
        assert_eq!(events.routing_change_count(), 1);
    }
}
