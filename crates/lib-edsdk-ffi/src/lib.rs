//! # lib-edsdk-ffi
//!
//! Safe wrappers for the Canon EDSDK camera library.
//!
//! This crate binds the vendor library at runtime and drives one camera
//! through live view. It handles:
//!
//! - Dynamic library loading with `libloading`
//! - Session lifecycle (Initialize/List/Acquire/Open/Close/Terminate)
//! - Live-view routing and frame download with bounded retry
//! - Exactly-once release of every vendor reference
//! - Optional property events, UI lock and shutter commands
//!
//! # Safety
//!
//! The vendor library is trusted to honour its own contract but nothing
//! more:
//!
//! 1. **Single binding**: every symbol is resolved once at load time
//! 2. **Scoped references**: [`OwnedRef`] releases on drop, view before sink
//! 3. **State machine**: session states reject out-of-order calls
//! 4. **Panic catching**: the event callback never unwinds into the SDK
//!
//! All vendor access goes through the [`CameraSdk`] trait so the session
//! and live-view logic can run against [`mock::MockSdk`] in tests.

pub mod camera;
pub mod error;
pub mod events;
pub mod handle;
pub mod lifecycle;
pub mod liveview;
pub mod loader;
pub mod sdk;
pub mod sync;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use camera::LiveViewCamera;
pub use error::{EdsdkError, EdsdkResult};
pub use events::PropertyEvents;
pub use handle::OwnedRef;
pub use lifecycle::{DeviceSession, SessionOptions, SessionState};
pub use liveview::{LiveView, RetryPolicy};
pub use loader::{default_library_path, EdsdkLibrary, LibraryFormat, LibraryInfo};
pub use sdk::{CameraSdk, EdsRef};
pub use sync::RecoverMutex;
