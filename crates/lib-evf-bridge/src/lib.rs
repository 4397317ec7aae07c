//! # lib-evf-bridge
//!
//! C ABI for Canon EDSDK live view.
//!
//! A host process (or another language runtime) loads this library and
//! drives one camera through a handful of functions:
//!
//! ```c
//! EvfBridge *ctx = NULL;
//! if (evf_initialize(NULL, &ctx) != 0) { /* no camera */ }
//! evf_start_liveview(ctx);
//! uint8_t *jpeg; size_t len;
//! if (evf_get_frame(ctx, &jpeg, &len) == 0) {
//!     /* ... */
//!     evf_free_buffer(jpeg);
//! }
//! evf_stop_liveview(ctx);
//! evf_terminate(ctx);
//! ```
//!
//! Every function returns an `int32_t` [`ResultCode`] and catches panics.
//! State lives in the context object behind the handle, never in globals;
//! logging is controlled by the `EVF_BRIDGE_LOG` environment variable.

pub mod abi;
pub mod bridge;
pub mod buffer;
pub mod codes;
pub mod config;
pub mod ffi;
pub mod logging;

pub use bridge::{Bridge, EvfBridge};
pub use codes::ResultCode;
pub use config::BridgeConfig;
pub use ffi::*;
