//! # lib-types
//!
//! Core type definitions shared by the EDSDK live-view bridge.
//!
//! This crate provides the plain data types used throughout the workspace:
//! - Vendor status codes and their classification
//! - Property identifiers and the live-view output-routing bits
//! - The device session state machine states
//! - Live-view frames handed back to callers

pub mod status;
pub mod property;
pub mod session;
pub mod frame;

pub use status::*;
pub use property::*;
pub use session::*;
pub use frame::*;
