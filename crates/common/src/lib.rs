//! Common utilities for usbip-dap
//!
//! Shared plumbing between the wire protocol and the server: the error
//! type, logging setup, compile-time configuration constants and the
//! emulated device's descriptor identity.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod logging;

pub use config::TransportMode;
pub use error::{Error, Result};
pub use logging::setup_logging;
