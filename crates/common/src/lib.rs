//! Common utilities for xylo-led
//!
//! This crate provides plumbing shared by the daemon and its tests:
//! error handling, logging setup, the async channel bridge between the
//! Tokio runtime and the USB worker thread, and a recording transport for
//! exercising the controller without hardware.

pub mod channel;
pub mod error;
pub mod logging;
pub mod test_utils;

pub use channel::{AttributeError, UsbBridge, UsbCommand, UsbEvent, UsbWorker, create_usb_bridge};
pub use error::{Error, Result};
pub use logging::setup_logging;
