//! USB subsystem
//!
//! Card discovery, hot-plug handling and the rusb transport. Everything
//! here runs on a dedicated worker thread so blocking transfers never stall
//! the Tokio runtime.

pub mod device;
pub mod manager;
pub mod transfers;
pub mod worker;

pub use device::{DeviceSummary, InterfaceSelection, UsbDevice};
pub use manager::{DeviceManager, UsbSettings, find_devices};
pub use transfers::{RusbTransport, map_rusb_error};
pub use worker::{UsbWorkerThread, dispatch_command, spawn_usb_worker};
