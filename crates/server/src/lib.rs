//! Xylo LED card service
//!
//! Library half of `xylo-ledd`: configuration, the rusb-backed USB
//! subsystem, and the card driver core.

pub mod config;
pub mod console;
pub mod usb;
pub mod xylo;
