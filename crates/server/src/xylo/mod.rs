//! Xylo card driver core
//!
//! Transport-agnostic logic for one card: bring-up, the ledmask register,
//! the attach animation, and session lifecycle. Everything here runs on
//! top of [`protocol::Transport`] so it can be driven by rusb or a mock.

pub mod animation;
pub mod bringup;
pub mod ledmask;
pub mod registry;
pub mod session;

pub use bringup::BringUpMode;
pub use ledmask::LedmaskRegister;
pub use registry::SessionRegistry;
pub use session::{DeviceSession, SessionOptions};
