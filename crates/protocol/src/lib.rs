//! Protocol library for xylo-led
//!
//! This crate describes the Xylo card's control protocol as data: the
//! bring-up table that programs the onboard FX2, the ledmask endpoint and
//! its attribute text format, the session types shared by the daemon, and
//! the [`Transport`] boundary every transfer goes through.
//!
//! # Example
//!
//! ```
//! use protocol::{BRING_UP_SEQUENCE, CPUCS_ADDRESS, format_mask, parse_mask};
//!
//! assert_eq!(BRING_UP_SEQUENCE.len(), 13);
//! assert_eq!(BRING_UP_SEQUENCE[0].address, CPUCS_ADDRESS);
//!
//! let mask = parse_mask("a5").unwrap();
//! assert_eq!(format_mask(mask), "0xa5\n");
//! ```

pub mod error;
pub mod firmware;
pub mod mask;
pub mod transport;
pub mod types;

pub use error::{ParseMaskError, RegistryError, Result, SessionError, UsbError};
pub use firmware::{
    ANIMATION_FRAME_DELAY, ANIMATION_FRAMES, BRING_UP_SEQUENCE, BULK_TIMEOUT, CONTROL_TIMEOUT,
    CPUCS_ADDRESS, CPUCS_HOLD, CPUCS_RUN, FIRMWARE_LOAD_REQUEST, InitPacket, LEDMASK_ENDPOINT,
    MAX_PACKET_LEN, VENDOR_OUT_REQUEST_TYPE, image_len, image_packets,
};
pub use mask::{format_mask, parse_mask};
pub use transport::{Transport, expect_full};
pub use types::{
    ControlSetup, DeviceLocation, SessionId, SessionInfo, SessionState, XYLO_PRODUCT_ID,
    XYLO_VENDOR_ID,
};
