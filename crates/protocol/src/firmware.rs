//! Xylo bring-up table and register map
//!
//! The card carries an FX2 microcontroller with no firmware of its own.
//! Bring-up holds the 8051 core in reset through the CPUCS register, loads
//! a small image into internal RAM with the `0xA0` vendor request, then
//! releases the core. The image programs the ledmask bulk endpoint.
//!
//! The table below is applied byte-for-byte, in order. Reordering or
//! splitting packets changes what ends up in RAM.

use std::time::Duration;

/// Vendor request that writes into FX2 internal RAM (`wValue` = address)
pub const FIRMWARE_LOAD_REQUEST: u8 = 0xa0;

/// bmRequestType for the bring-up requests: vendor, host-to-device, device
pub const VENDOR_OUT_REQUEST_TYPE: u8 = 0x40;

/// CPUCS register address
pub const CPUCS_ADDRESS: u16 = 0xe600;

/// CPUCS value holding the 8051 in reset
pub const CPUCS_HOLD: u8 = 0x01;

/// CPUCS value releasing the 8051
pub const CPUCS_RUN: u8 = 0x00;

/// Largest payload of a single load packet
pub const MAX_PACKET_LEN: usize = 16;

/// Timeout of each bring-up control transfer
pub const CONTROL_TIMEOUT: Duration = Duration::from_secs(1);

/// Bulk OUT endpoint carrying the ledmask byte
pub const LEDMASK_ENDPOINT: u8 = 0x02;

/// Timeout of a ledmask bulk write
pub const BULK_TIMEOUT: Duration = Duration::from_secs(2);

/// Pause after each animation frame
pub const ANIMATION_FRAME_DELAY: Duration = Duration::from_millis(50);

/// Ledmask values written by the attach animation: a count over the low
/// three LEDs, then two all-on/all-off blinks.
pub const ANIMATION_FRAMES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 0xff, 0x00, 0xff, 0x00];

/// One `0xA0` load request: `data` is written at `address`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitPacket {
    pub address: u16,
    pub data: &'static [u8],
}

impl InitPacket {
    pub const fn new(address: u16, data: &'static [u8]) -> Self {
        Self { address, data }
    }

    /// Whether this packet targets the CPUCS register rather than RAM
    pub fn is_cpucs(&self) -> bool {
        self.address == CPUCS_ADDRESS
    }
}

/// Full bring-up sequence: hold, image chunks, release
pub static BRING_UP_SEQUENCE: [InitPacket; 13] = [
    InitPacket::new(CPUCS_ADDRESS, &[CPUCS_HOLD]),
    InitPacket::new(
        0x0000,
        &[
            0x75, 0x81, 0x5f, 0x90, 0xe6, 0x00, 0x74, 0x0a, 0xf0, 0x90, 0xe6, 0x7a, 0x74, 0x01,
            0xf0, 0x11,
        ],
    ),
    InitPacket::new(
        0x0010,
        &[
            0x9b, 0x90, 0xe6, 0x18, 0x74, 0x10, 0xf0, 0x11, 0x9b, 0x90, 0xe6, 0x19, 0x74, 0x10,
            0xf0, 0x11,
        ],
    ),
    InitPacket::new(
        0x0020,
        &[
            0x9b, 0x90, 0xe6, 0x1a, 0x74, 0x0c, 0xf0, 0x11, 0x9b, 0x90, 0xe6, 0x1b, 0x74, 0x0c,
            0xf0, 0x11,
        ],
    ),
    InitPacket::new(
        0x0030,
        &[
            0x9b, 0x90, 0xe6, 0x02, 0x74, 0x98, 0xf0, 0x11, 0x9b, 0x90, 0xe6, 0x03, 0x74, 0xfe,
            0xf0, 0x90,
        ],
    ),
    InitPacket::new(
        0x0040,
        &[
            0xe6, 0x70, 0x74, 0x80, 0xf0, 0x11, 0x9b, 0x90, 0xe6, 0x01, 0x74, 0x03, 0xf0, 0x90,
            0xe6, 0x8d,
        ],
    ),
    InitPacket::new(
        0x0050,
        &[
            0xf0, 0xe5, 0xba, 0x20, 0xe1, 0xfb, 0x90, 0xe6, 0x8d, 0xe0, 0x60, 0x25, 0x90, 0xe7,
            0x80, 0xb4,
        ],
    ),
    InitPacket::new(
        0x0060,
        &[
            0x04, 0x27, 0xe0, 0xf5, 0xb2, 0xa3, 0xe0, 0xf5, 0xb5, 0xa3, 0xe0, 0xf5, 0xb0, 0xa3,
            0xe0, 0x90,
        ],
    ),
    InitPacket::new(
        0x0070,
        &[
            0xe6, 0x09, 0xf0, 0x90, 0xe7, 0xc0, 0xe5, 0xb0, 0xf0, 0x90, 0xe6, 0x8f, 0x74, 0x01,
            0xf0, 0x80,
        ],
    ),
    InitPacket::new(
        0x0080,
        &[
            0xcc, 0x90, 0xe7, 0xc0, 0xe5, 0xaa, 0xf0, 0x80, 0xf0, 0xff, 0xe0, 0xa3, 0x7e, 0x08,
            0x13, 0x92,
        ],
    ),
    InitPacket::new(
        0x0090,
        &[
            0x80, 0xc2, 0x81, 0xd2, 0x81, 0xde, 0xf7, 0xdf, 0xf1, 0x80, 0xb2, 0x00, 0x00, 0x00,
            0x00, 0x00,
        ],
    ),
    InitPacket::new(
        0x00a0,
        &[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x22],
    ),
    InitPacket::new(CPUCS_ADDRESS, &[CPUCS_RUN]),
];

/// Packets that carry the firmware image, in load order
pub fn image_packets() -> impl Iterator<Item = &'static InitPacket> {
    BRING_UP_SEQUENCE.iter().filter(|packet| !packet.is_cpucs())
}

/// Total size of the firmware image in bytes
pub fn image_len() -> usize {
    image_packets().map(|packet| packet.data.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_brackets_image_with_cpucs() {
        let first = BRING_UP_SEQUENCE.first().unwrap();
        let last = BRING_UP_SEQUENCE.last().unwrap();

        assert_eq!(first.address, CPUCS_ADDRESS);
        assert_eq!(first.data, &[CPUCS_HOLD]);
        assert_eq!(last.address, CPUCS_ADDRESS);
        assert_eq!(last.data, &[CPUCS_RUN]);
    }

    #[test]
    fn test_image_addresses_are_contiguous() {
        let mut expected = 0u16;
        for packet in image_packets() {
            assert_eq!(packet.address, expected);
            assert!(packet.data.len() <= MAX_PACKET_LEN);
            expected += packet.data.len() as u16;
        }
        assert_eq!(expected, 0x00ab);
    }

    #[test]
    fn test_image_shape() {
        assert_eq!(image_packets().count(), 11);
        assert_eq!(image_len(), 171);
        assert_eq!(image_packets().last().unwrap().data.len(), 11);
        // The image ends in a RET
        assert_eq!(image_packets().last().unwrap().data.last(), Some(&0x22));
    }

    #[test]
    fn test_request_type_is_vendor_out() {
        // Bit 7 clear: host to device. Bits 6..5 = 10: vendor.
        assert_eq!(VENDOR_OUT_REQUEST_TYPE & 0x80, 0);
        assert_eq!(VENDOR_OUT_REQUEST_TYPE & 0x60, 0x40);
    }

    #[test]
    fn test_ledmask_endpoint_is_out() {
        assert_eq!(LEDMASK_ENDPOINT & 0x80, 0);
    }
}
