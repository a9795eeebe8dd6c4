//! Ledmask register
//!
//! In-memory mirror of the card's one-byte LED state. A write updates the
//! mirror first and then pushes the byte to the bulk endpoint. A failed
//! push is not rolled back, so the mirror can run ahead of the hardware
//! until the next successful write.

use protocol::{
    BULK_TIMEOUT, LEDMASK_ENDPOINT, SessionError, Transport, UsbError, expect_full, parse_mask,
};
use tracing::{debug, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LedmaskRegister {
    value: u8,
}

impl LedmaskRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mirror value. Never touches the device.
    pub fn get(&self) -> u8 {
        self.value
    }

    /// Store `value` and write it to the card
    pub fn set<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        value: u8,
    ) -> Result<(), UsbError> {
        self.value = value;

        let payload = [value];
        let result = expect_full(
            payload.len(),
            transport.bulk_transfer(LEDMASK_ENDPOINT, &payload, BULK_TIMEOUT),
        );

        match &result {
            Ok(()) => debug!("Ledmask set to {:#04x}", value),
            Err(e) => warn!(
                "Ledmask write of {:#04x} failed, mirror kept: {}",
                value, e
            ),
        }
        result
    }

    /// Parse hex `text`, then [`set`](Self::set) the low byte
    ///
    /// Text without hex digits is rejected before anything is sent.
    pub fn set_from_hex_str<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        text: &str,
    ) -> Result<u8, SessionError> {
        let value = parse_mask(text)?;
        self.set(transport, value)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{MockTransport, TransferCall};

    #[test]
    fn test_set_writes_one_byte_to_endpoint_two() {
        let mock = MockTransport::new();
        let mut transport = mock.clone();
        let mut register = LedmaskRegister::new();

        register.set(&mut transport, 0x3c).unwrap();

        assert_eq!(register.get(), 0x3c);
        assert_eq!(
            mock.calls(),
            vec![TransferCall::Bulk {
                endpoint: 0x02,
                data: vec![0x3c],
                timeout: BULK_TIMEOUT,
            }]
        );
    }

    #[test]
    fn test_failed_write_keeps_new_value() {
        let mock = MockTransport::new();
        mock.fail_bulk(UsbError::Timeout);
        let mut transport = mock.clone();
        let mut register = LedmaskRegister::new();

        assert_eq!(register.set(&mut transport, 0x81), Err(UsbError::Timeout));
        assert_eq!(register.get(), 0x81);
    }

    #[test]
    fn test_parse_error_sends_nothing() {
        let mock = MockTransport::new();
        let mut transport = mock.clone();
        let mut register = LedmaskRegister::new();
        register.set(&mut transport, 0x11).unwrap();
        mock.clear();

        let result = register.set_from_hex_str(&mut transport, "zz");
        assert!(matches!(result, Err(SessionError::Parse(_))));
        assert_eq!(register.get(), 0x11);
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_hex_write_truncates() {
        let mock = MockTransport::new();
        let mut transport = mock.clone();
        let mut register = LedmaskRegister::new();

        assert_eq!(register.set_from_hex_str(&mut transport, "0x1a5\n"), Ok(0xa5));
        assert_eq!(mock.bulk_payloads(), vec![0xa5]);
    }
}
