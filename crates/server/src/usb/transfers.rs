//! USB transfer execution
//!
//! [`RusbTransport`] is the real [`Transport`]: it runs the card's vendor
//! control writes and ledmask bulk writes through a libusb device handle
//! and maps rusb errors to protocol errors.

use protocol::{ControlSetup, Transport, UsbError};
use rusb::{Context, DeviceHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Claimed interface on an open card
///
/// Releases the interface when dropped, which is how a session's detach
/// hands the device back.
pub struct RusbTransport {
    handle: DeviceHandle<Context>,
    interface: u8,
}

impl RusbTransport {
    pub(crate) fn new(handle: DeviceHandle<Context>, interface: u8) -> Self {
        Self { handle, interface }
    }
}

impl Transport for RusbTransport {
    /// OUT control transfer. Cards only ever receive vendor writes.
    fn control_transfer(
        &mut self,
        setup: ControlSetup,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbError> {
        trace!(
            "Control transfer: request_type={:#x}, request={:#x}, value={:#x}, index={:#x}, data_len={}",
            setup.request_type,
            setup.request,
            setup.value,
            setup.index,
            data.len()
        );

        if setup.request_type & 0x80 != 0 {
            return Err(UsbError::InvalidParam);
        }

        self.handle
            .write_control(
                setup.request_type,
                setup.request,
                setup.value,
                setup.index,
                data,
                timeout,
            )
            .map_err(|e| {
                warn!("Control transfer failed: {}", e);
                map_rusb_error(e)
            })
    }

    fn bulk_transfer(
        &mut self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbError> {
        trace!(
            "Bulk transfer: endpoint={:#x}, data_len={}, timeout={}ms",
            endpoint,
            data.len(),
            timeout.as_millis()
        );

        if endpoint & 0x80 != 0 {
            return Err(UsbError::InvalidParam);
        }

        self.handle
            .write_bulk(endpoint, data, timeout)
            .map_err(|e| {
                warn!("Bulk transfer to {:#x} failed: {}", endpoint, e);
                map_rusb_error(e)
            })
    }
}

impl Drop for RusbTransport {
    fn drop(&mut self) {
        match self.handle.release_interface(self.interface) {
            Ok(()) => debug!("Released interface {}", self.interface),
            // Already gone if the card was unplugged
            Err(e) => debug!("Release of interface {} failed: {}", self.interface, e),
        }
    }
}

/// Map rusb::Error to protocol::UsbError
pub fn map_rusb_error(err: rusb::Error) -> UsbError {
    match err {
        rusb::Error::Timeout => UsbError::Timeout,
        rusb::Error::Pipe => UsbError::Pipe,
        rusb::Error::NoDevice => UsbError::NoDevice,
        rusb::Error::NotFound => UsbError::NotFound,
        rusb::Error::Busy => UsbError::Busy,
        rusb::Error::Overflow => UsbError::Overflow,
        rusb::Error::Io => UsbError::Io,
        rusb::Error::InvalidParam => UsbError::InvalidParam,
        rusb::Error::Access => UsbError::Access,
        _ => UsbError::Other {
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_rusb_error() {
        assert_eq!(map_rusb_error(rusb::Error::Timeout), UsbError::Timeout);
        assert_eq!(map_rusb_error(rusb::Error::Pipe), UsbError::Pipe);
        assert_eq!(map_rusb_error(rusb::Error::NoDevice), UsbError::NoDevice);
        assert_eq!(map_rusb_error(rusb::Error::NotFound), UsbError::NotFound);
        assert_eq!(map_rusb_error(rusb::Error::Access), UsbError::Access);
    }

    #[test]
    fn test_unmapped_error_keeps_message() {
        match map_rusb_error(rusb::Error::NotSupported) {
            UsbError::Other { message } => assert!(!message.is_empty()),
            other => panic!("unexpected mapping: {:?}", other),
        }
    }

    #[test]
    fn test_ledmask_endpoint_is_out() {
        assert_eq!(protocol::LEDMASK_ENDPOINT & 0x80, 0);
        assert_eq!(protocol::VENDOR_OUT_REQUEST_TYPE & 0x80, 0);
    }
}
