//! Transfer transport boundary
//!
//! The controller core never talks to libusb directly. Everything it sends
//! goes through a [`Transport`], which the server implements over a
//! `rusb::DeviceHandle` and the tests implement with a recording double.

use crate::error::UsbError;
use crate::types::ControlSetup;
use std::time::Duration;

/// Synchronous OUT transfers to one device
///
/// Both calls block until the transfer completes or `timeout` elapses and
/// return the number of bytes the device accepted.
pub trait Transport: Send {
    /// Control transfer on endpoint 0
    fn control_transfer(
        &mut self,
        setup: ControlSetup,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbError>;

    /// Bulk transfer to an OUT endpoint
    fn bulk_transfer(
        &mut self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn control_transfer(
        &mut self,
        setup: ControlSetup,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbError> {
        (**self).control_transfer(setup, data, timeout)
    }

    fn bulk_transfer(
        &mut self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbError> {
        (**self).bulk_transfer(endpoint, data, timeout)
    }
}

/// Treat a transfer that moved fewer bytes than requested as a failure
pub fn expect_full(expected: usize, result: Result<usize, UsbError>) -> Result<(), UsbError> {
    match result {
        Ok(actual) if actual == expected => Ok(()),
        Ok(actual) => Err(UsbError::ShortTransfer { expected, actual }),
        Err(e) => Err(e),
    }
}
