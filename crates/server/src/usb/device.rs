//! USB device abstraction
//!
//! Wraps a rusb device with its cached descriptor and knows how to turn a
//! plugged-in card into a claimed [`RusbTransport`].

use crate::usb::transfers::{RusbTransport, map_rusb_error};
use protocol::{DeviceLocation, UsbError, XYLO_PRODUCT_ID, XYLO_VENDOR_ID};
use rusb::{Context, Device, DeviceDescriptor};
use std::fmt;
use tracing::{debug, warn};

/// Interface and alternate setting a card is driven through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceSelection {
    pub interface: u8,
    pub alt_setting: u8,
}

impl Default for InterfaceSelection {
    fn default() -> Self {
        Self {
            interface: 0,
            alt_setting: 1,
        }
    }
}

/// One-line description of a card for `--list-devices`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    pub location: DeviceLocation,
    pub vendor_id: u16,
    pub product_id: u16,
    pub product: Option<String>,
    pub speed: &'static str,
}

impl fmt::Display for DeviceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bus {} {:04x}:{:04x} {} ({} speed)",
            self.location,
            self.vendor_id,
            self.product_id,
            self.product.as_deref().unwrap_or("Xylo LED card"),
            self.speed
        )
    }
}

/// USB device wrapper with cached information
pub struct UsbDevice {
    device: Device<Context>,
    descriptor: DeviceDescriptor,
}

impl UsbDevice {
    /// Create a new USB device wrapper
    ///
    /// Reads and caches the device descriptor.
    pub fn new(device: Device<Context>) -> Result<Self, rusb::Error> {
        let descriptor = device.device_descriptor()?;
        Ok(Self { device, descriptor })
    }

    pub fn location(&self) -> DeviceLocation {
        DeviceLocation {
            bus_number: self.device.bus_number(),
            address: self.device.address(),
        }
    }

    /// Whether the descriptor identifies a Xylo card
    pub fn is_xylo(&self) -> bool {
        matches_ids(self.descriptor.vendor_id(), self.descriptor.product_id())
    }

    pub fn summary(&self) -> DeviceSummary {
        let product = self.descriptor.product_string_index().and_then(|idx| {
            self.device
                .open()
                .ok()
                .and_then(|handle| handle.read_string_descriptor_ascii(idx).ok())
        });

        DeviceSummary {
            location: self.location(),
            vendor_id: self.descriptor.vendor_id(),
            product_id: self.descriptor.product_id(),
            product,
            speed: speed_name(self.device.speed()),
        }
    }

    /// Open the card and claim its interface
    ///
    /// A kernel driver bound to the interface is detached first. Failure to
    /// select the alternate setting is logged but not fatal: the card's
    /// default setting still exposes the bulk endpoint on some revisions.
    pub fn open(&self, selection: InterfaceSelection) -> Result<RusbTransport, UsbError> {
        let location = self.location();
        let mut handle = self.device.open().map_err(|e| {
            warn!("Failed to open device {}: {}", location, e);
            map_rusb_error(e)
        })?;
        debug!("Opened device {}", location);

        let interface = selection.interface;
        match handle.kernel_driver_active(interface) {
            Ok(true) => {
                debug!("Detaching kernel driver from interface {}", interface);
                if let Err(e) = handle.detach_kernel_driver(interface) {
                    warn!(
                        "Failed to detach kernel driver from interface {}: {}",
                        interface, e
                    );
                }
            }
            Ok(false) => {}
            Err(e) => debug!(
                "Could not check kernel driver status for interface {}: {}",
                interface, e
            ),
        }

        handle.claim_interface(interface).map_err(|e| {
            warn!("Failed to claim interface {} on {}: {}", interface, location, e);
            map_rusb_error(e)
        })?;
        debug!("Claimed interface {} on {}", interface, location);

        if let Err(e) = handle.set_alternate_setting(interface, selection.alt_setting) {
            warn!(
                "Failed to select alternate setting {} on interface {}: {}",
                selection.alt_setting, interface, e
            );
        }

        Ok(RusbTransport::new(handle, interface))
    }
}

pub fn matches_ids(vendor_id: u16, product_id: u16) -> bool {
    vendor_id == XYLO_VENDOR_ID && product_id == XYLO_PRODUCT_ID
}

fn speed_name(speed: rusb::Speed) -> &'static str {
    match speed {
        rusb::Speed::Low => "low",
        rusb::Speed::Full => "full",
        rusb::Speed::High => "high",
        rusb::Speed::Super => "super",
        rusb::Speed::SuperPlus => "super+",
        _ => "unknown",
    }
}
