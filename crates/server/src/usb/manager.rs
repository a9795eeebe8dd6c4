//! USB device manager
//!
//! Finds Xylo cards, opens them, and feeds them to the session registry.
//! Runs on the USB thread.
//!
//! libusb forbids opening a device from inside a hotplug callback, so the
//! callback only queues the event; the worker drains the queue after each
//! `handle_events` pass.

use crate::usb::device::{DeviceSummary, InterfaceSelection, UsbDevice, matches_ids};
use crate::usb::transfers::RusbTransport;
use crate::xylo::{SessionOptions, SessionRegistry};
use common::UsbEvent;
use protocol::{DeviceLocation, XYLO_PRODUCT_ID, XYLO_VENDOR_ID};
use rusb::{Context, Device, Hotplug, HotplugBuilder, Registration, UsbContext};
use std::sync::mpsc;
use tracing::{debug, error, info, warn};

/// What the USB thread needs to know about the cards it drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsbSettings {
    pub selection: InterfaceSelection,
    /// Register for hotplug notifications when libusb supports them
    pub hotplug: bool,
    pub session: SessionOptions,
}

enum HotplugEvent {
    Arrived(Device<Context>),
    Left(DeviceLocation),
}

/// USB device manager
///
/// Sessions are keyed by bus location through the registry.
pub struct DeviceManager {
    context: Context,
    registry: SessionRegistry<RusbTransport>,
    selection: InterfaceSelection,
    hotplug_enabled: bool,
    _hotplug_registration: Option<Registration<Context>>,
    hotplug_tx: mpsc::Sender<HotplugEvent>,
    hotplug_rx: mpsc::Receiver<HotplugEvent>,
    event_sender: async_channel::Sender<UsbEvent>,
}

impl DeviceManager {
    pub fn new(
        event_sender: async_channel::Sender<UsbEvent>,
        settings: UsbSettings,
    ) -> Result<Self, rusb::Error> {
        let context = Context::new()?;
        let (hotplug_tx, hotplug_rx) = mpsc::channel();

        Ok(Self {
            context,
            registry: SessionRegistry::new(settings.session),
            selection: settings.selection,
            hotplug_enabled: settings.hotplug,
            _hotplug_registration: None,
            hotplug_tx,
            hotplug_rx,
            event_sender,
        })
    }

    /// Attach every card already plugged in, then start listening for
    /// hotplug events
    pub fn initialize(&mut self) -> Result<(), rusb::Error> {
        self.enumerate_devices()?;

        if !self.hotplug_enabled {
            info!("Hotplug disabled by configuration");
        } else if !rusb::has_hotplug() {
            warn!("libusb has no hotplug support; only cards present at startup are used");
        } else {
            self.register_hotplug()?;
        }

        info!(
            "Device manager initialized with {} card(s)",
            self.registry.len()
        );
        Ok(())
    }

    fn enumerate_devices(&mut self) -> Result<(), rusb::Error> {
        let devices = self.context.devices()?;
        for device in devices.iter() {
            self.handle_device_arrived(device);
        }
        Ok(())
    }

    fn register_hotplug(&mut self) -> Result<(), rusb::Error> {
        let callback = HotplugCallback {
            queue: self.hotplug_tx.clone(),
        };

        let registration = HotplugBuilder::new()
            .vendor_id(XYLO_VENDOR_ID)
            .product_id(XYLO_PRODUCT_ID)
            .enumerate(false)
            .register(&self.context, Box::new(callback))?;

        self._hotplug_registration = Some(registration);
        debug!("Hot-plug callbacks registered");
        Ok(())
    }

    /// Open a card and start a session for it
    ///
    /// Non-Xylo devices and locations already bound are ignored.
    pub fn handle_device_arrived(&mut self, device: Device<Context>) {
        let usb_device = match UsbDevice::new(device) {
            Ok(d) => d,
            Err(e) => {
                debug!("Skipping device without readable descriptor: {}", e);
                return;
            }
        };
        if !usb_device.is_xylo() {
            return;
        }

        let location = usb_device.location();
        if self.registry.find(location).is_some() {
            debug!("Card at {} already has a session", location);
            return;
        }

        let transport = match usb_device.open(self.selection) {
            Ok(t) => t,
            Err(e) => {
                error!("Cannot open card at {}: {}", location, e);
                return;
            }
        };

        let id = self.registry.attach(transport, Some(location));
        info!("Card at {} bound to {}", location, id);

        if let Some(session) = self.registry.session(id) {
            self.send_event(UsbEvent::SessionAttached {
                session: session.info(),
            });
        }
    }

    /// Tear down the session bound to `location`, if any
    pub fn handle_device_left(&mut self, location: DeviceLocation) {
        let Some(id) = self.registry.find(location) else {
            debug!("Unknown device left at {}", location);
            return;
        };

        if let Err(e) = self.registry.detach(id) {
            warn!("Detach of {} failed: {}", id, e);
        }
        self.send_event(UsbEvent::SessionDetached { session: id });
    }

    /// Apply queued hotplug events
    pub fn process_hotplug_events(&mut self) {
        while let Ok(event) = self.hotplug_rx.try_recv() {
            match event {
                HotplugEvent::Arrived(device) => self.handle_device_arrived(device),
                HotplugEvent::Left(location) => self.handle_device_left(location),
            }
        }
    }

    /// Detach every session
    pub fn shutdown(&mut self) {
        self.registry.detach_all();
    }

    pub fn registry(&self) -> &SessionRegistry<RusbTransport> {
        &self.registry
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    fn send_event(&self, event: UsbEvent) {
        // The bridge may have no listener (one-shot mode); drop rather than block
        if let Err(e) = self.event_sender.try_send(event) {
            debug!("USB event not delivered: {}", e);
        }
    }
}

/// List every Xylo card on the bus without opening a session
pub fn find_devices() -> Result<Vec<DeviceSummary>, rusb::Error> {
    let context = Context::new()?;
    let mut found = Vec::new();

    for device in context.devices()?.iter() {
        let Ok(descriptor) = device.device_descriptor() else {
            continue;
        };
        if !matches_ids(descriptor.vendor_id(), descriptor.product_id()) {
            continue;
        }
        found.push(UsbDevice::new(device)?.summary());
    }

    found.sort_by_key(|d| (d.location.bus_number, d.location.address));
    Ok(found)
}

/// Forwards libusb hotplug notifications to the manager's queue
struct HotplugCallback {
    queue: mpsc::Sender<HotplugEvent>,
}

impl Hotplug<Context> for HotplugCallback {
    fn device_arrived(&mut self, device: Device<Context>) {
        debug!(
            "Hot-plug callback: device arrived (bus={}, addr={})",
            device.bus_number(),
            device.address()
        );
        let _ = self.queue.send(HotplugEvent::Arrived(device));
    }

    fn device_left(&mut self, device: Device<Context>) {
        let location = DeviceLocation {
            bus_number: device.bus_number(),
            address: device.address(),
        };
        debug!("Hot-plug callback: device left ({})", location);
        let _ = self.queue.send(HotplugEvent::Left(location));
    }
}
