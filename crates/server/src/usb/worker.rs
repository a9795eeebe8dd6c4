//! USB worker thread
//!
//! Dedicated thread that owns the libusb context and every card session.
//! Runs the `handle_events` loop and answers commands from the Tokio
//! runtime over the channel bridge.

use crate::usb::manager::{DeviceManager, UsbSettings};
use crate::xylo::SessionRegistry;
use common::{AttributeError, UsbCommand, UsbWorker};
use protocol::Transport;
use rusb::UsbContext;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const EVENT_TIMEOUT: Duration = Duration::from_millis(100);

/// USB worker thread
pub struct UsbWorkerThread {
    manager: DeviceManager,
    worker: UsbWorker,
}

impl UsbWorkerThread {
    /// Create the worker and attach the cards already present
    pub fn new(worker: UsbWorker, settings: UsbSettings) -> Result<Self, rusb::Error> {
        let mut manager = DeviceManager::new(worker.event_tx.clone(), settings)?;
        manager.initialize()?;
        Ok(Self { manager, worker })
    }

    /// Run until a Shutdown command arrives or the bridge closes
    ///
    /// Each pass drains pending commands, lets libusb dispatch events for
    /// up to 100 ms, then applies queued hotplug arrivals and departures.
    pub fn run(mut self) -> Result<(), rusb::Error> {
        info!("USB worker thread started");

        'outer: loop {
            while let Some(cmd) = self.worker.try_recv_command() {
                if !dispatch_command(self.manager.registry(), cmd) {
                    info!("USB worker shutting down");
                    break 'outer;
                }
            }
            if self.worker.is_closed() {
                info!("Command bridge closed, USB worker shutting down");
                break;
            }

            match self.manager.context().handle_events(Some(EVENT_TIMEOUT)) {
                Ok(()) => {}
                Err(rusb::Error::Interrupted) => {
                    debug!("USB event handling interrupted");
                }
                Err(e) => {
                    warn!("Error handling USB events: {}", e);
                    std::thread::sleep(EVENT_TIMEOUT);
                }
            }

            self.manager.process_hotplug_events();
        }

        self.manager.shutdown();
        info!("USB worker thread stopped");
        Ok(())
    }
}

/// Answer one bridge command from the session registry
///
/// Returns `false` on [`UsbCommand::Shutdown`]. Dropped reply channels are
/// ignored: the requester gave up waiting.
pub fn dispatch_command<T: Transport>(registry: &SessionRegistry<T>, cmd: UsbCommand) -> bool {
    match cmd {
        UsbCommand::ListSessions { response } => {
            let sessions = registry.list();
            debug!("Listing {} sessions", sessions.len());
            let _ = response.send(sessions);
        }

        UsbCommand::ReadAttribute { session, response } => {
            let result = registry
                .read_attribute(session)
                .map_err(AttributeError::from);
            let _ = response.send(result);
        }

        UsbCommand::WriteAttribute {
            session,
            text,
            response,
        } => {
            debug!("Writing {:?} to {}", text.trim_end(), session);
            let result = registry
                .write_attribute(session, &text)
                .map_err(AttributeError::from);
            let _ = response.send(result);
        }

        UsbCommand::Shutdown => return false,
    }
    true
}

/// Spawn the USB worker thread
pub fn spawn_usb_worker(
    worker: UsbWorker,
    settings: UsbSettings,
) -> std::io::Result<std::thread::JoinHandle<Result<(), rusb::Error>>> {
    std::thread::Builder::new()
        .name("usb-worker".to_string())
        .spawn(move || {
            let worker_thread = UsbWorkerThread::new(worker, settings).inspect_err(|e| {
                error!("USB worker failed to start: {}", e);
            })?;
            worker_thread.run()
        })
}
