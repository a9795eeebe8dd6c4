//! Xylo device and session type definitions
//!
//! This module defines the identifiers, states and request descriptions
//! shared between the controller core, the USB worker and the daemon.

use serde::{Deserialize, Serialize};
use std::fmt;

/// USB vendor ID of the Xylo card (Cypress)
pub const XYLO_VENDOR_ID: u16 = 0x04b4;

/// USB product ID of the Xylo card (FX2 in its unprogrammed state)
pub const XYLO_PRODUCT_ID: u16 = 0x8613;

/// Session identifier (registry-assigned)
///
/// Handed out when a device is attached. Stable for the connected lifetime
/// of the device and never reused within one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xylo{}", self.0)
    }
}

/// Physical location of a device on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceLocation {
    /// Bus number
    pub bus_number: u8,
    /// Device address on the bus
    pub address: u8,
}

impl fmt::Display for DeviceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}:{:03}", self.bus_number, self.address)
    }
}

/// Lifecycle state of a device session
///
/// `Attached -> Initializing -> Ready -> Detached`. A strict bring-up that
/// fails lands in `Failed` instead of `Ready`. `Detached` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Session created, bring-up not started
    Attached,
    /// Bring-up sequence running
    Initializing,
    /// Device programmed, ledmask writes accepted
    Ready,
    /// Bring-up aborted in strict mode
    Failed,
    /// Device gone, handle released
    Detached,
}

impl SessionState {
    /// Whether ledmask reads and writes are accepted in this state
    pub fn accepts_io(self) -> bool {
        self == SessionState::Ready
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Attached => "attached",
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
            SessionState::Failed => "failed",
            SessionState::Detached => "detached",
        };
        f.write_str(name)
    }
}

/// Snapshot of a session for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub state: SessionState,
    /// Current mirror value
    pub ledmask: u8,
    /// Where the device sits, when known
    pub location: Option<DeviceLocation>,
}

/// Setup stage of an OUT control transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSetup {
    /// Request type byte (bmRequestType)
    pub request_type: u8,
    /// Request byte (bRequest)
    pub request: u8,
    /// Value parameter (wValue)
    pub value: u16,
    /// Index parameter (wIndex)
    pub index: u16,
}
