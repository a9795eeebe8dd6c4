//! Async channel bridge between Tokio runtime and USB thread

use async_channel::{Receiver, Sender, bounded};
use protocol::{RegistryError, SessionError, SessionId, SessionInfo};

/// Reply type for attribute operations addressed to one session
pub type AttributeReply<T> = tokio::sync::oneshot::Sender<Result<T, AttributeError>>;

/// Failure of an attribute operation routed through the bridge
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttributeError {
    /// No live session with that id
    #[error("no session {0}")]
    UnknownSession(SessionId),

    /// The session rejected the operation
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<RegistryError> for AttributeError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::SessionNotFound(id) => Self::UnknownSession(id),
            RegistryError::Session(e) => Self::Session(e),
        }
    }
}

/// Commands from Tokio runtime to USB thread
#[derive(Debug)]
pub enum UsbCommand {
    /// List all live device sessions
    ListSessions {
        /// Channel to send response back
        response: tokio::sync::oneshot::Sender<Vec<SessionInfo>>,
    },

    /// Read the ledmask attribute (`0x%x\n`)
    ReadAttribute {
        /// Session to read
        session: SessionId,
        /// Channel to send response back
        response: AttributeReply<String>,
    },

    /// Write the ledmask attribute from hex text
    WriteAttribute {
        /// Session to write
        session: SessionId,
        /// Attribute text, parsed as hex
        text: String,
        /// Channel to send bytes consumed back
        response: AttributeReply<usize>,
    },

    /// Shutdown the USB thread gracefully
    Shutdown,
}

/// USB events from the device manager
#[derive(Debug, Clone)]
pub enum UsbEvent {
    /// Device attached and brought up
    SessionAttached {
        /// Snapshot taken after bring-up
        session: SessionInfo,
    },

    /// Device removed, session torn down
    SessionDetached {
        /// ID of the removed session
        session: SessionId,
    },
}

/// Handle for Tokio runtime (async)
#[derive(Clone)]
pub struct UsbBridge {
    cmd_tx: Sender<UsbCommand>,
    event_rx: Receiver<UsbEvent>,
}

impl UsbBridge {
    /// Send a command to the USB thread
    pub async fn send_command(&self, cmd: UsbCommand) -> crate::Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Receive an event from the USB thread
    pub async fn recv_event(&self) -> crate::Result<UsbEvent> {
        self.event_rx
            .recv()
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// List sessions and wait for the answer
    pub async fn list_sessions(&self) -> crate::Result<Vec<SessionInfo>> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.send_command(UsbCommand::ListSessions { response: tx })
            .await?;
        rx.await.map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Read one session's ledmask attribute
    pub async fn read_attribute(&self, session: SessionId) -> crate::Result<String> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.send_command(UsbCommand::ReadAttribute {
            session,
            response: tx,
        })
        .await?;
        rx.await
            .map_err(|e| crate::Error::Channel(e.to_string()))?
            .map_err(crate::Error::from)
    }

    /// Write one session's ledmask attribute
    pub async fn write_attribute(&self, session: SessionId, text: &str) -> crate::Result<usize> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.send_command(UsbCommand::WriteAttribute {
            session,
            text: text.to_string(),
            response: tx,
        })
        .await?;
        rx.await
            .map_err(|e| crate::Error::Channel(e.to_string()))?
            .map_err(crate::Error::from)
    }
}

/// Handle for USB thread (blocking)
pub struct UsbWorker {
    pub(crate) cmd_rx: Receiver<UsbCommand>,
    /// Event sender (public for USB worker thread to access)
    pub event_tx: Sender<UsbEvent>,
}

impl UsbWorker {
    /// Receive a command from Tokio runtime (blocking)
    pub fn recv_command(&self) -> crate::Result<UsbCommand> {
        self.cmd_rx
            .recv_blocking()
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Try to receive a command without blocking
    pub fn try_recv_command(&self) -> Option<UsbCommand> {
        self.cmd_rx.try_recv().ok()
    }

    /// True once every [`UsbBridge`] has been dropped
    pub fn is_closed(&self) -> bool {
        self.cmd_rx.is_closed()
    }

    /// Send an event to Tokio runtime (blocking)
    pub fn send_event(&self, event: UsbEvent) -> crate::Result<()> {
        self.event_tx
            .send_blocking(event)
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Create the channel bridge between Tokio and USB thread
///
/// Returns (UsbBridge for Tokio, UsbWorker for USB thread)
pub fn create_usb_bridge() -> (UsbBridge, UsbWorker) {
    let (cmd_tx, cmd_rx) = bounded(64);
    let (event_tx, event_rx) = bounded(64);

    (
        UsbBridge { cmd_tx, event_rx },
        UsbWorker { cmd_rx, event_tx },
    )
}
