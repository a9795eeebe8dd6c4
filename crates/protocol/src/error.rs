//! Protocol error types

use crate::types::{SessionId, SessionState};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport-level errors
///
/// Maps to libusb error codes. See rusb::Error for details.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum UsbError {
    /// Transfer timed out
    #[error("transfer timed out")]
    Timeout,
    /// Endpoint stalled (protocol error)
    #[error("endpoint stalled")]
    Pipe,
    /// Device was disconnected
    #[error("device disconnected")]
    NoDevice,
    /// Device or endpoint not found
    #[error("device or endpoint not found")]
    NotFound,
    /// Device is busy
    #[error("device busy")]
    Busy,
    /// Buffer overflow
    #[error("buffer overflow")]
    Overflow,
    /// I/O error
    #[error("I/O error")]
    Io,
    /// Invalid parameter
    #[error("invalid parameter")]
    InvalidParam,
    /// Access denied (permissions)
    #[error("access denied")]
    Access,
    /// Device accepted fewer bytes than were sent
    #[error("short transfer: sent {actual} of {expected} bytes")]
    ShortTransfer { expected: usize, actual: usize },
    /// Other error with message
    #[error("{message}")]
    Other { message: String },
}

/// Attribute text contained no hexadecimal digits
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("no hexadecimal value in {input:?}")]
pub struct ParseMaskError {
    pub input: String,
}

/// Errors surfaced by a device session
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The ledmask transfer failed
    #[error("transport error: {0}")]
    Transport(#[from] UsbError),

    /// Attribute write could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseMaskError),

    /// Session is not in the `Ready` state
    #[error("session is not ready (state: {state})")]
    NotReady { state: SessionState },
}

/// Errors from the session registry
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no session {0}")]
    SessionNotFound(SessionId),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Type alias for session results
pub type Result<T> = std::result::Result<T, SessionError>;
