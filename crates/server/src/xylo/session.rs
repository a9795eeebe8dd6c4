//! Device session
//!
//! Owns one card for as long as it is plugged in. The session serialises
//! every ledmask access behind one lock so two attribute writes can never
//! interleave on the bulk endpoint.
//!
//! Detach is two-phase: the `detached` flag is raised first so new
//! operations fail fast, then the lock is taken (waiting out any transfer
//! in flight) and the transport is dropped.

use crate::xylo::animation;
use crate::xylo::bringup::{self, BringUpMode};
use crate::xylo::ledmask::LedmaskRegister;
use protocol::{
    ANIMATION_FRAME_DELAY, DeviceLocation, SessionError, SessionId, SessionInfo, SessionState,
    Transport, format_mask,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

/// How new sessions are brought up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub bringup_mode: BringUpMode,
    /// Play the attach animation after bring-up
    pub animation_enabled: bool,
    pub frame_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            bringup_mode: BringUpMode::Continue,
            animation_enabled: true,
            frame_delay: ANIMATION_FRAME_DELAY,
        }
    }
}

struct Inner<T> {
    /// `None` once detached
    transport: Option<T>,
    ledmask: LedmaskRegister,
    state: SessionState,
}

pub struct DeviceSession<T: Transport> {
    id: SessionId,
    location: Option<DeviceLocation>,
    detached: AtomicBool,
    inner: Mutex<Inner<T>>,
}

impl<T: Transport> DeviceSession<T> {
    /// Wrap a freshly opened device. Nothing is sent yet.
    pub fn new(id: SessionId, transport: T, location: Option<DeviceLocation>) -> Self {
        Self {
            id,
            location,
            detached: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                transport: Some(transport),
                ledmask: LedmaskRegister::new(),
                state: SessionState::Attached,
            }),
        }
    }

    /// Create a session and bring the card up
    ///
    /// Bring-up errors are logged, the returned session reflects them in
    /// its state.
    pub fn attach(
        id: SessionId,
        transport: T,
        location: Option<DeviceLocation>,
        options: &SessionOptions,
    ) -> Self {
        let session = Self::new(id, transport, location);
        if let Err(e) = session.bring_up(options) {
            warn!("{}: bring-up reported {}", id, e);
        }
        session
    }

    /// Run bring-up and the attach animation
    ///
    /// Only valid in `Attached`. In continue mode the session ends up
    /// `Ready` whatever the sequencer returned, and that result is passed
    /// back. In strict mode a failure leaves the session `Failed`. A detach
    /// signalled meanwhile stops the sequence and yields `NotReady`.
    pub fn bring_up(&self, options: &SessionOptions) -> Result<(), SessionError> {
        let mut inner = self.lock();
        if inner.state != SessionState::Attached || self.is_detached() {
            return Err(SessionError::NotReady { state: inner.state });
        }
        inner.state = SessionState::Initializing;
        info!("{}: initialising", self.id);

        let Inner {
            transport,
            ledmask,
            state,
        } = &mut *inner;
        let Some(transport) = transport.as_mut() else {
            *state = SessionState::Detached;
            return Err(SessionError::NotReady { state: *state });
        };

        let outcome = bringup::initialize(transport, options.bringup_mode, &self.detached);
        if self.is_detached() {
            *state = SessionState::Detached;
            info!("{}: detached during bring-up", self.id);
            return Err(SessionError::NotReady { state: *state });
        }
        if outcome.is_err() && options.bringup_mode == BringUpMode::Strict {
            *state = SessionState::Failed;
            warn!("{}: bring-up failed, session unusable", self.id);
            return outcome;
        }

        *state = SessionState::Ready;
        if options.animation_enabled {
            animation::run(ledmask, transport, options.frame_delay, &self.detached);
        }

        info!("{}: ready", self.id);
        outcome
    }

    /// Tear the session down. Safe to call more than once.
    pub fn detach(&self) {
        if self.detached.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut inner = self.lock();
        let transport = inner.transport.take();
        inner.state = SessionState::Detached;
        drop(inner);
        drop(transport);

        info!("{}: detached", self.id);
    }

    /// Current ledmask mirror
    pub fn ledmask(&self) -> Result<u8, SessionError> {
        self.with_ready(|register, _| Ok(register.get()))
    }

    /// Write a ledmask value to the card
    pub fn set_ledmask(&self, value: u8) -> Result<(), SessionError> {
        self.with_ready(|register, transport| Ok(register.set(transport, value)?))
    }

    /// Parse hex text and write it to the card
    pub fn set_ledmask_from_hex(&self, text: &str) -> Result<u8, SessionError> {
        self.with_ready(|register, transport| register.set_from_hex_str(transport, text))
    }

    /// Attribute read: `0x%x\n`
    pub fn read_attribute(&self) -> Result<String, SessionError> {
        self.ledmask().map(format_mask)
    }

    /// Attribute write: returns the number of bytes consumed
    pub fn write_attribute(&self, text: &str) -> Result<usize, SessionError> {
        self.set_ledmask_from_hex(text)?;
        Ok(text.len())
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn location(&self) -> Option<DeviceLocation> {
        self.location
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn info(&self) -> SessionInfo {
        let inner = self.lock();
        SessionInfo {
            id: self.id,
            state: inner.state,
            ledmask: inner.ledmask.get(),
            location: self.location,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_ready<R>(
        &self,
        op: impl FnOnce(&mut LedmaskRegister, &mut T) -> Result<R, SessionError>,
    ) -> Result<R, SessionError> {
        if self.is_detached() {
            return Err(SessionError::NotReady {
                state: SessionState::Detached,
            });
        }

        let mut inner = self.lock();
        // Detach may have been signalled while we waited for the lock
        if self.is_detached() {
            return Err(SessionError::NotReady {
                state: SessionState::Detached,
            });
        }
        if !inner.state.accepts_io() {
            return Err(SessionError::NotReady { state: inner.state });
        }

        let Inner {
            transport, ledmask, ..
        } = &mut *inner;
        let transport = transport.as_mut().ok_or(SessionError::NotReady {
            state: SessionState::Detached,
        })?;
        op(ledmask, transport)
    }
}
