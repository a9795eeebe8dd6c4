//! Bring-up sequencer
//!
//! Replays [`BRING_UP_SEQUENCE`] against a freshly attached card: hold the
//! FX2 core in reset, load the image, release the core.
//!
//! A failed step is logged. In [`BringUpMode::Continue`] the remaining
//! steps are still sent and the last failure is returned at the end; in
//! [`BringUpMode::Strict`] the first failure ends the sequence.
//! Raising `stop` ends the sequence before the next step.

use protocol::{
    BRING_UP_SEQUENCE, CONTROL_TIMEOUT, ControlSetup, FIRMWARE_LOAD_REQUEST, InitPacket,
    SessionError, SessionState, Transport, VENDOR_OUT_REQUEST_TYPE, expect_full,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// How the sequencer reacts to a failed step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BringUpMode {
    /// Send every step, report the last failure
    #[default]
    Continue,
    /// Stop at the first failure
    Strict,
}

/// Control setup for loading one packet
pub fn load_setup(packet: &InitPacket) -> ControlSetup {
    ControlSetup {
        request_type: VENDOR_OUT_REQUEST_TYPE,
        request: FIRMWARE_LOAD_REQUEST,
        value: packet.address,
        index: 0,
    }
}

/// Program the card with the standard bring-up sequence
pub fn initialize<T: Transport + ?Sized>(
    transport: &mut T,
    mode: BringUpMode,
    stop: &AtomicBool,
) -> Result<(), SessionError> {
    run_sequence(transport, &BRING_UP_SEQUENCE, mode, stop)
}

/// Apply `sequence` in order
///
/// A raised `stop` flag yields `NotReady { state: Detached }` and no
/// further transfers.
pub fn run_sequence<T: Transport + ?Sized>(
    transport: &mut T,
    sequence: &[InitPacket],
    mode: BringUpMode,
    stop: &AtomicBool,
) -> Result<(), SessionError> {
    let mut last_error = None;

    for (step, packet) in sequence.iter().enumerate() {
        if stop.load(Ordering::Acquire) {
            debug!("Bring-up interrupted before step {}", step);
            return Err(SessionError::NotReady {
                state: SessionState::Detached,
            });
        }

        let result = expect_full(
            packet.data.len(),
            transport.control_transfer(load_setup(packet), packet.data, CONTROL_TIMEOUT),
        );

        match result {
            Ok(()) => {
                debug!(
                    "Bring-up step {}: wrote {} bytes at {:#06x}",
                    step,
                    packet.data.len(),
                    packet.address
                );
            }
            Err(e) => {
                warn!(
                    "Bring-up step {} at {:#06x} failed: {}",
                    step, packet.address, e
                );
                if mode == BringUpMode::Strict {
                    return Err(e.into());
                }
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) => Err(e.into()),
        None => {
            info!("Bring-up complete ({} steps)", sequence.len());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::MockTransport;
    use protocol::{CPUCS_ADDRESS, UsbError};

    fn go() -> AtomicBool {
        AtomicBool::new(false)
    }

    #[test]
    fn test_load_setup() {
        let setup = load_setup(&BRING_UP_SEQUENCE[0]);
        assert_eq!(setup.request_type, 0x40);
        assert_eq!(setup.request, 0xa0);
        assert_eq!(setup.value, CPUCS_ADDRESS);
        assert_eq!(setup.index, 0);
    }

    #[test]
    fn test_clean_run() {
        let mock = MockTransport::new();
        let mut transport = mock.clone();

        assert_eq!(
            initialize(&mut transport, BringUpMode::Continue, &go()),
            Ok(())
        );
        assert_eq!(mock.call_count(), 13);
    }

    #[test]
    fn test_continue_reports_last_failure() {
        let mock = MockTransport::new();
        mock
            .fail_call(2, UsbError::Timeout)
            .fail_call(7, UsbError::Pipe);
        let mut transport = mock.clone();

        assert_eq!(
            initialize(&mut transport, BringUpMode::Continue, &go()),
            Err(SessionError::Transport(UsbError::Pipe))
        );
        assert_eq!(mock.call_count(), 13);
    }

    #[test]
    fn test_strict_stops_at_first_failure() {
        let mock = MockTransport::new();
        mock.fail_call(3, UsbError::Timeout);
        let mut transport = mock.clone();

        assert_eq!(
            initialize(&mut transport, BringUpMode::Strict, &go()),
            Err(SessionError::Transport(UsbError::Timeout))
        );
        assert_eq!(mock.call_count(), 4);
    }

    #[test]
    fn test_short_write_counts_as_failure() {
        let mock = MockTransport::new();
        mock.short_write(1, 8);
        let mut transport = mock.clone();

        assert_eq!(
            initialize(&mut transport, BringUpMode::Continue, &go()),
            Err(SessionError::Transport(UsbError::ShortTransfer {
                expected: 16,
                actual: 8
            }))
        );
    }

    #[test]
    fn test_stop_flag_ends_sequence() {
        let mock = MockTransport::new();
        let mut transport = mock.clone();

        assert_eq!(
            initialize(&mut transport, BringUpMode::Continue, &AtomicBool::new(true)),
            Err(SessionError::NotReady {
                state: SessionState::Detached
            })
        );
        assert_eq!(mock.call_count(), 0);
    }
}
