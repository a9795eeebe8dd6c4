//! Test utilities for xylo-led
//!
//! Provides a recording [`Transport`] and helper functions for testing
//! across crates.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{MockTransport, TransferCall};
//! use protocol::{LEDMASK_ENDPOINT, BULK_TIMEOUT, Transport};
//!
//! let mock = MockTransport::new();
//! let mut transport = mock.clone();
//! transport.bulk_transfer(LEDMASK_ENDPOINT, &[0xa5], BULK_TIMEOUT).unwrap();
//!
//! assert_eq!(mock.bulk_payloads(), vec![0xa5]);
//! assert!(matches!(mock.calls()[0], TransferCall::Bulk { endpoint: 0x02, .. }));
//! ```

use protocol::{
    ControlSetup, DeviceLocation, SessionId, SessionInfo, SessionState, Transport, UsbError,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// One transfer as seen by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferCall {
    Control {
        setup: ControlSetup,
        data: Vec<u8>,
        timeout: Duration,
    },
    Bulk {
        endpoint: u8,
        data: Vec<u8>,
        timeout: Duration,
    },
}

/// A transfer plus the moment it was issued
#[derive(Debug, Clone)]
pub struct RecordedTransfer {
    pub call: TransferCall,
    pub at: Instant,
}

#[derive(Default)]
struct MockState {
    recorded: Vec<RecordedTransfer>,
    /// Call index (0-based, across both kinds) -> injected error
    failures: HashMap<usize, UsbError>,
    /// Error returned by every bulk transfer, when set
    bulk_failure: Option<UsbError>,
    /// Call index -> bytes reported as accepted
    short_writes: HashMap<usize, usize>,
    /// Time each transfer takes
    latency: Duration,
}

/// Recording transport double
///
/// Clones share state: keep one clone for inspection, hand the other to the
/// code under test.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the `index`th transfer (0-based, control and bulk counted together)
    pub fn fail_call(&self, index: usize, error: UsbError) -> &Self {
        self.state().failures.insert(index, error);
        self
    }

    /// Fail every bulk transfer from now on
    pub fn fail_bulk(&self, error: UsbError) -> &Self {
        self.state().bulk_failure = Some(error);
        self
    }

    /// Stop failing bulk transfers
    pub fn heal_bulk(&self) -> &Self {
        self.state().bulk_failure = None;
        self
    }

    /// Report only `accepted` bytes for the `index`th transfer
    pub fn short_write(&self, index: usize, accepted: usize) -> &Self {
        self.state().short_writes.insert(index, accepted);
        self
    }

    /// Make every transfer block for `latency`
    pub fn set_latency(&self, latency: Duration) -> &Self {
        self.state().latency = latency;
        self
    }

    /// All transfers issued so far, in order
    pub fn calls(&self) -> Vec<TransferCall> {
        self.state()
            .recorded
            .iter()
            .map(|r| r.call.clone())
            .collect()
    }

    /// All transfers with their timestamps
    pub fn recorded(&self) -> Vec<RecordedTransfer> {
        self.state().recorded.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().recorded.len()
    }

    /// Control transfers only
    pub fn control_calls(&self) -> Vec<(ControlSetup, Vec<u8>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransferCall::Control { setup, data, .. } => Some((setup, data)),
                TransferCall::Bulk { .. } => None,
            })
            .collect()
    }

    /// First byte of every bulk transfer, in order
    pub fn bulk_payloads(&self) -> Vec<u8> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransferCall::Bulk { data, .. } => data.first().copied(),
                TransferCall::Control { .. } => None,
            })
            .collect()
    }

    /// Highest number of transfers observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Forget recorded transfers, keep injected failures
    pub fn clear(&self) {
        self.state().recorded.clear();
    }

    fn record(&self, call: TransferCall, len: usize) -> Result<usize, UsbError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let (index, latency, outcome) = {
            let mut state = self.state();
            let index = state.recorded.len();
            let is_bulk = matches!(call, TransferCall::Bulk { .. });
            state.recorded.push(RecordedTransfer {
                call,
                at: Instant::now(),
            });

            let outcome = if let Some(error) = state.failures.get(&index) {
                Err(error.clone())
            } else if let (true, Some(error)) = (is_bulk, &state.bulk_failure) {
                Err(error.clone())
            } else {
                Ok(state.short_writes.get(&index).copied().unwrap_or(len))
            };
            (index, state.latency, outcome)
        };

        if !latency.is_zero() {
            std::thread::sleep(latency);
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!("mock transfer #{} -> {:?}", index, outcome);
        outcome
    }
}

impl Transport for MockTransport {
    fn control_transfer(
        &mut self,
        setup: ControlSetup,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbError> {
        self.record(
            TransferCall::Control {
                setup,
                data: data.to_vec(),
                timeout,
            },
            data.len(),
        )
    }

    fn bulk_transfer(
        &mut self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbError> {
        self.record(
            TransferCall::Bulk {
                endpoint,
                data: data.to_vec(),
                timeout,
            },
            data.len(),
        )
    }
}

/// Create a mock SessionInfo for testing
pub fn create_mock_session_info(id: u32, state: SessionState, ledmask: u8) -> SessionInfo {
    SessionInfo {
        id: SessionId(id),
        state,
        ledmask,
        location: Some(create_mock_location(id)),
    }
}

/// Create a device location derived from an id
pub fn create_mock_location(id: u32) -> DeviceLocation {
    DeviceLocation {
        bus_number: 1,
        address: (id % 127) as u8 + 1,
    }
}

/// Run an async operation with a timeout
///
/// # Example
/// ```ignore
/// use common::test_utils::{with_timeout, DEFAULT_TEST_TIMEOUT};
///
/// #[tokio::test]
/// async fn test_with_timeout() {
///     let result = with_timeout(DEFAULT_TEST_TIMEOUT, async { 42 }).await.unwrap();
///     assert_eq!(result, 42);
/// }
/// ```
pub async fn with_timeout<T, F>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError { duration })
}

/// Error returned when a test times out
#[derive(Debug)]
pub struct TimeoutError {
    /// The timeout duration that was exceeded
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Test timed out after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}
