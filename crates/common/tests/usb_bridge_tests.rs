//! USB Bridge Integration Tests
//!
//! Tests for the async channel bridge between Tokio runtime and USB thread.
//!
//! Run with: `cargo test -p common --test usb_bridge_tests`

use common::test_utils::{DEFAULT_TEST_TIMEOUT, create_mock_session_info, with_timeout};
use common::{AttributeError, Error, UsbCommand, UsbEvent, UsbWorker, create_usb_bridge};
use protocol::{SessionError, SessionId, SessionState, format_mask, parse_mask};
use std::collections::BTreeMap;
use std::thread;

/// Minimal stand-in for the USB thread: one mask per session, no hardware
fn spawn_fake_worker(worker: UsbWorker, sessions: &[u32]) -> thread::JoinHandle<usize> {
    let mut masks: BTreeMap<SessionId, u8> = sessions.iter().map(|&n| (SessionId(n), 0)).collect();

    thread::spawn(move || {
        let mut handled = 0;
        while let Ok(cmd) = worker.recv_command() {
            handled += 1;
            match cmd {
                UsbCommand::ListSessions { response } => {
                    let list = masks
                        .iter()
                        .map(|(id, mask)| create_mock_session_info(id.0, SessionState::Ready, *mask))
                        .collect();
                    let _ = response.send(list);
                }
                UsbCommand::ReadAttribute { session, response } => {
                    let reply = masks
                        .get(&session)
                        .map(|m| format_mask(*m))
                        .ok_or(AttributeError::UnknownSession(session));
                    let _ = response.send(reply);
                }
                UsbCommand::WriteAttribute {
                    session,
                    text,
                    response,
                } => {
                    let reply = match masks.get_mut(&session) {
                        None => Err(AttributeError::UnknownSession(session)),
                        Some(mask) => parse_mask(&text)
                            .map(|v| {
                                *mask = v;
                                text.len()
                            })
                            .map_err(|e| AttributeError::Session(SessionError::from(e))),
                    };
                    let _ = response.send(reply);
                }
                UsbCommand::Shutdown => break,
            }
        }
        handled
    })
}

// ============================================================================
// Command round trips
// ============================================================================

#[tokio::test]
async fn test_list_sessions() {
    let (bridge, worker) = create_usb_bridge();
    let handle = spawn_fake_worker(worker, &[2, 1]);

    let sessions = with_timeout(DEFAULT_TEST_TIMEOUT, bridge.list_sessions())
        .await
        .unwrap()
        .unwrap();
    let ids: Vec<_> = sessions.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![SessionId(1), SessionId(2)]);

    bridge.send_command(UsbCommand::Shutdown).await.unwrap();
    assert_eq!(handle.join().unwrap(), 2);
}

#[tokio::test]
async fn test_write_then_read_attribute() {
    let (bridge, worker) = create_usb_bridge();
    let handle = spawn_fake_worker(worker, &[1]);

    let consumed = bridge.write_attribute(SessionId(1), "a5\n").await.unwrap();
    assert_eq!(consumed, 3);
    assert_eq!(
        bridge.read_attribute(SessionId(1)).await.unwrap(),
        "0xa5\n"
    );

    bridge.send_command(UsbCommand::Shutdown).await.unwrap();
    handle.join().unwrap();
}

#[tokio::test]
async fn test_unknown_session_error_is_forwarded() {
    let (bridge, worker) = create_usb_bridge();
    let handle = spawn_fake_worker(worker, &[1]);

    let err = bridge.read_attribute(SessionId(7)).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Attribute(AttributeError::UnknownSession(SessionId(7)))
    ));

    let err = bridge.write_attribute(SessionId(1), "zz").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Attribute(AttributeError::Session(SessionError::Parse(_)))
    ));

    bridge.send_command(UsbCommand::Shutdown).await.unwrap();
    handle.join().unwrap();
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_commands_fail_after_worker_exits() {
    let (bridge, worker) = create_usb_bridge();
    drop(worker);

    assert!(matches!(
        bridge.list_sessions().await,
        Err(Error::Channel(_))
    ));
}

#[tokio::test]
async fn test_dropped_reply_is_a_channel_error() {
    let (bridge, worker) = create_usb_bridge();
    let handle = thread::spawn(move || {
        // Take the command and drop its reply sender
        let cmd = worker.recv_command().unwrap();
        drop(cmd);
    });

    assert!(matches!(
        bridge.read_attribute(SessionId(1)).await,
        Err(Error::Channel(_))
    ));
    handle.join().unwrap();
}

#[test]
fn test_worker_sees_closed_bridge() {
    let (bridge, worker) = create_usb_bridge();
    assert!(!worker.is_closed());
    drop(bridge);
    assert!(worker.is_closed());
}

#[tokio::test]
async fn test_events_reach_runtime_in_order() {
    let (bridge, worker) = create_usb_bridge();

    thread::spawn(move || {
        worker
            .send_event(UsbEvent::SessionAttached {
                session: create_mock_session_info(1, SessionState::Ready, 0),
            })
            .unwrap();
        worker
            .send_event(UsbEvent::SessionDetached {
                session: SessionId(1),
            })
            .unwrap();
    });

    match bridge.recv_event().await.unwrap() {
        UsbEvent::SessionAttached { session } => assert_eq!(session.id, SessionId(1)),
        other => panic!("unexpected event {:?}", other),
    }
    match bridge.recv_event().await.unwrap() {
        UsbEvent::SessionDetached { session } => assert_eq!(session, SessionId(1)),
        other => panic!("unexpected event {:?}", other),
    }
}
