//! Session registry
//!
//! Hands out session ids and owns every live [`DeviceSession`]. The USB
//! worker talks to cards only through here, so the registry is also the
//! seam where tests swap the rusb transport for a mock.

use crate::xylo::session::{DeviceSession, SessionOptions};
use protocol::{DeviceLocation, RegistryError, SessionId, SessionInfo, Transport};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SessionRegistry<T: Transport> {
    options: SessionOptions,
    sessions: HashMap<SessionId, Arc<DeviceSession<T>>>,
    next_id: u32,
}

impl<T: Transport> SessionRegistry<T> {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            sessions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Bring up a newly arrived card and start tracking it
    ///
    /// Always yields a session; bring-up failures only show up in its state.
    pub fn attach(&mut self, transport: T, location: Option<DeviceLocation>) -> SessionId {
        let id = SessionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);

        let session = DeviceSession::new(id, transport, location);
        match session.bring_up(&self.options) {
            Ok(()) => info!("{} attached", id),
            Err(e) => warn!("{} attached with bring-up error: {}", id, e),
        }

        self.sessions.insert(id, Arc::new(session));
        id
    }

    /// Detach and forget a session
    pub fn detach(&mut self, id: SessionId) -> Result<(), RegistryError> {
        let session = self
            .sessions
            .remove(&id)
            .ok_or(RegistryError::SessionNotFound(id))?;
        session.detach();
        Ok(())
    }

    /// Detach everything, e.g. on shutdown
    pub fn detach_all(&mut self) {
        for (id, session) in self.sessions.drain() {
            debug!("Detaching {} on shutdown", id);
            session.detach();
        }
    }

    pub fn session(&self, id: SessionId) -> Option<Arc<DeviceSession<T>>> {
        self.sessions.get(&id).cloned()
    }

    /// Session bound to a bus location
    pub fn find(&self, location: DeviceLocation) -> Option<SessionId> {
        self.sessions
            .values()
            .find(|s| s.location() == Some(location))
            .map(|s| s.id())
    }

    /// Snapshot of every session, ordered by id
    pub fn list(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<_> = self.sessions.values().map(|s| s.info()).collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn read_attribute(&self, id: SessionId) -> Result<String, RegistryError> {
        let session = self.session(id).ok_or(RegistryError::SessionNotFound(id))?;
        Ok(session.read_attribute()?)
    }

    pub fn write_attribute(&self, id: SessionId, text: &str) -> Result<usize, RegistryError> {
        let session = self.session(id).ok_or(RegistryError::SessionNotFound(id))?;
        Ok(session.write_attribute(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{MockTransport, create_mock_location};
    use protocol::{SessionError, SessionState};

    fn registry() -> SessionRegistry<MockTransport> {
        SessionRegistry::new(SessionOptions {
            animation_enabled: false,
            ..SessionOptions::default()
        })
    }

    #[test]
    fn test_ids_are_unique_and_start_at_one() {
        let mut registry = registry();
        let a = registry.attach(MockTransport::new(), None);
        let b = registry.attach(MockTransport::new(), None);
        registry.detach(a).unwrap();
        let c = registry.attach(MockTransport::new(), None);

        assert_eq!(a, SessionId(1));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_detach_unknown() {
        let mut registry = registry();
        assert_eq!(
            registry.detach(SessionId(9)),
            Err(RegistryError::SessionNotFound(SessionId(9)))
        );
    }

    #[test]
    fn test_find_by_location() {
        let mut registry = registry();
        let location = create_mock_location(3);
        let id = registry.attach(MockTransport::new(), Some(location));

        assert_eq!(registry.find(location), Some(id));
        assert_eq!(registry.find(create_mock_location(4)), None);
    }

    #[test]
    fn test_location_freed_on_detach() {
        let mut registry = registry();
        let location = create_mock_location(3);
        let first = registry.attach(MockTransport::new(), Some(location));
        registry.detach(first).unwrap();
        assert_eq!(registry.find(location), None);

        // Re-plug at the same address binds a fresh session
        let second = registry.attach(MockTransport::new(), Some(location));
        assert_ne!(first, second);
        assert_eq!(registry.find(location), Some(second));
    }

    #[test]
    fn test_attribute_round_trip() {
        let mut registry = registry();
        let id = registry.attach(MockTransport::new(), None);

        assert_eq!(registry.write_attribute(id, "7f\n"), Ok(3));
        assert_eq!(registry.read_attribute(id).as_deref(), Ok("0x7f\n"));
    }

    #[test]
    fn test_detached_session_handle_rejects_io() {
        let mut registry = registry();
        let id = registry.attach(MockTransport::new(), None);
        let handle = registry.session(id).unwrap();

        registry.detach(id).unwrap();

        assert_eq!(
            handle.read_attribute(),
            Err(SessionError::NotReady {
                state: SessionState::Detached
            })
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_is_sorted() {
        let mut registry = registry();
        for _ in 0..5 {
            registry.attach(MockTransport::new(), None);
        }
        let ids: Vec<_> = registry.list().into_iter().map(|i| i.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }
}
