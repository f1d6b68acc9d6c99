//! Matchmaking: pairs new-game requests into sessions.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::registry::Registry;
use crate::session::{GameSession, SessionError, SessionId};
use crate::store::PersistenceStore;

/// Result of a new-game request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matched {
    /// A pending session was created and queued.
    Waiting(SessionId),
    /// The session is in progress and ready for moves.
    Started(SessionId),
}

/// Creates sessions and pairs waiting requests, strictly first-in first-out.
#[derive(Clone)]
pub struct Matchmaker {
    store: Arc<dyn PersistenceStore>,
}

impl Matchmaker {
    /// Creates a matchmaker that allocates session ids from the store.
    pub fn new(store: Arc<dyn PersistenceStore>) -> Self {
        Self { store }
    }

    /// Handles a new-game request.
    ///
    /// Single-player requests start immediately against the computer.
    /// Two-player requests join the longest-waiting session created by
    /// someone else, or queue a new pending one.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if a dequeued session could not be joined.
    #[instrument(skip(self, registry))]
    pub fn request_game(
        &self,
        registry: &mut Registry,
        identity: &str,
        two_player: bool,
    ) -> Result<Matched, SessionError> {
        if !two_player {
            let id = self.store.allocate_session_id();
            registry.insert_session(GameSession::single_player(id.clone(), identity.to_string()));
            return Ok(Matched::Started(id));
        }

        if let Some(id) = registry.take_waiting_for(identity) {
            let session = registry.session_mut(&id).ok_or(SessionError::NotPending)?;
            session.add_second_participant(identity.to_string())?;
            info!(session_id = %id, "Paired with waiting session");
            return Ok(Matched::Started(id));
        }

        let id = self.store.allocate_session_id();
        registry.insert_session(GameSession::awaiting_partner(id.clone(), identity.to_string()));
        registry.enqueue(id.clone());
        info!(session_id = %id, "No partner available, waiting");
        Ok(Matched::Waiting(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Participant, SessionStatus};
    use crate::store::MemoryStore;

    fn matchmaker() -> Matchmaker {
        Matchmaker::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_single_player_starts_immediately() {
        let mut registry = Registry::new();
        let Matched::Started(id) = matchmaker().request_game(&mut registry, "alice", false).unwrap()
        else {
            panic!("single player should start");
        };
        let session = registry.session(&id).unwrap();
        assert_eq!(*session.status(), SessionStatus::InProgress);
        assert_eq!(*session.participant2(), Some(Participant::Computer));
        assert_eq!(registry.waiting().count(), 0);
    }

    #[test]
    fn test_two_player_pairs_in_order() {
        let mm = matchmaker();
        let mut registry = Registry::new();
        let first = mm.request_game(&mut registry, "alice", true).unwrap();
        let second = mm.request_game(&mut registry, "bob", true).unwrap();

        let Matched::Waiting(waiting_id) = first else {
            panic!("first request should wait");
        };
        assert_eq!(second, Matched::Started(waiting_id.clone()));

        let session = registry.session(&waiting_id).unwrap();
        assert_eq!(session.participant1(), "alice");
        assert_eq!(
            *session.participant2(),
            Some(Participant::Human("bob".to_string()))
        );
        assert_eq!(*session.status(), SessionStatus::InProgress);
    }

    #[test]
    fn test_oldest_waiting_matched_first() {
        let mm = matchmaker();
        let mut registry = Registry::new();
        let Matched::Waiting(a) = mm.request_game(&mut registry, "alice", true).unwrap() else {
            panic!("should wait");
        };
        let Matched::Waiting(b) = mm.request_game(&mut registry, "alice", true).unwrap() else {
            panic!("same identity should not pair");
        };
        assert_ne!(a, b);
        assert_eq!(mm.request_game(&mut registry, "carol", true).unwrap(), Matched::Started(a));
        assert_eq!(mm.request_game(&mut registry, "dave", true).unwrap(), Matched::Started(b));
    }

    #[test]
    fn test_never_pairs_identity_with_itself() {
        let mm = matchmaker();
        let mut registry = Registry::new();
        mm.request_game(&mut registry, "alice", true).unwrap();
        let result = mm.request_game(&mut registry, "alice", true).unwrap();
        assert!(matches!(result, Matched::Waiting(_)));
        for id in registry.waiting() {
            let session = registry.session(id).unwrap();
            assert_eq!(*session.participant2(), None);
        }
    }
}
