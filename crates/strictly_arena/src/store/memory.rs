//! In-process store used when no database is configured, and in tests.

use async_trait::async_trait;
use derive_getters::Getters;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, instrument};

use crate::session::{GameSession, Identity, SessionId};
use crate::store::{PersistenceStore, StoreError, new_session_id};

/// Counters kept per participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Getters)]
pub struct ParticipantStats {
    wins: u32,
    games_played: u32,
}

#[derive(Debug, Default)]
struct MemoryState {
    games: Vec<GameSession>,
    participants: HashMap<Identity, ParticipantStats>,
}

/// Store that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_writes: bool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose writes always fail.
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Completed games in the order they were saved.
    pub fn completed_games(&self) -> Vec<GameSession> {
        self.lock().games.clone()
    }

    /// Counters for a participant, if recorded.
    pub fn participant(&self, identity: &str) -> Option<ParticipantStats> {
        self.lock().participants.get(identity).copied()
    }

    /// Number of recorded participants.
    pub fn participant_count(&self) -> usize {
        self.lock().participants.len()
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    fn allocate_session_id(&self) -> SessionId {
        new_session_id()
    }

    #[instrument(skip(self, game), fields(session_id = %game.id()))]
    async fn save_completed_game(&self, game: GameSession) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::new("Writes are disabled"));
        }
        if game.winner().is_none() {
            return Err(StoreError::new("Session has no result to record"));
        }

        let mut state = self.lock();
        for identity in game.human_identities() {
            let stats = state.participants.entry(identity.to_string()).or_default();
            stats.games_played += 1;
        }
        if let Some(winner) = game.credited_winner() {
            let stats = state.participants.entry(winner.to_string()).or_default();
            stats.wins += 1;
        }
        debug!(games = state.games.len() + 1, "Completed game stored");
        state.games.push(game);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn record_participant(&self, identity: Identity) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::new("Writes are disabled"));
        }
        self.lock().participants.entry(identity).or_default();
        Ok(())
    }
}
