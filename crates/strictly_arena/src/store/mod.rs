//! Persistence collaborator: session ids, completed games, participants.
//!
//! The gateway never waits on these calls before emitting state; store
//! failures are logged by the caller and otherwise ignored.

mod error;
mod memory;
mod models;
mod schema; // Diesel generated schema - internal use only
mod sqlite;

pub use error::StoreError;
pub use memory::{MemoryStore, ParticipantStats};
pub use models::{CompletedGame, ParticipantRecord};
pub use sqlite::SqliteStore;

use crate::session::{GameSession, Identity, SessionId};
use async_trait::async_trait;

/// Durable storage behind the in-memory game flow.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Allocates a globally unique session id.
    fn allocate_session_id(&self) -> SessionId;

    /// Records a completed session and updates win counters.
    ///
    /// Draws and computer wins never increment a win counter.
    async fn save_completed_game(&self, game: GameSession) -> Result<(), StoreError>;

    /// Records a newly authenticated participant. Idempotent.
    async fn record_participant(&self, identity: Identity) -> Result<(), StoreError>;
}

/// Fresh UUID v4 session id.
pub(crate) fn new_session_id() -> SessionId {
    uuid::Uuid::new_v4().to_string()
}
