//! SQLite-backed persistence via diesel.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{debug, info, instrument};

use crate::session::{GameSession, Identity, SessionId};
use crate::store::models::{NewCompletedGame, NewParticipant};
use crate::store::{
    CompletedGame, ParticipantRecord, PersistenceStore, StoreError, new_session_id, schema,
};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Database store for completed games and participant counters.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: String,
}

impl SqliteStore {
    /// Opens the database at the given path and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened or migrated.
    #[instrument(skip(db_path))]
    pub fn open(db_path: impl Into<String>) -> Result<Self, StoreError> {
        let store = Self {
            db_path: db_path.into(),
        };
        info!(path = %store.db_path, "Opening SQLite store");
        store.run_migrations()?;
        Ok(store)
    }

    /// Establishes a database connection.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, StoreError> {
        debug!(path = %self.db_path, "Establishing connection");
        SqliteConnection::establish(&self.db_path).map_err(|e| {
            StoreError::new(format!("Failed to connect to '{}': {}", self.db_path, e))
        })
    }

    /// Applies any migrations not yet run.
    #[instrument(skip(self))]
    pub fn run_migrations(&self) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::new(format!("Migration failed: {}", e)))?;
        info!(count = applied.len(), "Migrations applied");
        Ok(())
    }

    /// Inserts a completed game and updates counters in one transaction.
    ///
    /// Every human participant gets `games_played + 1`; only a human winner
    /// gets `wins + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the session has no result or a database
    /// error occurs.
    #[instrument(skip(self, game), fields(session_id = %game.id()))]
    pub fn insert_completed_game(&self, game: &GameSession) -> Result<CompletedGame, StoreError> {
        let record = NewCompletedGame::from_session(game)?;
        let humans = game.human_identities();
        let credited = game.credited_winner();
        let mut conn = self.connection()?;

        let saved = conn.transaction::<_, StoreError, _>(|conn| {
            let saved = diesel::insert_into(schema::completed_games::table)
                .values(&record)
                .returning(CompletedGame::as_returning())
                .get_result(conn)?;

            for identity in &humans {
                diesel::insert_or_ignore_into(schema::participants::table)
                    .values(&NewParticipant::new(identity.to_string()))
                    .execute(conn)?;
                diesel::update(schema::participants::table.find(*identity))
                    .set(schema::participants::games_played.eq(schema::participants::games_played + 1))
                    .execute(conn)?;
            }

            if let Some(winner) = credited {
                diesel::update(schema::participants::table.find(winner))
                    .set(schema::participants::wins.eq(schema::participants::wins + 1))
                    .execute(conn)?;
            }

            Ok(saved)
        })?;

        info!(winner = %saved.winner(), moves = saved.moves(), "Completed game recorded");
        Ok(saved)
    }

    /// Inserts a participant if not already present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn upsert_participant(&self, identity: &str) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        let inserted = diesel::insert_or_ignore_into(schema::participants::table)
            .values(&NewParticipant::new(identity.to_string()))
            .execute(&mut conn)?;
        debug!(inserted, "Participant recorded");
        Ok(())
    }

    /// Gets a participant's counters. Returns `None` if never seen.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn get_participant(&self, identity: &str) -> Result<Option<ParticipantRecord>, StoreError> {
        let mut conn = self.connection()?;
        let record = schema::participants::table
            .find(identity)
            .select(ParticipantRecord::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(record)
    }

    /// Lists completed games involving an identity, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn games_for(&self, identity: &str) -> Result<Vec<CompletedGame>, StoreError> {
        let mut conn = self.connection()?;
        let games = schema::completed_games::table
            .filter(
                schema::completed_games::player1
                    .eq(identity)
                    .or(schema::completed_games::player2.eq(identity)),
            )
            .order(schema::completed_games::completed_at.desc())
            .select(CompletedGame::as_select())
            .load(&mut conn)?;
        debug!(count = games.len(), "Games loaded");
        Ok(games)
    }
}

#[async_trait]
impl PersistenceStore for SqliteStore {
    fn allocate_session_id(&self) -> SessionId {
        new_session_id()
    }

    async fn save_completed_game(&self, game: GameSession) -> Result<(), StoreError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.insert_completed_game(&game))
            .await
            .map_err(|e| StoreError::new(format!("Store task failed: {}", e)))??;
        Ok(())
    }

    async fn record_participant(&self, identity: Identity) -> Result<(), StoreError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.upsert_participant(&identity))
            .await
            .map_err(|e| StoreError::new(format!("Store task failed: {}", e)))?
    }
}
