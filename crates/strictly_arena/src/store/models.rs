//! Database models.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;
use strictly_tictactoe::Board;
use tracing::instrument;

use crate::session::{DRAW_LABEL, GameSession, Winner};
use crate::store::{StoreError, schema};

/// Participant database model.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::participants)]
#[diesel(primary_key(identity))]
pub struct ParticipantRecord {
    identity: String,
    wins: i32,
    games_played: i32,
    created_at: NaiveDateTime,
}

/// Insertable participant model.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::participants)]
pub struct NewParticipant {
    identity: String,
}

/// Completed game database model.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::completed_games)]
pub struct CompletedGame {
    id: String,
    player1: String,
    player2: String,
    winner: String,
    board: String,
    moves: i32,
    completed_at: NaiveDateTime,
}

impl CompletedGame {
    /// Decodes the stored final board.
    #[instrument(skip(self), fields(game_id = %self.id))]
    pub fn parse_board(&self) -> Result<Board, StoreError> {
        Ok(serde_json::from_str(&self.board)?)
    }

    /// Returns true if the game ended in a draw.
    pub fn is_draw(&self) -> bool {
        self.winner == DRAW_LABEL
    }
}

/// Insertable completed game model.
#[derive(Debug, Clone, Insertable, Getters)]
#[diesel(table_name = schema::completed_games)]
pub struct NewCompletedGame {
    id: String,
    player1: String,
    player2: String,
    winner: String,
    board: String,
    moves: i32,
}

impl NewCompletedGame {
    /// Builds the row for a completed session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the session has no result or the board
    /// cannot be encoded.
    #[instrument(skip(game), fields(session_id = %game.id()))]
    pub fn from_session(game: &GameSession) -> Result<Self, StoreError> {
        let winner = match game.winner() {
            Some(Winner::Draw) => DRAW_LABEL.to_string(),
            Some(Winner::Participant(participant)) => participant.label().to_string(),
            None => return Err(StoreError::new("Session has no result to record")),
        };
        let player2 = game
            .participant2()
            .as_ref()
            .map(|p| p.label().to_string())
            .ok_or_else(|| StoreError::new("Session has no second participant"))?;

        Ok(Self {
            id: game.id().clone(),
            player1: game.participant1().clone(),
            player2,
            winner,
            board: serde_json::to_string(game.board())?,
            moves: i32::try_from(*game.moves())
                .map_err(|e| StoreError::new(format!("Move count overflow: {}", e)))?,
        })
    }
}
