//! Scripted opponent for single-player sessions.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use strictly_tictactoe::{Board, Coordinates};
use tracing::{debug, instrument};

/// Picks uniformly at random among the empty squares.
#[derive(Debug, Clone)]
pub struct RandomOpponent {
    rng: StdRng,
}

impl RandomOpponent {
    /// Creates an opponent seeded from operating system entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a reproducible opponent.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Chooses a move on the given board.
    ///
    /// Returns `None` only for a full board, which is always terminal
    /// before the opponent is consulted.
    #[instrument(skip(self, board))]
    pub fn choose_move(&mut self, board: &Board) -> Option<Coordinates> {
        let choice = board.empty_cells().choose(&mut self.rng).copied();
        debug!(choice = ?choice, "Scripted opponent chose move");
        choice
    }
}

impl Default for RandomOpponent {
    fn default() -> Self {
        Self::from_entropy()
    }
}
