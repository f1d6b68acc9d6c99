//! Terminal outcome evaluation.

use super::{Line, check_winner, is_full};
use crate::{Board, Mark};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Outcome {
    /// A mark completed a line.
    Win {
        /// The winning mark.
        mark: Mark,
        /// The line it completed.
        line: Line,
    },
    /// The board filled up without a winning line.
    Draw,
}

impl Outcome {
    /// Returns the winning mark if there is one.
    pub fn winner(&self) -> Option<Mark> {
        match self {
            Outcome::Win { mark, .. } => Some(*mark),
            Outcome::Draw => None,
        }
    }
}

/// Result of evaluating a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum Evaluation {
    /// Moves remain and nobody has won.
    Ongoing,
    /// The game is over.
    Over(Outcome),
}

impl Evaluation {
    /// Returns true when the game is over.
    pub fn is_over(&self) -> bool {
        matches!(self, Evaluation::Over(_))
    }

    /// Returns the outcome of a finished game.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Evaluation::Ongoing => None,
            Evaluation::Over(outcome) => Some(*outcome),
        }
    }
}

/// Evaluates a board.
///
/// Lines are checked rows first, then columns, then the two diagonals; the
/// first complete line wins. A full board without a line is a draw.
#[instrument]
pub fn evaluate(board: &Board) -> Evaluation {
    if let Some((mark, line)) = check_winner(board) {
        Evaluation::Over(Outcome::Win { mark, line })
    } else if is_full(board) {
        Evaluation::Over(Outcome::Draw)
    } else {
        Evaluation::Ongoing
    }
}
