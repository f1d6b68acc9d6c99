//! Strictly Tic-Tac-Toe - pure board model and outcome evaluation.
//!
//! This crate knows nothing about players, sessions or networking. It
//! answers one question: given a board, is the game over, and if so how?
//!
//! # Example
//!
//! ```
//! use strictly_tictactoe::{Board, Coordinates, Evaluation, Mark, evaluate};
//!
//! let mut board = Board::new();
//! board.place(Coordinates::new(1, 1), Mark::X).unwrap();
//! assert_eq!(evaluate(&board), Evaluation::Ongoing);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod rules;
mod types;

pub use rules::{Evaluation, Line, Outcome, check_winner, evaluate, is_full};
pub use types::{Board, BoardError, Coordinates, Mark, Square};
