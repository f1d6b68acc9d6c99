//! Game rules for tic-tac-toe.
//!
//! Pure functions for evaluating a board. Nothing here mutates state, so
//! the same board can be evaluated any number of times.

mod draw;
mod evaluation;
mod win;

pub use draw::is_full;
pub use evaluation::{Evaluation, Outcome, evaluate};
pub use win::{Line, check_winner};
