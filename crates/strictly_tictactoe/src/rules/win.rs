//! Win detection logic for tic-tac-toe.

use crate::{Board, Coordinates, Mark, Square};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// A line of three squares that can win the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Line {
    /// A horizontal line, by row index.
    Row(usize),
    /// A vertical line, by column index.
    Column(usize),
    /// Top-left to bottom-right.
    Diagonal,
    /// Top-right to bottom-left.
    AntiDiagonal,
}

impl Line {
    /// Every line in scan order: rows, then columns, then both diagonals.
    pub const SCAN_ORDER: [Line; 8] = [
        Line::Row(0),
        Line::Row(1),
        Line::Row(2),
        Line::Column(0),
        Line::Column(1),
        Line::Column(2),
        Line::Diagonal,
        Line::AntiDiagonal,
    ];

    /// The three cells making up this line.
    pub fn cells(self) -> [Coordinates; 3] {
        match self {
            Line::Row(y) => [0, 1, 2].map(|x| Coordinates::new(x, y)),
            Line::Column(x) => [0, 1, 2].map(|y| Coordinates::new(x, y)),
            Line::Diagonal => [0, 1, 2].map(|i| Coordinates::new(i, i)),
            Line::AntiDiagonal => [0, 1, 2].map(|i| Coordinates::new(2 - i, i)),
        }
    }
}

/// Finds the first complete line of identical marks in scan order.
///
/// Returns the winning mark and the line it completed, or `None`.
#[instrument]
pub fn check_winner(board: &Board) -> Option<(Mark, Line)> {
    Line::SCAN_ORDER.into_iter().find_map(|line| {
        let [a, b, c] = line.cells().map(|at| board.get(at));
        match a {
            Some(Square::Occupied(mark)) if a == b && b == c => Some((mark, line)),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with(cells: &[(usize, usize, Mark)]) -> Board {
        let mut board = Board::new();
        for &(x, y, mark) in cells {
            board.place(Coordinates::new(x, y), mark).unwrap();
        }
        board
    }

    #[test]
    fn test_no_winner_empty_board() {
        assert_eq!(check_winner(&Board::new()), None);
    }

    #[test]
    fn test_winner_top_row() {
        let board = board_with(&[(0, 0, Mark::X), (1, 0, Mark::X), (2, 0, Mark::X)]);
        assert_eq!(check_winner(&board), Some((Mark::X, Line::Row(0))));
    }

    #[test]
    fn test_winner_right_column() {
        let board = board_with(&[(2, 0, Mark::O), (2, 1, Mark::O), (2, 2, Mark::O)]);
        assert_eq!(check_winner(&board), Some((Mark::O, Line::Column(2))));
    }

    #[test]
    fn test_winner_diagonal() {
        let board = board_with(&[(0, 0, Mark::O), (1, 1, Mark::O), (2, 2, Mark::O)]);
        assert_eq!(check_winner(&board), Some((Mark::O, Line::Diagonal)));
    }

    #[test]
    fn test_winner_anti_diagonal() {
        let board = board_with(&[(2, 0, Mark::X), (1, 1, Mark::X), (0, 2, Mark::X)]);
        assert_eq!(check_winner(&board), Some((Mark::X, Line::AntiDiagonal)));
    }

    #[test]
    fn test_mixed_line_does_not_win() {
        let board = board_with(&[(0, 0, Mark::X), (1, 0, Mark::O), (2, 0, Mark::X)]);
        assert_eq!(check_winner(&board), None);
    }

    #[test]
    fn test_rows_scanned_before_columns() {
        // Not reachable by legal play, but pins the scan order.
        let board = board_with(&[
            (0, 0, Mark::X),
            (1, 0, Mark::X),
            (2, 0, Mark::X),
            (0, 1, Mark::X),
            (0, 2, Mark::X),
        ]);
        assert_eq!(check_winner(&board), Some((Mark::X, Line::Row(0))));
    }
}
