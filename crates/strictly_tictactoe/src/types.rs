//! Core domain types for tic-tac-toe.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Side length of the board.
pub const SIZE: usize = 3;

/// A mark placed on the board.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, strum::EnumIter,
)]
pub enum Mark {
    /// Placed by the first participant (moves first).
    X,
    /// Placed by the second participant.
    O,
}

impl Mark {
    /// Returns the other mark.
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

/// A square on the tic-tac-toe board.
///
/// Serialized as `"X"`, `"O"` or `""` so a board reads naturally on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Square {
    /// Empty square.
    #[default]
    Empty,
    /// Square occupied by a mark.
    Occupied(Mark),
}

impl Square {
    /// Returns the mark in this square, if any.
    pub fn mark(self) -> Option<Mark> {
        match self {
            Square::Empty => None,
            Square::Occupied(mark) => Some(mark),
        }
    }
}

impl From<Mark> for Square {
    fn from(mark: Mark) -> Self {
        Square::Occupied(mark)
    }
}

impl From<Square> for String {
    fn from(square: Square) -> Self {
        match square {
            Square::Empty => String::new(),
            Square::Occupied(mark) => mark.to_string(),
        }
    }
}

impl TryFrom<String> for Square {
    type Error = BoardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "" => Ok(Square::Empty),
            "X" => Ok(Square::Occupied(Mark::X)),
            "O" => Ok(Square::Occupied(Mark::O)),
            _ => Err(BoardError::UnknownSymbol(value)),
        }
    }
}

/// A cell address: `x` is the column, `y` is the row, both zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("({}, {})", x, y)]
pub struct Coordinates {
    /// Column index.
    pub x: usize,
    /// Row index.
    pub y: usize,
}

impl Coordinates {
    /// Creates coordinates from a column and a row.
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Returns true if both indices fall on the board.
    pub fn in_bounds(self) -> bool {
        self.x < SIZE && self.y < SIZE
    }

    /// Row-major index into the square array.
    fn index(self) -> usize {
        self.y * SIZE + self.x
    }
}

/// Error raised by board mutation or decoding.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum BoardError {
    /// Coordinates fall outside the 3x3 grid.
    #[display("Coordinates {} are out of bounds", _0)]
    OutOfBounds(#[error(not(source))] Coordinates),
    /// The target square already holds a mark.
    #[display("Square {} is already occupied", _0)]
    Occupied(#[error(not(source))] Coordinates),
    /// A serialized square was neither `"X"`, `"O"` nor `""`.
    #[display("Unknown square symbol '{}'", _0)]
    UnknownSymbol(#[error(not(source))] String),
}

/// 3x3 tic-tac-toe board.
///
/// Squares only ever go from empty to occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "[[Square; 3]; 3]", from = "[[Square; 3]; 3]")]
pub struct Board {
    /// Squares in row-major order.
    squares: [Square; SIZE * SIZE],
}

impl Board {
    /// Creates a new empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a board from rows, top row first.
    pub fn from_rows(rows: [[Square; SIZE]; SIZE]) -> Self {
        let mut squares = [Square::Empty; SIZE * SIZE];
        for (y, row) in rows.iter().enumerate() {
            for (x, square) in row.iter().enumerate() {
                squares[y * SIZE + x] = *square;
            }
        }
        Self { squares }
    }

    /// Returns the board as rows, top row first.
    pub fn rows(&self) -> [[Square; SIZE]; SIZE] {
        let mut rows = [[Square::Empty; SIZE]; SIZE];
        for (index, square) in self.squares.iter().enumerate() {
            rows[index / SIZE][index % SIZE] = *square;
        }
        rows
    }

    /// Gets the square at the given coordinates, `None` when out of bounds.
    pub fn get(&self, at: Coordinates) -> Option<Square> {
        at.in_bounds().then(|| self.squares[at.index()])
    }

    /// Returns true if the coordinates index an empty square.
    pub fn is_empty_at(&self, at: Coordinates) -> bool {
        matches!(self.get(at), Some(Square::Empty))
    }

    /// Places a mark on an empty square.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError`] if the coordinates are out of bounds or the
    /// square is already occupied. The board is left untouched.
    #[instrument(skip(self))]
    pub fn place(&mut self, at: Coordinates, mark: Mark) -> Result<(), BoardError> {
        match self.get(at) {
            None => Err(BoardError::OutOfBounds(at)),
            Some(Square::Occupied(_)) => Err(BoardError::Occupied(at)),
            Some(Square::Empty) => {
                self.squares[at.index()] = Square::Occupied(mark);
                Ok(())
            }
        }
    }

    /// All empty squares in row-major order.
    pub fn empty_cells(&self) -> Vec<Coordinates> {
        self.squares
            .iter()
            .enumerate()
            .filter(|(_, square)| **square == Square::Empty)
            .map(|(index, _)| Coordinates::new(index % SIZE, index / SIZE))
            .collect()
    }

    /// Number of occupied squares.
    pub fn occupied_count(&self) -> usize {
        self.squares
            .iter()
            .filter(|square| **square != Square::Empty)
            .count()
    }

    /// Returns all squares as a slice.
    pub fn squares(&self) -> &[Square; SIZE * SIZE] {
        &self.squares
    }

    /// Returns a copy with every mark swapped for its opponent.
    pub fn relabeled(&self) -> Self {
        let mut squares = self.squares;
        for square in squares.iter_mut() {
            if let Square::Occupied(mark) = *square {
                *square = Square::Occupied(mark.opponent());
            }
        }
        Self { squares }
    }

    /// Formats the board as a human-readable string.
    pub fn display(&self) -> String {
        let mut result = String::new();
        for (y, row) in self.rows().iter().enumerate() {
            for (x, square) in row.iter().enumerate() {
                match square {
                    Square::Empty => result.push('.'),
                    Square::Occupied(mark) => result.push_str(&mark.to_string()),
                }
                if x < SIZE - 1 {
                    result.push('|');
                }
            }
            if y < SIZE - 1 {
                result.push_str("\n-+-+-\n");
            }
        }
        result
    }
}

impl From<[[Square; SIZE]; SIZE]> for Board {
    fn from(rows: [[Square; SIZE]; SIZE]) -> Self {
        Self::from_rows(rows)
    }
}

impl From<Board> for [[Square; SIZE]; SIZE] {
    fn from(board: Board) -> Self {
        board.rows()
    }
}
