// Error types for board construction and tile operations

use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("tile ({x}, {y}) is outside the {width}x{height} board")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
    #[error("{mines} mines do not fit a board of {cells} tiles with one safe tile")]
    TooManyMines { mines: usize, cells: usize },
    #[error("a {width}x{height} board has more tiles than can be addressed")]
    TooLarge { width: usize, height: usize },
    #[error("board must have at least one row and one column")]
    EmptyBoard,
    #[error("mine placed twice at ({x}, {y})")]
    DuplicateMine { x: usize, y: usize },
}

pub type Result<T> = core::result::Result<T, BoardError>;
