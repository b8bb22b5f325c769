use crate::grid::{Cell, ImageId};

/// Precondition violations raised by grid construction, solving and task dispatch.
///
/// Every variant is fatal to the operation that raised it and never to state that was already
/// committed. "No solution" from the solver is not an error; see [`crate::solver::Guess`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("grid must have at least one row and one column")]
    EmptyGrid,

    #[error("expected {expected} tiles for the grid, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("image {0:?} appears more than once in the arrangement")]
    DuplicateImage(ImageId),

    #[error("arrangement is not a permutation of the session's tiles")]
    NotAPermutation,

    #[error("no unplaced images left for empty cell {0:?}")]
    RemainingExhausted(Cell),

    #[error("grid is full but {0} images were never placed")]
    RemainingLeftover(usize),

    #[error("no candidate image could be scored for cell {0:?}")]
    NoCandidate(Cell),

    #[error("failed to spawn submission task: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
