use crate::error::{Error, Result};

/// Identifier of an original, pre-shuffle tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub const fn new(row: usize, col: usize) -> Self {
        Cell { row, col }
    }

    pub(crate) fn index(self) -> [usize; 2] {
        [self.row, self.col]
    }
}

/// Edit status of a single cell. The tag travels with its tile on every swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "group")]
pub enum TileState {
    #[default]
    Free,
    Fixed,
    Grouped(usize),
}

impl TileState {
    /// Free -> Grouped(0) -> Fixed -> Free.
    pub fn cycled(self) -> Self {
        match self {
            TileState::Free => TileState::Grouped(0),
            TileState::Grouped(_) => TileState::Fixed,
            TileState::Fixed => TileState::Free,
        }
    }

    pub fn toggled_fixed(self) -> Self {
        match self {
            TileState::Fixed => TileState::Free,
            TileState::Free | TileState::Grouped(_) => TileState::Fixed,
        }
    }

    pub fn is_fixed(self) -> bool {
        matches!(self, TileState::Fixed)
    }
}

/// Inclusive rectangle of cells, normalized so `top_left` is the minimum corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub top_left: Cell,
    pub bottom_right: Cell,
}

impl Rect {
    pub fn spanning(a: Cell, b: Cell) -> Self {
        Rect {
            top_left: Cell::new(a.row.min(b.row), a.col.min(b.col)),
            bottom_right: Cell::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    pub fn cells(self) -> impl Iterator<Item = Cell> {
        (self.top_left.row..=self.bottom_right.row).flat_map(move |row| {
            (self.top_left.col..=self.bottom_right.col).map(move |col| Cell::new(row, col))
        })
    }

    pub fn contains(&self, cell: Cell) -> bool {
        (self.top_left.row..=self.bottom_right.row).contains(&cell.row)
            && (self.top_left.col..=self.bottom_right.col).contains(&cell.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Rows,
    Columns,
}

/// Cyclic shift of every row (or every column) of the grid by one position.
///
/// Forward moves each line towards index 0 and wraps the first line to the end; backward is the
/// inverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    pub axis: Axis,
    pub forward: bool,
}

/// Immutable copy of the arrangement and tile states, used for undo.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    arrangement: ndarray::Array2<ImageId>,
    states: ndarray::Array2<TileState>,
}

/// The current tile arrangement plus the per-cell edit state.
///
/// Cell indices outside the grid are a contract violation and panic.
#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    arrangement: ndarray::Array2<ImageId>,
    states: ndarray::Array2<TileState>,
}

impl Board {
    pub fn new(arrangement: ndarray::Array2<ImageId>) -> Result<Self> {
        let (rows, cols) = arrangement.dim();
        if rows == 0 || cols == 0 {
            return Err(Error::EmptyGrid);
        }

        let mut seen = std::collections::HashSet::with_capacity(rows * cols);
        for id in arrangement.iter() {
            if !seen.insert(*id) {
                return Err(Error::DuplicateImage(*id));
            }
        }

        Ok(Board {
            states: ndarray::Array2::from_elem((rows, cols), TileState::Free),
            arrangement,
        })
    }

    /// Builds a board from a row-major list of `div_x * div_y` ids.
    pub fn from_rows(div_x: usize, div_y: usize, ids: Vec<ImageId>) -> Result<Self> {
        if div_x == 0 || div_y == 0 {
            return Err(Error::EmptyGrid);
        }
        if ids.len() != div_x * div_y {
            return Err(Error::DimensionMismatch {
                expected: div_x * div_y,
                found: ids.len(),
            });
        }

        let found = ids.len();
        let arrangement = ndarray::Array2::from_shape_vec((div_y, div_x), ids).map_err(|_| {
            Error::DimensionMismatch {
                expected: div_x * div_y,
                found,
            }
        })?;
        Board::new(arrangement)
    }

    pub fn rows(&self) -> usize {
        self.arrangement.nrows()
    }

    pub fn cols(&self) -> usize {
        self.arrangement.ncols()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.row < self.rows() && cell.col < self.cols()
    }

    pub fn arrangement(&self) -> &ndarray::Array2<ImageId> {
        &self.arrangement
    }

    pub fn states(&self) -> &ndarray::Array2<TileState> {
        &self.states
    }

    pub fn into_arrangement(self) -> ndarray::Array2<ImageId> {
        self.arrangement
    }

    pub fn get(&self, cell: Cell) -> ImageId {
        self.arrangement[cell.index()]
    }

    pub fn state(&self, cell: Cell) -> TileState {
        self.states[cell.index()]
    }

    pub fn set_state(&mut self, cell: Cell, state: TileState) {
        self.states[cell.index()] = state;
    }

    /// Swaps both the tiles and their tags.
    pub fn swap(&mut self, a: Cell, b: Cell) {
        self.arrangement.swap(a.index(), b.index());
        self.states.swap(a.index(), b.index());
    }

    pub fn rotate(&mut self, rotation: Rotation) {
        let (rows, cols) = self.arrangement.dim();
        let (lines, span) = match rotation.axis {
            Axis::Rows => (rows, cols),
            Axis::Columns => (cols, rows),
        };

        let at = |line: usize, i: usize| match rotation.axis {
            Axis::Rows => Cell::new(line, i),
            Axis::Columns => Cell::new(i, line),
        };

        // Bubble the leading (or trailing) line through to the other end.
        if rotation.forward {
            for line in 0..lines.saturating_sub(1) {
                for i in 0..span {
                    self.swap(at(line, i), at(line + 1, i));
                }
            }
        } else {
            for line in (1..lines).rev() {
                for i in 0..span {
                    self.swap(at(line, i), at(line - 1, i));
                }
            }
        }
    }

    /// Sets every tag back to [`TileState::Free`] without moving tiles.
    pub fn reset_states(&mut self) {
        for state in self.states.iter_mut() {
            *state = TileState::Free;
        }
    }

    /// Replaces the arrangement with a solver result. Tags stay on their cells.
    pub fn install(&mut self, arrangement: ndarray::Array2<ImageId>) -> Result<()> {
        if arrangement.dim() != self.arrangement.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.arrangement.len(),
                found: arrangement.len(),
            });
        }

        let mut current = self.arrangement.iter().copied().collect::<Vec<_>>();
        let mut incoming = arrangement.iter().copied().collect::<Vec<_>>();
        current.sort_unstable();
        incoming.sort_unstable();
        if current != incoming {
            return Err(Error::NotAPermutation);
        }

        self.arrangement = arrangement;
        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            arrangement: self.arrangement.clone(),
            states: self.states.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        self.arrangement = snapshot.arrangement;
        self.states = snapshot.states;
    }
}
