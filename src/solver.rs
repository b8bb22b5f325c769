use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use genawaiter::yield_;

use crate::error::{Error, Result};
use crate::grid::{Board, Cell, ImageId, TileState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    fn step(self) -> (isize, isize) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

/// Edge-mismatch score between two tiles.
///
/// `cost(a, b, direction)` scores `b` sitting next to `a` in `direction`; lower is a better fit.
/// The solver only ever asks `(left, right, Right)` and `(above, below, Down)`.
pub trait Cost {
    fn cost(&self, a: ImageId, b: ImageId, direction: Direction) -> f64;
}

impl<F> Cost for F
where
    F: Fn(ImageId, ImageId, Direction) -> f64,
{
    fn cost(&self, a: ImageId, b: ImageId, direction: Direction) -> f64 {
        self(a, b, direction)
    }
}

fn oriented(cost: &dyn Cost, tile: ImageId, neighbor: ImageId, direction: Direction) -> f64 {
    match direction {
        Direction::Up => cost.cost(neighbor, tile, Direction::Down),
        Direction::Down => cost.cost(tile, neighbor, Direction::Down),
        Direction::Left => cost.cost(neighbor, tile, Direction::Right),
        Direction::Right => cost.cost(tile, neighbor, Direction::Right),
    }
}

/// Sum of `cost` over every horizontal and vertical neighbor pair.
pub fn total_cost(arrangement: &ndarray::Array2<ImageId>, cost: &dyn Cost) -> f64 {
    let horizontal = arrangement
        .windows((1, 2))
        .into_iter()
        .map(|pair| cost.cost(pair[[0, 0]], pair[[0, 1]], Direction::Right))
        .sum::<f64>();
    let vertical = arrangement
        .windows((2, 1))
        .into_iter()
        .map(|pair| cost.cost(pair[[0, 0]], pair[[1, 0]], Direction::Down))
        .sum::<f64>();

    horizontal + vertical
}

/// Partially filled grid; `None` marks an empty cell.
type Layout = ndarray::Array2<Option<ImageId>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset {
    pub row: isize,
    pub col: isize,
}

/// Tiles that must keep their relative positions, placed as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: usize,
    members: Vec<(ImageId, Offset)>,
}

impl Group {
    /// Offsets are taken relative to the first cell, so `cells` should be in row-major order.
    fn from_cells(id: usize, cells: &[(Cell, ImageId)]) -> Self {
        let origin = cells.first().map(|(cell, _)| *cell).unwrap_or(Cell::new(0, 0));
        Group {
            id,
            members: cells
                .iter()
                .map(|(cell, image)| {
                    (
                        *image,
                        Offset {
                            row: cell.row as isize - origin.row as isize,
                            col: cell.col as isize - origin.col as isize,
                        },
                    )
                })
                .collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }
}

fn place(mut layout: Layout, group: &Group, anchor: Cell) -> Option<Layout> {
    for (image, offset) in &group.members {
        let row = anchor.row.checked_add_signed(offset.row)?;
        let col = anchor.col.checked_add_signed(offset.col)?;

        let slot = layout.get_mut([row, col])?;
        if slot.is_some() {
            return None;
        }
        *slot = Some(*image);
    }

    Some(layout)
}

/// Solver input: fixed tiles already in place, rigid groups to position, everything else free.
#[derive(Debug, Clone)]
pub struct Problem {
    layout: Layout,
    groups: Vec<Group>,
    remaining: BTreeSet<ImageId>,
}

impl Problem {
    /// Fixed cells stay put, cells sharing a group id form a [`Group`] (ordered by id, members in
    /// row-major order) and the rest is left to the greedy fill. A group id held by a single cell
    /// constrains nothing, so that tile is treated as free.
    pub fn from_board(board: &Board) -> Self {
        let mut layout = Layout::from_elem(board.arrangement().dim(), None);
        let mut clusters: BTreeMap<usize, Vec<(Cell, ImageId)>> = BTreeMap::new();
        let mut remaining = BTreeSet::new();

        for ((row, col), state) in board.states().indexed_iter() {
            let cell = Cell::new(row, col);
            let image = board.get(cell);
            match state {
                TileState::Fixed => layout[cell.index()] = Some(image),
                TileState::Grouped(gid) => clusters.entry(*gid).or_default().push((cell, image)),
                TileState::Free => {
                    remaining.insert(image);
                }
            }
        }

        let mut groups = vec![];
        for (gid, cells) in clusters {
            if cells.len() < 2 {
                remaining.extend(cells.iter().map(|(_, image)| *image));
                continue;
            }
            groups.push(Group::from_cells(gid, &cells));
        }

        Problem {
            layout,
            groups,
            remaining,
        }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn remaining(&self) -> &BTreeSet<ImageId> {
        &self.remaining
    }

    fn vacancies(&self) -> usize {
        self.layout.iter().filter(|slot| slot.is_none()).count()
    }
}

/// Result of a solve. No feasible group placement is reported as infinite cost with no
/// arrangement, which callers must check before installing anything.
#[derive(Debug, Clone, PartialEq)]
pub struct Guess {
    pub cost: f64,
    pub arrangement: Option<ndarray::Array2<ImageId>>,
}

impl Guess {
    pub fn no_solution() -> Self {
        Guess {
            cost: f64::INFINITY,
            arrangement: None,
        }
    }

    pub fn is_solution(&self) -> bool {
        self.arrangement.is_some()
    }
}

/// Every way to place `groups[group_idx..]` onto `layout`, anchors tried in row-major order.
fn group_placements(
    groups: Rc<Vec<Group>>,
    layout: Layout,
    group_idx: usize,
) -> Box<dyn Iterator<Item = Layout>> {
    Box::new(
        genawaiter::rc::gen!({
            let group = if let Some(group) = groups.get(group_idx) {
                group
            } else {
                yield_!(layout);
                return;
            };

            let (h, w) = layout.dim();
            for row in 0..h {
                for col in 0..w {
                    let placed = if let Some(placed) = place(layout.clone(), group, Cell::new(row, col)) {
                        placed
                    } else {
                        continue;
                    };

                    for leaf in group_placements(groups.clone(), placed, group_idx + 1) {
                        yield_!(leaf);
                    }
                }
            }
        })
        .into_iter(),
    )
}

/// Places every group exhaustively, completes each placement greedily and keeps the cheapest
/// result. Ties keep the first one found.
pub fn solve(problem: Problem, cost: &dyn Cost) -> Result<Guess> {
    let start_time = instant::Instant::now();
    let (h, w) = problem.layout.dim();

    log::info!(
        "solving {}x{}: {} groups ({:?} tiles), {} fixed, {} free",
        w,
        h,
        problem.groups.len(),
        problem.groups.iter().map(Group::len).collect::<Vec<_>>(),
        problem.layout.iter().filter(|slot| slot.is_some()).count(),
        problem.remaining.len(),
    );

    // Very cheap check to see if the groups even fit.
    let grouped = problem.groups.iter().map(Group::len).sum::<usize>();
    if grouped > problem.vacancies() {
        log::info!(
            "{} grouped tiles cannot fit in {} empty cells",
            grouped,
            problem.vacancies()
        );
        return Ok(Guess::no_solution());
    }

    let Problem {
        layout,
        groups,
        remaining,
    } = problem;

    let mut best = Guess::no_solution();
    let mut leaves = 0usize;
    for leaf in group_placements(Rc::new(groups), layout, 0) {
        leaves += 1;

        let arrangement = fill(leaf, remaining.clone(), cost)?;
        let total = total_cost(&arrangement, cost);
        if total.is_nan() {
            log::warn!("skipping group placement {} with an unscorable total", leaves);
            continue;
        }
        if !best.is_solution() || total < best.cost {
            best = Guess {
                cost: total,
                arrangement: Some(arrangement),
            };
        }
    }

    log::info!(
        "solve took {:?}, {} group placements, best cost {}",
        instant::Instant::now() - start_time,
        leaves,
        best.cost
    );

    Ok(best)
}

fn neighbors(layout: &Layout, cell: Cell) -> impl Iterator<Item = (Direction, ImageId)> + '_ {
    Direction::ALL.into_iter().filter_map(move |direction| {
        let (dr, dc) = direction.step();
        let row = cell.row.checked_add_signed(dr)?;
        let col = cell.col.checked_add_signed(dc)?;
        layout
            .get([row, col])
            .copied()
            .flatten()
            .map(|image| (direction, image))
    })
}

/// The empty cell with the most occupied neighbors, first in row-major order on ties.
fn next_target(layout: &Layout) -> Option<Cell> {
    let mut target: Option<(Cell, usize)> = None;

    for ((row, col), slot) in layout.indexed_iter() {
        if slot.is_some() {
            continue;
        }

        let cell = Cell::new(row, col);
        let occupied = neighbors(layout, cell).count();
        if target.map_or(true, |(_, most)| occupied > most) {
            target = Some((cell, occupied));
            if occupied == 4 {
                break;
            }
        }
    }

    target.map(|(cell, _)| cell)
}

fn fit(layout: &Layout, cell: Cell, candidate: ImageId, cost: &dyn Cost) -> f64 {
    neighbors(layout, cell)
        .map(|(direction, neighbor)| oriented(cost, candidate, neighbor, direction).abs())
        .sum()
}

/// Greedily fills every empty cell from `remaining`, most constrained cell first.
fn fill(
    mut layout: Layout,
    mut remaining: BTreeSet<ImageId>,
    cost: &dyn Cost,
) -> Result<ndarray::Array2<ImageId>> {
    while let Some(cell) = next_target(&layout) {
        if remaining.is_empty() {
            return Err(Error::RemainingExhausted(cell));
        }

        let mut best: Option<(ImageId, f64)> = None;
        for &candidate in &remaining {
            let score = fit(&layout, cell, candidate, cost);
            if score.is_nan() {
                continue;
            }
            if best.map_or(true, |(_, lowest)| score < lowest) {
                best = Some((candidate, score));
            }
        }

        let (image, _) = best.ok_or(Error::NoCandidate(cell))?;
        layout[cell.index()] = Some(image);
        remaining.remove(&image);
    }

    if !remaining.is_empty() {
        return Err(Error::RemainingLeftover(remaining.len()));
    }

    Ok(layout.mapv(|slot| slot.expect("next_target found no empty cell")))
}
