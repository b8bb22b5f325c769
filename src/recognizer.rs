//! Turns buffered pointer-button events into editing commands.
//!
//! Matching is longest-match over a fixed, priority-ordered set of patterns. Every pattern is a
//! short sequence of event kinds with a constraint on the cell each event lands on. The head of
//! the [`EventLog`] is evaluated against all patterns on each pass:
//!
//! - the longest fully matched pattern wins, equal lengths resolve by priority;
//! - if nothing matched but some pattern could still complete, recognition waits for more events;
//! - if the head can begin no pattern at all, that single event is dropped.
//!
//! The last rule guarantees the log always drains, so malformed input never errors.

use crate::grid::{Axis, Cell, Rect, Rotation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PressPrimary,
    ReleasePrimary,
    PressSecondary,
    ReleaseSecondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub kind: EventKind,
    pub cell: Cell,
}

impl PointerEvent {
    pub const fn new(kind: EventKind, cell: Cell) -> Self {
        PointerEvent { kind, cell }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Advance every cell of the rectangle Free -> Grouped(0) -> Fixed -> Free.
    RegionCycle(Rect),
    ToggleFixed(Cell),
    Swap(Cell, Cell),
    RotateLine(Rotation),
    /// Fix every cell of the rectangle that is not fixed yet.
    FixRegion(Rect),
}

/// Append-only event buffer read through a cursor.
///
/// Consumed events stay in place until the cursor passes `compact_threshold`, or the log is fully
/// drained, at which point they are dropped in one go.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: Vec<PointerEvent>,
    cursor: usize,
    compact_threshold: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        EventLog::new(64)
    }
}

impl EventLog {
    pub fn new(compact_threshold: usize) -> Self {
        EventLog {
            events: vec![],
            cursor: 0,
            compact_threshold: compact_threshold.max(1),
        }
    }

    pub fn push(&mut self, event: PointerEvent) {
        self.events.push(event);
    }

    /// Events not yet consumed, oldest first.
    pub fn pending(&self) -> &[PointerEvent] {
        &self.events[self.cursor..]
    }

    pub fn len(&self) -> usize {
        self.events.len() - self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.cursor = 0;
    }

    fn consume(&mut self, n: usize) {
        self.cursor = (self.cursor + n).min(self.events.len());
    }

    fn compact(&mut self) {
        if self.cursor == self.events.len() {
            self.clear();
        } else if self.cursor >= self.compact_threshold {
            self.events.drain(..self.cursor);
            self.cursor = 0;
        }
    }

    #[cfg(test)]
    fn stored(&self) -> usize {
        self.events.len()
    }
}

#[derive(Debug, Clone, Copy)]
enum At {
    Any,
    Same(usize),
    Other(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Match {
    Complete(usize),
    Partial,
    Failed,
}

fn follow(events: &[PointerEvent], steps: &[(EventKind, At)]) -> Match {
    for (i, (kind, at)) in steps.iter().enumerate() {
        let event = match events.get(i) {
            Some(event) => event,
            None => return Match::Partial,
        };

        if event.kind != *kind {
            return Match::Failed;
        }

        let placed = match *at {
            At::Any => true,
            At::Same(j) => event.cell == events[j].cell,
            At::Other(j) => event.cell != events[j].cell,
        };
        if !placed {
            return Match::Failed;
        }
    }

    Match::Complete(steps.len())
}

use EventKind::*;

const DRAG: &[(EventKind, At)] = &[(PressPrimary, At::Any), (ReleasePrimary, At::Other(0))];

const DOUBLE_CLICK: &[(EventKind, At)] = &[
    (PressPrimary, At::Any),
    (ReleasePrimary, At::Same(0)),
    (PressPrimary, At::Same(0)),
    (ReleasePrimary, At::Same(0)),
];

const TWO_CLICK_SWAP: &[(EventKind, At)] = &[
    (PressPrimary, At::Any),
    (ReleasePrimary, At::Same(0)),
    (PressPrimary, At::Any),
    (ReleasePrimary, At::Same(2)),
];

const SECONDARY_CLICK: &[(EventKind, At)] =
    &[(PressSecondary, At::Any), (ReleaseSecondary, At::Same(0))];

const SECONDARY_DRAG: &[(EventKind, At)] =
    &[(PressSecondary, At::Any), (ReleaseSecondary, At::Any)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    Drag,
    DoubleClick,
    TwoClickSwap,
    EdgeActivate,
    RegionFix,
}

/// Priority order for equal-length matches.
const PATTERNS: [Pattern; 5] = [
    Pattern::Drag,
    Pattern::DoubleClick,
    Pattern::TwoClickSwap,
    Pattern::EdgeActivate,
    Pattern::RegionFix,
];

impl Pattern {
    fn steps(self) -> &'static [(EventKind, At)] {
        match self {
            Pattern::Drag => DRAG,
            Pattern::DoubleClick => DOUBLE_CLICK,
            Pattern::TwoClickSwap => TWO_CLICK_SWAP,
            Pattern::EdgeActivate => SECONDARY_CLICK,
            Pattern::RegionFix => SECONDARY_DRAG,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    Command(usize, Command),
    Incomplete,
    Unmatched,
}

/// Stateless matcher; the only thing it knows is the grid shape, to recognize border cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recognizer {
    rows: usize,
    cols: usize,
}

impl Recognizer {
    pub fn new(rows: usize, cols: usize) -> Self {
        Recognizer { rows, cols }
    }

    /// Consumes every recognizable prefix of `log`, returning the commands in order.
    pub fn drain(&self, log: &mut EventLog) -> Vec<Command> {
        let mut commands = vec![];

        loop {
            if log.is_empty() {
                break;
            }

            match self.recognize(log.pending()) {
                Outcome::Command(len, command) => {
                    log::debug!("recognized {:?} from {} events", command, len);
                    log.consume(len);
                    commands.push(command);
                }
                Outcome::Incomplete => break,
                Outcome::Unmatched => {
                    log::trace!("dropping unmatched event {:?}", log.pending()[0]);
                    log.consume(1);
                }
            }
        }

        log.compact();
        commands
    }

    fn recognize(&self, events: &[PointerEvent]) -> Outcome {
        let mut best: Option<(usize, Command)> = None;
        let mut alive = false;

        for pattern in PATTERNS {
            match follow(events, pattern.steps()) {
                Match::Complete(len) => {
                    let command = if let Some(command) = self.command(pattern, &events[..len]) {
                        command
                    } else {
                        continue;
                    };

                    if best.as_ref().map_or(true, |(best_len, _)| len > *best_len) {
                        best = Some((len, command));
                    }
                }
                Match::Partial => alive = true,
                Match::Failed => {}
            }
        }

        match best {
            Some((len, command)) => Outcome::Command(len, command),
            None if alive => Outcome::Incomplete,
            None => Outcome::Unmatched,
        }
    }

    fn command(&self, pattern: Pattern, events: &[PointerEvent]) -> Option<Command> {
        Some(match pattern {
            Pattern::Drag => Command::RegionCycle(Rect::spanning(events[0].cell, events[1].cell)),
            Pattern::DoubleClick => Command::ToggleFixed(events[0].cell),
            Pattern::TwoClickSwap => Command::Swap(events[0].cell, events[2].cell),
            Pattern::EdgeActivate => Command::RotateLine(self.rotation_at(events[0].cell)?),
            Pattern::RegionFix => Command::FixRegion(Rect::spanning(events[0].cell, events[1].cell)),
        })
    }

    /// Top and left borders rotate forward, bottom and right backward. Checked in that order, so
    /// the top row owns both upper corners and the left column owns the lower left one.
    fn rotation_at(&self, cell: Cell) -> Option<Rotation> {
        let (axis, forward) = if cell.row == 0 {
            (Axis::Rows, true)
        } else if cell.col == 0 {
            (Axis::Columns, true)
        } else if cell.row + 1 == self.rows {
            (Axis::Rows, false)
        } else if cell.col + 1 == self.cols {
            (Axis::Columns, false)
        } else {
            return None;
        };

        Some(Rotation { axis, forward })
    }
}

/// Maps pointer pixel coordinates on the displayed image to grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub div_x: usize,
    pub div_y: usize,
}

impl Geometry {
    /// `None` for points outside the image, including the sliver left over when the image size is
    /// not a multiple of the tile size.
    pub fn cell_at(&self, x: i32, y: i32) -> Option<Cell> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }

        let tile_w = self.width as usize / self.div_x.max(1);
        let tile_h = self.height as usize / self.div_y.max(1);
        if tile_w == 0 || tile_h == 0 {
            return None;
        }

        let cell = Cell::new(y as usize / tile_h, x as usize / tile_w);
        if cell.row >= self.div_y || cell.col >= self.div_x {
            return None;
        }
        Some(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn ev(kind: EventKind, row: usize, col: usize) -> PointerEvent {
        PointerEvent::new(kind, Cell::new(row, col))
    }

    fn log_of(events: &[PointerEvent]) -> EventLog {
        let mut log = EventLog::default();
        for event in events {
            log.push(*event);
        }
        log
    }

    #[test]
    fn test_double_click_is_one_command() {
        let recognizer = Recognizer::new(4, 4);
        let mut log = log_of(&[
            ev(PressPrimary, 1, 2),
            ev(ReleasePrimary, 1, 2),
            ev(PressPrimary, 1, 2),
            ev(ReleasePrimary, 1, 2),
        ]);

        assert_eq!(
            recognizer.recognize(log.pending()),
            Outcome::Command(4, Command::ToggleFixed(Cell::new(1, 2)))
        );
        assert_eq!(
            recognizer.drain(&mut log),
            vec![Command::ToggleFixed(Cell::new(1, 2))]
        );
        assert!(log.is_empty());
    }

    #[test]
    fn test_drag_spans_rectangle() {
        let recognizer = Recognizer::new(4, 4);
        let mut log = log_of(&[ev(PressPrimary, 3, 0), ev(ReleasePrimary, 1, 2)]);

        assert_eq!(
            recognizer.drain(&mut log),
            vec![Command::RegionCycle(Rect {
                top_left: Cell::new(1, 0),
                bottom_right: Cell::new(3, 2),
            })]
        );
        assert!(log.is_empty());
    }

    #[test]
    fn test_two_clicks_swap() {
        let recognizer = Recognizer::new(4, 4);
        let mut log = log_of(&[
            ev(PressPrimary, 0, 0),
            ev(ReleasePrimary, 0, 0),
            ev(PressPrimary, 2, 3),
            ev(ReleasePrimary, 2, 3),
        ]);

        assert_eq!(
            recognizer.drain(&mut log),
            vec![Command::Swap(Cell::new(0, 0), Cell::new(2, 3))]
        );
    }

    #[test]
    fn test_single_click_waits() {
        let recognizer = Recognizer::new(4, 4);
        let mut log = log_of(&[ev(PressPrimary, 1, 1), ev(ReleasePrimary, 1, 1)]);

        assert!(recognizer.drain(&mut log).is_empty());
        assert_eq!(log.len(), 2);

        log.push(ev(PressPrimary, 1, 1));
        assert!(recognizer.drain(&mut log).is_empty());
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_click_then_drag_drops_click() {
        let recognizer = Recognizer::new(4, 4);
        let mut log = log_of(&[
            ev(PressPrimary, 1, 1),
            ev(ReleasePrimary, 1, 1),
            ev(PressPrimary, 2, 2),
            ev(ReleasePrimary, 3, 3),
        ]);

        assert_eq!(
            recognizer.drain(&mut log),
            vec![Command::RegionCycle(Rect::spanning(
                Cell::new(2, 2),
                Cell::new(3, 3)
            ))]
        );
        assert!(log.is_empty());
    }

    #[test]
    fn test_unmatched_head_is_dropped() {
        let recognizer = Recognizer::new(4, 4);
        let mut log = log_of(&[
            ev(ReleasePrimary, 0, 0),
            ev(ReleaseSecondary, 2, 2),
            ev(PressPrimary, 1, 1),
        ]);

        assert!(recognizer.drain(&mut log).is_empty());
        assert_eq!(log.pending(), &[ev(PressPrimary, 1, 1)]);
    }

    #[test]
    fn test_mixed_buttons_never_deadlock() {
        let recognizer = Recognizer::new(4, 4);
        let mut log = log_of(&[
            ev(PressPrimary, 1, 1),
            ev(ReleaseSecondary, 1, 1),
            ev(PressSecondary, 1, 1),
            ev(ReleasePrimary, 1, 1),
        ]);

        assert!(recognizer.drain(&mut log).is_empty());
        assert!(log.is_empty());
    }

    #[test]
    fn test_secondary_click_on_border_rotates() {
        let recognizer = Recognizer::new(3, 4);
        let cases = [
            ((0, 2), Axis::Rows, true),
            ((0, 0), Axis::Rows, true),
            ((1, 0), Axis::Columns, true),
            ((2, 0), Axis::Columns, true),
            ((2, 1), Axis::Rows, false),
            ((1, 3), Axis::Columns, false),
        ];

        for ((row, col), axis, forward) in cases {
            let mut log = log_of(&[
                ev(PressSecondary, row, col),
                ev(ReleaseSecondary, row, col),
            ]);
            assert_eq!(
                recognizer.drain(&mut log),
                vec![Command::RotateLine(Rotation { axis, forward })],
                "border cell ({row}, {col})"
            );
        }
    }

    #[test]
    fn test_secondary_click_inside_fixes_cell() {
        let recognizer = Recognizer::new(3, 3);
        let mut log = log_of(&[ev(PressSecondary, 1, 1), ev(ReleaseSecondary, 1, 1)]);

        assert_eq!(
            recognizer.drain(&mut log),
            vec![Command::FixRegion(Rect::spanning(
                Cell::new(1, 1),
                Cell::new(1, 1)
            ))]
        );
    }

    #[test]
    fn test_secondary_drag_fixes_region() {
        let recognizer = Recognizer::new(3, 3);
        let mut log = log_of(&[ev(PressSecondary, 0, 0), ev(ReleaseSecondary, 2, 1)]);

        assert_matches!(
            recognizer.drain(&mut log).as_slice(),
            [Command::FixRegion(rect)] if *rect == Rect::spanning(Cell::new(0, 0), Cell::new(2, 1))
        );
    }

    #[test]
    fn test_log_compacts_consumed_events() {
        let recognizer = Recognizer::new(4, 4);
        let mut log = EventLog::new(4);

        for _ in 0..3 {
            log.push(ev(PressPrimary, 0, 0));
            log.push(ev(ReleasePrimary, 0, 1));
        }
        log.push(ev(PressPrimary, 2, 2));

        assert_eq!(recognizer.drain(&mut log).len(), 3);
        assert_eq!(log.len(), 1);
        assert_eq!(log.stored(), 1);
    }

    #[test]
    fn test_geometry_cell_at() {
        let geometry = Geometry {
            width: 100,
            height: 62,
            div_x: 4,
            div_y: 3,
        };

        assert_eq!(geometry.cell_at(0, 0), Some(Cell::new(0, 0)));
        assert_eq!(geometry.cell_at(99, 59), Some(Cell::new(2, 3)));
        assert_eq!(geometry.cell_at(30, 25), Some(Cell::new(1, 1)));
        // 62 / 3 leaves a two pixel sliver below the last row.
        assert_eq!(geometry.cell_at(10, 61), None);
        assert_eq!(geometry.cell_at(-1, 10), None);
        assert_eq!(geometry.cell_at(100, 10), None);
    }
}
