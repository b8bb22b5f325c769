use std::collections::VecDeque;

use crate::grid::{Board, Snapshot};
use crate::recognizer::EventLog;

/// LIFO stack of board snapshots.
///
/// With a depth bound the oldest snapshot is evicted once the stack is full.
#[derive(Debug, Clone, Default)]
pub struct History {
    snapshots: VecDeque<Snapshot>,
    max_depth: Option<usize>,
}

impl History {
    pub fn new(max_depth: Option<usize>) -> Self {
        History {
            snapshots: VecDeque::new(),
            max_depth,
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn save(&mut self, board: &Board) {
        self.push(board.snapshot());
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        if let Some(max_depth) = self.max_depth {
            if max_depth == 0 {
                return;
            }
            while self.snapshots.len() >= max_depth {
                self.snapshots.pop_front();
                log::debug!("history full at {}, evicted oldest snapshot", max_depth);
            }
        }
        self.snapshots.push_back(snapshot);
    }

    /// Installs the most recent snapshot and drops any half-entered command, whose events refer
    /// to cells of the state being undone. Returns `false` when there is nothing to undo.
    pub fn restore(&mut self, board: &mut Board, events: &mut EventLog) -> bool {
        let snapshot = if let Some(snapshot) = self.snapshots.pop_back() {
            snapshot
        } else {
            return false;
        };

        board.restore(snapshot);
        events.clear();
        true
    }

    pub fn clear_all(&mut self, board: &mut Board) {
        self.save(board);
        board.reset_states();
    }
}
