use crate::error::Result;
use crate::grid::{Board, Cell, ImageId, TileState};
use crate::history::History;
use crate::recognizer::{Command, EventLog, PointerEvent, Recognizer};

/// Applies recognized commands to the board. Every mutation is preceded by a history save, so an
/// undo right after any command restores the exact previous state.
#[derive(Debug, Clone)]
pub struct Editor {
    board: Board,
    history: History,
    events: EventLog,
    recognizer: Recognizer,
}

impl Editor {
    pub fn new(board: Board, history: History, events: EventLog) -> Self {
        Editor {
            recognizer: Recognizer::new(board.rows(), board.cols()),
            board,
            history,
            events,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn into_board(self) -> Board {
        self.board
    }

    /// Buffers `event` and applies whatever commands it completes.
    pub fn push_event(&mut self, event: PointerEvent) -> Vec<Command> {
        if !self.board.contains(event.cell) {
            log::warn!(
                "ignoring {:?} outside the {}x{} grid",
                event,
                self.board.cols(),
                self.board.rows()
            );
            return vec![];
        }

        self.events.push(event);
        let commands = self.recognizer.drain(&mut self.events);
        for command in &commands {
            self.apply(command);
        }
        commands
    }

    pub fn apply(&mut self, command: &Command) {
        self.history.save(&self.board);

        match command {
            Command::RegionCycle(rect) => {
                for cell in rect.cells() {
                    let state = self.board.state(cell);
                    self.board.set_state(cell, state.cycled());
                }
            }
            Command::ToggleFixed(cell) => {
                let state = self.board.state(*cell);
                self.board.set_state(*cell, state.toggled_fixed());
            }
            Command::Swap(a, b) => self.board.swap(*a, *b),
            Command::RotateLine(rotation) => self.board.rotate(*rotation),
            Command::FixRegion(rect) => {
                for cell in rect.cells() {
                    if !self.board.state(cell).is_fixed() {
                        self.board.set_state(cell, TileState::Fixed);
                    }
                }
            }
        }
    }

    pub fn undo(&mut self) -> bool {
        self.history.restore(&mut self.board, &mut self.events)
    }

    pub fn clear_all(&mut self) {
        self.history.clear_all(&mut self.board);
    }

    /// Installs a solver result. Group tags are dropped; fixed tiles kept their cells.
    pub fn install_guess(&mut self, arrangement: ndarray::Array2<ImageId>) -> Result<()> {
        // Taken up front so a rejected arrangement leaves no history entry behind.
        let before = self.board.snapshot();
        self.board.install(arrangement)?;
        self.history.push(before);

        let grouped = self
            .board
            .states()
            .indexed_iter()
            .filter(|(_, state)| matches!(state, TileState::Grouped(_)))
            .map(|((row, col), _)| Cell::new(row, col))
            .collect::<Vec<_>>();
        for cell in grouped {
            self.board.set_state(cell, TileState::Free);
        }
        Ok(())
    }
}
