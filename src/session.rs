//! The interactive editing session and its control loop.
//!
//! A [`Session`] is an explicit context owned by the caller. The windowing layer drives it either
//! by calling [`Session::pointer`] and [`Session::control`] from its own callbacks, or by
//! implementing [`Frontend`] and handing control to [`Session::run`].

use std::sync::Arc;
use std::time::Duration;

use crate::dispatch::Dispatcher;
use crate::editor::Editor;
use crate::error::Result;
use crate::grid::{Board, ImageId};
use crate::history::History;
use crate::recognizer::{Command, EventLog, PointerEvent};
use crate::solver::{self, Cost, Problem};

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Upper bound on how long the loop waits for input before polling submissions.
    pub poll_interval_ms: u64,
    /// Maximum undo depth; `None` keeps everything.
    pub history_depth: Option<usize>,
    /// Consumed pointer events kept before the event log is compacted.
    pub compact_threshold: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            poll_interval_ms: 100,
            history_depth: None,
            compact_threshold: 64,
        }
    }
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Primary,
    Secondary,
}

/// Tokens the key-binding adapter routes to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Submit,
    Finish,
    PrimaryGuess,
    SecondaryGuess,
    Undo,
    ClearAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Pointer(PointerEvent),
    Control(Control),
}

/// The windowing side of [`Session::run`].
pub trait Frontend {
    /// Waits at most `timeout` for the next input; `None` on timeout.
    fn next_input(&mut self, timeout: Duration) -> Option<Input>;

    fn redraw(&mut self, board: &Board);
}

type Submitter = Arc<dyn Fn(ndarray::Array2<ImageId>) -> anyhow::Result<()> + Send + Sync>;

pub struct Session<'a> {
    config: SessionConfig,
    editor: Editor,
    dispatcher: Dispatcher,
    primary: Box<dyn Cost + 'a>,
    secondary: Option<Box<dyn Cost + 'a>>,
    submitter: Option<Submitter>,
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("editor", &self.editor)
            .field("pending_submissions", &self.dispatcher.pending())
            .field("has_secondary", &self.secondary.is_some())
            .field("has_submitter", &self.submitter.is_some())
            .finish()
    }
}

impl<'a> Session<'a> {
    pub fn new(config: SessionConfig, board: Board, primary: impl Cost + 'a) -> Self {
        let editor = Editor::new(
            board,
            History::new(config.history_depth),
            EventLog::new(config.compact_threshold),
        );

        Session {
            config,
            editor,
            dispatcher: Dispatcher::new(),
            primary: Box::new(primary),
            secondary: None,
            submitter: None,
        }
    }

    /// Alternate predicate used by [`Control::SecondaryGuess`].
    pub fn with_secondary(mut self, cost: impl Cost + 'a) -> Self {
        self.set_secondary(cost);
        self
    }

    /// Replaces the secondary predicate of a running session.
    pub fn set_secondary(&mut self, cost: impl Cost + 'a) {
        self.secondary = Some(Box::new(cost));
    }

    /// Callback run in the background on [`Control::Submit`].
    pub fn with_submitter<F>(mut self, submitter: F) -> Self
    where
        F: Fn(ndarray::Array2<ImageId>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.submitter = Some(Arc::new(submitter));
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn board(&self) -> &Board {
        self.editor.board()
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn pending_submissions(&self) -> usize {
        self.dispatcher.pending()
    }

    pub fn pointer(&mut self, event: PointerEvent) -> Vec<Command> {
        self.editor.push_event(event)
    }

    /// Handles every token except [`Control::Finish`], which only [`Session::run`] acts on.
    /// Failures are logged and leave the board as it was.
    pub fn control(&mut self, control: Control) {
        match control {
            Control::Submit => {
                if let Err(err) = self.submit() {
                    log::error!("submission not started: {}", err);
                }
            }
            Control::PrimaryGuess => self.guess_logged(Predicate::Primary),
            Control::SecondaryGuess => self.guess_logged(Predicate::Secondary),
            Control::Undo => {
                if !self.editor.undo() {
                    log::debug!("nothing to undo");
                }
            }
            Control::ClearAll => self.editor.clear_all(),
            Control::Finish => {}
        }
    }

    pub fn submit(&mut self) -> Result<()> {
        let submitter = if let Some(submitter) = &self.submitter {
            submitter.clone()
        } else {
            log::warn!("no submitter configured, ignoring submit");
            return Ok(());
        };

        self.dispatcher
            .spawn(self.editor.board().arrangement(), move |arrangement| {
                submitter(arrangement)
            })
    }

    /// Solves the current constraints and installs the result. Returns `false` when nothing was
    /// installed because no placement of the groups exists or no such predicate was configured.
    pub fn guess(&mut self, predicate: Predicate) -> Result<bool> {
        let cost: &dyn Cost = match predicate {
            Predicate::Primary => self.primary.as_ref(),
            Predicate::Secondary => {
                if let Some(cost) = &self.secondary {
                    cost.as_ref()
                } else {
                    log::warn!("no secondary predicate configured");
                    return Ok(false);
                }
            }
        };

        let guess = solver::solve(Problem::from_board(self.editor.board()), cost)?;
        let arrangement = if let Some(arrangement) = guess.arrangement {
            arrangement
        } else {
            log::warn!("groups cannot be placed, arrangement left unchanged");
            return Ok(false);
        };

        log::info!("installing {:?} guess with cost {}", predicate, guess.cost);
        self.editor.install_guess(arrangement)?;
        Ok(true)
    }

    fn guess_logged(&mut self, predicate: Predicate) {
        if let Err(err) = self.guess(predicate) {
            log::error!("{:?} guess failed: {}", predicate, err);
        }
    }

    /// Runs the control loop until the frontend sends [`Control::Finish`].
    pub fn run<F: Frontend + ?Sized>(mut self, frontend: &mut F) -> ndarray::Array2<ImageId> {
        frontend.redraw(self.editor.board());

        loop {
            let input = frontend.next_input(self.config.poll_interval());
            self.dispatcher.poll();

            match input {
                Some(Input::Control(Control::Finish)) => break,
                Some(Input::Control(control)) => self.control(control),
                Some(Input::Pointer(event)) => {
                    self.pointer(event);
                }
                None => {}
            }

            frontend.redraw(self.editor.board());
        }

        self.finish()
    }

    /// Waits for outstanding submissions and hands back the final arrangement.
    pub fn finish(mut self) -> ndarray::Array2<ImageId> {
        self.dispatcher.join_all();
        self.editor.into_board().into_arrangement()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Cell, TileState};
    use crate::recognizer::EventKind::*;
    use crate::solver::Direction;
    use assert_matches::assert_matches;
    use std::collections::VecDeque;
    use std::sync::mpsc;

    fn ids(v: &[usize]) -> Vec<ImageId> {
        v.iter().map(|i| ImageId(*i)).collect()
    }

    fn truth(cols: usize) -> impl Fn(ImageId, ImageId, Direction) -> f64 {
        move |a: ImageId, b: ImageId, direction: Direction| match direction {
            Direction::Right if b.0 == a.0 + 1 && a.0 % cols + 1 < cols => 0.0,
            Direction::Down if b.0 == a.0 + cols => 0.0,
            _ => 1.0,
        }
    }

    fn identity(div_x: usize, div_y: usize) -> ndarray::Array2<ImageId> {
        ndarray::Array2::from_shape_vec((div_y, div_x), (0..div_x * div_y).map(ImageId).collect())
            .unwrap()
    }

    fn click(row: usize, col: usize) -> [Input; 2] {
        [
            Input::Pointer(PointerEvent::new(PressPrimary, Cell::new(row, col))),
            Input::Pointer(PointerEvent::new(ReleasePrimary, Cell::new(row, col))),
        ]
    }

    struct Script {
        inputs: VecDeque<Input>,
        redraws: usize,
    }

    impl Frontend for Script {
        fn next_input(&mut self, _timeout: Duration) -> Option<Input> {
            Some(
                self.inputs
                    .pop_front()
                    .unwrap_or(Input::Control(Control::Finish)),
            )
        }

        fn redraw(&mut self, _board: &Board) {
            self.redraws += 1;
        }
    }

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.history_depth, None);
    }

    #[test]
    fn test_config_from_json() {
        let empty: SessionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, SessionConfig::default());

        // Keys are camelCase; snake_case spellings are not recognized.
        let config: SessionConfig = serde_json::from_str(
            r#"{ "pollIntervalMs": 20, "historyDepth": 0, "compact_threshold": 3 }"#,
        )
        .unwrap();
        assert_eq!(
            config,
            SessionConfig {
                poll_interval_ms: 20,
                history_depth: Some(0),
                compact_threshold: 64,
            }
        );

        let unbounded: SessionConfig =
            serde_json::from_str(r#"{ "historyDepth": null, "compactThreshold": 8 }"#).unwrap();
        assert_eq!(unbounded.history_depth, None);
        assert_eq!(unbounded.compact_threshold, 8);
    }

    #[test]
    fn test_zero_history_depth_disables_undo() {
        let config: SessionConfig = serde_json::from_str(r#"{ "historyDepth": 0 }"#).unwrap();
        let board = Board::from_rows(2, 2, ids(&[1, 0, 2, 3])).unwrap();
        let mut session = Session::new(config, board, truth(2));

        for input in click(0, 0).into_iter().chain(click(0, 1)) {
            if let Input::Pointer(event) = input {
                session.pointer(event);
            }
        }
        assert_eq!(session.board().arrangement(), &identity(2, 2));

        session.control(Control::Undo);
        assert_eq!(session.board().arrangement(), &identity(2, 2));
        assert!(session.editor().history().is_empty());
    }

    #[test]
    fn test_set_secondary_on_running_session() {
        let board = Board::from_rows(2, 2, ids(&[3, 2, 1, 0])).unwrap();
        let flat = |_: ImageId, _: ImageId, _: Direction| 1.0;
        let mut session = Session::new(SessionConfig::default(), board, flat);

        assert_matches!(session.guess(Predicate::Secondary), Ok(false));
        session.set_secondary(truth(2));
        assert_matches!(session.guess(Predicate::Secondary), Ok(true));
        assert_eq!(session.board().arrangement(), &identity(2, 2));
    }

    #[test]
    fn test_run_loop() {
        let board = Board::from_rows(2, 2, ids(&[1, 0, 2, 3])).unwrap();
        let (tx, rx) = mpsc::channel();
        let tx = std::sync::Mutex::new(tx);
        let session = Session::new(SessionConfig::default(), board, truth(2)).with_submitter(
            move |arrangement| {
                tx.lock()
                    .map_err(|_| anyhow::anyhow!("poisoned"))?
                    .send(arrangement)?;
                Ok(())
            },
        );

        let mut inputs = VecDeque::new();
        inputs.extend(click(0, 0));
        inputs.extend(click(0, 1));
        inputs.push_back(Input::Control(Control::Submit));
        inputs.push_back(Input::Control(Control::Undo));
        inputs.push_back(Input::Control(Control::PrimaryGuess));
        let mut script = Script {
            inputs,
            redraws: 0,
        };

        let finished = session.run(&mut script);

        assert_eq!(finished, identity(2, 2));
        assert_eq!(rx.recv().unwrap(), identity(2, 2));
        assert_eq!(script.redraws, 8);
    }

    #[test]
    fn test_guess_without_secondary_does_nothing() {
        let board = Board::from_rows(2, 2, ids(&[3, 2, 1, 0])).unwrap();
        let mut session = Session::new(SessionConfig::default(), board.clone(), truth(2));

        assert_matches!(session.guess(Predicate::Secondary), Ok(false));
        assert_eq!(session.board(), &board);
    }

    #[test]
    fn test_secondary_guess_uses_its_own_predicate() {
        let calls = std::cell::Cell::new(0usize);
        let counting = |a: ImageId, b: ImageId, direction: Direction| {
            calls.set(calls.get() + 1);
            truth(2)(a, b, direction)
        };

        let board = Board::from_rows(2, 2, ids(&[3, 2, 1, 0])).unwrap();
        let mut session =
            Session::new(SessionConfig::default(), board, |_: ImageId, _: ImageId, _: Direction| {
                1.0
            })
            .with_secondary(counting);

        session.control(Control::SecondaryGuess);
        assert_eq!(session.board().arrangement(), &identity(2, 2));
        drop(session);
        assert!(calls.get() > 0);
    }

    #[test]
    fn test_failed_guess_leaves_board_alone() {
        let mut board = Board::from_rows(2, 2, ids(&[3, 2, 1, 0])).unwrap();
        board.set_state(Cell::new(0, 0), TileState::Fixed);
        let nan = |_: ImageId, _: ImageId, _: Direction| f64::NAN;
        let mut session = Session::new(SessionConfig::default(), board.clone(), nan);

        assert!(session.guess(Predicate::Primary).is_err());
        session.control(Control::PrimaryGuess);
        assert_eq!(session.board(), &board);
        assert!(session.editor().history().is_empty());
    }

    #[test]
    fn test_guess_keeps_fixed_and_drops_groups() {
        let mut board = Board::from_rows(3, 2, ids(&[4, 0, 5, 3, 1, 2])).unwrap();
        board.set_state(Cell::new(1, 1), TileState::Fixed);
        board.set_state(Cell::new(0, 1), TileState::Grouped(0));
        board.set_state(Cell::new(0, 2), TileState::Grouped(0));
        let mut session = Session::new(SessionConfig::default(), board, truth(3));

        assert_matches!(session.guess(Predicate::Primary), Ok(true));

        let board = session.board();
        assert_eq!(board.get(Cell::new(1, 1)), ImageId(1));
        assert_eq!(board.state(Cell::new(1, 1)), TileState::Fixed);
        assert!(board
            .states()
            .iter()
            .all(|state| !matches!(state, TileState::Grouped(_))));

        // The pair keeps its shape wherever it lands.
        let ((row, col), _) = board
            .arrangement()
            .indexed_iter()
            .find(|(_, id)| **id == ImageId(0))
            .unwrap();
        assert_eq!(board.get(Cell::new(row, col + 1)), ImageId(5));

        let mut placed = board.arrangement().iter().map(|id| id.0).collect::<Vec<_>>();
        placed.sort_unstable();
        assert_eq!(placed, (0..6).collect::<Vec<_>>());
        assert_eq!(session.editor().history().len(), 1);
    }
}
