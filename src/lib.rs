pub mod dispatch;
pub mod editor;
pub mod error;
pub mod grid;
pub mod history;
pub mod recognizer;
pub mod session;
pub mod solver;

pub use error::{Error, Result};

use wasm_bindgen::prelude::*;

#[wasm_bindgen(start)]
pub fn main_js() {
    console_error_panic_hook::set_once();
    wasm_log::init(wasm_log::Config::default());
}

#[wasm_bindgen]
#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionArgs {
    div_x: usize,
    div_y: usize,
    width: u32,
    height: u32,
    arrangement: Vec<grid::ImageId>,
    #[serde(default)]
    config: session::SessionConfig,
}

#[wasm_bindgen]
impl SessionArgs {
    #[wasm_bindgen(js_name = fromJs)]
    pub fn from_js(v: JsValue) -> std::result::Result<SessionArgs, serde_wasm_bindgen::Error> {
        serde_wasm_bindgen::from_value(v)
    }
}

/// A JS `(a, b, direction) => number` used as a cost predicate.
struct JsCost(js_sys::Function);

impl solver::Cost for JsCost {
    fn cost(&self, a: grid::ImageId, b: grid::ImageId, direction: solver::Direction) -> f64 {
        let result = self.0.call3(
            &JsValue::NULL,
            &JsValue::from_f64(a.0 as f64),
            &JsValue::from_f64(b.0 as f64),
            &JsValue::from_str(direction.as_str()),
        );

        match result.map(|v| v.as_f64()) {
            Ok(Some(cost)) => cost,
            Ok(None) => {
                log::warn!("cost predicate returned a non-number for {:?}", (a, b, direction));
                f64::INFINITY
            }
            Err(err) => {
                log::warn!("cost predicate threw: {:?}", err);
                f64::INFINITY
            }
        }
    }
}

#[wasm_bindgen]
pub struct GuessSession {
    session: session::Session<'static>,
    geometry: recognizer::Geometry,
}

#[wasm_bindgen]
impl GuessSession {
    #[wasm_bindgen(constructor)]
    pub fn new(args: SessionArgs, cost: js_sys::Function) -> std::result::Result<GuessSession, JsError> {
        let board = grid::Board::from_rows(args.div_x, args.div_y, args.arrangement)?;
        Ok(GuessSession {
            session: session::Session::new(args.config, board, JsCost(cost)),
            geometry: recognizer::Geometry {
                width: args.width,
                height: args.height,
                div_x: args.div_x,
                div_y: args.div_y,
            },
        })
    }

    #[wasm_bindgen(js_name = setSecondary)]
    pub fn set_secondary(&mut self, cost: js_sys::Function) {
        self.session.set_secondary(JsCost(cost));
    }

    /// Feeds a mouse event in image pixels. `button` follows `MouseEvent.button`: 0 is primary,
    /// 2 is secondary. Returns whether any command was applied.
    pub fn pointer(&mut self, button: i16, down: bool, x: i32, y: i32) -> bool {
        let kind = match (button, down) {
            (0, true) => recognizer::EventKind::PressPrimary,
            (0, false) => recognizer::EventKind::ReleasePrimary,
            (2, true) => recognizer::EventKind::PressSecondary,
            (2, false) => recognizer::EventKind::ReleaseSecondary,
            _ => return false,
        };

        match self.geometry.cell_at(x, y) {
            Some(cell) => !self
                .session
                .pointer(recognizer::PointerEvent::new(kind, cell))
                .is_empty(),
            None => {
                log::debug!("ignoring pointer at ({}, {}) outside the image", x, y);
                false
            }
        }
    }

    pub fn undo(&mut self) {
        self.session.control(session::Control::Undo);
    }

    #[wasm_bindgen(js_name = clearAll)]
    pub fn clear_all(&mut self) {
        self.session.control(session::Control::ClearAll);
    }

    /// Returns whether a guess was installed.
    pub fn guess(&mut self, secondary: bool) -> std::result::Result<bool, JsError> {
        let predicate = if secondary {
            session::Predicate::Secondary
        } else {
            session::Predicate::Primary
        };
        Ok(self.session.guess(predicate)?)
    }

    /// Row-major image ids.
    pub fn arrangement(&self) -> Vec<usize> {
        self.session.board().arrangement().iter().map(|id| id.0).collect()
    }

    #[wasm_bindgen(js_name = tileStates)]
    pub fn tile_states(&self) -> std::result::Result<JsValue, serde_wasm_bindgen::Error> {
        let states = self.session.board().states().iter().collect::<Vec<_>>();
        serde_wasm_bindgen::to_value(&states)
    }

    /// Ends the session, returning the final row-major arrangement.
    pub fn finish(self) -> Vec<usize> {
        self.session.finish().iter().map(|id| id.0).collect()
    }
}
