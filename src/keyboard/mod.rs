//! Key codes, analog key states and report parsing

pub mod keymap;
mod parser;
mod state;

pub use keymap::{default_keymap, HidKey, KeyMap};
pub use parser::{ReportParser, RECORD_SIZE};
pub use state::{AnalogKeyState, KeyStates};
