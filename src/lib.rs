//! Analog Keys - analog keyboard input pipeline
//!
//! Reads pressure-sensitive keyboards over HID and turns their reports into
//! per-key pressure changes. Recognized keyboards are tracked as they are
//! plugged in and out, and every change is delivered to listeners on a small
//! worker pool.

pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod keyboard;
pub mod manager;

pub use config::Config;
pub use error::{ConfigError, KeyMapError, RegistryError, SessionError, TransportError};
pub use event::{AnalogKeyboardListener, EventBus, KeyboardEvent, ListenerId};
pub use keyboard::{AnalogKeyState, HidKey, KeyMap, KeyStates, ReportParser};
pub use manager::AnalogKeyboardManager;
