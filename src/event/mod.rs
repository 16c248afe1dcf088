//! Keyboard events and their delivery to listeners

mod bus;
mod pool;

pub use bus::{EventBus, ListenerId};

use crate::device::KeyboardSession;
use crate::keyboard::KeyStates;
use std::sync::Arc;

/// Receiver of analog keyboard events.
///
/// Implement the callbacks you need, the rest default to doing nothing.
/// Callbacks run on the event pool, never on a keyboard's reader thread, so
/// a slow listener delays other deliveries but never device reads.
pub trait AnalogKeyboardListener: Send + Sync {
    /// Key pressures of an open keyboard changed
    fn key_pressed(&self, _keyboard: &Arc<KeyboardSession>, _states: &KeyStates) {}

    /// A supported keyboard was attached
    fn keyboard_added(&self, _keyboard: &Arc<KeyboardSession>) {}

    /// A supported keyboard was detached, or the subsystem stopped
    fn keyboard_removed(&self, _keyboard: &Arc<KeyboardSession>) {}

    /// A keyboard was opened and is being read
    fn keyboard_opened(&self, _keyboard: &Arc<KeyboardSession>) {}

    /// A keyboard stopped being read and was closed
    fn keyboard_closed(&self, _keyboard: &Arc<KeyboardSession>) {}

    /// Reading from a keyboard failed
    fn keyboard_error(&self, _keyboard: &Arc<KeyboardSession>, _message: &str) {}
}

/// An event published on the [`EventBus`]
#[derive(Debug, Clone)]
pub enum KeyboardEvent {
    KeyPressed {
        keyboard: Arc<KeyboardSession>,
        states: KeyStates,
    },
    Added(Arc<KeyboardSession>),
    Removed(Arc<KeyboardSession>),
    Opened(Arc<KeyboardSession>),
    Closed(Arc<KeyboardSession>),
    Error {
        keyboard: Arc<KeyboardSession>,
        message: String,
    },
}

impl KeyboardEvent {
    /// The keyboard the event is about
    pub fn keyboard(&self) -> &Arc<KeyboardSession> {
        match self {
            KeyboardEvent::KeyPressed { keyboard, .. }
            | KeyboardEvent::Error { keyboard, .. }
            | KeyboardEvent::Added(keyboard)
            | KeyboardEvent::Removed(keyboard)
            | KeyboardEvent::Opened(keyboard)
            | KeyboardEvent::Closed(keyboard) => keyboard,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            KeyboardEvent::KeyPressed { .. } => "key pressed",
            KeyboardEvent::Added(_) => "keyboard added",
            KeyboardEvent::Removed(_) => "keyboard removed",
            KeyboardEvent::Opened(_) => "keyboard opened",
            KeyboardEvent::Closed(_) => "keyboard closed",
            KeyboardEvent::Error { .. } => "keyboard error",
        }
    }

    /// Invoke the matching callback of `listener`
    pub fn dispatch(&self, listener: &dyn AnalogKeyboardListener) {
        match self {
            KeyboardEvent::KeyPressed { keyboard, states } => listener.key_pressed(keyboard, states),
            KeyboardEvent::Added(keyboard) => listener.keyboard_added(keyboard),
            KeyboardEvent::Removed(keyboard) => listener.keyboard_removed(keyboard),
            KeyboardEvent::Opened(keyboard) => listener.keyboard_opened(keyboard),
            KeyboardEvent::Closed(keyboard) => listener.keyboard_closed(keyboard),
            KeyboardEvent::Error { keyboard, message } => listener.keyboard_error(keyboard, message),
        }
    }
}
