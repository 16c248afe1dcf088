//! Error types for the analog keyboard pipeline

use crate::keyboard::HidKey;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while building a key code table
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyMapError {
    /// The code does not fit into a single HID byte
    #[error("invalid key code {0}, expected a value in 0..=255")]
    CodeOutOfRange(i32),
    /// The code is already mapped to another key
    #[error("key code {code:#04x} is already mapped to {existing}, cannot map it to {requested}")]
    CodeConflict {
        code: u8,
        existing: HidKey,
        requested: HidKey,
    },
}

/// Errors reported by a HID transport
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to open device: {0}")]
    Open(String),
    #[error("read failed: {0}")]
    Read(String),
    #[error("device enumeration failed: {0}")]
    Enumerate(String),
    #[error("device is not open")]
    Closed,
}

/// Lifecycle misuse and startup failures of a keyboard session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("keyboard is already open")]
    AlreadyOpen,
    #[error("keyboard is not open")]
    NotOpen,
    #[error("keyboard session has already been closed, create a new session to read again")]
    Spent,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to spawn reader thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Errors raised by the device registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("keyboards did not close within {timeout:?}: {}", .open.join(", "))]
    ShutdownTimeout { timeout: Duration, open: Vec<String> },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to start event threads: {0}")]
    Spawn(#[source] io::Error),
}

/// Errors raised while loading the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
