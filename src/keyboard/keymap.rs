//! Semantic key identifiers and the HID key code table
//!
//! Analog reports identify keys by a single-byte USB HID usage code (usage
//! page 0x07). [`KeyMap`] translates those bytes into [`HidKey`]s. The default
//! table is built once per process and shared read-only; keyboards with extra
//! codes derive a new table with [`KeyMap::extended`] instead of touching the
//! shared one.

use crate::error::KeyMapError;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// A key, independent of the hardware code used to report it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum HidKey {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    N1,
    N2,
    N3,
    N4,
    N5,
    N6,
    N7,
    N8,
    N9,
    N0,
    Enter,
    Escape,
    Backspace,
    Tab,
    Space,
    Minus,
    Equal,
    BracketLeft,
    BracketRight,
    Backslash,
    Semicolon,
    Quote,
    Backquote,
    Comma,
    Period,
    Slash,
    CapsLock,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    PrintScreen,
    ScrollLock,
    PauseBreak,
    Insert,
    Home,
    PageUp,
    Delete,
    End,
    PageDown,
    ArrowRight,
    ArrowLeft,
    ArrowDown,
    ArrowUp,
    NumLock,
    NumpadDivide,
    NumpadMultiply,
    NumpadSubtract,
    NumpadAdd,
    NumpadEnter,
    Numpad1,
    Numpad2,
    Numpad3,
    Numpad4,
    Numpad5,
    Numpad6,
    Numpad7,
    Numpad8,
    Numpad9,
    Numpad0,
    NumpadDecimal,
    InternationalBackslash,
    ContextMenu,
    Power,
    NumpadEqual,
    F13,
    F14,
    F15,
    F16,
    F17,
    F18,
    F19,
    F20,
    F21,
    F22,
    F23,
    F24,
    Open,
    Help,
    Again,
    Undo,
    Cut,
    Copy,
    Paste,
    Find,
    VolumeMute,
    VolumeUp,
    VolumeDown,
    NumpadComma,
    InternationalRO,
    KanaMode,
    InternationalYen,
    Convert,
    NonConvert,
    Lang1,
    Lang2,
    Lang3,
    Lang4,
    LeftCtrl,
    LeftShift,
    LeftAlt,
    LeftMeta,
    RightCtrl,
    RightShift,
    RightAlt,
    RightMeta,
    /// Fn key reported by some analog keyboards outside the standard usage table
    Fn,
    /// Vendor mode/profile key reported by some analog keyboards
    Mode,
}

impl fmt::Display for HidKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Mapping from HID key codes to [`HidKey`]s
///
/// A code maps to at most one key. Codes are checked against the byte range
/// when registered, so a table can only ever hold codes a report can carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMap {
    keys: HashMap<u8, HidKey>,
}

impl KeyMap {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` under `code`.
    ///
    /// Fails if `code` is not a byte value, or if it is already mapped to a
    /// different key. Registering the same pair twice is a no-op.
    pub fn put(&mut self, key: HidKey, code: i32) -> Result<(), KeyMapError> {
        let code = u8::try_from(code).map_err(|_| KeyMapError::CodeOutOfRange(code))?;

        match self.keys.get(&code) {
            Some(&existing) if existing != key => Err(KeyMapError::CodeConflict {
                code,
                existing,
                requested: key,
            }),
            Some(_) => Ok(()),
            None => {
                self.keys.insert(code, key);
                Ok(())
            }
        }
    }

    /// Look up the key reported under `code`
    pub fn lookup(&self, code: u8) -> Option<HidKey> {
        self.keys.get(&code).copied()
    }

    /// Build a new table holding this table's codes plus `extra`.
    ///
    /// `self` is left untouched, so a shared table can be specialized per
    /// keyboard without affecting other devices.
    pub fn extended(&self, extra: &[(HidKey, i32)]) -> Result<KeyMap, KeyMapError> {
        let mut map = self.clone();
        for &(key, code) in extra {
            map.put(key, code)?;
        }
        Ok(map)
    }

    /// Number of mapped codes
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn insert(&mut self, key: HidKey, code: u8) {
        self.keys.insert(code, key);
    }
}

/// Default USB HID keyboard table, built on first use
static DEFAULT_KEYMAP: LazyLock<Arc<KeyMap>> = LazyLock::new(|| {
    let mut map = KeyMap::new();

    // Letters
    map.insert(HidKey::A, 0x04);
    map.insert(HidKey::B, 0x05);
    map.insert(HidKey::C, 0x06);
    map.insert(HidKey::D, 0x07);
    map.insert(HidKey::E, 0x08);
    map.insert(HidKey::F, 0x09);
    map.insert(HidKey::G, 0x0a);
    map.insert(HidKey::H, 0x0b);
    map.insert(HidKey::I, 0x0c);
    map.insert(HidKey::J, 0x0d);
    map.insert(HidKey::K, 0x0e);
    map.insert(HidKey::L, 0x0f);
    map.insert(HidKey::M, 0x10);
    map.insert(HidKey::N, 0x11);
    map.insert(HidKey::O, 0x12);
    map.insert(HidKey::P, 0x13);
    map.insert(HidKey::Q, 0x14);
    map.insert(HidKey::R, 0x15);
    map.insert(HidKey::S, 0x16);
    map.insert(HidKey::T, 0x17);
    map.insert(HidKey::U, 0x18);
    map.insert(HidKey::V, 0x19);
    map.insert(HidKey::W, 0x1a);
    map.insert(HidKey::X, 0x1b);
    map.insert(HidKey::Y, 0x1c);
    map.insert(HidKey::Z, 0x1d);

    // Number row
    map.insert(HidKey::N1, 0x1e);
    map.insert(HidKey::N2, 0x1f);
    map.insert(HidKey::N3, 0x20);
    map.insert(HidKey::N4, 0x21);
    map.insert(HidKey::N5, 0x22);
    map.insert(HidKey::N6, 0x23);
    map.insert(HidKey::N7, 0x24);
    map.insert(HidKey::N8, 0x25);
    map.insert(HidKey::N9, 0x26);
    map.insert(HidKey::N0, 0x27);

    // Editing and punctuation
    map.insert(HidKey::Enter, 0x28);
    map.insert(HidKey::Escape, 0x29);
    map.insert(HidKey::Backspace, 0x2a);
    map.insert(HidKey::Tab, 0x2b);
    map.insert(HidKey::Space, 0x2c);
    map.insert(HidKey::Minus, 0x2d);
    map.insert(HidKey::Equal, 0x2e);
    map.insert(HidKey::BracketLeft, 0x2f);
    map.insert(HidKey::BracketRight, 0x30);
    map.insert(HidKey::Backslash, 0x31);
    map.insert(HidKey::Semicolon, 0x33);
    map.insert(HidKey::Quote, 0x34);
    map.insert(HidKey::Backquote, 0x35);
    map.insert(HidKey::Comma, 0x36);
    map.insert(HidKey::Period, 0x37);
    map.insert(HidKey::Slash, 0x38);
    map.insert(HidKey::CapsLock, 0x39);

    // Function row
    map.insert(HidKey::F1, 0x3a);
    map.insert(HidKey::F2, 0x3b);
    map.insert(HidKey::F3, 0x3c);
    map.insert(HidKey::F4, 0x3d);
    map.insert(HidKey::F5, 0x3e);
    map.insert(HidKey::F6, 0x3f);
    map.insert(HidKey::F7, 0x40);
    map.insert(HidKey::F8, 0x41);
    map.insert(HidKey::F9, 0x42);
    map.insert(HidKey::F10, 0x43);
    map.insert(HidKey::F11, 0x44);
    map.insert(HidKey::F12, 0x45);
    map.insert(HidKey::PrintScreen, 0x46);
    map.insert(HidKey::ScrollLock, 0x47);
    map.insert(HidKey::PauseBreak, 0x48);

    // Navigation cluster
    map.insert(HidKey::Insert, 0x49);
    map.insert(HidKey::Home, 0x4a);
    map.insert(HidKey::PageUp, 0x4b);
    map.insert(HidKey::Delete, 0x4c);
    map.insert(HidKey::End, 0x4d);
    map.insert(HidKey::PageDown, 0x4e);
    map.insert(HidKey::ArrowRight, 0x4f);
    map.insert(HidKey::ArrowLeft, 0x50);
    map.insert(HidKey::ArrowDown, 0x51);
    map.insert(HidKey::ArrowUp, 0x52);

    // Numpad
    map.insert(HidKey::NumLock, 0x53);
    map.insert(HidKey::NumpadDivide, 0x54);
    map.insert(HidKey::NumpadMultiply, 0x55);
    map.insert(HidKey::NumpadSubtract, 0x56);
    map.insert(HidKey::NumpadAdd, 0x57);
    map.insert(HidKey::NumpadEnter, 0x58);
    map.insert(HidKey::Numpad1, 0x59);
    map.insert(HidKey::Numpad2, 0x5a);
    map.insert(HidKey::Numpad3, 0x5b);
    map.insert(HidKey::Numpad4, 0x5c);
    map.insert(HidKey::Numpad5, 0x5d);
    map.insert(HidKey::Numpad6, 0x5e);
    map.insert(HidKey::Numpad7, 0x5f);
    map.insert(HidKey::Numpad8, 0x60);
    map.insert(HidKey::Numpad9, 0x61);
    map.insert(HidKey::Numpad0, 0x62);
    map.insert(HidKey::NumpadDecimal, 0x63);
    map.insert(HidKey::InternationalBackslash, 0x64);
    map.insert(HidKey::ContextMenu, 0x65);
    map.insert(HidKey::Power, 0x66);
    map.insert(HidKey::NumpadEqual, 0x67);

    // Extended function keys
    map.insert(HidKey::F13, 0x68);
    map.insert(HidKey::F14, 0x69);
    map.insert(HidKey::F15, 0x6a);
    map.insert(HidKey::F16, 0x6b);
    map.insert(HidKey::F17, 0x6c);
    map.insert(HidKey::F18, 0x6d);
    map.insert(HidKey::F19, 0x6e);
    map.insert(HidKey::F20, 0x6f);
    map.insert(HidKey::F21, 0x70);
    map.insert(HidKey::F22, 0x71);
    map.insert(HidKey::F23, 0x72);
    map.insert(HidKey::F24, 0x73);

    // System and media
    map.insert(HidKey::Open, 0x74);
    map.insert(HidKey::Help, 0x75);
    map.insert(HidKey::Again, 0x79);
    map.insert(HidKey::Undo, 0x7a);
    map.insert(HidKey::Cut, 0x7b);
    map.insert(HidKey::Copy, 0x7c);
    map.insert(HidKey::Paste, 0x7d);
    map.insert(HidKey::Find, 0x7e);
    map.insert(HidKey::VolumeMute, 0x7f);
    map.insert(HidKey::VolumeUp, 0x80);
    map.insert(HidKey::VolumeDown, 0x81);

    // International and language keys
    map.insert(HidKey::NumpadComma, 0x85);
    map.insert(HidKey::InternationalRO, 0x87);
    map.insert(HidKey::KanaMode, 0x88);
    map.insert(HidKey::InternationalYen, 0x89);
    map.insert(HidKey::Convert, 0x8a);
    map.insert(HidKey::NonConvert, 0x8b);
    map.insert(HidKey::Lang1, 0x90);
    map.insert(HidKey::Lang2, 0x91);
    map.insert(HidKey::Lang3, 0x92);
    map.insert(HidKey::Lang4, 0x93);

    // Modifiers
    map.insert(HidKey::LeftCtrl, 0xe0);
    map.insert(HidKey::LeftShift, 0xe1);
    map.insert(HidKey::LeftAlt, 0xe2);
    map.insert(HidKey::LeftMeta, 0xe3);
    map.insert(HidKey::RightCtrl, 0xe4);
    map.insert(HidKey::RightShift, 0xe5);
    map.insert(HidKey::RightAlt, 0xe6);
    map.insert(HidKey::RightMeta, 0xe7);

    Arc::new(map)
});

/// Shared handle to the default key code table
pub fn default_keymap() -> Arc<KeyMap> {
    Arc::clone(&DEFAULT_KEYMAP)
}
