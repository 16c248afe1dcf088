//! Analog HID report parsing
//!
//! Analog keyboards send reports made of 3-byte records:
//!
//! | byte | meaning |
//! |------|---------|
//! | 0 | record type, `0` for an analog key reading |
//! | 1 | HID key code, `0` ends the list of active keys |
//! | 2 | pressure, `0x00`..=`0xff` |
//!
//! Only keys with a non-zero reading are listed, so a key that is let go
//! simply disappears from the next report. [`ReportParser`] remembers the
//! previous report and synthesizes an explicit zero reading for those keys.

use super::{AnalogKeyState, KeyMap, KeyStates};
use std::sync::Arc;

/// Size of one analog record in a report
pub const RECORD_SIZE: usize = 3;

/// Record type of an analog key reading
const ANALOG_RECORD: u8 = 0x00;

/// Key code terminating the active key list
const END_OF_KEYS: u8 = 0x00;

/// Readings at or below this value count as released. Half a pressure step,
/// so only a zero byte is treated as zero.
const SAFE_ZERO: f32 = 1.0 / (2.0 * 255.0);

/// Stateful parser turning raw reports into key state changes.
///
/// Each open keyboard owns its own parser; the remembered report is never
/// shared between devices.
#[derive(Debug, Clone)]
pub struct ReportParser {
    keymap: Arc<KeyMap>,
    last_states: KeyStates,
}

impl ReportParser {
    pub fn new(keymap: Arc<KeyMap>) -> Self {
        Self {
            keymap,
            last_states: KeyStates::new(),
        }
    }

    /// Parse the first `len` bytes of `data`.
    ///
    /// Returns the readings contained in the report plus a zero reading for
    /// every key that was pressed in the previous report and is missing from
    /// this one. Malformed input never fails, it only yields fewer states:
    /// records of other types are skipped and a trailing partial record is
    /// ignored.
    pub fn parse(&mut self, data: &[u8], len: usize) -> KeyStates {
        let len = len.min(data.len());
        let mut states = KeyStates::new();

        for record in data[..len].chunks_exact(RECORD_SIZE) {
            if record[0] != ANALOG_RECORD {
                continue;
            }

            let code = record[1];
            if code == END_OF_KEYS {
                break;
            }

            let value = f32::from(record[2]) / 255.0;
            states.insert(AnalogKeyState::new(code, self.keymap.lookup(code), value));
        }

        self.release_missing(&mut states);
        self.last_states = states.clone();
        states
    }

    /// States of the last parsed report, including synthesized releases
    pub fn last_states(&self) -> &KeyStates {
        &self.last_states
    }

    pub fn keymap(&self) -> &Arc<KeyMap> {
        &self.keymap
    }

    fn release_missing(&self, states: &mut KeyStates) {
        for last in &self.last_states {
            if last.value > SAFE_ZERO && !states.contains_code(last.code) {
                states.insert(last.released());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::{default_keymap, HidKey};

    const REPORT_SIZE: usize = 64;

    fn report(bytes: &[u8]) -> [u8; REPORT_SIZE] {
        let mut data = [0u8; REPORT_SIZE];
        data[..bytes.len()].copy_from_slice(bytes);
        data
    }

    fn parser() -> ReportParser {
        ReportParser::new(default_keymap())
    }

    #[test]
    fn empty_report_yields_nothing() {
        let mut parser = parser();
        let data = report(&[]);

        assert!(parser.parse(&data, data.len()).is_empty());
        assert!(parser.last_states().is_empty());
        assert!(Arc::ptr_eq(parser.keymap(), &default_keymap()));
    }

    #[test]
    fn single_key() {
        let mut parser = parser();
        let data = report(&[0x00, 0xe1, 0xff]);

        let states = parser.parse(&data, 3);

        assert_eq!(states.len(), 1);
        assert_eq!(states.value_of(HidKey::LeftShift), Some(1.0));
    }

    #[test]
    fn explicit_zero_is_kept() {
        let mut parser = parser();
        let data = report(&[0x00, 0x17, 0xff, 0x00, 0xe4, 0x00]);

        let states = parser.parse(&data, 6);

        assert_eq!(states.len(), 2);
        assert_eq!(states.value_of(HidKey::T), Some(1.0));
        assert_eq!(states.value_of(HidKey::RightCtrl), Some(0.0));
    }

    #[test]
    fn other_record_type_is_ignored() {
        let mut parser = parser();
        let data = report(&[0x01]);

        assert!(parser.parse(&data, 3).is_empty());
    }

    #[test]
    fn foreign_records_are_skipped_not_terminal() {
        let mut parser = parser();
        let data = report(&[0x02, 0x04, 0xff, 0x00, 0x05, 0x80]);

        let states = parser.parse(&data, 6);

        assert_eq!(states.len(), 1);
        assert_eq!(states.value_of(HidKey::A), None);
        assert_eq!(states.value_of(HidKey::B), Some(128.0 / 255.0));
    }

    #[test]
    fn zero_key_code_ends_report() {
        let mut parser = parser();
        let data = report(&[0x00, 0x04, 0xff, 0x00, 0x00, 0xff, 0x00, 0x05, 0xff]);

        let states = parser.parse(&data, 9);

        assert_eq!(states.len(), 1);
        assert!(states.value_of(HidKey::B).is_none());
    }

    #[test]
    fn trailing_partial_record_is_ignored() {
        let mut parser = parser();
        let data = report(&[0x00, 0x04, 0xff, 0x00, 0x05]);

        let states = parser.parse(&data, 5);

        assert_eq!(states.len(), 1);
        assert_eq!(states.value_of(HidKey::A), Some(1.0));
    }

    #[test]
    fn length_beyond_buffer_is_clamped() {
        let mut parser = parser();
        let data = [0x00, 0x04, 0xff];

        let states = parser.parse(&data, 64);

        assert_eq!(states.value_of(HidKey::A), Some(1.0));
    }

    #[test]
    fn unknown_code_is_emitted() {
        let mut parser = parser();
        let data = report(&[0x00, 0xf5, 0x40]);

        let states = parser.parse(&data, 3);

        let state = states.get(0xf5).expect("unknown key should be reported");
        assert_eq!(state.key, None);
        assert_eq!(state.value, 64.0 / 255.0);
    }

    #[test]
    fn missing_key_is_released() {
        let mut parser = parser();
        let pressed = report(&[0x00, 0x04, 0xff]);
        let empty = report(&[]);

        parser.parse(&pressed, REPORT_SIZE);
        let states = parser.parse(&empty, REPORT_SIZE);

        assert_eq!(states.len(), 1);
        assert_eq!(states.value_of(HidKey::A), Some(0.0));
    }

    #[test]
    fn release_is_only_sent_once() {
        let mut parser = parser();
        let pressed = report(&[0x00, 0x04, 0xff]);
        let empty = report(&[]);

        parser.parse(&pressed, REPORT_SIZE);
        parser.parse(&empty, REPORT_SIZE);
        let states = parser.parse(&empty, REPORT_SIZE);

        assert!(states.is_empty());
    }

    #[test]
    fn zero_reading_is_not_released_again() {
        let mut parser = parser();
        let zero = report(&[0x00, 0x04, 0x00]);
        let empty = report(&[]);

        parser.parse(&zero, REPORT_SIZE);
        assert!(parser.parse(&empty, REPORT_SIZE).is_empty());
    }

    #[test]
    fn lightest_touch_is_released() {
        let mut parser = parser();
        let touch = report(&[0x00, 0x04, 0x01]);
        let empty = report(&[]);

        parser.parse(&touch, REPORT_SIZE);
        let states = parser.parse(&empty, REPORT_SIZE);

        assert_eq!(states.value_of(HidKey::A), Some(0.0));
    }

    #[test]
    fn held_key_is_not_released() {
        let mut parser = parser();
        let both = report(&[0x00, 0x04, 0xff, 0x00, 0x05, 0x80]);
        let one = report(&[0x00, 0x05, 0x90]);

        parser.parse(&both, REPORT_SIZE);
        let states = parser.parse(&one, REPORT_SIZE);

        assert_eq!(states.len(), 2);
        assert_eq!(states.value_of(HidKey::A), Some(0.0));
        assert_eq!(states.value_of(HidKey::B), Some(144.0 / 255.0));
    }

    #[test]
    fn parsers_do_not_share_memory() {
        let mut first = parser();
        let mut second = parser();
        let pressed = report(&[0x00, 0x04, 0xff]);
        let empty = report(&[]);

        first.parse(&pressed, REPORT_SIZE);
        assert!(second.parse(&empty, REPORT_SIZE).is_empty());
    }
}
