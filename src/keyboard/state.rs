//! Analog key state tracking

use super::HidKey;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Pressure reading for a single key
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnalogKeyState {
    /// HID key code the reading was reported under
    pub code: u8,
    /// Key resolved from `code`, `None` if the key map has no entry for it
    pub key: Option<HidKey>,
    /// Current pressure, 0.0 (released) to 1.0 (fully pressed)
    pub value: f32,
}

impl AnalogKeyState {
    pub fn new(code: u8, key: Option<HidKey>, value: f32) -> Self {
        Self { code, key, value }
    }

    /// A zero-pressure reading for the same key
    pub fn released(&self) -> Self {
        Self {
            value: 0.0,
            ..*self
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.value > 0.0
    }
}

/// The set of key states emitted for one report.
///
/// Holds at most one state per key code. Iteration is in key code order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyStates {
    states: BTreeMap<u8, AnalogKeyState>,
}

impl KeyStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a state, replacing any earlier state for the same code
    pub fn insert(&mut self, state: AnalogKeyState) {
        self.states.insert(state.code, state);
    }

    pub fn get(&self, code: u8) -> Option<&AnalogKeyState> {
        self.states.get(&code)
    }

    pub fn contains_code(&self, code: u8) -> bool {
        self.states.contains_key(&code)
    }

    /// Pressure reported for `key`, if it is part of this set
    pub fn value_of(&self, key: HidKey) -> Option<f32> {
        self.states
            .values()
            .find(|state| state.key == Some(key))
            .map(|state| state.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnalogKeyState> {
        self.states.values()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn into_vec(self) -> Vec<AnalogKeyState> {
        self.states.into_values().collect()
    }
}

impl Serialize for KeyStates {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.states.values())
    }
}

impl FromIterator<AnalogKeyState> for KeyStates {
    fn from_iter<I: IntoIterator<Item = AnalogKeyState>>(iter: I) -> Self {
        let mut states = KeyStates::new();
        for state in iter {
            states.insert(state);
        }
        states
    }
}

impl<'a> IntoIterator for &'a KeyStates {
    type Item = &'a AnalogKeyState;
    type IntoIter = std::collections::btree_map::Values<'a, u8, AnalogKeyState>;

    fn into_iter(self) -> Self::IntoIter {
        self.states.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_same_code() {
        let mut states = KeyStates::new();
        states.insert(AnalogKeyState::new(0x04, Some(HidKey::A), 0.5));
        states.insert(AnalogKeyState::new(0x04, Some(HidKey::A), 0.75));

        assert_eq!(states.len(), 1);
        assert_eq!(states.value_of(HidKey::A), Some(0.75));
    }

    #[test]
    fn unknown_codes_stay_distinct() {
        let states: KeyStates = [
            AnalogKeyState::new(0xf1, None, 0.2),
            AnalogKeyState::new(0xf2, None, 0.4),
        ]
        .into_iter()
        .collect();

        assert_eq!(states.len(), 2);
        assert_eq!(states.get(0xf2).map(|s| s.value), Some(0.4));
    }

    #[test]
    fn released_keeps_identity() {
        let state = AnalogKeyState::new(0xe1, Some(HidKey::LeftShift), 1.0);
        let released = state.released();

        assert_eq!(released.code, 0xe1);
        assert_eq!(released.key, Some(HidKey::LeftShift));
        assert_eq!(released.value, 0.0);
        assert!(state.is_pressed());
        assert!(!released.is_pressed());
    }

    #[test]
    fn iterates_in_code_order() {
        let states: KeyStates = [
            AnalogKeyState::new(0x17, Some(HidKey::T), 1.0),
            AnalogKeyState::new(0x04, Some(HidKey::A), 1.0),
        ]
        .into_iter()
        .collect();

        let codes: Vec<u8> = states.iter().map(|s| s.code).collect();
        assert_eq!(codes, vec![0x04, 0x17]);

        let keys: Vec<Option<HidKey>> = states.into_vec().into_iter().map(|s| s.key).collect();
        assert_eq!(keys, vec![Some(HidKey::A), Some(HidKey::T)]);
    }

    #[test]
    fn serializes_as_list() {
        let states: KeyStates = [AnalogKeyState::new(0x04, Some(HidKey::A), 1.0)]
            .into_iter()
            .collect();

        let json = serde_json::to_string(&states).unwrap();
        assert_eq!(json, r#"[{"code":4,"key":"A","value":1.0}]"#);
    }
}
