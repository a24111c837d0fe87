//! Key and button identifiers, and the table of keys the recorder tracks

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Windows virtual key codes used by the default tables
pub mod vk {
    pub const LBUTTON: u16 = 0x01;
    pub const RBUTTON: u16 = 0x02;
    pub const SHIFT: u16 = 0x10;
    pub const CONTROL: u16 = 0x11;
    pub const SPACE: u16 = 0x20;
    pub const A: u16 = 0x41;
    pub const D: u16 = 0x44;
    pub const E: u16 = 0x45;
    pub const F: u16 = 0x46;
    pub const Q: u16 = 0x51;
    pub const R: u16 = 0x52;
    pub const S: u16 = 0x53;
    pub const W: u16 = 0x57;
    pub const F5: u16 = 0x74;
    pub const F6: u16 = 0x75;
    pub const F7: u16 = 0x76;
}

/// OS virtual key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(pub u16);

impl KeyId {
    pub fn code(self) -> u16 {
        self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
}

impl MouseButton {
    pub const ALL: [MouseButton; 2] = [MouseButton::Left, MouseButton::Right];

    /// Key code the OS reports this button's state under
    pub fn key_id(self) -> KeyId {
        match self {
            MouseButton::Left => KeyId(vk::LBUTTON),
            MouseButton::Right => KeyId(vk::RBUTTON),
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MouseButton::Left => f.write_str("left"),
            MouseButton::Right => f.write_str("right"),
        }
    }
}

/// Fixed mapping of key codes to display labels, enumerated once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedKeys {
    keys: Vec<(KeyId, String)>,
}

impl TrackedKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = (KeyId, S)>,
        S: Into<String>,
    {
        let mut keys: Vec<(KeyId, String)> = keys.into_iter().map(|(k, l)| (k, l.into())).collect();
        // Last label wins for duplicate codes
        let mut seen = std::collections::HashSet::new();
        keys.reverse();
        keys.retain(|(k, _)| seen.insert(*k));
        keys.reverse();
        Self { keys }
    }

    pub fn iter(&self) -> impl Iterator<Item = (KeyId, &str)> {
        self.keys.iter().map(|(k, l)| (*k, l.as_str()))
    }

    pub fn label(&self, key: KeyId) -> Option<&str> {
        self.keys.iter().find(|(k, _)| *k == key).map(|(_, l)| l.as_str())
    }

    pub fn contains(&self, key: KeyId) -> bool {
        self.label(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.keys.iter().map(|(_, l)| l.as_str()).collect()
    }

    /// Code -> label table, as stored in config files
    pub fn to_table(&self) -> BTreeMap<u16, String> {
        self.keys.iter().map(|(k, l)| (k.0, l.clone())).collect()
    }

    pub fn from_table(table: &BTreeMap<u16, String>) -> Self {
        Self::new(table.iter().map(|(k, l)| (KeyId(*k), l.clone())))
    }
}

impl Default for TrackedKeys {
    fn default() -> Self {
        Self::new([
            (KeyId(vk::W), "W"),
            (KeyId(vk::A), "A"),
            (KeyId(vk::S), "S"),
            (KeyId(vk::D), "D"),
            (KeyId(vk::SPACE), "SPACE"),
            (KeyId(vk::SHIFT), "SHIFT"),
            (KeyId(vk::CONTROL), "CTRL"),
            (KeyId(vk::E), "E"),
            (KeyId(vk::Q), "Q"),
            (KeyId(vk::R), "R"),
            (KeyId(vk::F), "F"),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_order() {
        let keys = TrackedKeys::default();
        assert_eq!(keys.len(), 11);
        assert_eq!(keys.labels()[..4], ["W", "A", "S", "D"]);
        assert_eq!(keys.label(KeyId(vk::CONTROL)), Some("CTRL"));
    }

    #[test]
    fn test_duplicate_code_keeps_last_label() {
        let keys = TrackedKeys::new([(KeyId(1), "one"), (KeyId(2), "two"), (KeyId(1), "uno")]);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.label(KeyId(1)), Some("uno"));
    }

    #[test]
    fn test_buttons_map_to_vk_codes() {
        assert_eq!(MouseButton::Left.key_id(), KeyId(0x01));
        assert_eq!(MouseButton::Right.key_id(), KeyId(0x02));
    }
}
