//! In-memory probe for driving the engine without touching the OS
//!
//! Sampled state is set by the test; every synthesis call is logged with
//! the instant it happened so timing can be checked afterwards.

use crate::error::{Error, Result};
use crate::keys::{KeyId, MouseButton};
use crate::probe::InputProbe;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Synthetic {
    Key { key: KeyId, down: bool },
    Move { x: i32, y: i32 },
    Button { button: MouseButton, down: bool },
}

#[derive(Debug, Clone, Copy)]
pub struct SyntheticCall {
    pub at: Instant,
    pub input: Synthetic,
}

#[derive(Default)]
struct ProbeState {
    pressed: HashSet<KeyId>,
    cursor: (i32, i32),
    fail_cursor: bool,
    fail_synthesis: bool,
    calls: Vec<SyntheticCall>,
}

#[derive(Default)]
pub struct ScriptedProbe {
    state: Mutex<ProbeState>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cursor(x: i32, y: i32) -> Self {
        let probe = Self::new();
        probe.set_cursor(x, y);
        probe
    }

    pub fn press(&self, key: KeyId) {
        self.state.lock().pressed.insert(key);
    }

    pub fn release(&self, key: KeyId) {
        self.state.lock().pressed.remove(&key);
    }

    pub fn press_button(&self, button: MouseButton) {
        self.press(button.key_id());
    }

    pub fn release_button(&self, button: MouseButton) {
        self.release(button.key_id());
    }

    pub fn set_cursor(&self, x: i32, y: i32) {
        self.state.lock().cursor = (x, y);
    }

    /// Make `cursor_position` fail, simulating a broken OS call
    pub fn fail_cursor(&self, fail: bool) {
        self.state.lock().fail_cursor = fail;
    }

    /// Make every `send_*`/`move_cursor` call fail without being logged
    pub fn fail_synthesis(&self, fail: bool) {
        self.state.lock().fail_synthesis = fail;
    }

    pub fn calls(&self) -> Vec<SyntheticCall> {
        self.state.lock().calls.clone()
    }

    pub fn inputs(&self) -> Vec<Synthetic> {
        self.state.lock().calls.iter().map(|c| c.input).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Keys whose last synthesized event was a key-down
    pub fn held_keys(&self) -> HashSet<KeyId> {
        let mut held = HashSet::new();
        for call in &self.state.lock().calls {
            if let Synthetic::Key { key, down } = call.input {
                if down {
                    held.insert(key);
                } else {
                    held.remove(&key);
                }
            }
        }
        held
    }

    fn log(&self, input: Synthetic) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_synthesis {
            return Err(Error::action_failed("SendInput", "scripted failure"));
        }
        state.calls.push(SyntheticCall {
            at: Instant::now(),
            input,
        });
        Ok(())
    }
}

impl InputProbe for ScriptedProbe {
    fn key_pressed(&self, key: KeyId) -> bool {
        self.state.lock().pressed.contains(&key)
    }

    fn cursor_position(&self) -> Result<(i32, i32)> {
        let state = self.state.lock();
        if state.fail_cursor {
            return Err(Error::action_failed("GetCursorPos", "scripted failure"));
        }
        Ok(state.cursor)
    }

    fn send_key(&self, key: KeyId, down: bool) -> Result<()> {
        self.log(Synthetic::Key { key, down })
    }

    fn move_cursor(&self, x: i32, y: i32) -> Result<()> {
        self.log(Synthetic::Move { x, y })
    }

    fn send_button(&self, button: MouseButton, down: bool) -> Result<()> {
        self.log(Synthetic::Button { button, down })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_held_keys_tracks_last_edge() {
        let probe = ScriptedProbe::new();
        probe.send_key(KeyId(1), true).unwrap();
        probe.send_key(KeyId(2), true).unwrap();
        probe.send_key(KeyId(1), false).unwrap();
        let held = probe.held_keys();
        assert!(held.contains(&KeyId(2)));
        assert!(!held.contains(&KeyId(1)));
    }

    #[test]
    fn test_failed_synthesis_is_not_logged() {
        let probe = ScriptedProbe::new();
        probe.fail_synthesis(true);
        assert!(probe.move_cursor(1, 1).is_err());
        probe.fail_synthesis(false);
        probe.move_cursor(2, 2).unwrap();
        assert_eq!(probe.inputs(), vec![Synthetic::Move { x: 2, y: 2 }]);
    }

    #[test]
    fn test_buttons_sampled_through_key_state() {
        let probe = ScriptedProbe::new();
        probe.press_button(MouseButton::Right);
        assert!(probe.button_pressed(MouseButton::Right));
        assert!(!probe.button_pressed(MouseButton::Left));
        assert!(probe.inputs().is_empty());
    }
}
