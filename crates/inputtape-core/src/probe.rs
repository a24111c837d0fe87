//! The boundary between the engine and the OS input APIs
//!
//! Implementations are direct passthroughs: no buffering, no retries.

use crate::error::Result;
use crate::keys::{KeyId, MouseButton};

pub trait InputProbe: Send + Sync {
    /// Whether the key (or mouse button, via [`MouseButton::key_id`]) is currently down
    fn key_pressed(&self, key: KeyId) -> bool;

    fn cursor_position(&self) -> Result<(i32, i32)>;

    fn send_key(&self, key: KeyId, down: bool) -> Result<()>;

    fn move_cursor(&self, x: i32, y: i32) -> Result<()>;

    fn send_button(&self, button: MouseButton, down: bool) -> Result<()>;

    fn button_pressed(&self, button: MouseButton) -> bool {
        self.key_pressed(button.key_id())
    }
}
