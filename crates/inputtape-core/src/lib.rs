//! inputtape-core - Input probe primitives
//!
//! Polls key and cursor state and synthesizes keyboard/mouse input.
//! Everything above this crate talks to the OS through [`InputProbe`].
//!
//! ## Platform Support
//!
//! - **Windows**: Full support via `GetAsyncKeyState` / `SendInput`
//! - **Linux**: Coming soon (XTest)
//! - **macOS**: Coming soon (CGEvent)

pub mod error;
pub mod keys;
pub mod platform;
pub mod probe;
pub mod testing;

pub use error::{Error, ErrorCode, Result};
pub use keys::{KeyId, MouseButton, TrackedKeys};
pub use probe::InputProbe;

pub mod prelude {
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::keys::{KeyId, MouseButton, TrackedKeys};
    pub use crate::probe::InputProbe;
    pub use crate::testing::ScriptedProbe;
}

/// Probe backed by the current OS
pub fn system_probe() -> Result<std::sync::Arc<dyn InputProbe>> {
    platform::current::system_probe()
}
