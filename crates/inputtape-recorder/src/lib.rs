//! inputtape-recorder - Keyboard and mouse macro recording
//!
//! Polls input state into a timestamped event log and replays it with the
//! same relative timing, optionally looping.
//!
//! ## Platform Support
//!
//! The engine is platform independent and works against any
//! [`inputtape_core::InputProbe`]. See `inputtape-core` for OS backends.

pub mod config;
pub mod controller;
pub mod events;
pub mod recorder;
pub mod replay;
pub mod status;
pub mod storage;

pub use config::Config;
pub use controller::{ControllerConfig, HotkeyBindings, HotkeyPoller, ModeController, Trigger};
pub use events::*;
pub use recorder::{CaptureState, Recorder, RecorderConfig, RecordingHandle};
pub use replay::{PlaybackControl, PlaybackHandle, PlaybackReport, Player, PlayerConfig};
pub use status::{Receiver, Sender, StatusEvent, StatusSink};
pub use storage::RecordingStorage;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::controller::{ControllerConfig, ModeController, Trigger};
    pub use crate::events::*;
    pub use crate::recorder::{Recorder, RecorderConfig, RecordingHandle};
    pub use crate::replay::{PlaybackControl, PlaybackHandle, PlaybackReport, Player, PlayerConfig};
    pub use crate::status::{StatusEvent, StatusSink};
    pub use crate::storage::RecordingStorage;
}
