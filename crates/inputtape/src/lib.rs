//! # inputtape
//!
//! Desktop input macro recorder.
//!
//! ## Features
//!
//! - **Recording**: Poll tracked keys, cursor and mouse buttons into a timestamped log
//! - **Replay**: Re-emit the log with the recorded gaps, once or in a loop
//! - **Control**: Global hotkeys to toggle recording, playback and loop mode
//! - **Storage**: Recordings as JSON lines
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use inputtape::prelude::*;
//!
//! let probe = inputtape::system_probe()?;
//! let recorder = Recorder::new(probe.clone());
//! let handle = recorder.start("demo")?;
//! std::thread::sleep(std::time::Duration::from_secs(5));
//! let recording = handle.stop()?;
//!
//! let player = Player::new(probe);
//! player.play(&recording, &PlaybackControl::new(false))?;
//! # Ok::<(), anyhow::Error>(())
//! ```

// Re-export core primitives
pub use inputtape_core::*;

// Re-export the engine
pub use inputtape_recorder as recorder;

pub use inputtape_recorder::{
    Action, ActionEvent, Config, EventLog, ModeController, PlaybackControl, Player, Recorder,
    Recording, RecordingStorage, StatusEvent, Trigger,
};

/// Prelude - import everything you need
pub mod prelude {
    pub use inputtape_core::prelude::*;
    pub use inputtape_recorder::prelude::*;
}
