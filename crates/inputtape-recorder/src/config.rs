//! Runtime configuration, read from `config.toml`

use crate::controller::{ControllerConfig, HotkeyBindings};
use crate::recorder::RecorderConfig;
use crate::replay::PlayerConfig;
use crate::storage::{self, RecordingStorage};
use anyhow::{Context, Result};
use inputtape_core::keys::vk;
use inputtape_core::{Error, KeyId, TrackedKeys};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Recorder sample period, also the hotkey poll period
    pub sample_interval_ms: u64,
    /// Button hold time for replayed clicks
    pub click_hold_ms: u64,
    /// Cancellation check period while waiting between events
    pub cancel_poll_ms: u64,
    pub speed: f64,
    pub release_held_on_finish: bool,
    pub recording_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,
    pub hotkeys: Hotkeys,
    pub keys: Vec<KeyBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hotkeys {
    pub record: u16,
    pub playback: u16,
    pub toggle_loop: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBinding {
    pub code: u16,
    pub label: String,
}

impl Default for Hotkeys {
    fn default() -> Self {
        Self {
            record: vk::F5,
            playback: vk::F6,
            toggle_loop: vk::F7,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_interval_ms: 10,
            click_hold_ms: 10,
            cancel_poll_ms: 10,
            speed: 1.0,
            release_held_on_finish: false,
            recording_name: "macro".to_string(),
            storage_dir: None,
            hotkeys: Hotkeys::default(),
            keys: TrackedKeys::default()
                .iter()
                .map(|(k, l)| KeyBinding {
                    code: k.code(),
                    label: l.to_string(),
                })
                .collect(),
        }
    }
}

impl Config {
    /// `config.toml` from the default storage dir, or defaults if there is none
    pub fn load() -> Result<Self> {
        let path = storage::default_dir()?.join(CONFIG_FILE);
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&text)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        tracing::info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_interval_ms == 0 {
            return Err(Error::config("sample_interval_ms must be at least 1").into());
        }
        if self.cancel_poll_ms == 0 {
            return Err(Error::config("cancel_poll_ms must be at least 1").into());
        }
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(Error::config(format!("speed must be positive, got {}", self.speed)).into());
        }

        let hotkeys = [self.hotkeys.record, self.hotkeys.playback, self.hotkeys.toggle_loop];
        let distinct: HashSet<u16> = hotkeys.iter().copied().collect();
        if distinct.len() != hotkeys.len() {
            return Err(Error::config("hotkeys must be three different keys").into());
        }
        if let Some(k) = self.keys.iter().find(|k| distinct.contains(&k.code)) {
            return Err(Error::config(format!(
                "key {} ({}) is both tracked and a hotkey",
                KeyId(k.code),
                k.label
            ))
            .into());
        }
        Ok(())
    }

    pub fn tracked_keys(&self) -> TrackedKeys {
        TrackedKeys::new(self.keys.iter().map(|k| (KeyId(k.code), k.label.clone())))
    }

    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            sample_interval: Duration::from_millis(self.sample_interval_ms),
            keys: self.tracked_keys(),
        }
    }

    pub fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            click_hold: Duration::from_millis(self.click_hold_ms),
            cancel_poll_interval: Duration::from_millis(self.cancel_poll_ms),
            release_held_on_finish: self.release_held_on_finish,
            ..Default::default()
        }
        .with_speed(self.speed)
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            poll_interval: Duration::from_millis(self.sample_interval_ms),
            hotkeys: HotkeyBindings {
                record: KeyId(self.hotkeys.record),
                playback: KeyId(self.hotkeys.playback),
                toggle_loop: KeyId(self.hotkeys.toggle_loop),
            },
            recording_name: self.recording_name.clone(),
            recorder: self.recorder_config(),
            player: self.player_config(),
        }
    }

    pub fn storage(&self) -> Result<RecordingStorage> {
        match &self.storage_dir {
            Some(dir) => RecordingStorage::with_dir(dir),
            None => RecordingStorage::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inputtape_core::ErrorCode;

    #[test]
    fn test_defaults_match_tracked_table() {
        let config = Config::default();
        assert_eq!(config.tracked_keys(), TrackedKeys::default());
        assert!(config.validate().is_ok());
        let player = config.player_config();
        assert_eq!(player.click_hold, Duration::from_millis(10));
        assert_eq!(config.recorder_config().sample_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
sample_interval_ms = 5
speed = 2.0

[hotkeys]
toggle_loop = 120

[[keys]]
code = 87
label = "W"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.sample_interval_ms, 5);
        assert_eq!(config.hotkeys.record, vk::F5);
        assert_eq!(config.hotkeys.toggle_loop, 120);
        assert_eq!(config.tracked_keys().labels(), vec!["W"]);
        assert_eq!(config.player_config().speed, 2.0);
    }

    #[test]
    fn test_rejects_hotkey_that_is_tracked() {
        let config = Config {
            hotkeys: Hotkeys {
                record: vk::W,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.downcast_ref::<Error>().unwrap().is(ErrorCode::Config));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let config = Config {
            sample_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let text = config.to_toml().unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
