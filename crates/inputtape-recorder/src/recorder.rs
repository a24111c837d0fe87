//! Polling recorder
//!
//! Samples the probe at a fixed interval and turns state changes into
//! timestamped actions. Keys are edge-triggered, cursor moves fire on change,
//! and mouse buttons are level-triggered: a held button yields one
//! `MouseClick` per sample cycle.

use crate::events::*;
use anyhow::Result;
use inputtape_core::{InputProbe, KeyId, MouseButton, TrackedKeys};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Recorder configuration
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Minimum time between two samples; also the stop latency
    pub sample_interval: Duration,
    /// Keys whose edges are recorded
    pub keys: TrackedKeys,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(10),
            keys: TrackedKeys::default(),
        }
    }
}

/// Per-session capture state. The pressed set only exists to detect edges and
/// is dropped with the session.
pub struct CaptureState {
    keys: TrackedKeys,
    pressed: HashSet<KeyId>,
    last_cursor: (i32, i32),
}

impl CaptureState {
    pub fn new(keys: TrackedKeys, cursor: (i32, i32)) -> Self {
        Self {
            keys,
            pressed: HashSet::new(),
            last_cursor: cursor,
        }
    }

    /// Run one sample cycle, appending whatever changed. Returns how many
    /// events were appended.
    pub fn sample(&mut self, probe: &dyn InputProbe, t: u64, log: &mut EventLog) -> Result<usize> {
        let before = log.len();

        for (key, label) in self.keys.iter() {
            let down = probe.key_pressed(key);
            let was_down = self.pressed.contains(&key);
            if down && !was_down {
                self.pressed.insert(key);
                log.record(t, Action::key_down(key, label));
            } else if !down && was_down {
                self.pressed.remove(&key);
                log.record(t, Action::key_up(key, label));
            }
        }

        let (x, y) = probe.cursor_position()?;
        if (x, y) != self.last_cursor {
            self.last_cursor = (x, y);
            log.record(t, Action::MouseMove { x, y });
        }

        for button in MouseButton::ALL {
            if probe.button_pressed(button) {
                log.record(t, Action::MouseClick { b: button });
            }
        }

        Ok(log.len() - before)
    }

    pub fn pressed(&self) -> &HashSet<KeyId> {
        &self.pressed
    }
}

/// Recording handle - owns the capture thread
pub struct RecordingHandle {
    name: String,
    stop: Arc<AtomicBool>,
    count: Arc<AtomicUsize>,
    thread: thread::JoinHandle<Result<Recording>>,
}

impl RecordingHandle {
    /// Signal the capture thread and wait for it. Takes at most one sample
    /// interval. Keys still held are not released in the log.
    pub fn stop(self) -> Result<Recording> {
        self.stop.store(true, Ordering::SeqCst);
        match self.thread.join() {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("capture thread for '{}' panicked", self.name)),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Relaxed) && !self.thread.is_finished()
    }

    /// Events captured so far
    pub fn event_count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The recorder
pub struct Recorder {
    probe: Arc<dyn InputProbe>,
    config: RecorderConfig,
}

impl Recorder {
    pub fn new(probe: Arc<dyn InputProbe>) -> Self {
        Self::with_config(probe, RecorderConfig::default())
    }

    pub fn with_config(probe: Arc<dyn InputProbe>, config: RecorderConfig) -> Self {
        Self { probe, config }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn start(&self, name: impl Into<String>) -> Result<RecordingHandle> {
        let name = name.into();
        let stop = Arc::new(AtomicBool::new(false));
        let count = Arc::new(AtomicUsize::new(0));

        let probe = self.probe.clone();
        let config = self.config.clone();
        let stop1 = stop.clone();
        let count1 = count.clone();
        let name1 = name.clone();
        let thread = thread::Builder::new()
            .name("inputtape-recorder".to_string())
            .spawn(move || run_capture(probe, config, name1, stop1, count1))?;

        Ok(RecordingHandle {
            name,
            stop,
            count,
            thread,
        })
    }
}

fn run_capture(
    probe: Arc<dyn InputProbe>,
    config: RecorderConfig,
    name: String,
    stop: Arc<AtomicBool>,
    count: Arc<AtomicUsize>,
) -> Result<Recording> {
    let mut recording = Recording::new(name);
    let start = Instant::now();
    tracing::info!(name = %recording.name, keys = config.keys.len(), "capture started");

    let cursor = match probe.cursor_position() {
        Ok(pos) => pos,
        Err(e) => {
            tracing::error!(error = %e, "capture aborted");
            return Err(e.into());
        }
    };
    let mut state = CaptureState::new(config.keys, cursor);

    while !stop.load(Ordering::Relaxed) {
        let t = start.elapsed().as_millis() as u64;
        match state.sample(probe.as_ref(), t, &mut recording.events) {
            Ok(n) => {
                count.fetch_add(n, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!(error = %e, "capture aborted");
                return Err(e);
            }
        }
        thread::sleep(config.sample_interval);
    }

    if !state.pressed().is_empty() {
        tracing::debug!(held = state.pressed().len(), "keys still held at stop");
    }
    tracing::info!(events = recording.events.len(), "capture stopped");
    Ok(recording)
}

#[cfg(test)]
mod tests {
    use super::*;
    use inputtape_core::keys::vk;
    use inputtape_core::testing::ScriptedProbe;

    const W: KeyId = KeyId(vk::W);
    const A: KeyId = KeyId(vk::A);

    fn kinds(log: &EventLog) -> Vec<ActionKind> {
        log.iter().map(|e| e.kind()).collect()
    }

    #[test]
    fn test_scripted_edges_produce_matching_log() {
        let probe = ScriptedProbe::with_cursor(10, 10);
        let mut state = CaptureState::new(TrackedKeys::default(), (10, 10));
        let mut log = EventLog::new();

        probe.press(W);
        assert_eq!(state.sample(&probe, 0, &mut log).unwrap(), 1);
        // Held key, still cursor: nothing new
        assert_eq!(state.sample(&probe, 10, &mut log).unwrap(), 0);

        probe.set_cursor(100, 100);
        state.sample(&probe, 50, &mut log).unwrap();
        assert_eq!(state.sample(&probe, 60, &mut log).unwrap(), 0);

        probe.release(W);
        state.sample(&probe, 200, &mut log).unwrap();

        assert_eq!(
            kinds(&log),
            vec![ActionKind::KeyDown, ActionKind::MouseMove, ActionKind::KeyUp]
        );
        assert_eq!(log.as_slice()[1].action, Action::MouseMove { x: 100, y: 100 });
        assert_eq!(log.as_slice()[2].action, Action::key_up(W, "W"));
        assert!(state.pressed().is_empty());
    }

    #[test]
    fn test_held_button_repeats_every_cycle() {
        let probe = ScriptedProbe::new();
        let mut state = CaptureState::new(TrackedKeys::default(), (0, 0));
        let mut log = EventLog::new();

        probe.press_button(MouseButton::Left);
        for t in [0, 10, 20] {
            state.sample(&probe, t, &mut log).unwrap();
        }
        probe.release_button(MouseButton::Left);
        state.sample(&probe, 30, &mut log).unwrap();

        assert_eq!(log.summary().clicks, 3);
    }

    #[test]
    fn test_cycle_order_keys_then_move_then_clicks() {
        let probe = ScriptedProbe::new();
        let mut state = CaptureState::new(TrackedKeys::default(), (0, 0));
        let mut log = EventLog::new();

        probe.press_button(MouseButton::Right);
        probe.set_cursor(5, 5);
        probe.press(A);
        probe.press(W);
        state.sample(&probe, 0, &mut log).unwrap();

        let labels: Vec<_> = log
            .iter()
            .filter_map(|e| match &e.action {
                Action::KeyDown { n, .. } => Some(n.as_str()),
                _ => None,
            })
            .collect();
        // Tracked-key table order, not press order
        assert_eq!(labels, vec!["W", "A"]);
        assert_eq!(
            kinds(&log),
            vec![
                ActionKind::KeyDown,
                ActionKind::KeyDown,
                ActionKind::MouseMove,
                ActionKind::MouseClick
            ]
        );
    }

    #[test]
    fn test_untracked_keys_ignored() {
        let probe = ScriptedProbe::new();
        let mut state = CaptureState::new(TrackedKeys::new([(W, "W")]), (0, 0));
        let mut log = EventLog::new();
        probe.press(A);
        state.sample(&probe, 0, &mut log).unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn test_threaded_session_keeps_order_and_no_release_at_stop() {
        let probe = Arc::new(ScriptedProbe::new());
        let recorder = Recorder::new(probe.clone());
        let handle = recorder.start("walk").unwrap();

        probe.press(W);
        thread::sleep(Duration::from_millis(40));
        probe.set_cursor(3, 4);
        thread::sleep(Duration::from_millis(40));
        probe.press(A);
        thread::sleep(Duration::from_millis(40));
        assert!(handle.is_running());
        assert!(handle.event_count() >= 3);

        let recording = handle.stop().unwrap();
        assert_eq!(recording.name, "walk");
        assert_eq!(
            kinds(&recording.events),
            vec![ActionKind::KeyDown, ActionKind::MouseMove, ActionKind::KeyDown]
        );
        assert!(recording.events.validate().is_ok());
    }

    #[test]
    fn test_probe_failure_ends_session() {
        let probe = Arc::new(ScriptedProbe::new());
        let recorder = Recorder::new(probe.clone());
        let handle = recorder.start("broken").unwrap();
        probe.fail_cursor(true);
        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_running());
        assert!(handle.stop().is_err());
    }
}
