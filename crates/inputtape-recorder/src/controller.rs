//! Hotkey-driven mode controller
//!
//! Polls three global hotkeys and starts/stops the recorder and player on
//! their own threads. Recording and playback of the shared buffer are
//! mutually exclusive: a new recording is refused while playback runs.

use crate::events::{Recording, RecordingSlot};
use crate::recorder::{Recorder, RecorderConfig, RecordingHandle};
use crate::replay::{PlaybackControl, PlaybackHandle, Player, PlayerConfig};
use crate::status::{StatusEvent, StatusSink};
use anyhow::Result;
use inputtape_core::keys::vk;
use inputtape_core::{Error, InputProbe, KeyId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    ToggleRecording,
    TogglePlayback,
    ToggleLoop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyBindings {
    pub record: KeyId,
    pub playback: KeyId,
    pub toggle_loop: KeyId,
}

impl Default for HotkeyBindings {
    fn default() -> Self {
        Self {
            record: KeyId(vk::F5),
            playback: KeyId(vk::F6),
            toggle_loop: KeyId(vk::F7),
        }
    }
}

/// Turns hotkey state into triggers, one per physical press
pub struct HotkeyPoller {
    bindings: [(KeyId, Trigger); 3],
    was_down: [bool; 3],
}

impl HotkeyPoller {
    pub fn new(hotkeys: HotkeyBindings) -> Self {
        Self {
            bindings: [
                (hotkeys.record, Trigger::ToggleRecording),
                (hotkeys.playback, Trigger::TogglePlayback),
                (hotkeys.toggle_loop, Trigger::ToggleLoop),
            ],
            was_down: [false; 3],
        }
    }

    pub fn poll(&mut self, probe: &dyn InputProbe) -> Vec<Trigger> {
        let mut fired = Vec::new();
        for (i, (key, trigger)) in self.bindings.iter().enumerate() {
            let down = probe.key_pressed(*key);
            if down && !self.was_down[i] {
                fired.push(*trigger);
            }
            self.was_down[i] = down;
        }
        fired
    }
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub poll_interval: Duration,
    pub hotkeys: HotkeyBindings,
    pub recording_name: String,
    pub recorder: RecorderConfig,
    pub player: PlayerConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            hotkeys: HotkeyBindings::default(),
            recording_name: "macro".to_string(),
            recorder: RecorderConfig::default(),
            player: PlayerConfig::default(),
        }
    }
}

type RecordedHook = Box<dyn FnMut(&Recording) + Send>;

pub struct ModeController {
    probe: Arc<dyn InputProbe>,
    config: ControllerConfig,
    recorder: Recorder,
    player: Player,
    slot: RecordingSlot,
    looping: Arc<AtomicBool>,
    status: StatusSink,
    poller: HotkeyPoller,
    recording: Option<RecordingHandle>,
    playback: Option<PlaybackHandle>,
    on_recorded: Option<RecordedHook>,
}

impl ModeController {
    pub fn new(probe: Arc<dyn InputProbe>, config: ControllerConfig, status: StatusSink) -> Self {
        let recorder = Recorder::with_config(probe.clone(), config.recorder.clone());
        let player =
            Player::with_config(probe.clone(), config.player.clone()).status(status.clone());
        let poller = HotkeyPoller::new(config.hotkeys);
        Self {
            probe,
            config,
            recorder,
            player,
            slot: RecordingSlot::new(),
            looping: Arc::new(AtomicBool::new(false)),
            status,
            poller,
            recording: None,
            playback: None,
            on_recorded: None,
        }
    }

    /// Called with every finished recording, before it is published
    pub fn on_recorded(mut self, hook: impl FnMut(&Recording) + Send + 'static) -> Self {
        self.on_recorded = Some(Box::new(hook));
        self
    }

    pub fn looping(self, on: bool) -> Self {
        self.looping.store(on, Ordering::SeqCst);
        self
    }

    pub fn slot(&self) -> &RecordingSlot {
        &self.slot
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn is_looping(&self) -> bool {
        self.looping.load(Ordering::SeqCst)
    }

    pub fn handle(&mut self, trigger: Trigger) -> Result<()> {
        tracing::debug!(?trigger, "trigger");
        match trigger {
            Trigger::ToggleRecording => {
                if self.recording.is_some() {
                    self.stop_recording().map(|_| ())
                } else {
                    self.start_recording()
                }
            }
            Trigger::TogglePlayback => {
                self.reap_playback();
                if self.playback.is_some() {
                    self.stop_playback();
                    Ok(())
                } else {
                    self.start_playback()
                }
            }
            Trigger::ToggleLoop => {
                let on = !self.looping.fetch_xor(true, Ordering::SeqCst);
                self.status.emit(StatusEvent::LoopMode { on });
                Ok(())
            }
        }
    }

    /// Poll hotkeys until `shutdown` is set, then stop both workers
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        tracing::info!(
            record = %self.config.hotkeys.record,
            playback = %self.config.hotkeys.playback,
            toggle_loop = %self.config.hotkeys.toggle_loop,
            "controller running"
        );
        while !shutdown.load(Ordering::SeqCst) {
            for trigger in self.poller.poll(self.probe.as_ref()) {
                if let Err(e) = self.handle(trigger) {
                    tracing::warn!(error = %e, ?trigger, "trigger failed");
                }
            }
            self.reap_playback();
            thread::sleep(self.config.poll_interval);
        }
        self.shutdown();
        Ok(())
    }

    /// Stop whatever is running. A recording in progress is kept.
    pub fn shutdown(&mut self) {
        if self.recording.is_some() {
            if let Err(e) = self.stop_recording() {
                tracing::warn!(error = %e, "recording lost on shutdown");
            }
        }
        self.stop_playback();
    }

    fn start_recording(&mut self) -> Result<()> {
        if self.is_playing() {
            let err = Error::busy("playback");
            self.status.emit(StatusEvent::Rejected {
                reason: err.message.clone(),
            });
            return Err(err.into());
        }
        let handle = self.recorder.start(self.config.recording_name.clone())?;
        self.status.emit(StatusEvent::RecordingStarted {
            name: handle.name().to_string(),
        });
        self.recording = Some(handle);
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<u64> {
        let Some(handle) = self.recording.take() else {
            return Ok(self.slot.generation());
        };
        match handle.stop() {
            Ok(recording) => {
                self.status.emit(StatusEvent::RecordingStopped {
                    events: recording.events.len(),
                });
                if let Some(hook) = self.on_recorded.as_mut() {
                    hook(&recording);
                }
                Ok(self.slot.publish(recording))
            }
            Err(e) => {
                self.status.emit(StatusEvent::RecordingFailed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn start_playback(&mut self) -> Result<()> {
        let recording = match self.slot.current() {
            Some(r) if !r.is_empty() => r,
            _ => {
                self.status.emit(StatusEvent::NothingToPlay);
                return Ok(());
            }
        };
        let control = PlaybackControl::with_loop_flag(self.looping.clone());
        self.playback = Some(self.player.spawn(recording, control)?);
        Ok(())
    }

    fn stop_playback(&mut self) {
        if let Some(handle) = self.playback.take() {
            if let Err(e) = handle.stop() {
                tracing::warn!(error = %e, "playback ended with error");
            }
        }
    }

    /// Join a playback that already ended on its own
    fn reap_playback(&mut self) {
        if self.playback.as_ref().is_some_and(|h| h.is_finished()) {
            if let Some(handle) = self.playback.take() {
                match handle.join() {
                    Ok(report) => tracing::debug!(?report, "playback reaped"),
                    Err(e) => tracing::warn!(error = %e, "playback ended with error"),
                }
            }
        }
    }
}

impl Drop for ModeController {
    fn drop(&mut self) {
        if let Some(handle) = self.playback.take() {
            handle.control().cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Action, ActionKind, EventLog};
    use crate::status::Receiver;
    use inputtape_core::testing::{ScriptedProbe, Synthetic};
    use inputtape_core::ErrorCode;
    use parking_lot::Mutex;
    use std::time::Instant;

    const W: KeyId = KeyId(vk::W);

    fn controller(probe: &Arc<ScriptedProbe>) -> (ModeController, Receiver<StatusEvent>) {
        let (sink, rx) = StatusSink::channel();
        let ctl = ModeController::new(probe.clone(), ControllerConfig::default(), sink);
        (ctl, rx)
    }

    fn wait_idle(ctl: &ModeController) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while ctl.is_playing() {
            assert!(Instant::now() < deadline, "playback did not finish");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_hotkeys_fire_once_per_press() {
        let probe = ScriptedProbe::new();
        let mut poller = HotkeyPoller::new(HotkeyBindings::default());
        let f5 = KeyId(vk::F5);

        probe.press(f5);
        assert_eq!(poller.poll(&probe), vec![Trigger::ToggleRecording]);
        assert!(poller.poll(&probe).is_empty());
        probe.release(f5);
        assert!(poller.poll(&probe).is_empty());
        probe.press(f5);
        probe.press(KeyId(vk::F7));
        assert_eq!(
            poller.poll(&probe),
            vec![Trigger::ToggleRecording, Trigger::ToggleLoop]
        );
    }

    #[test]
    fn test_record_then_play() {
        let probe = Arc::new(ScriptedProbe::new());
        let saved = Arc::new(Mutex::new(0usize));
        let saved1 = saved.clone();
        let (ctl, rx) = controller(&probe);
        let mut ctl = ctl.on_recorded(move |r| *saved1.lock() = r.events.len());

        ctl.handle(Trigger::ToggleRecording).unwrap();
        assert!(ctl.is_recording());
        probe.press(W);
        thread::sleep(Duration::from_millis(40));
        probe.release(W);
        thread::sleep(Duration::from_millis(40));
        ctl.handle(Trigger::ToggleRecording).unwrap();
        assert!(!ctl.is_recording());

        let recording = ctl.slot().current().unwrap();
        let kinds: Vec<_> = recording.events.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![ActionKind::KeyDown, ActionKind::KeyUp]);
        assert_eq!(*saved.lock(), 2);

        ctl.handle(Trigger::TogglePlayback).unwrap();
        wait_idle(&ctl);
        assert_eq!(
            probe.inputs(),
            vec![
                Synthetic::Key { key: W, down: true },
                Synthetic::Key { key: W, down: false }
            ]
        );

        let lines: Vec<String> = rx.try_iter().map(|s| s.to_string()).collect();
        assert_eq!(lines.first().unwrap(), "Recording 'macro' started...");
        assert_eq!(lines[1], "Recording stopped! (2 events)");
        assert_eq!(lines.last().unwrap(), "Playback complete!");
    }

    #[test]
    fn test_playback_without_recording_reports_and_continues() {
        let probe = Arc::new(ScriptedProbe::new());
        let (mut ctl, rx) = controller(&probe);
        ctl.handle(Trigger::TogglePlayback).unwrap();
        assert!(!ctl.is_playing());
        assert_eq!(rx.try_recv().unwrap(), StatusEvent::NothingToPlay);
        assert!(probe.inputs().is_empty());
    }

    #[test]
    fn test_recording_rejected_during_playback() {
        let probe = Arc::new(ScriptedProbe::new());
        let (ctl, rx) = controller(&probe);
        let mut ctl = ctl.looping(true);
        let mut log = EventLog::new();
        log.record(0, Action::key_down(W, "W"));
        log.record(5000, Action::key_up(W, "W"));
        ctl.slot().publish(Recording::with_events("long", log));

        ctl.handle(Trigger::TogglePlayback).unwrap();
        thread::sleep(Duration::from_millis(30));
        assert!(ctl.is_playing());

        let err = ctl.handle(Trigger::ToggleRecording).unwrap_err();
        assert!(err.downcast_ref::<Error>().unwrap().is(ErrorCode::Busy));
        assert!(!ctl.is_recording());
        assert!(rx
            .try_iter()
            .any(|s| matches!(s, StatusEvent::Rejected { .. })));

        // Second press cancels; the held key is released
        ctl.handle(Trigger::TogglePlayback).unwrap();
        assert!(!ctl.is_playing());
        assert!(probe.held_keys().is_empty());
    }

    #[test]
    fn test_loop_toggle_reaches_running_playback() {
        let probe = Arc::new(ScriptedProbe::new());
        let (mut ctl, rx) = controller(&probe);
        let mut log = EventLog::new();
        log.record(0, Action::MouseMove { x: 1, y: 1 });
        log.record(30, Action::MouseMove { x: 2, y: 2 });
        ctl.slot().publish(Recording::with_events("moves", log));

        ctl.handle(Trigger::ToggleLoop).unwrap();
        assert!(ctl.is_looping());
        ctl.handle(Trigger::TogglePlayback).unwrap();
        thread::sleep(Duration::from_millis(100));
        assert!(ctl.is_playing());

        ctl.handle(Trigger::ToggleLoop).unwrap();
        wait_idle(&ctl);

        let statuses: Vec<StatusEvent> = rx.try_iter().collect();
        assert_eq!(statuses[0], StatusEvent::LoopMode { on: true });
        assert!(statuses.contains(&StatusEvent::LoopMode { on: false }));
        assert!(statuses
            .iter()
            .any(|s| matches!(s, StatusEvent::LoopCompleted { .. })));
        assert_eq!(statuses.last().unwrap(), &StatusEvent::PlaybackFinished);
    }

    #[test]
    fn test_run_dispatches_hotkeys_until_shutdown() {
        let probe = Arc::new(ScriptedProbe::new());
        let (mut ctl, rx) = controller(&probe);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown1 = shutdown.clone();
        let worker = thread::spawn(move || {
            ctl.run(&shutdown1).unwrap();
            ctl
        });

        probe.press(KeyId(vk::F7));
        let status = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(status, StatusEvent::LoopMode { on: true });
        probe.release(KeyId(vk::F7));

        probe.press(KeyId(vk::F5));
        let status = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(matches!(status, StatusEvent::RecordingStarted { .. }));

        shutdown.store(true, Ordering::SeqCst);
        let ctl = worker.join().unwrap();
        assert!(!ctl.is_recording());
        // Recording in progress at shutdown is kept
        assert!(ctl.slot().current().is_some());
    }
}
