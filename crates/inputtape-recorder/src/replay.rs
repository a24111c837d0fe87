//! Timing-accurate replay of recorded actions
//!
//! Each pass measures elapsed time from its own start and sleeps until the
//! event's offset from the first event. Late events are dispatched at once.

use crate::events::*;
use crate::status::{StatusEvent, StatusSink};
use anyhow::Result;
use inputtape_core::{Error, InputProbe, KeyId};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// How long a replayed click holds the button down
    pub click_hold: Duration,
    /// Longest sleep between cancellation checks while waiting for an event
    pub cancel_poll_interval: Duration,
    /// Playback speed (1.0 = real-time, 2.0 = 2x speed)
    pub speed: f64,
    /// Release keys still held when the last pass ends instead of carrying
    /// them over to the next playback
    pub release_held_on_finish: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            click_hold: Duration::from_millis(10),
            cancel_poll_interval: Duration::from_millis(10),
            speed: 1.0,
            release_held_on_finish: false,
        }
    }
}

impl PlayerConfig {
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = clamp_speed(speed);
        self
    }
}

pub(crate) fn clamp_speed(speed: f64) -> f64 {
    if speed.is_finite() {
        speed.clamp(0.1, 10.0)
    } else {
        1.0
    }
}

/// Flags shared between a running playback and whoever controls it
#[derive(Debug, Clone)]
pub struct PlaybackControl {
    cancel: Arc<AtomicBool>,
    looping: Arc<AtomicBool>,
}

impl PlaybackControl {
    pub fn new(looping: bool) -> Self {
        Self::with_loop_flag(Arc::new(AtomicBool::new(looping)))
    }

    /// Share an existing loop flag, so toggling it affects the running playback
    pub fn with_loop_flag(looping: Arc<AtomicBool>) -> Self {
        Self {
            cancel: Arc::new(AtomicBool::new(false)),
            looping,
        }
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::SeqCst);
    }

    pub fn is_looping(&self) -> bool {
        self.looping.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Passes run to completion
    pub passes: usize,
    pub events_dispatched: usize,
    pub cancelled: bool,
    /// Keys force-released at pass boundaries or on cancellation
    pub keys_released: usize,
}

/// Handle to a playback running on its own thread
pub struct PlaybackHandle {
    control: PlaybackControl,
    thread: thread::JoinHandle<Result<PlaybackReport>>,
}

impl PlaybackHandle {
    /// Cancel and wait; held keys are released before this returns
    pub fn stop(self) -> Result<PlaybackReport> {
        self.control.cancel();
        self.join()
    }

    pub fn join(self) -> Result<PlaybackReport> {
        match self.thread.join() {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("playback thread panicked")),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn control(&self) -> &PlaybackControl {
        &self.control
    }
}

/// Per-invocation state
struct PlaybackSession {
    held: BTreeSet<KeyId>,
    report: PlaybackReport,
}

/// Replays recordings through an [`InputProbe`]
#[derive(Clone)]
pub struct Player {
    probe: Arc<dyn InputProbe>,
    config: PlayerConfig,
    status: StatusSink,
    /// Keys a finished playback left down; released by the next pass
    carry: Arc<Mutex<BTreeSet<KeyId>>>,
}

impl Player {
    pub fn new(probe: Arc<dyn InputProbe>) -> Self {
        Self::with_config(probe, PlayerConfig::default())
    }

    pub fn with_config(probe: Arc<dyn InputProbe>, config: PlayerConfig) -> Self {
        Self {
            probe,
            config,
            status: StatusSink::none(),
            carry: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    pub fn status(mut self, status: StatusSink) -> Self {
        self.status = status;
        self
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Keys left down by the last finished playback
    pub fn carried_keys(&self) -> Vec<KeyId> {
        self.carry.lock().iter().copied().collect()
    }

    pub fn spawn(
        &self,
        recording: Arc<Recording>,
        control: PlaybackControl,
    ) -> Result<PlaybackHandle> {
        let player = self.clone();
        let control1 = control.clone();
        let thread = thread::Builder::new()
            .name("inputtape-player".to_string())
            .spawn(move || player.play(&recording, &control1))?;
        Ok(PlaybackHandle { control, thread })
    }

    /// Play on the calling thread until the last pass ends or `control` is cancelled
    pub fn play(&self, recording: &Recording, control: &PlaybackControl) -> Result<PlaybackReport> {
        if recording.is_empty() {
            self.status.emit(StatusEvent::NothingToPlay);
            return Err(Error::empty_recording().into());
        }

        self.status.emit(StatusEvent::PlaybackStarted {
            events: recording.events.len(),
            looping: control.is_looping(),
        });
        tracing::info!(
            name = %recording.name,
            events = recording.events.len(),
            looping = control.is_looping(),
            speed = self.config.speed,
            "playback started"
        );

        let mut session = PlaybackSession {
            held: std::mem::take(&mut *self.carry.lock()),
            report: PlaybackReport::default(),
        };

        let result = self.run_passes(&recording.events, control, &mut session);

        if result.is_ok() && !session.report.cancelled && self.config.release_held_on_finish {
            self.release_all(&mut session)?;
        }
        if !session.held.is_empty() {
            tracing::debug!(held = session.held.len(), "keys left down after playback");
            self.carry.lock().extend(session.held.iter().copied());
        }

        match result {
            Ok(()) => {
                let report = session.report;
                if report.cancelled {
                    self.status.emit(StatusEvent::PlaybackStopped);
                } else {
                    self.status.emit(StatusEvent::PlaybackFinished);
                }
                tracing::info!(
                    passes = report.passes,
                    events = report.events_dispatched,
                    cancelled = report.cancelled,
                    "playback ended"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!(error = %e, "playback aborted");
                self.status.emit(StatusEvent::PlaybackFailed { reason: e.to_string() });
                Err(e)
            }
        }
    }

    fn run_passes(
        &self,
        events: &EventLog,
        control: &PlaybackControl,
        session: &mut PlaybackSession,
    ) -> Result<()> {
        let Some(first) = events.first() else {
            return Ok(());
        };
        let t0 = first.t;

        loop {
            let pass_start = Instant::now();
            self.release_all(session)?;

            for event in events {
                if control.is_cancelled() {
                    return self.cancel(session);
                }

                let target = self.scale(Duration::from_millis(event.t.saturating_sub(t0)));
                if !self.wait_until(pass_start + target, control) {
                    return self.cancel(session);
                }

                self.dispatch(event, session)?;
                session.report.events_dispatched += 1;
            }

            session.report.passes += 1;

            if control.is_cancelled() {
                return self.cancel(session);
            }
            if !control.is_looping() {
                return Ok(());
            }
            tracing::debug!(pass = session.report.passes, "pass complete");
            self.status.emit(StatusEvent::LoopCompleted {
                pass: session.report.passes,
            });
        }
    }

    fn scale(&self, offset: Duration) -> Duration {
        let speed = clamp_speed(self.config.speed);
        if (speed - 1.0).abs() < f64::EPSILON {
            offset
        } else {
            offset.div_f64(speed)
        }
    }

    /// Sleep until `deadline`, checking for cancellation in between.
    /// Returns false if cancelled first.
    fn wait_until(&self, deadline: Instant, control: &PlaybackControl) -> bool {
        loop {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            if control.is_cancelled() {
                return false;
            }
            let slice = (deadline - now).min(self.config.cancel_poll_interval);
            thread::sleep(slice);
        }
    }

    fn cancel(&self, session: &mut PlaybackSession) -> Result<()> {
        session.report.cancelled = true;
        self.release_all(session)
    }

    fn release_all(&self, session: &mut PlaybackSession) -> Result<()> {
        while let Some(key) = session.held.pop_first() {
            self.probe.send_key(key, false)?;
            session.report.keys_released += 1;
            tracing::debug!(key = %key, "released held key");
        }
        Ok(())
    }

    fn dispatch(&self, event: &ActionEvent, session: &mut PlaybackSession) -> Result<()> {
        tracing::trace!(t = event.t, action = ?event.action, "dispatch");
        match &event.action {
            Action::MouseMove { x, y } => {
                self.probe.move_cursor(*x, *y)?;
            }
            Action::MouseClick { b } => {
                self.probe.send_button(*b, true)?;
                thread::sleep(self.config.click_hold);
                self.probe.send_button(*b, false)?;
            }
            Action::KeyDown { k, n } => {
                self.probe.send_key(*k, true)?;
                session.held.insert(*k);
                self.status.emit(StatusEvent::KeyPressed { label: n.clone() });
            }
            Action::KeyUp { k, n } => {
                self.probe.send_key(*k, false)?;
                session.held.remove(k);
                self.status.emit(StatusEvent::KeyReleased { label: n.clone() });
            }
        }
        Ok(())
    }
}
