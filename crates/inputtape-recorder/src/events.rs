//! Recorded action events and the Event Log
//!
//! Events serialize to compact JSON lines, one flat object per action.

use chrono::{DateTime, Utc};
use inputtape_core::{KeyId, MouseButton};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Single recorded action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEvent {
    /// Milliseconds since recording start
    pub t: u64,
    #[serde(flatten)]
    pub action: Action,
}

impl ActionEvent {
    pub fn new(t: u64, action: Action) -> Self {
        Self { t, action }
    }

    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "e")]
pub enum Action {
    /// Tracked key went down: key code, display label
    #[serde(rename = "kd")]
    KeyDown { k: KeyId, n: String },

    /// Tracked key went up
    #[serde(rename = "ku")]
    KeyUp { k: KeyId, n: String },

    /// Cursor moved to absolute screen coordinates
    #[serde(rename = "m")]
    MouseMove { x: i32, y: i32 },

    /// Button observed down during one sample cycle
    #[serde(rename = "c")]
    MouseClick { b: MouseButton },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    KeyDown,
    KeyUp,
    MouseMove,
    MouseClick,
}

impl Action {
    pub fn key_down(key: KeyId, label: impl Into<String>) -> Self {
        Action::KeyDown { k: key, n: label.into() }
    }

    pub fn key_up(key: KeyId, label: impl Into<String>) -> Self {
        Action::KeyUp { k: key, n: label.into() }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::KeyDown { .. } => ActionKind::KeyDown,
            Action::KeyUp { .. } => ActionKind::KeyUp,
            Action::MouseMove { .. } => ActionKind::MouseMove,
            Action::MouseClick { .. } => ActionKind::MouseClick,
        }
    }
}

/// Append-only, time-ordered sequence of actions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog {
    events: Vec<ActionEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. A timestamp earlier than the last one is raised to it
    /// so the log stays non-decreasing.
    pub fn push(&mut self, mut event: ActionEvent) {
        if let Some(last) = self.events.last() {
            if event.t < last.t {
                tracing::warn!(t = event.t, last = last.t, "clamping out-of-order event timestamp");
                event.t = last.t;
            }
        }
        self.events.push(event);
    }

    pub fn record(&mut self, t: u64, action: Action) {
        self.push(ActionEvent::new(t, action));
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ActionEvent> {
        self.events.iter()
    }

    pub fn first(&self) -> Option<&ActionEvent> {
        self.events.first()
    }

    pub fn last(&self) -> Option<&ActionEvent> {
        self.events.last()
    }

    pub fn as_slice(&self) -> &[ActionEvent] {
        &self.events
    }

    /// Span from first to last event
    pub fn duration(&self) -> Duration {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => Duration::from_millis(last.t.saturating_sub(first.t)),
            _ => Duration::ZERO,
        }
    }

    /// Index of the first event whose timestamp goes backwards
    pub fn validate(&self) -> Result<(), usize> {
        match self.events.windows(2).position(|w| w[1].t < w[0].t) {
            Some(i) => Err(i + 1),
            None => Ok(()),
        }
    }

    pub fn summary(&self) -> LogSummary {
        let mut summary = LogSummary::default();
        for e in &self.events {
            match e.kind() {
                ActionKind::KeyDown => summary.key_downs += 1,
                ActionKind::KeyUp => summary.key_ups += 1,
                ActionKind::MouseMove => summary.moves += 1,
                ActionKind::MouseClick => summary.clicks += 1,
            }
        }
        summary
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a ActionEvent;
    type IntoIter = std::slice::Iter<'a, ActionEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// Build a log without clamping; use [`EventLog::validate`] before trusting it
impl From<Vec<ActionEvent>> for EventLog {
    fn from(events: Vec<ActionEvent>) -> Self {
        Self { events }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LogSummary {
    pub key_downs: usize,
    pub key_ups: usize,
    pub moves: usize,
    pub clicks: usize,
}

/// A finished recording session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub name: String,
    /// Wall-clock time of `t == 0`
    pub started_at: DateTime<Utc>,
    pub events: EventLog,
}

impl Recording {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            started_at: Utc::now(),
            events: EventLog::new(),
        }
    }

    pub fn with_events(name: impl Into<String>, events: EventLog) -> Self {
        Self {
            events,
            ..Self::new(name)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Absolute wall-clock time of an event in this recording, `None` if the
    /// offset is outside chrono's range
    pub fn wall_time(&self, event: &ActionEvent) -> Option<DateTime<Utc>> {
        let ms = i64::try_from(event.t).ok()?;
        self.started_at.checked_add_signed(chrono::Duration::try_milliseconds(ms)?)
    }
}

/// The process-wide recording buffer
///
/// Publishing replaces the buffer and bumps the generation. Readers hold their
/// own `Arc` to the generation they started with.
#[derive(Clone, Default)]
pub struct RecordingSlot {
    inner: Arc<RwLock<SlotInner>>,
}

#[derive(Default)]
struct SlotInner {
    generation: u64,
    recording: Option<Arc<Recording>>,
}

impl RecordingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, recording: Recording) -> u64 {
        let mut inner = self.inner.write();
        inner.generation += 1;
        inner.recording = Some(Arc::new(recording));
        inner.generation
    }

    pub fn current(&self) -> Option<Arc<Recording>> {
        self.inner.read().recording.clone()
    }

    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_json_shape() {
        let e = ActionEvent::new(50, Action::MouseMove { x: 100, y: -3 });
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, r#"{"t":50,"e":"m","x":100,"y":-3}"#);

        let key: ActionEvent = serde_json::from_str(r#"{"t":0,"e":"kd","k":87,"n":"W"}"#).unwrap();
        assert_eq!(key.action, Action::key_down(KeyId(0x57), "W"));

        let click: ActionEvent = serde_json::from_str(r#"{"t":7,"e":"c","b":"right"}"#).unwrap();
        assert_eq!(click.action, Action::MouseClick { b: MouseButton::Right });
    }

    #[test]
    fn test_push_clamps_backwards_timestamp() {
        let mut log = EventLog::new();
        log.record(20, Action::MouseMove { x: 1, y: 1 });
        log.record(10, Action::MouseMove { x: 2, y: 2 });
        assert_eq!(log.last().unwrap().t, 20);
        assert!(log.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_first_bad_index() {
        let log = EventLog::from(vec![
            ActionEvent::new(0, Action::MouseMove { x: 0, y: 0 }),
            ActionEvent::new(30, Action::MouseMove { x: 1, y: 0 }),
            ActionEvent::new(5, Action::MouseMove { x: 2, y: 0 }),
        ]);
        assert_eq!(log.validate(), Err(2));
    }

    #[test]
    fn test_duration_and_summary() {
        let mut log = EventLog::new();
        log.record(100, Action::key_down(KeyId(0x57), "W"));
        log.record(150, Action::MouseClick { b: MouseButton::Left });
        log.record(160, Action::MouseClick { b: MouseButton::Left });
        log.record(300, Action::key_up(KeyId(0x57), "W"));
        assert_eq!(log.duration(), Duration::from_millis(200));
        let s = log.summary();
        assert_eq!((s.key_downs, s.key_ups, s.moves, s.clicks), (1, 1, 0, 2));
    }

    #[test]
    fn test_wall_time_out_of_range() {
        let mut log = EventLog::new();
        log.record(1500, Action::MouseMove { x: 0, y: 0 });
        log.record(100_000_000_000_000_000, Action::MouseMove { x: 1, y: 1 });
        log.record(u64::MAX, Action::MouseMove { x: 2, y: 2 });
        let rec = Recording::with_events("far", log);

        let first = rec.wall_time(&rec.events.as_slice()[0]).unwrap();
        assert_eq!((first - rec.started_at).num_milliseconds(), 1500);
        assert!(rec.wall_time(&rec.events.as_slice()[1]).is_none());
        assert!(rec.wall_time(&rec.events.as_slice()[2]).is_none());
    }

    #[test]
    fn test_slot_generations() {
        let slot = RecordingSlot::new();
        assert!(slot.current().is_none());
        let held = {
            slot.publish(Recording::new("first"));
            slot.current().unwrap()
        };
        assert_eq!(slot.publish(Recording::new("second")), 2);
        assert_eq!(held.name, "first");
        assert_eq!(slot.current().unwrap().name, "second");
    }
}
