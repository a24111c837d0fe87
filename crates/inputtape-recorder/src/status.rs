//! Operator-facing status events
//!
//! Workers report progress over a channel; the CLI prints the `Display` form.

pub use crossbeam_channel::{Receiver, Sender};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    RecordingStarted { name: String },
    RecordingStopped { events: usize },
    RecordingFailed { reason: String },
    PlaybackStarted { events: usize, looping: bool },
    KeyPressed { label: String },
    KeyReleased { label: String },
    LoopCompleted { pass: usize },
    PlaybackStopped,
    PlaybackFinished,
    PlaybackFailed { reason: String },
    NothingToPlay,
    LoopMode { on: bool },
    Rejected { reason: String },
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::RecordingStarted { name } => write!(f, "Recording '{}' started...", name),
            StatusEvent::RecordingStopped { events } => {
                write!(f, "Recording stopped! ({} events)", events)
            }
            StatusEvent::RecordingFailed { reason } => write!(f, "Recording failed: {}", reason),
            StatusEvent::PlaybackStarted { events, looping } => write!(
                f,
                "Playing recording ({} events) - Loop mode: {}",
                events,
                on_off(*looping)
            ),
            StatusEvent::KeyPressed { label } => write!(f, "Pressing {}", label),
            StatusEvent::KeyReleased { label } => write!(f, "Releasing {}", label),
            StatusEvent::LoopCompleted { .. } => {
                f.write_str("Loop complete, starting next iteration...")
            }
            StatusEvent::PlaybackStopped => f.write_str("Playback stopped!"),
            StatusEvent::PlaybackFinished => f.write_str("Playback complete!"),
            StatusEvent::PlaybackFailed { reason } => write!(f, "Playback failed: {}", reason),
            StatusEvent::NothingToPlay => f.write_str("No actions recorded!"),
            StatusEvent::LoopMode { on } => write!(f, "Loop mode: {}", on_off(*on)),
            StatusEvent::Rejected { reason } => write!(f, "Ignored: {}", reason),
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}

/// Where a worker sends its status lines. A sink without a channel drops them.
#[derive(Debug, Clone, Default)]
pub struct StatusSink {
    tx: Option<Sender<StatusEvent>>,
}

impl StatusSink {
    pub fn new(tx: Sender<StatusEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn channel() -> (Self, Receiver<StatusEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: StatusEvent) {
        tracing::debug!(status = %event);
        if let Some(tx) = &self.tx {
            // Receiver gone means nobody is listening anymore
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_lines() {
        assert_eq!(StatusEvent::NothingToPlay.to_string(), "No actions recorded!");
        assert_eq!(
            StatusEvent::KeyPressed { label: "W".into() }.to_string(),
            "Pressing W"
        );
        assert_eq!(StatusEvent::LoopMode { on: true }.to_string(), "Loop mode: ON");
    }

    #[test]
    fn test_sink_survives_dropped_receiver() {
        let (sink, rx) = StatusSink::channel();
        drop(rx);
        sink.emit(StatusEvent::PlaybackFinished);
        StatusSink::none().emit(StatusEvent::PlaybackFinished);
    }
}
