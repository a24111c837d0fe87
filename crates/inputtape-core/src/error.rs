//! Structured errors shared by the recorder, player and CLI

use serde::{Deserialize, Serialize};
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    EmptyRecording,
    InvalidRecording,
    Busy,
    ActionFailed,
    NotImplemented,
    Config,
    Io,
    Unknown,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestions: Vec::new(),
            context: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn empty_recording() -> Self {
        Self::new(ErrorCode::EmptyRecording, "No actions recorded!")
            .with_suggestions(vec!["Record something before starting playback".to_string()])
    }

    pub fn invalid_recording(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRecording, reason)
    }

    pub fn busy(what: &str) -> Self {
        Self::new(ErrorCode::Busy, format!("Cannot start while {} is in progress", what))
    }

    pub fn action_failed(action: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::ActionFailed,
            format!("{} failed: {}", action, reason),
        )
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotImplemented, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Config, message)
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<Error>() {
            Ok(err) => err,
            Err(e) => Self::new(ErrorCode::Unknown, e.to_string()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorCode::Io, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_code_in_screaming_case() {
        let json = serde_json::to_value(Error::empty_recording()).unwrap();
        assert_eq!(json["code"], "EMPTY_RECORDING");
        assert!(json.get("context").is_none());
    }

    #[test]
    fn test_anyhow_roundtrip_keeps_code() {
        let wrapped: anyhow::Error = Error::busy("playback").into();
        let back = Error::from(wrapped);
        assert!(back.is(ErrorCode::Busy));
    }
}
