//! Progress events emitted during an extraction run

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Kind of progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Downloading,
    Success,
    Error,
    Info,
    Resume,
    Cleanup,
    Cancelled,
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProgressStatus::Downloading => "downloading",
            ProgressStatus::Success => "success",
            ProgressStatus::Error => "error",
            ProgressStatus::Info => "info",
            ProgressStatus::Resume => "resume",
            ProgressStatus::Cleanup => "cleanup",
            ProgressStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// One progress record. `current` and `total` count file units
/// (one list manifest plus one file per language, per section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub current: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_file: Option<String>,
    pub status: ProgressStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressEvent {
    pub fn new(status: ProgressStatus, current: usize, total: usize) -> Self {
        Self {
            current,
            total,
            current_file: None,
            status,
            error: None,
            entry_count: None,
            message: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.current_file = Some(file.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_entries(mut self, count: usize) -> Self {
        self.entry_count = Some(count);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

pub type EventSender = mpsc::UnboundedSender<ProgressEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

/// Create an ordered event channel for one consumer
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_skips_empty_fields() {
        let event = ProgressEvent::new(ProgressStatus::Success, 2, 5)
            .with_file("nowloading_us.json")
            .with_entries(12);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["current_file"], "nowloading_us.json");
        assert_eq!(json["entry_count"], 12);
        assert!(json.get("error").is_none());
        assert!(json.get("message").is_none());
    }
}
