//! Events flowing from transfer workers back to whoever renders them.

use serde::Serialize;

use crate::state::DownloadId;

/// Fixed message carried by the error event of a cancelled transfer.
pub const INTERRUPTED_MESSAGE: &str = "Download interrupted by user";

/// Everything a transfer worker can report.
///
/// For a single download the stream is zero or more `Progress` events with
/// non-decreasing percents followed by exactly one `Finished` or `Error`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    Progress { id: DownloadId, percent: u8 },
    Finished { id: DownloadId },
    Error { id: DownloadId, message: String },
}

impl DownloadEvent {
    pub fn id(&self) -> DownloadId {
        match self {
            Self::Progress { id, .. } | Self::Finished { id } | Self::Error { id, .. } => *id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }

    /// True for the error event produced by a user interruption.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::Error { message, .. } if message == INTERRUPTED_MESSAGE)
    }
}

/// Consumer of download events, typically a presentation layer.
///
/// Implementations render; they never take part in the transfer itself.
pub trait EventSink {
    fn on_progress(&mut self, id: DownloadId, percent: u8);
    fn on_finished(&mut self, id: DownloadId);
    fn on_error(&mut self, id: DownloadId, message: &str);

    /// Dispatch an event to the matching handler.
    fn deliver(&mut self, event: &DownloadEvent) {
        match event {
            DownloadEvent::Progress { id, percent } => self.on_progress(*id, *percent),
            DownloadEvent::Finished { id } => self.on_finished(*id),
            DownloadEvent::Error { id, message } => self.on_error(*id, message),
        }
    }
}

/// Collects events in arrival order.
impl EventSink for Vec<DownloadEvent> {
    fn on_progress(&mut self, id: DownloadId, percent: u8) {
        self.push(DownloadEvent::Progress { id, percent });
    }

    fn on_finished(&mut self, id: DownloadId) {
        self.push(DownloadEvent::Finished { id });
    }

    fn on_error(&mut self, id: DownloadId, message: &str) {
        self.push(DownloadEvent::Error {
            id,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_tagged_json() {
        let id = DownloadId::new();
        let json = serde_json::to_value(DownloadEvent::Progress { id, percent: 42 }).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["percent"], 42);
        assert_eq!(json["id"], id.to_string());
    }

    #[test]
    fn vec_sink_records_in_order() {
        let id = DownloadId::new();
        let mut sink: Vec<DownloadEvent> = Vec::new();
        sink.deliver(&DownloadEvent::Progress { id, percent: 10 });
        sink.deliver(&DownloadEvent::Finished { id });

        assert_eq!(sink.len(), 2);
        assert!(!sink[0].is_terminal());
        assert!(sink[1].is_terminal());
        assert_eq!(sink[1].id(), id);
    }

    #[test]
    fn interruption_is_recognised_by_message() {
        let id = DownloadId::new();
        let interrupted = DownloadEvent::Error {
            id,
            message: INTERRUPTED_MESSAGE.to_string(),
        };
        let failed = DownloadEvent::Error {
            id,
            message: "connection reset".to_string(),
        };
        assert!(interrupted.is_interruption());
        assert!(!failed.is_interruption());
    }
}
