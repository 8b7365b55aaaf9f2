//! Events a [`Session`](crate::session::Session) hands to its sink.

use crate::display::DisplaySegment;
use crate::stats::GameStats;
use crate::vendor::VendorCommand;
use jiff::Timestamp;
use serde::Serialize;

/// Which path produced a stats update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsSource {
    /// Complete binary stats record
    Record,
    /// Fallback matcher over plain text
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionStatus {
    Connected { peer: String },
    Error { message: String },
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Segment {
        segment: DisplaySegment,
    },
    Vendor {
        command: VendorCommand,
    },
    StatsUpdated {
        stats: GameStats,
        source: StatsSource,
    },
    Status {
        status: SessionStatus,
        at: Timestamp,
    },
}

impl SessionEvent {
    /// Status event stamped with the current time
    pub fn status(status: SessionStatus) -> Self {
        SessionEvent::Status {
            status,
            at: Timestamp::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_event_json() {
        let event = SessionEvent::Status {
            status: SessionStatus::Connected {
                peer: "127.0.0.1:23".to_string(),
            },
            at: Timestamp::UNIX_EPOCH,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"event":"status","status":{"status":"connected","peer":"127.0.0.1:23"},"at":"1970-01-01T00:00:00Z"}"#
        );
    }

    #[test]
    fn test_segment_event_json() {
        let event = SessionEvent::Segment {
            segment: DisplaySegment::Newline,
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"event":"segment","segment":{"type":"newline"}}"#
        );
    }
}
