//! Session wire protocol
//!
//! Client → server: one binary message per encoded frame, plus the text
//! command `{"action":"end"}`.
//! Server → client: JSON event messages and a close code per exit path.

use chrono::{DateTime, Utc};
use emotrack_common::time::to_iso8601;
use emotrack_common::EmotionLabel;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Emotion value sent when no face is present
pub const NO_FACE: &str = "no_face";
/// Emotion value sent when classification failed
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Connected,
    Ping,
}

/// Server → client event message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServerEvent {
    Status {
        status: Status,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<Uuid>,
    },
    Emotion {
        emotion: &'static str,
        confidence: f64,
        timestamp: String,
    },
    Error {
        error: String,
    },
}

impl ServerEvent {
    pub fn connected(session_id: Uuid) -> Self {
        ServerEvent::Status {
            status: Status::Connected,
            session_id: Some(session_id),
        }
    }

    pub fn ping() -> Self {
        ServerEvent::Status {
            status: Status::Ping,
            session_id: None,
        }
    }

    pub fn classified(emotion: EmotionLabel, confidence: f64, at: &DateTime<Utc>) -> Self {
        ServerEvent::Emotion {
            emotion: emotion.as_str(),
            confidence,
            timestamp: to_iso8601(at),
        }
    }

    pub fn no_face(at: &DateTime<Utc>) -> Self {
        ServerEvent::Emotion {
            emotion: NO_FACE,
            confidence: 0.0,
            timestamp: to_iso8601(at),
        }
    }

    pub fn unknown(at: &DateTime<Utc>) -> Self {
        ServerEvent::Emotion {
            emotion: UNKNOWN,
            confidence: 0.0,
            timestamp: to_iso8601(at),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            error: message.into(),
        }
    }

    /// JSON text of the message
    pub fn to_text(&self) -> String {
        // Serializing these shapes cannot fail; fall back to a bare error object
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"error":"internal"}"#.to_string())
    }
}

/// Client → server text commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Explicit end of stream
    End,
}

impl ClientCommand {
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Why a session ended, with the close code sent to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Client sent the end command
    ClientEnded,
    /// Client closed the connection or the stream ended
    Disconnected,
    /// Fixed-duration mode elapsed
    MaxDuration,
    IdleTimeout,
    Preempted,
    AuthFailed,
    /// Unrecoverable transport or loop failure
    Error,
}

impl CloseReason {
    pub const NORMAL: u16 = 1000;
    pub const POLICY_VIOLATION: u16 = 1008;
    pub const INTERNAL_ERROR: u16 = 1011;
    pub const IDLE_TIMEOUT: u16 = 4000;
    pub const PREEMPTED: u16 = 4001;

    pub fn code(&self) -> u16 {
        match self {
            CloseReason::ClientEnded | CloseReason::Disconnected | CloseReason::MaxDuration => {
                Self::NORMAL
            }
            CloseReason::AuthFailed => Self::POLICY_VIOLATION,
            CloseReason::Error => Self::INTERNAL_ERROR,
            CloseReason::IdleTimeout => Self::IDLE_TIMEOUT,
            CloseReason::Preempted => Self::PREEMPTED,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::ClientEnded => "client_ended",
            CloseReason::Disconnected => "disconnected",
            CloseReason::MaxDuration => "max_duration",
            CloseReason::IdleTimeout => "idle_timeout",
            CloseReason::Preempted => "preempted",
            CloseReason::AuthFailed => "auth_failed",
            CloseReason::Error => "error",
        }
    }

    /// Human-readable text for the close frame
    pub fn description(&self) -> &'static str {
        match self {
            CloseReason::ClientEnded => "Session ended by client",
            CloseReason::Disconnected => "Client disconnected",
            CloseReason::MaxDuration => "Monitoring duration reached",
            CloseReason::IdleTimeout => "No frames received",
            CloseReason::Preempted => "Replaced by a newer session",
            CloseReason::AuthFailed => "Authentication failed",
            CloseReason::Error => "Internal error",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
