//! Monitor events and the EventBus
//!
//! Lifecycle events for ingestion sessions and the reports they produce.
//! Events are broadcast via EventBus and can be serialized for SSE transmission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{EmotionLabel, IdentityId};

/// Monitor event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MonitorEvent {
    /// Session admitted and streaming
    SessionOpened {
        session_id: Uuid,
        identity_id: IdentityId,
        timestamp: DateTime<Utc>,
    },

    /// Session forced closed because a newer session for the same identity was admitted
    SessionPreempted {
        session_id: Uuid,
        identity_id: IdentityId,
        /// Session that replaced it
        replaced_by: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Session finished cleanup
    SessionClosed {
        session_id: Uuid,
        identity_id: IdentityId,
        /// Close reason (normal, idle_timeout, preempted, ...)
        reason: String,
        /// Successfully classified frames
        samples_recorded: u64,
        /// Samples durably written
        samples_persisted: u64,
        /// Samples discarded by buffer overflow
        samples_dropped: u64,
        /// When the session was admitted
        opened_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// Trend summary persisted for a session
    TrendSaved {
        session_id: Uuid,
        identity_id: IdentityId,
        overall_avg_confidence: f64,
        timestamp: DateTime<Utc>,
    },

    /// Report produced for a persisted trend
    ReportGenerated {
        session_id: Uuid,
        identity_id: IdentityId,
        file_path: PathBuf,
        dominant_emotion: Option<EmotionLabel>,
        timestamp: DateTime<Utc>,
    },

    /// Report generation failed (isolated, never reaches the client)
    ReportFailed {
        session_id: Uuid,
        identity_id: IdentityId,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl MonitorEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            MonitorEvent::SessionOpened { .. } => "SessionOpened",
            MonitorEvent::SessionPreempted { .. } => "SessionPreempted",
            MonitorEvent::SessionClosed { .. } => "SessionClosed",
            MonitorEvent::TrendSaved { .. } => "TrendSaved",
            MonitorEvent::ReportGenerated { .. } => "ReportGenerated",
            MonitorEvent::ReportFailed { .. } => "ReportFailed",
        }
    }

    /// Session the event refers to
    pub fn session_id(&self) -> Uuid {
        match self {
            MonitorEvent::SessionOpened { session_id, .. }
            | MonitorEvent::SessionPreempted { session_id, .. }
            | MonitorEvent::SessionClosed { session_id, .. }
            | MonitorEvent::TrendSaved { session_id, .. }
            | MonitorEvent::ReportGenerated { session_id, .. }
            | MonitorEvent::ReportFailed { session_id, .. } => *session_id,
        }
    }
}

/// Process-wide event distribution
///
/// Thin wrapper over a tokio broadcast channel. Slow subscribers lag and
/// lose the oldest events; emitters never block.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MonitorEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use emotrack_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: MonitorEvent,
    ) -> Result<usize, broadcast::error::SendError<MonitorEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: MonitorEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
