//! Session aggregator
//!
//! Builds the trend summary of a closed session from its persisted samples
//! and stores it. Runs once per session, from the controller's finish step.

use emotrack_common::{EventBus, IdentityId, MonitorEvent, TrendSummary};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::db::EmotionRepository;

#[derive(Clone)]
pub struct SessionAggregator {
    repo: Arc<dyn EmotionRepository>,
    events: EventBus,
}

impl SessionAggregator {
    pub fn new(repo: Arc<dyn EmotionRepository>, events: EventBus) -> Self {
        Self { repo, events }
    }

    /// Compute and persist the session's trend
    ///
    /// `None` when the session has no persisted samples or the trend could not
    /// be read or stored. Failures are logged; nothing is retried.
    pub async fn aggregate(&self, session_id: Uuid, identity_id: IdentityId) -> Option<TrendSummary> {
        let samples = match self.repo.query_samples(session_id).await {
            Ok(samples) => samples,
            Err(e) => {
                error!(%session_id, "Could not load samples for trend: {}", e);
                return None;
            }
        };

        let Some(trend) = TrendSummary::from_samples(session_id, identity_id, &samples) else {
            info!(%session_id, identity_id, "No samples recorded, skipping trend");
            return None;
        };

        if let Err(e) = self.repo.save_trend(&trend).await {
            error!(%session_id, identity_id, "Failed to save emotion trend: {}", e);
            return None;
        }

        info!(
            %session_id,
            identity_id,
            samples = trend.sample_count(),
            labels = trend.per_label.len(),
            overall_avg_confidence = trend.overall_avg_confidence,
            "Saved emotion trend"
        );

        self.events.emit_lossy(MonitorEvent::TrendSaved {
            session_id,
            identity_id,
            overall_avg_confidence: trend.overall_avg_confidence,
            timestamp: emotrack_common::time::now(),
        });

        Some(trend)
    }
}
