//! Report trigger
//!
//! Hands a persisted trend to the report generator on a detached task.
//! Generation failures stay inside that task: they are logged and published
//! as `ReportFailed`, and never reach the closed session.

use async_trait::async_trait;
use emotrack_common::time::{file_stamp, now};
use emotrack_common::{EventBus, MonitorEvent, ReportRecord, TrendSummary};
use serde_json::json;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::db::insert_report;
use crate::error::{Error, Result};

/// Report-generation collaborator
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate(&self, trend: &TrendSummary) -> Result<ReportRecord>;
}

#[derive(Clone)]
pub struct ReportTrigger {
    generator: Arc<dyn ReportGenerator>,
    events: EventBus,
}

impl ReportTrigger {
    pub fn new(generator: Arc<dyn ReportGenerator>, events: EventBus) -> Self {
        Self { generator, events }
    }

    /// Fire-and-forget report generation
    ///
    /// The returned handle may be dropped; the task keeps running.
    pub fn on_trend_ready(&self, trend: TrendSummary) -> JoinHandle<()> {
        let generator = Arc::clone(&self.generator);
        let events = self.events.clone();

        tokio::spawn(async move {
            let session_id = trend.session_id;
            let identity_id = trend.identity_id;

            match generator.generate(&trend).await {
                Ok(record) => {
                    info!(
                        %session_id,
                        identity_id,
                        file = %record.file_path.display(),
                        "Report generated"
                    );
                    events.emit_lossy(MonitorEvent::ReportGenerated {
                        session_id,
                        identity_id,
                        file_path: record.file_path,
                        dominant_emotion: record.dominant_emotion,
                        timestamp: now(),
                    });
                }
                Err(e) => {
                    error!(%session_id, identity_id, "Report generation failed: {}", e);
                    events.emit_lossy(MonitorEvent::ReportFailed {
                        session_id,
                        identity_id,
                        error: e.to_string(),
                        timestamp: now(),
                    });
                }
            }
        })
    }
}

/// Writes a JSON report document and records it in `reports`
pub struct JsonReportGenerator {
    pool: SqlitePool,
    reports_dir: PathBuf,
}

impl JsonReportGenerator {
    pub fn new(pool: SqlitePool, reports_dir: PathBuf) -> Self {
        Self { pool, reports_dir }
    }

    fn report_path(&self, trend: &TrendSummary, stamp: &str) -> PathBuf {
        self.reports_dir.join(format!(
            "{}_emotion_report_{}_{}.json",
            trend.identity_id, trend.session_id, stamp
        ))
    }
}

#[async_trait]
impl ReportGenerator for JsonReportGenerator {
    async fn generate(&self, trend: &TrendSummary) -> Result<ReportRecord> {
        let generated_at = now();
        let dominant_emotion = trend.dominant_emotion();
        let file_path = self.report_path(trend, &file_stamp(&generated_at));

        let document = json!({
            "report_type": "emotion_tracking",
            "identity_id": trend.identity_id,
            "session_id": trend.session_id,
            "period_start": trend.period_start,
            "period_end": trend.period_end,
            "sample_count": trend.sample_count(),
            "dominant_emotion": dominant_emotion,
            "overall_avg_confidence": trend.overall_avg_confidence,
            "per_label": trend.per_label,
            "generated_at": generated_at,
        });

        tokio::fs::create_dir_all(&self.reports_dir)
            .await
            .map_err(|e| Error::Report(format!("{}: {}", self.reports_dir.display(), e)))?;
        tokio::fs::write(&file_path, serde_json::to_vec_pretty(&document)?)
            .await
            .map_err(|e| Error::Report(format!("{}: {}", file_path.display(), e)))?;

        let record = ReportRecord {
            identity_id: trend.identity_id,
            session_id: trend.session_id,
            file_path,
            dominant_emotion,
            generated_at,
        };

        let summary = serde_json::to_string(&trend.per_label)?;
        insert_report(&self.pool, &record, &summary).await?;

        Ok(record)
    }
}
