//! Sample and trend persistence
//!
//! Samples of one session are partitioned by `session_id`, so sessions write
//! without any cross-session locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use emotrack_common::time::to_iso8601;
use emotrack_common::{EmotionLabel, Sample, TrendSummary};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Persistence collaborator used by the sample buffer and the aggregator
#[async_trait]
pub trait EmotionRepository: Send + Sync {
    /// Store a batch; all samples are written or none are
    async fn save_samples(&self, batch: &[Sample]) -> Result<()>;

    /// All persisted samples of a session, in capture order
    async fn query_samples(&self, session_id: Uuid) -> Result<Vec<Sample>>;

    /// Store the session's trend summary
    async fn save_trend(&self, trend: &TrendSummary) -> Result<()>;
}

/// SQLite-backed repository
#[derive(Debug, Clone)]
pub struct SqliteEmotionRepository {
    pool: SqlitePool,
}

impl SqliteEmotionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::Persistence(format!("Invalid stored timestamp '{}': {}", raw, e)))
}

#[async_trait]
impl EmotionRepository for SqliteEmotionRepository {
    async fn save_samples(&self, batch: &[Sample]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let persist = async {
            let mut tx = self.pool.begin().await?;

            for sample in batch {
                sqlx::query(
                    r#"
                    INSERT INTO emotion_data (user_id, session_id, emotion, intensity, timestamp)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(sample.identity_id)
                .bind(sample.session_id.to_string())
                .bind(sample.emotion.as_str())
                .bind(sample.confidence)
                .bind(to_iso8601(&sample.captured_at))
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await
        };

        persist
            .await
            .map_err(|e| Error::Persistence(format!("Batch of {} samples: {}", batch.len(), e)))
    }

    async fn query_samples(&self, session_id: Uuid) -> Result<Vec<Sample>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, emotion, intensity, timestamp
            FROM emotion_data
            WHERE session_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;

        rows.iter()
            .map(|row| -> Result<Sample> {
                let emotion: String = row.get("emotion");
                let timestamp: String = row.get("timestamp");
                Ok(Sample {
                    session_id,
                    identity_id: row.get("user_id"),
                    emotion: emotion
                        .parse::<EmotionLabel>()
                        .map_err(|e| Error::Persistence(e.to_string()))?,
                    confidence: row.get("intensity"),
                    captured_at: parse_timestamp(&timestamp)?,
                })
            })
            .collect()
    }

    async fn save_trend(&self, trend: &TrendSummary) -> Result<()> {
        let summary = serde_json::to_string(&trend.per_label)?;

        sqlx::query(
            r#"
            INSERT INTO emotion_trends
                (user_id, session_id, period_start, period_end, emotion_summary, average_intensity)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(trend.identity_id)
        .bind(trend.session_id.to_string())
        .bind(to_iso8601(&trend.period_start))
        .bind(to_iso8601(&trend.period_end))
        .bind(summary)
        .bind(trend.overall_avg_confidence)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::TrendPersistence(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emotrack_common::db::init_memory_database;

    async fn setup() -> SqliteEmotionRepository {
        let pool = init_memory_database().await.unwrap();
        sqlx::query("INSERT INTO users (id, email) VALUES (1, 'one@example.com')")
            .execute(&pool)
            .await
            .unwrap();
        SqliteEmotionRepository::new(pool)
    }

    fn sample(session_id: Uuid, emotion: EmotionLabel, confidence: f64) -> Sample {
        Sample {
            session_id,
            identity_id: 1,
            emotion,
            confidence,
            captured_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_batch_round_trip_preserves_order() {
        let repo = setup().await;
        let session_id = Uuid::new_v4();
        let batch = vec![
            sample(session_id, EmotionLabel::Happy, 0.9),
            sample(session_id, EmotionLabel::Sad, 0.4),
            sample(session_id, EmotionLabel::Angry, 0.7),
        ];

        repo.save_samples(&batch).await.unwrap();
        let stored = repo.query_samples(session_id).await.unwrap();

        let labels: Vec<_> = stored.iter().map(|s| s.emotion).collect();
        assert_eq!(labels, vec![EmotionLabel::Happy, EmotionLabel::Sad, EmotionLabel::Angry]);
        // Stored with microsecond precision
        assert_eq!(
            stored[0].captured_at.timestamp_micros(),
            batch[0].captured_at.timestamp_micros()
        );
    }

    #[tokio::test]
    async fn test_sessions_are_partitioned() {
        let repo = setup().await;
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        repo.save_samples(&[sample(a, EmotionLabel::Joy, 0.5)]).await.unwrap();
        repo.save_samples(&[sample(b, EmotionLabel::Fear, 0.5)]).await.unwrap();

        assert_eq!(repo.query_samples(a).await.unwrap().len(), 1);
        assert_eq!(repo.query_samples(b).await.unwrap()[0].emotion, EmotionLabel::Fear);
    }

    #[tokio::test]
    async fn test_failed_batch_writes_nothing() {
        let repo = setup().await;
        let session_id = Uuid::new_v4();
        // Second sample violates the users foreign key
        let mut orphan = sample(session_id, EmotionLabel::Sad, 0.2);
        orphan.identity_id = 999;
        let batch = vec![sample(session_id, EmotionLabel::Happy, 0.9), orphan];

        let result = repo.save_samples(&batch).await;
        assert!(matches!(result, Err(Error::Persistence(_))));
        assert!(repo.query_samples(session_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_trend_for_session_rejected() {
        let repo = setup().await;
        let session_id = Uuid::new_v4();
        let samples = vec![sample(session_id, EmotionLabel::Neutral, 0.5)];
        let trend = TrendSummary::from_samples(session_id, 1, &samples).unwrap();

        repo.save_trend(&trend).await.unwrap();
        let duplicate = repo.save_trend(&trend).await;
        assert!(matches!(duplicate, Err(Error::TrendPersistence(_))));
    }
}
