//! Report records

use emotrack_common::time::to_iso8601;
use emotrack_common::ReportRecord;
use sqlx::SqlitePool;

use crate::error::{Error, Result};

/// Insert a `reports` row; returns its id
///
/// `emotion_summary` is the trend's per-label JSON.
pub async fn insert_report(
    pool: &SqlitePool,
    record: &ReportRecord,
    emotion_summary: &str,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO reports
            (user_id, session_id, file_path, dominant_emotion, emotion_summary, generated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.identity_id)
    .bind(record.session_id.to_string())
    .bind(record.file_path.to_string_lossy().into_owned())
    .bind(record.dominant_emotion.map(|e| e.as_str()))
    .bind(emotion_summary)
    .bind(to_iso8601(&record.generated_at))
    .execute(pool)
    .await
    .map_err(|e| Error::Report(format!("reports row: {}", e)))?;

    Ok(result.last_insert_rowid())
}

/// Number of reports stored for a session
pub async fn count_reports(pool: &SqlitePool, session_id: uuid::Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reports WHERE session_id = ?")
        .bind(session_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count)
}
