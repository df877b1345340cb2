//! Unit tests for database initialization

use emotrack_common::db::init::{init_database, init_memory_database};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("emotrack.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("emotrack.db");

    let pool1 = init_database(&db_path).await;
    assert!(pool1.is_ok());

    // Schema creation is idempotent
    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_all_tables_created() {
    let pool = init_memory_database().await.unwrap();

    for table in ["users", "emotion_data", "emotion_trends", "reports"] {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1, "Missing table {}", table);
    }
}

#[tokio::test]
async fn test_trend_session_id_is_unique() {
    let pool = init_memory_database().await.unwrap();

    sqlx::query("INSERT INTO users (email) VALUES ('a@example.com')")
        .execute(&pool)
        .await
        .unwrap();

    let insert = "INSERT INTO emotion_trends \
        (user_id, session_id, period_start, period_end, emotion_summary, average_intensity) \
        VALUES (1, 's-1', '2025-01-01T00:00:00Z', '2025-01-01T00:01:00Z', '{}', 0.5)";

    sqlx::query(insert).execute(&pool).await.unwrap();
    let duplicate = sqlx::query(insert).execute(&pool).await;
    assert!(duplicate.is_err(), "Second trend for the same session must be rejected");
}
