use anyhow::Result;
use sqlx::SqlitePool;

/// Create the correction-memory schema. Idempotent; safe to run on every
/// startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Append-only: rows are never updated or deleted. Reclassifying an input
    // inserts a new row; lookups take the latest by created_at.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS corrections (
            id TEXT PRIMARY KEY,
            normalized_key TEXT NOT NULL,
            source_raw_input TEXT NOT NULL,
            source_id TEXT NOT NULL,
            resource_kind TEXT NOT NULL,
            series_name TEXT NOT NULL,
            issue_number TEXT,
            year INTEGER,
            publisher TEXT,
            cover_image_ref TEXT,
            original_confidence REAL NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_corrections_key_created
         ON corrections(normalized_key, created_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
