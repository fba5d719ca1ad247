//! Correction memory store.
//!
//! Human-confirmed resolutions, keyed by normalized input. Consulted before
//! any catalog lookup and written after a manual pick. Append-only: a
//! concurrent or repeated confirmation for the same key adds a row, and
//! reads take the most recent — no locking needed.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::warn;
use uuid::Uuid;

use crate::models::{CorrectionRecord, ResourceKind, SelectedItem};

/// Fetch the most recent correction for a normalized key, if any.
/// `created_at` is stored at millisecond precision so back-to-back
/// confirmations still order correctly; ties on the same millisecond are
/// broken by id so the answer stays deterministic.
pub async fn lookup(pool: &SqlitePool, normalized_key: &str) -> Result<Option<CorrectionRecord>> {
    let row = sqlx::query(
        r#"
        SELECT id, normalized_key, source_raw_input, source_id, resource_kind,
               series_name, issue_number, year, publisher, cover_image_ref,
               original_confidence, created_at
        FROM corrections
        WHERE normalized_key = ?
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(normalized_key)
    .fetch_optional(pool)
    .await?;

    row.map(record_from_row).transpose()
}

/// Append a correction record. Never updates existing rows.
pub async fn record(pool: &SqlitePool, correction: &CorrectionRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO corrections (
            id, normalized_key, source_raw_input, source_id, resource_kind,
            series_name, issue_number, year, publisher, cover_image_ref,
            original_confidence, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(correction.id.to_string())
    .bind(&correction.normalized_key)
    .bind(&correction.source_raw_input)
    .bind(&correction.selected.source_id)
    .bind(correction.selected.resource_kind.as_str())
    .bind(&correction.selected.series_name)
    .bind(&correction.selected.issue_number)
    .bind(correction.selected.year)
    .bind(&correction.selected.publisher)
    .bind(&correction.selected.cover_image_ref)
    .bind(correction.original_confidence)
    .bind(correction.created_at.timestamp_millis())
    .execute(pool)
    .await?;

    Ok(())
}

/// Best-effort write: the user-visible resolution has already been produced,
/// so a persistence failure is logged and swallowed rather than surfaced.
pub async fn record_best_effort(pool: &SqlitePool, correction: &CorrectionRecord) {
    if let Err(e) = record(pool, correction).await {
        warn!(
            key = %correction.normalized_key,
            error = %e,
            "correction write failed; resolution already returned"
        );
    }
}

/// List corrections, newest first, optionally filtered to one key.
pub async fn list(
    pool: &SqlitePool,
    normalized_key: Option<&str>,
    limit: i64,
) -> Result<Vec<CorrectionRecord>> {
    let rows = match normalized_key {
        Some(key) => {
            sqlx::query(
                r#"
                SELECT id, normalized_key, source_raw_input, source_id, resource_kind,
                       series_name, issue_number, year, publisher, cover_image_ref,
                       original_confidence, created_at
                FROM corrections
                WHERE normalized_key = ?
                ORDER BY created_at DESC, id DESC
                LIMIT ?
                "#,
            )
            .bind(key)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                SELECT id, normalized_key, source_raw_input, source_id, resource_kind,
                       series_name, issue_number, year, publisher, cover_image_ref,
                       original_confidence, created_at
                FROM corrections
                ORDER BY created_at DESC, id DESC
                LIMIT ?
                "#,
            )
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };

    rows.into_iter().map(record_from_row).collect()
}

fn record_from_row(row: sqlx::sqlite::SqliteRow) -> Result<CorrectionRecord> {
    let id: String = row.get("id");
    let kind: String = row.get("resource_kind");
    let created_at: i64 = row.get("created_at");

    Ok(CorrectionRecord {
        id: Uuid::parse_str(&id)?,
        normalized_key: row.get("normalized_key"),
        source_raw_input: row.get("source_raw_input"),
        selected: SelectedItem {
            source_id: row.get("source_id"),
            resource_kind: ResourceKind::parse(&kind)?,
            series_name: row.get("series_name"),
            issue_number: row.get("issue_number"),
            year: row.get("year"),
            publisher: row.get("publisher"),
            cover_image_ref: row.get("cover_image_ref"),
        },
        original_confidence: row.get("original_confidence"),
        created_at: DateTime::<Utc>::from_timestamp_millis(created_at).unwrap_or_else(Utc::now),
    })
}
