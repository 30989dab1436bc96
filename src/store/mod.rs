//! Sqlite-backed persistence for scheduled posts, workflow checkpoints and
//! reflection rules.

pub mod checkpoints;
pub mod posts;
pub mod rules;
pub mod types;

pub use checkpoints::CheckpointStore;
pub use posts::PostStore;
pub use rules::RuleStore;
pub use types::{Checkpoint, NewScheduledPost, PostStatus, ScheduledPost};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::Path;

/// One sqlite database implementing every store trait.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create store directory: {}", parent.display()))?;
        }

        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .with_context(|| format!("Failed to open store DB: {}", db_path.display()))?;

        ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS scheduled_posts (
            id             TEXT PRIMARY KEY,
            topic          TEXT NOT NULL,
            post           TEXT NOT NULL,
            scheduled_date TEXT NOT NULL,
            status         TEXT NOT NULL DEFAULT 'pending',
            image_url      TEXT,
            image_mime     TEXT,
            image_path     TEXT,
            created_date   TEXT NOT NULL,
            posted_date    TEXT
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create scheduled_posts table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_scheduled_posts_due
            ON scheduled_posts(status, scheduled_date)",
    )
    .execute(pool)
    .await
    .context("Failed to create scheduled_posts index")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS workflow_checkpoints (
            workflow_id  TEXT PRIMARY KEY,
            node         TEXT NOT NULL,
            interrupt_id TEXT,
            state        TEXT NOT NULL,
            request      TEXT,
            updated_at   TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create workflow_checkpoints table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS reflection_rules (
            style      TEXT PRIMARY KEY,
            rules      TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create reflection_rules table")?;

    Ok(())
}

/// Fixed-width UTC timestamps so string comparison in SQL orders by time.
pub(crate) fn to_db_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn parse_db_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp in store: {raw}"))
}

#[cfg(test)]
pub(crate) async fn test_store(dir: &tempfile::TempDir) -> SqliteStore {
    SqliteStore::open(&dir.path().join("postwright.db")).await.unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn db_time_is_fixed_width() {
        let a = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 11, 20, 13, 0, 0).unwrap();
        assert_eq!(to_db_time(a), "2026-01-02T03:04:05Z");
        assert!(to_db_time(a) < to_db_time(b));
        assert_eq!(parse_db_time(&to_db_time(b)).unwrap(), b);
    }

    #[tokio::test]
    async fn open_creates_parent_and_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("postwright.db");
        SqliteStore::open(&path).await.unwrap();
        SqliteStore::open(&path).await.unwrap();
        assert!(path.exists());
    }
}
