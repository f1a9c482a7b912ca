//! Time-bounded submission history.
//!
//! One row per submitted info-hash. A hash counts as a duplicate only while
//! its record is younger than the retention window; stale records are
//! removed lazily during lookups and in bulk by the periodic sweep.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sqlx::FromRow;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::db::Database;
use crate::magnet::InfoHash;

/// How often the periodic sweep runs in watch mode.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Where a submission originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionSource {
    /// Explicit user action on a specific link or selection.
    ContextMenu,
    /// Automatic detection on an allow-listed page.
    ContentScript,
}

impl SubmissionSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContextMenu => "context_menu",
            Self::ContentScript => "content_script",
        }
    }
}

/// A persisted submission, as stored in the `transfers` table.
#[derive(Debug, Clone, FromRow)]
pub struct SubmissionRecord {
    pub hash: String,
    /// Unix timestamp in milliseconds.
    pub submitted_at: i64,
    pub source: String,
    pub origin: Option<String>,
}

/// History-related errors.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// The database query failed.
    #[error("history query failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Sqlite-backed submission history keyed by info-hash.
#[derive(Debug, Clone)]
pub struct History {
    db: Database,
}

impl History {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn now_ms() -> i64 {
        // Clock-before-epoch is not a supported environment
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
    }

    /// Checks whether a hash was submitted within the retention window.
    ///
    /// A stale record found during the check is deleted immediately, so a
    /// re-submission after expiry starts from a clean row.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Database` if a query fails.
    #[instrument(skip(self, window), fields(hash = %hash))]
    pub async fn is_duplicate(
        &self,
        hash: &InfoHash,
        window: Duration,
    ) -> Result<bool, HistoryError> {
        self.is_duplicate_at(hash, window, Self::now_ms()).await
    }

    async fn is_duplicate_at(
        &self,
        hash: &InfoHash,
        window: Duration,
        now_ms: i64,
    ) -> Result<bool, HistoryError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT submitted_at FROM transfers WHERE hash = ?")
                .bind(hash.as_str())
                .fetch_optional(self.db.pool())
                .await?;

        let Some((submitted_at,)) = row else {
            return Ok(false);
        };

        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        if now_ms.saturating_sub(submitted_at) < window_ms {
            return Ok(true);
        }

        // Lazy expiry
        sqlx::query("DELETE FROM transfers WHERE hash = ?")
            .bind(hash.as_str())
            .execute(self.db.pool())
            .await?;
        debug!(hash = %hash, "expired history record removed");
        Ok(false)
    }

    /// Records a successful submission. Upsert; last write wins.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Database` if the write fails.
    #[instrument(skip(self), fields(hash = %hash, source = source.as_str()))]
    pub async fn mark_submitted(
        &self,
        hash: &InfoHash,
        source: SubmissionSource,
        origin: Option<&str>,
    ) -> Result<(), HistoryError> {
        sqlx::query(
            "INSERT INTO transfers (hash, submitted_at, source, origin) VALUES (?, ?, ?, ?)
             ON CONFLICT(hash) DO UPDATE SET
                 submitted_at = excluded.submitted_at,
                 source = excluded.source,
                 origin = excluded.origin",
        )
        .bind(hash.as_str())
        .bind(Self::now_ms())
        .bind(source.as_str())
        .bind(origin)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Deletes all records older than the retention window.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Database` if the delete fails.
    #[instrument(skip(self, window))]
    pub async fn sweep_expired(&self, window: Duration) -> Result<u64, HistoryError> {
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        let cutoff = Self::now_ms().saturating_sub(window_ms);

        let result = sqlx::query("DELETE FROM transfers WHERE submitted_at < ?")
            .bind(cutoff)
            .execute(self.db.pool())
            .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            debug!(removed, "swept expired history records");
        }
        Ok(removed)
    }

    /// Deletes the entire history, returning the number of removed rows.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Database` if the delete fails.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<u64, HistoryError> {
        let result = sqlx::query("DELETE FROM transfers")
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// Lists records, newest first, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Database` if the query fails.
    pub async fn recent(&self, limit: u32) -> Result<Vec<SubmissionRecord>, HistoryError> {
        let records = sqlx::query_as::<_, SubmissionRecord>(
            "SELECT hash, submitted_at, source, origin FROM transfers
             ORDER BY submitted_at DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(self.db.pool())
        .await?;
        Ok(records)
    }
}
