//! Bounded persistent log buffer.
//!
//! A 500-entry ring of leveled, component-tagged records in sqlite, kept
//! separate from the ambient `tracing` output so the `logs` command can show
//! recent activity across runs. Writing is best-effort: a failed insert is
//! reported on the tracing side and never propagated to the caller.

use std::fmt;
use std::str::FromStr;

use sqlx::FromRow;
use thiserror::Error;
use tracing::warn;

use crate::db::Database;

/// Maximum number of retained log records.
pub const MAX_LOG_ENTRIES: u32 = 500;

/// Maximum stored length of a record's detail field, in characters.
pub const MAX_DETAIL_CHARS: usize = 500;

/// Record severity, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ERROR" => Ok(Self::Error),
            "WARN" => Ok(Self::Warn),
            "INFO" => Ok(Self::Info),
            "DEBUG" => Ok(Self::Debug),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// A stored log record.
#[derive(Debug, Clone, FromRow)]
pub struct LogRecord {
    pub id: i64,
    /// Unix timestamp in milliseconds.
    pub ts: i64,
    pub level: String,
    pub component: String,
    pub message: String,
    pub detail: Option<String>,
}

/// Log-store errors, surfaced only by read and clear operations.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("log query failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Sqlite-backed log store with eviction beyond [`MAX_LOG_ENTRIES`].
#[derive(Debug, Clone)]
pub struct LogStore {
    db: Database,
}

impl LogStore {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn now_ms() -> i64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
    }

    /// Appends a record, evicting the oldest rows beyond the cap.
    ///
    /// Never fails the caller: insert or eviction errors are downgraded to
    /// a `tracing` warning.
    pub async fn record(
        &self,
        level: LogLevel,
        component: &str,
        message: &str,
        detail: Option<&str>,
    ) {
        let truncated = detail.map(|d| {
            if d.chars().count() > MAX_DETAIL_CHARS {
                d.chars().take(MAX_DETAIL_CHARS).collect::<String>()
            } else {
                d.to_string()
            }
        });

        let insert = sqlx::query(
            "INSERT INTO logs (ts, level, component, message, detail) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Self::now_ms())
        .bind(level.as_str())
        .bind(component)
        .bind(message)
        .bind(truncated)
        .execute(self.db.pool())
        .await;

        if let Err(e) = insert {
            warn!(error = %e, "log record insert failed");
            return;
        }

        let evict = sqlx::query(
            "DELETE FROM logs WHERE id NOT IN (SELECT id FROM logs ORDER BY id DESC LIMIT ?)",
        )
        .bind(i64::from(MAX_LOG_ENTRIES))
        .execute(self.db.pool())
        .await;

        if let Err(e) = evict {
            warn!(error = %e, "log eviction failed");
        }
    }

    /// Fetches records newest first, optionally filtered by level and
    /// component.
    ///
    /// # Errors
    ///
    /// Returns `LogError::Database` if the query fails.
    pub async fn get(
        &self,
        level: Option<LogLevel>,
        component: Option<&str>,
        limit: u32,
    ) -> Result<Vec<LogRecord>, LogError> {
        let records = sqlx::query_as::<_, LogRecord>(
            "SELECT id, ts, level, component, message, detail FROM logs
             WHERE (?1 IS NULL OR level = ?1)
               AND (?2 IS NULL OR component = ?2)
             ORDER BY id DESC LIMIT ?3",
        )
        .bind(level.map(LogLevel::as_str))
        .bind(component)
        .bind(i64::from(limit))
        .fetch_all(self.db.pool())
        .await?;
        Ok(records)
    }

    /// Deletes all records, returning the number removed.
    ///
    /// # Errors
    ///
    /// Returns `LogError::Database` if the delete fails.
    pub async fn clear(&self) -> Result<u64, LogError> {
        let result = sqlx::query("DELETE FROM logs")
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
