//! Persistent key-value settings.
//!
//! Three settings back the tool: the API credential, the history retention
//! window in days, and the domain allow-list. All reads fall back to a
//! default when unset; writes are last-writer-wins upserts.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::db::Database;
use crate::policy::AllowList;

/// Default retention window for the submission history, in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 7;

/// Valid retention range, inclusive.
pub const RETENTION_RANGE: std::ops::RangeInclusive<u32> = 1..=30;

const KEY_API_TOKEN: &str = "apiToken";
const KEY_RETENTION_DAYS: &str = "retentionDays";
const KEY_ALLOW_LIST: &str = "whitelistedDomains";

/// Settings-related errors.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The database query failed.
    #[error("settings query failed: {0}")]
    Database(#[from] sqlx::Error),

    /// A retention value outside the valid range was supplied.
    #[error("retention days must be between 1 and 30, got {0}")]
    RetentionOutOfRange(u32),

    /// A stored value could not be decoded.
    #[error("stored setting '{key}' is malformed: {reason}")]
    Malformed { key: String, reason: String },
}

/// Typed access to the settings table.
#[derive(Debug, Clone)]
pub struct Settings {
    db: Database,
}

impl Settings {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Returns the stored API credential, if any.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Database` if the query fails.
    pub async fn api_token(&self) -> Result<Option<String>, SettingsError> {
        Ok(self
            .get(KEY_API_TOKEN)
            .await?
            .filter(|token| !token.trim().is_empty()))
    }

    /// Stores the API credential.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Database` if the write fails.
    #[instrument(skip(self, token))]
    pub async fn set_api_token(&self, token: &str) -> Result<(), SettingsError> {
        self.set(KEY_API_TOKEN, token.trim()).await?;
        debug!("API token updated");
        Ok(())
    }

    /// Returns the retention window in days, defaulting to 7.
    ///
    /// Stored values outside the 1-30 range (or unparseable ones) fall back
    /// to the default rather than failing a read path.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Database` if the query fails.
    pub async fn retention_days(&self) -> Result<u32, SettingsError> {
        let stored = self.get(KEY_RETENTION_DAYS).await?;
        Ok(stored
            .and_then(|value| value.parse::<u32>().ok())
            .filter(|days| RETENTION_RANGE.contains(days))
            .unwrap_or(DEFAULT_RETENTION_DAYS))
    }

    /// Returns the retention window as a `Duration`.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Database` if the query fails.
    pub async fn retention_window(&self) -> Result<Duration, SettingsError> {
        let days = self.retention_days().await?;
        Ok(Duration::from_secs(u64::from(days) * 24 * 60 * 60))
    }

    /// Stores the retention window, validating the 1-30 range.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::RetentionOutOfRange` for values outside the
    /// range, or `SettingsError::Database` if the write fails.
    #[instrument(skip(self))]
    pub async fn set_retention_days(&self, days: u32) -> Result<(), SettingsError> {
        if !RETENTION_RANGE.contains(&days) {
            return Err(SettingsError::RetentionOutOfRange(days));
        }
        self.set(KEY_RETENTION_DAYS, &days.to_string()).await?;
        debug!(days, "retention window updated");
        Ok(())
    }

    /// Returns the persisted allow-list, or the seed list when unset.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Database` if the query fails, or
    /// `SettingsError::Malformed` when the stored JSON cannot be decoded.
    pub async fn allow_list(&self) -> Result<AllowList, SettingsError> {
        let Some(stored) = self.get(KEY_ALLOW_LIST).await? else {
            return Ok(AllowList::default_seed());
        };

        let domains: Vec<String> =
            serde_json::from_str(&stored).map_err(|e| SettingsError::Malformed {
                key: KEY_ALLOW_LIST.to_string(),
                reason: e.to_string(),
            })?;

        Ok(AllowList::new(domains))
    }

    /// Persists the allow-list as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Database` if the write fails.
    #[instrument(skip(self, list), fields(count = list.domains().len()))]
    pub async fn set_allow_list(&self, list: &AllowList) -> Result<(), SettingsError> {
        let json = serde_json::to_string(list.domains()).map_err(|e| SettingsError::Malformed {
            key: KEY_ALLOW_LIST.to_string(),
            reason: e.to_string(),
        })?;
        self.set(KEY_ALLOW_LIST, &json).await?;
        debug!("allow-list persisted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn settings() -> Settings {
        let db = Database::new_in_memory().await.unwrap();
        Settings::new(db)
    }

    // ==================== API Token ====================

    #[tokio::test]
    async fn test_api_token_unset_is_none() {
        let s = settings().await;
        assert!(s.api_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_api_token_roundtrip() {
        let s = settings().await;
        s.set_api_token("secret-token").await.unwrap();
        assert_eq!(s.api_token().await.unwrap().unwrap(), "secret-token");
    }

    #[tokio::test]
    async fn test_api_token_blank_treated_as_unset() {
        let s = settings().await;
        s.set_api_token("   ").await.unwrap();
        assert!(s.api_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_api_token_last_write_wins() {
        let s = settings().await;
        s.set_api_token("first").await.unwrap();
        s.set_api_token("second").await.unwrap();
        assert_eq!(s.api_token().await.unwrap().unwrap(), "second");
    }

    // ==================== Retention ====================

    #[tokio::test]
    async fn test_retention_defaults_to_seven() {
        let s = settings().await;
        assert_eq!(s.retention_days().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_retention_roundtrip() {
        let s = settings().await;
        s.set_retention_days(14).await.unwrap();
        assert_eq!(s.retention_days().await.unwrap(), 14);
    }

    #[tokio::test]
    async fn test_retention_rejects_out_of_range() {
        let s = settings().await;
        assert!(matches!(
            s.set_retention_days(0).await,
            Err(SettingsError::RetentionOutOfRange(0))
        ));
        assert!(matches!(
            s.set_retention_days(31).await,
            Err(SettingsError::RetentionOutOfRange(31))
        ));
    }

    #[tokio::test]
    async fn test_retention_corrupt_value_falls_back() {
        let s = settings().await;
        sqlx::query("INSERT INTO settings (key, value) VALUES ('retentionDays', 'banana')")
            .execute(s.db.pool())
            .await
            .unwrap();
        assert_eq!(s.retention_days().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_retention_window_duration() {
        let s = settings().await;
        s.set_retention_days(2).await.unwrap();
        assert_eq!(
            s.retention_window().await.unwrap(),
            Duration::from_secs(2 * 24 * 60 * 60)
        );
    }

    // ==================== Allow-list ====================

    #[tokio::test]
    async fn test_allow_list_defaults_to_seed() {
        let s = settings().await;
        let list = s.allow_list().await.unwrap();
        assert_eq!(list, AllowList::default_seed());
    }

    #[tokio::test]
    async fn test_allow_list_roundtrip() {
        let s = settings().await;
        let list = AllowList::new(vec!["one.com".into(), "two.org".into()]);
        s.set_allow_list(&list).await.unwrap();
        assert_eq!(s.allow_list().await.unwrap(), list);
    }

    #[tokio::test]
    async fn test_allow_list_malformed_json_errors() {
        let s = settings().await;
        sqlx::query("INSERT INTO settings (key, value) VALUES ('whitelistedDomains', 'not json')")
            .execute(s.db.pool())
            .await
            .unwrap();
        assert!(matches!(
            s.allow_list().await,
            Err(SettingsError::Malformed { .. })
        ));
    }
}
