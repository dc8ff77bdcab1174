//! Durable storage of access-token bundles.
//!
//! Records are append-only: a refresh inserts a new row rather than updating the previous
//! one, and the current token for an account is simply the most recently created row.

use crate::error::Result;
use crate::token::AccessTokenBundle;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::future::Future;
use std::str::FromStr;

/// Insert-and-latest storage for token bundles, keyed by account identifier.
pub trait TokenStore {
    /// Appends `bundle` as the newest record for `account`.
    fn save(
        &self,
        account: &str,
        bundle: &AccessTokenBundle,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Returns the record with the latest creation time for `account`.
    ///
    /// Records sharing a creation time are ordered by insertion, so the last one saved wins.
    fn latest(
        &self,
        account: &str,
    ) -> impl Future<Output = Result<Option<AccessTokenBundle>>> + Send;
}

/// [`TokenStore`] backed by the `youtube_access_tokens` SQLite table.
#[derive(Debug, Clone)]
pub struct SqliteTokenStore {
    pool: SqlitePool,
}

impl SqliteTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database at `url` and makes sure the table exists.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS youtube_access_tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                access_token TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_youtube_access_tokens_user_created
            ON youtube_access_tokens(user_id, created_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl TokenStore for SqliteTokenStore {
    async fn save(&self, account: &str, bundle: &AccessTokenBundle) -> Result<()> {
        let payload = serde_json::to_string(bundle)?;
        sqlx::query(
            "INSERT INTO youtube_access_tokens (user_id, access_token, created_at) VALUES (?, ?, ?)",
        )
        .bind(account)
        .bind(payload)
        .bind(bundle.created.as_second())
        .execute(&self.pool)
        .await?;

        tracing::debug!(account, created = %bundle.created, "saved access token");
        Ok(())
    }

    async fn latest(&self, account: &str) -> Result<Option<AccessTokenBundle>> {
        let row = sqlx::query(
            r#"
            SELECT access_token FROM youtube_access_tokens
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(account)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String = row.try_get("access_token")?;
        Ok(Some(serde_json::from_str(&payload)?))
    }
}
