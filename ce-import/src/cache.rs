//! HTTP response cache
//!
//! Successful GET responses from external sites are stored in SQLite keyed by
//! request URL. Entries never expire; `clear-cache` is the only invalidation.
//! Without a configured path the cache lives in memory for the process.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::error::ImportResult;

/// A stored response
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ResponseCache {
    pool: SqlitePool,
}

impl ResponseCache {
    /// Open the cache at `path`, or an in-memory cache when `None`
    pub async fn open(path: Option<&Path>) -> ImportResult<Self> {
        match path {
            Some(path) => Self::open_file(path).await,
            None => Self::in_memory().await,
        }
    }

    async fn open_file(path: &Path) -> ImportResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // mode=rwc: read, write, create
        let db_url = format!("sqlite://{}?mode=rwc", path.display());
        tracing::debug!("Opening response cache: {}", db_url);

        let pool = SqlitePool::connect(&db_url).await?;
        Self::with_pool(pool).await
    }

    pub async fn in_memory() -> ImportResult<Self> {
        // A single, never-recycled connection: every new connection to
        // sqlite::memory: would see an empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> ImportResult<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS http_responses (
                request_url TEXT PRIMARY KEY,
                final_url TEXT NOT NULL,
                status INTEGER NOT NULL,
                body TEXT NOT NULL,
                fetched_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub async fn get(&self, request_url: &str) -> ImportResult<Option<CachedResponse>> {
        let row = sqlx::query(
            r#"
            SELECT final_url, status, body, fetched_at
            FROM http_responses
            WHERE request_url = ?
            "#,
        )
        .bind(request_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let fetched_at: String = row.get("fetched_at");
            let status: i64 = row.get("status");
            CachedResponse {
                url: row.get("final_url"),
                status: status as u16,
                body: row.get("body"),
                fetched_at: DateTime::parse_from_rfc3339(&fetched_at)
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            }
        }))
    }

    pub async fn put(&self, request_url: &str, response: &CachedResponse) -> ImportResult<()> {
        sqlx::query(
            r#"
            INSERT INTO http_responses (request_url, final_url, status, body, fetched_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(request_url) DO UPDATE SET
                final_url = excluded.final_url,
                status = excluded.status,
                body = excluded.body,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(request_url)
        .bind(&response.url)
        .bind(response.status as i64)
        .bind(&response.body)
        .bind(response.fetched_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Remove every entry, returning how many were removed
    pub async fn clear(&self) -> ImportResult<u64> {
        let result = sqlx::query("DELETE FROM http_responses")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn len(&self) -> ImportResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM http_responses")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn is_empty(&self) -> ImportResult<bool> {
        Ok(self.len().await? == 0)
    }
}
