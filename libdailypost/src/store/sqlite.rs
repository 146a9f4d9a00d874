//! SQLite document store
//!
//! Mirrors the hosted layout: a `posts` table holding one JSON document per
//! post and an append-only `publication_history` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;

use crate::error::{Result, StoreError};
use crate::store::PostStore;
use crate::types::{Post, PublicationAction, PublicationHistoryEntry, StoredHistoryEntry};

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path` and run migrations
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(StoreError::IoError)?;
        }

        // Forward slashes work on both Windows and Unix; mode=rwc creates the file
        let db_url = format!(
            "sqlite://{}?mode=rwc",
            db_path.to_string_lossy().replace('\\', "/")
        );

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(StoreError::SqlxError)?;

        Self::from_pool(pool).await
    }

    /// Private in-memory database, mostly for tests
    pub async fn in_memory() -> Result<Self> {
        // A single connection keeps every query on the same memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(StoreError::SqlxError)?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StoreError::MigrationError)?;

        Ok(Self { pool })
    }

    /// Insert a post, or replace the document if the id already exists.
    /// A replaced post keeps its place in catalog order.
    pub async fn upsert_post(&self, post: &Post) -> Result<()> {
        let content = serde_json::to_string(post).map_err(StoreError::JsonError)?;

        sqlx::query(
            r#"
            INSERT INTO posts (id, content) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET content = excluded.content
            "#,
        )
        .bind(&post.id)
        .bind(content)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }
}

#[async_trait]
impl PostStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn load_posts(&self) -> Result<Vec<Post>> {
        let rows = sqlx::query("SELECT content FROM posts ORDER BY rowid ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        rows.iter()
            .map(|row| -> Result<Post> {
                let content: String = row.get("content");
                Ok(serde_json::from_str(&content).map_err(StoreError::JsonError)?)
            })
            .collect()
    }

    async fn save_post(&self, post: &Post) -> Result<()> {
        let content = serde_json::to_string(post).map_err(StoreError::JsonError)?;

        let result = sqlx::query("UPDATE posts SET content = ? WHERE id = ?")
            .bind(content)
            .bind(&post.id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::PostNotFound(post.id.clone()).into());
        }
        Ok(())
    }

    async fn append_history(&self, entry: &PublicationHistoryEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO publication_history (post_id, action, message, target_date, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.post_id)
        .bind(entry.action.as_str())
        .bind(&entry.message)
        .bind(&entry.target_date)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    async fn list_history(&self, limit: usize) -> Result<Vec<StoredHistoryEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r#"
            SELECT post_id, action, message, target_date, recorded_at
            FROM publication_history
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.iter()
            .map(|row| -> Result<StoredHistoryEntry> {
                let action: String = row.get("action");
                let action = action
                    .parse::<PublicationAction>()
                    .map_err(StoreError::Corrupt)?;
                let recorded_at: i64 = row.get("recorded_at");
                let recorded_at = DateTime::from_timestamp(recorded_at, 0).ok_or_else(|| {
                    StoreError::Corrupt(format!("invalid recorded_at timestamp {}", recorded_at))
                })?;

                Ok(StoredHistoryEntry {
                    entry: PublicationHistoryEntry {
                        post_id: row.get("post_id"),
                        action,
                        message: row.get("message"),
                        target_date: row.get("target_date"),
                    },
                    recorded_at,
                })
            })
            .collect()
    }
}
