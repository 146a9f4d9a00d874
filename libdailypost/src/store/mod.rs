//! Storage for the post catalog and the publication audit log
//!
//! The scheduler only ever sees the [`PostStore`] trait. Which backend sits
//! behind it is decided once at startup from configuration and passed in.
//!
//! # Examples
//!
//! ```no_run
//! use libdailypost::config::{StoreBackend, StoreConfig};
//! use libdailypost::store::open_store;
//!
//! # async fn example() -> libdailypost::Result<()> {
//! let store = open_store(&StoreConfig {
//!     backend: StoreBackend::Local,
//!     path: "~/.local/share/dailypost/posts.json".to_string(),
//! })
//! .await?;
//!
//! let posts = store.load_posts().await?;
//! println!("{} holds {} posts", store.name(), posts.len());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::Result;
use crate::types::{Post, PublicationHistoryEntry, StoredHistoryEntry};

pub mod local;
pub mod memory;
pub mod sqlite;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Catalog reader/writer and history writer used by the scheduler
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Human-readable backend name, for logs
    fn name(&self) -> &str;

    /// Read the whole catalog, in catalog order
    async fn load_posts(&self) -> Result<Vec<Post>>;

    /// Replace the stored post with the same id
    ///
    /// # Errors
    ///
    /// Returns `StoreError::PostNotFound` if no post has that id.
    async fn save_post(&self, post: &Post) -> Result<()>;

    /// Append one entry to the audit log
    async fn append_history(&self, entry: &PublicationHistoryEntry) -> Result<()>;

    /// Most recent audit entries first, at most `limit` of them
    async fn list_history(&self, limit: usize) -> Result<Vec<StoredHistoryEntry>>;
}

/// Open the backend named in the configuration
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn PostStore>> {
    let path = config.expanded_path();
    let store: Arc<dyn PostStore> = match config.backend {
        StoreBackend::Sqlite => Arc::new(SqliteStore::new(&path).await?),
        StoreBackend::Local => Arc::new(LocalStore::new(&path)),
    };
    tracing::debug!(backend = store.name(), path = %path.display(), "Opened store");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_store_picks_backend() {
        let temp_dir = TempDir::new().unwrap();

        let local = open_store(&StoreConfig {
            backend: StoreBackend::Local,
            path: temp_dir.path().join("posts.json").to_string_lossy().to_string(),
        })
        .await
        .unwrap();
        assert_eq!(local.name(), "local");

        let sqlite = open_store(&StoreConfig {
            backend: StoreBackend::Sqlite,
            path: temp_dir.path().join("posts.db").to_string_lossy().to_string(),
        })
        .await
        .unwrap();
        assert_eq!(sqlite.name(), "sqlite");
    }
}
