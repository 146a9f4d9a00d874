//! In-memory store
//!
//! Holds the catalog and audit log in process memory. Each operation can be
//! told to fail, which lets tests drive the scheduler through its store
//! failure paths without a real backend.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Result, StoreError};
use crate::store::PostStore;
use crate::types::{Post, PublicationHistoryEntry, StoredHistoryEntry};

#[derive(Default)]
pub struct MemoryStore {
    posts: Mutex<Vec<Post>>,
    history: Mutex<Vec<StoredHistoryEntry>>,
    fail_load: AtomicBool,
    fail_save: AtomicBool,
    fail_history: AtomicBool,
}

impl MemoryStore {
    pub fn new(posts: Vec<Post>) -> Self {
        Self {
            posts: Mutex::new(posts),
            ..Default::default()
        }
    }

    /// Snapshot of the current catalog
    pub fn posts(&self) -> Vec<Post> {
        lock(&self.posts).map(|p| p.clone()).unwrap_or_default()
    }

    /// Snapshot of the audit log, oldest first
    pub fn history(&self) -> Vec<PublicationHistoryEntry> {
        lock(&self.history)
            .map(|h| h.iter().map(|stored| stored.entry.clone()).collect())
            .unwrap_or_default()
    }

    pub fn fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    pub fn fail_save(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }

    pub fn fail_history(&self, fail: bool) {
        self.fail_history.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, operation: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("memory store refused {}", operation)).into());
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()).into())
}

#[async_trait]
impl PostStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load_posts(&self) -> Result<Vec<Post>> {
        Self::check(&self.fail_load, "load_posts")?;
        Ok(lock(&self.posts)?.clone())
    }

    async fn save_post(&self, post: &Post) -> Result<()> {
        Self::check(&self.fail_save, "save_post")?;
        let mut posts = lock(&self.posts)?;
        let slot = posts
            .iter_mut()
            .find(|p| p.id == post.id)
            .ok_or_else(|| StoreError::PostNotFound(post.id.clone()))?;
        *slot = post.clone();
        Ok(())
    }

    async fn append_history(&self, entry: &PublicationHistoryEntry) -> Result<()> {
        Self::check(&self.fail_history, "append_history")?;
        lock(&self.history)?.push(StoredHistoryEntry {
            entry: entry.clone(),
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_history(&self, limit: usize) -> Result<Vec<StoredHistoryEntry>> {
        let history = lock(&self.history)?;
        Ok(history.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PublicationAction;
    use crate::DailypostError;

    #[tokio::test]
    async fn test_save_replaces_by_id() {
        let store = MemoryStore::new(vec![Post::new("a", "01/12"), Post::new("b", "02/12")]);
        let mut updated = Post::new("b", "02/12");
        updated.published = true;

        store.save_post(&updated).await.unwrap();

        let posts = store.posts();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id, "a");
        assert!(posts[1].published);
    }

    #[tokio::test]
    async fn test_save_unknown_post_fails() {
        let store = MemoryStore::new(vec![]);
        let err = store.save_post(&Post::new("ghost", "01/12")).await.unwrap_err();
        assert!(matches!(err, DailypostError::Store(StoreError::PostNotFound(ref id)) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryStore::new(vec![]);
        store.fail_load(true);
        assert!(store.load_posts().await.is_err());
        store.fail_load(false);
        assert!(store.load_posts().await.is_ok());

        store.fail_history(true);
        let entry = crate::create_history_entry(None, PublicationAction::NoPost, "m", "01/12");
        assert!(store.append_history(&entry).await.is_err());
        assert!(store.history().is_empty());
    }

    #[tokio::test]
    async fn test_list_history_newest_first() {
        let store = MemoryStore::new(vec![]);
        for date in ["01/12", "02/12", "03/12"] {
            let entry = crate::create_history_entry(None, PublicationAction::NoPost, "m", date);
            store.append_history(&entry).await.unwrap();
        }

        let listed = store.list_history(2).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].entry.target_date, "03/12");
        assert_eq!(listed[1].entry.target_date, "02/12");
    }
}
