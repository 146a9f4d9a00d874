//! Local JSON document store
//!
//! The catalog is a single JSON array file; array order is catalog order.
//! The audit log sits next to it as JSON lines (`<name>.history.jsonl`).

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::io::SeekFrom;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::{Result, StoreError};
use crate::store::PostStore;
use crate::types::{Post, PublicationHistoryEntry, StoredHistoryEntry};

pub struct LocalStore {
    posts_path: PathBuf,
    history_path: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(posts_path: &Path) -> Self {
        Self {
            posts_path: posts_path.to_path_buf(),
            history_path: posts_path.with_extension("history.jsonl"),
            write_lock: Mutex::new(()),
        }
    }

    pub fn posts_path(&self) -> &Path {
        &self.posts_path
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    /// Overwrite the whole catalog
    pub async fn replace_posts(&self, posts: &[Post]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_posts(posts).await
    }

    async fn read_posts(&self) -> Result<Vec<Post>> {
        let content = match tokio::fs::read_to_string(&self.posts_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::IoError(e).into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let posts = serde_json::from_str(&content).map_err(StoreError::JsonError)?;
        Ok(posts)
    }

    async fn write_posts(&self, posts: &[Post]) -> Result<()> {
        ensure_parent(&self.posts_path).await?;
        let json = serde_json::to_vec_pretty(posts).map_err(StoreError::JsonError)?;

        // Write beside the target, then rename over it
        let tmp_path = self.posts_path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(StoreError::IoError)?;
        tokio::fs::rename(&tmp_path, &self.posts_path)
            .await
            .map_err(StoreError::IoError)?;
        Ok(())
    }
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(StoreError::IoError)?;
    }
    Ok(())
}

/// True when `path` holds data whose last byte is not a newline, as left by
/// an interrupted append
async fn ends_mid_line(path: &Path) -> Result<bool> {
    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(StoreError::IoError(e).into()),
    };
    let len = file.metadata().await.map_err(StoreError::IoError)?.len();
    if len == 0 {
        return Ok(false);
    }

    file.seek(SeekFrom::End(-1))
        .await
        .map_err(StoreError::IoError)?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)
        .await
        .map_err(StoreError::IoError)?;
    Ok(last[0] != b'\n')
}

#[async_trait]
impl PostStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn load_posts(&self) -> Result<Vec<Post>> {
        self.read_posts().await
    }

    async fn save_post(&self, post: &Post) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut posts = self.read_posts().await?;
        let slot = posts
            .iter_mut()
            .find(|p| p.id == post.id)
            .ok_or_else(|| StoreError::PostNotFound(post.id.clone()))?;
        *slot = post.clone();
        self.write_posts(&posts).await
    }

    async fn append_history(&self, entry: &PublicationHistoryEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        ensure_parent(&self.history_path).await?;

        let stored = StoredHistoryEntry {
            entry: entry.clone(),
            recorded_at: Utc::now(),
        };
        let mut line = serde_json::to_string(&stored).map_err(StoreError::JsonError)?;
        line.push('\n');

        // Never glue a new entry onto a torn one
        if ends_mid_line(&self.history_path).await? {
            tracing::warn!(path = %self.history_path.display(), "History log ends mid-line, starting a new line");
            line.insert(0, '\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.history_path)
            .await
            .map_err(StoreError::IoError)?;
        file.write_all(line.as_bytes())
            .await
            .map_err(StoreError::IoError)?;
        file.flush().await.map_err(StoreError::IoError)?;
        Ok(())
    }

    async fn list_history(&self, limit: usize) -> Result<Vec<StoredHistoryEntry>> {
        let content = match tokio::fs::read_to_string(&self.history_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::IoError(e).into()),
        };

        let mut entries = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredHistoryEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(
                    path = %self.history_path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping malformed history line"
                ),
            }
        }
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PublicationAction;
    use tempfile::TempDir;

    fn sample_posts() -> Vec<Post> {
        vec![
            Post {
                caption: "First".to_string(),
                ..Post::new("1", "05/12")
            },
            Post {
                caption: "Second".to_string(),
                ..Post::new("2", "06/12")
            },
        ]
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(&temp_dir.path().join("posts.json"));
        assert!(store.load_posts().await.unwrap().is_empty());
        assert!(store.list_history(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_post_keeps_order_and_other_posts() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(&temp_dir.path().join("nested").join("posts.json"));
        store.replace_posts(&sample_posts()).await.unwrap();

        let mut first = sample_posts().remove(0);
        first.published = true;
        store.save_post(&first).await.unwrap();

        let posts = store.load_posts().await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id, "1");
        assert!(posts[0].published);
        assert_eq!(posts[1], sample_posts()[1]);
        assert!(!store.posts_path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_save_unknown_post_fails() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(&temp_dir.path().join("posts.json"));
        store.replace_posts(&sample_posts()).await.unwrap();

        let result = store.save_post(&Post::new("ghost", "01/01")).await;
        assert!(result.unwrap_err().to_string().contains("Post not found: ghost"));
    }

    #[tokio::test]
    async fn test_reads_dashboard_documents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("posts.json");
        std::fs::write(
            &path,
            r#"[{"id":"7","date":"05/12","title":"Atelier","caption":"Hi","imageUrl":"https://x/y.jpg","published":false,"hashtags":[],"cta":""}]"#,
        )
        .unwrap();

        let store = LocalStore::new(&path);
        let mut posts = store.load_posts().await.unwrap();
        posts[0].published = true;
        store.save_post(&posts[0]).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[0]["title"], "Atelier");
        assert_eq!(raw[0]["published"], true);
    }

    #[tokio::test]
    async fn test_malformed_catalog_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("posts.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = LocalStore::new(&path);
        assert!(store.load_posts().await.is_err());
    }

    #[tokio::test]
    async fn test_history_appends_lines() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(&temp_dir.path().join("posts.json"));

        let first = crate::create_history_entry(None, PublicationAction::NoPost, "none", "06/12");
        let second =
            crate::create_history_entry(Some("1"), PublicationAction::Published, "ok", "05/12");
        store.append_history(&first).await.unwrap();
        store.append_history(&second).await.unwrap();

        assert_eq!(
            store.history_path(),
            temp_dir.path().join("posts.history.jsonl")
        );
        let raw = std::fs::read_to_string(store.history_path()).unwrap();
        assert_eq!(raw.lines().count(), 2);

        let listed = store.list_history(10).await.unwrap();
        assert_eq!(listed[0].entry, second);
        assert_eq!(listed[1].entry, first);
        assert_eq!(store.list_history(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_torn_history_line_is_skipped_and_not_glued() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(&temp_dir.path().join("posts.json"));

        let first =
            crate::create_history_entry(Some("p1"), PublicationAction::Published, "ok", "05/12");
        store.append_history(&first).await.unwrap();

        // An append cut short by a crash leaves a fragment with no newline
        let mut raw = std::fs::OpenOptions::new()
            .append(true)
            .open(store.history_path())
            .unwrap();
        std::io::Write::write_all(&mut raw, br#"{"post_id":"p2","act"#).unwrap();
        drop(raw);

        let second =
            crate::create_history_entry(Some("p3"), PublicationAction::Skipped, "skip", "06/12");
        store.append_history(&second).await.unwrap();

        let content = std::fs::read_to_string(store.history_path()).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.ends_with('\n'));

        let listed = store.list_history(10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].entry, second);
        assert_eq!(listed[1].entry, first);
    }
}
