use std::path::{Path, PathBuf};

use async_trait::async_trait;
use draft_store_core::{content_digest, Draft, DurableStore, StoreError};
use tokio::fs;
use tracing::{debug, instrument};

use crate::keys::file_key;

/// Local filesystem durable store.
///
/// Organizes records as:
/// ```text
/// {base_dir}/
///   drafts/
///     {draft_id}.json
/// ```
#[derive(Debug, Clone)]
pub struct LocalDraftStore {
    base_dir: PathBuf,
}

impl LocalDraftStore {
    /// Create a new LocalDraftStore with the given base directory.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    fn drafts_dir(&self) -> PathBuf {
        self.base_dir.join("drafts")
    }

    fn draft_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        Ok(self.drafts_dir().join(format!("{}.json", file_key(id)?)))
    }

    async fn ensure_drafts_dir(&self) -> Result<(), StoreError> {
        let dir = self.drafts_dir();
        fs::create_dir_all(&dir).await.map_err(|e| {
            StoreError::Unavailable(format!(
                "Failed to create drafts dir {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(())
    }
}

#[async_trait]
impl DurableStore for LocalDraftStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, id: &str) -> Result<Option<Draft>, StoreError> {
        let path = self.draft_path(id)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Unavailable(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let draft: Draft = serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        if draft.id != id {
            return Err(StoreError::Serialization(format!(
                "Record {} belongs to draft {:?}, expected {:?}",
                path.display(),
                draft.id,
                id
            )));
        }

        debug!(
            "Loaded draft {} ({} bytes, digest {})",
            id,
            draft.content.len(),
            content_digest(&draft.content)
        );
        Ok(Some(draft))
    }

    #[instrument(skip(self, draft), level = "debug", fields(id = %draft.id, content_len = draft.content.len()))]
    async fn put(&self, draft: &Draft) -> Result<(), StoreError> {
        let path = self.draft_path(&draft.id)?;
        let data = serde_json::to_vec_pretty(draft)
            .map_err(|e| StoreError::Serialization(format!("Failed to encode draft: {}", e)))?;

        self.ensure_drafts_dir().await?;

        // Write atomically via temp file
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &data).await.map_err(|e| {
            StoreError::Unavailable(format!("Failed to write {}: {}", temp_path.display(), e))
        })?;
        fs::rename(&temp_path, &path).await.map_err(|e| {
            StoreError::Unavailable(format!("Failed to rename to {}: {}", path.display(), e))
        })?;

        debug!(
            "Saved draft {} ({} bytes, digest {})",
            draft.id,
            draft.content.len(),
            content_digest(&draft.content)
        );
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let path = self.draft_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted draft {}", id);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Unavailable(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup() -> (LocalDraftStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalDraftStore::new(temp_dir.path());
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let (store, _temp) = setup().await;
        let draft = Draft::new("default", "hello");

        store.put(&draft).await.unwrap();

        let loaded = store.get("default").await.unwrap().unwrap();
        assert_eq!(loaded, draft);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let (store, _temp) = setup().await;
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_is_upsert() {
        let (store, temp) = setup().await;

        store.put(&Draft::new("default", "first")).await.unwrap();
        store.put(&Draft::new("default", "second")).await.unwrap();

        let loaded = store.get("default").await.unwrap().unwrap();
        assert_eq!(loaded.content, "second");

        // One record per identifier, no temp files left behind
        let files: Vec<_> = std::fs::read_dir(temp.path().join("drafts"))
            .unwrap()
            .collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _temp) = setup().await;
        store.put(&Draft::new("default", "hello")).await.unwrap();

        assert!(store.delete("default").await.unwrap());
        assert!(store.get("default").await.unwrap().is_none());

        // Deleting again reports nothing existed
        assert!(!store.delete("default").await.unwrap());
    }

    #[tokio::test]
    async fn test_identifier_isolation() {
        let (store, _temp) = setup().await;
        store.put(&Draft::new("post/1", "one")).await.unwrap();
        store.put(&Draft::new("post/2", "two")).await.unwrap();

        assert_eq!(store.get("post/1").await.unwrap().unwrap().content, "one");
        assert_eq!(store.get("post/2").await.unwrap().unwrap().content, "two");
    }

    #[tokio::test]
    async fn test_corrupt_record() {
        let (store, temp) = setup().await;
        let dir = temp.path().join("drafts");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("default.json"), b"{not json").unwrap();

        let err = store.get("default").await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_empty_identifier_rejected() {
        let (store, _temp) = setup().await;
        let err = store.put(&Draft::new("", "hello")).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }
}
