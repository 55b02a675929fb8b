use std::fs;
use std::path::{Path, PathBuf};

use draft_store_core::{MirrorStore, StoreError};
use tracing::{debug, instrument};

use crate::keys::file_key;

/// Local filesystem mirror store.
///
/// Each mirrored draft is a plain text file named after its namespaced key:
/// ```text
/// {base_dir}/
///   mirror/
///     {prefix}{draft_id}.txt
/// ```
/// Operations use blocking I/O on purpose; the mirror is read and written inline by
/// the engine without suspending.
#[derive(Debug, Clone)]
pub struct LocalMirrorStore {
    base_dir: PathBuf,
    prefix: String,
}

impl LocalMirrorStore {
    /// Create a new LocalMirrorStore under `base_dir` with the given key prefix.
    pub fn new(base_dir: impl AsRef<Path>, prefix: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            prefix: prefix.into(),
        }
    }

    /// The namespaced key for a draft identifier.
    pub fn key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    fn mirror_dir(&self) -> PathBuf {
        self.base_dir.join("mirror")
    }

    fn mirror_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        if id.is_empty() {
            return Err(StoreError::InvalidArgument(
                "Draft identifier must not be empty".to_string(),
            ));
        }
        Ok(self
            .mirror_dir()
            .join(format!("{}.txt", file_key(&self.key(id))?)))
    }
}

impl MirrorStore for LocalMirrorStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    #[instrument(skip(self), level = "debug")]
    fn get(&self, id: &str) -> Result<Option<String>, StoreError> {
        let path = self.mirror_path(id)?;
        match fs::read(&path) {
            Ok(bytes) => String::from_utf8(bytes).map(Some).map_err(|e| {
                StoreError::Serialization(format!("Mirror {} is not UTF-8: {}", path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Unavailable(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    #[instrument(skip(self, text), level = "debug", fields(text_len = text.len()))]
    fn put(&self, id: &str, text: &str) -> Result<(), StoreError> {
        let path = self.mirror_path(id)?;
        let dir = self.mirror_dir();
        fs::create_dir_all(&dir).map_err(|e| {
            StoreError::Unavailable(format!("Failed to create mirror dir {}: {}", dir.display(), e))
        })?;

        let temp_path = path.with_extension("txt.tmp");
        fs::write(&temp_path, text).map_err(|e| {
            StoreError::Unavailable(format!("Failed to write {}: {}", temp_path.display(), e))
        })?;
        fs::rename(&temp_path, &path).map_err(|e| {
            StoreError::Unavailable(format!("Failed to rename to {}: {}", path.display(), e))
        })?;

        debug!("Mirrored draft {} ({} bytes)", self.key(id), text.len());
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let path = self.mirror_path(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
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

    fn setup() -> (LocalMirrorStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalMirrorStore::new(temp_dir.path(), "draft_");
        (store, temp_dir)
    }

    #[test]
    fn test_put_get_delete() {
        let (store, _temp) = setup();
        assert!(store.get("default").unwrap().is_none());

        store.put("default", "hello").unwrap();
        assert_eq!(store.get("default").unwrap().as_deref(), Some("hello"));

        store.put("default", "hello world").unwrap();
        assert_eq!(store.get("default").unwrap().as_deref(), Some("hello world"));

        assert!(store.delete("default").unwrap());
        assert!(store.get("default").unwrap().is_none());
        assert!(!store.delete("default").unwrap());
    }

    #[test]
    fn test_keys_are_namespaced() {
        let (store, temp) = setup();
        store.put("default", "hello").unwrap();

        assert!(temp.path().join("mirror").join("draft_default.txt").exists());

        // Another prefix over the same directory sees nothing
        let other = LocalMirrorStore::new(temp.path(), "other_");
        assert!(other.get("default").unwrap().is_none());
    }

    #[test]
    fn test_empty_text_is_stored() {
        let (store, _temp) = setup();
        store.put("default", "").unwrap();
        assert_eq!(store.get("default").unwrap().as_deref(), Some(""));
    }
}
