use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use draft_store_core::{MirrorStore, StoreError};

use super::DEFAULT_MIRROR_PREFIX;

/// In-memory mirror store keyed by `prefix + id`.
#[derive(Debug)]
pub struct MemoryMirrorStore {
    prefix: String,
    entries: DashMap<String, String>,
    fail_writes: AtomicBool,
}

impl Default for MemoryMirrorStore {
    fn default() -> Self {
        Self::new(DEFAULT_MIRROR_PREFIX)
    }
}

impl MemoryMirrorStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            entries: DashMap::new(),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Seed a mirrored value for `id`.
    pub fn with_entry(self, id: &str, text: &str) -> Self {
        self.entries.insert(self.key(id), text.to_string());
        self
    }

    /// Make every subsequent `put`/`delete` fail with `StoreError::Unavailable`.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of the mirrored value for `id`, bypassing fault injection.
    pub fn peek(&self, id: &str) -> Option<String> {
        self.entries.get(&self.key(id)).map(|v| v.clone())
    }

    fn key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "Memory mirror is refusing writes".to_string(),
            ));
        }
        Ok(())
    }
}

impl MirrorStore for MemoryMirrorStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.peek(id))
    }

    fn put(&self, id: &str, text: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        self.entries.insert(self.key(id), text.to_string());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.check_writable()?;
        Ok(self.entries.remove(&self.key(id)).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_isolation() {
        let store = MemoryMirrorStore::new("a_").with_entry("default", "seeded");
        assert_eq!(store.get("default").unwrap().as_deref(), Some("seeded"));

        store.put("other", "x").unwrap();
        assert_eq!(store.peek("other").as_deref(), Some("x"));
        assert!(store.delete("other").unwrap());
        assert!(store.peek("other").is_none());
    }

    #[test]
    fn test_failed_write_leaves_value() {
        let store = MemoryMirrorStore::default().with_entry("default", "kept");
        store.fail_writes(true);

        assert!(store.put("default", "lost").is_err());
        assert!(store.delete("default").is_err());
        assert_eq!(store.peek("default").as_deref(), Some("kept"));
    }
}
