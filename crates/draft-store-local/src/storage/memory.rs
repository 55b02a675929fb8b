use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use draft_store_core::{Draft, DurableStore, StoreError};
use tracing::{debug, instrument};

/// In-memory durable store.
///
/// Useful for ephemeral sessions and tests. Faults can be injected to exercise the
/// engine's degraded paths, and reads can be slowed to reproduce load races.
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    drafts: DashMap<String, Draft>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    read_delay_ms: AtomicUsize,
    writes: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record without counting it as a write.
    pub fn with_draft(self, draft: Draft) -> Self {
        self.drafts.insert(draft.id.clone(), draft);
        self
    }

    /// Make every subsequent `put`/`delete` fail with `StoreError::Unavailable`.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `get` fail with `StoreError::Unavailable`.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Delay every `get` by `delay` before it resolves.
    pub fn set_read_delay(&self, delay: Duration) {
        let ms = usize::try_from(delay.as_millis()).unwrap_or(usize::MAX);
        self.read_delay_ms.store(ms, Ordering::SeqCst);
    }

    /// Number of successful `put` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of successful `delete` calls.
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Snapshot of the record stored under `id`, bypassing fault injection.
    pub fn peek(&self, id: &str) -> Option<Draft> {
        self.drafts.get(id).map(|d| d.clone())
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "Memory store is refusing writes".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for MemoryDraftStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, id: &str) -> Result<Option<Draft>, StoreError> {
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "Memory store is refusing reads".to_string(),
            ));
        }
        Ok(self.peek(id))
    }

    #[instrument(skip(self, draft), level = "debug", fields(id = %draft.id))]
    async fn put(&self, draft: &Draft) -> Result<(), StoreError> {
        if draft.id.is_empty() {
            return Err(StoreError::InvalidArgument(
                "Draft identifier must not be empty".to_string(),
            ));
        }
        self.check_writable()?;
        self.drafts.insert(draft.id.clone(), draft.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!("Stored draft {} in memory", draft.id);
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.check_writable()?;
        let existed = self.drafts.remove(id).is_some();
        if existed {
            self.deletes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_counts() {
        let store = MemoryDraftStore::new();
        store.put(&Draft::new("default", "a")).await.unwrap();
        store.put(&Draft::new("default", "b")).await.unwrap();

        assert_eq!(store.write_count(), 2);
        assert_eq!(store.get("default").await.unwrap().unwrap().content, "b");

        assert!(store.delete("default").await.unwrap());
        assert!(!store.delete("default").await.unwrap());
        assert_eq!(store.delete_count(), 1);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store = MemoryDraftStore::new().with_draft(Draft::new("default", "kept"));
        store.fail_writes(true);

        let err = store.put(&Draft::new("default", "lost")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(store.delete("default").await.is_err());
        assert_eq!(store.peek("default").unwrap().content, "kept");
        assert_eq!(store.write_count(), 0);

        store.fail_reads(true);
        assert!(store.get("default").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_delay() {
        let store = MemoryDraftStore::new().with_draft(Draft::new("default", "slow"));
        store.set_read_delay(Duration::from_millis(500));

        let started = tokio::time::Instant::now();
        let draft = store.get("default").await.unwrap().unwrap();
        assert_eq!(draft.content, "slow");
        assert!(started.elapsed() >= Duration::from_millis(500));
    }
}
