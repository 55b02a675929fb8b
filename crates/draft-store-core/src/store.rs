use async_trait::async_trait;

use crate::draft::Draft;
use crate::error::StoreError;

/// Durable store abstraction for drafts.
///
/// This is the source of truth across restarts. Implementations key records by
/// draft identifier and treat `put` as an upsert. No ordering is promised between
/// concurrent writes to different identifiers; callers serialize writes for the
/// same identifier.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Returns the backend identifier (e.g., "local", "memory").
    fn backend_name(&self) -> &'static str;

    /// Load the draft stored under `id`, if any.
    async fn get(&self, id: &str) -> Result<Option<Draft>, StoreError>;

    /// Insert or replace the draft stored under `draft.id`.
    async fn put(&self, draft: &Draft) -> Result<(), StoreError>;

    /// Remove the draft stored under `id`.
    ///
    /// Returns whether an entry existed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;
}
