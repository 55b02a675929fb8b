use crate::error::StoreError;

/// Synchronous text mirror of the current draft.
///
/// The mirror is a low-latency convenience copy, written on every draft mutation
/// independently of the durable store. It may lag the durable store; callers tolerate
/// its failures rather than treating them as data loss.
///
/// Implementations namespace keys as `prefix + id`.
pub trait MirrorStore: Send + Sync {
    /// Returns the backend identifier (e.g., "local", "memory").
    fn backend_name(&self) -> &'static str;

    /// Read the mirrored text for `id`.
    fn get(&self, id: &str) -> Result<Option<String>, StoreError>;

    /// Replace the mirrored text for `id`.
    fn put(&self, id: &str, text: &str) -> Result<(), StoreError>;

    /// Remove the mirrored text for `id`. Returns whether an entry existed.
    fn delete(&self, id: &str) -> Result<bool, StoreError>;
}
