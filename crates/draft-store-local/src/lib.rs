//! Store backends for offline-first drafts.
//!
//! - `LocalDraftStore` / `LocalMirrorStore`: one file per draft under a base directory
//! - `MemoryDraftStore` / `MemoryMirrorStore`: process-local maps with fault injection

mod keys;
mod mirror;
mod storage;

pub use keys::file_key;
pub use mirror::{LocalMirrorStore, MemoryMirrorStore, DEFAULT_MIRROR_PREFIX};
pub use storage::{LocalDraftStore, MemoryDraftStore};
