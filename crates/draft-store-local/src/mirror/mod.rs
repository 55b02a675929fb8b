mod file;
mod memory;

pub use file::LocalMirrorStore;
pub use memory::MemoryMirrorStore;

/// Namespace applied to mirror keys when the host does not choose one.
pub const DEFAULT_MIRROR_PREFIX: &str = "draft_";
