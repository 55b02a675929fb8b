mod local;
mod memory;

pub use local::LocalDraftStore;
pub use memory::MemoryDraftStore;
