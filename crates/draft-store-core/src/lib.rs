//! Core traits and types for offline-first draft persistence.
//!
//! This crate defines the abstractions shared between store implementations and the
//! draft lifecycle engine:
//! - `DurableStore`: asynchronous, authoritative record store for drafts
//! - `MirrorStore`: synchronous text mirror used for cross-reload detection
//! - `ReachabilityProbe`: platform reachability signal (polled and/or pushed)
//! - `UploadHandler`: the caller-supplied remote upload operation

mod draft;
mod error;
mod mirror;
mod probe;
mod store;
mod upload;

pub use draft::{content_digest, Draft, DraftStatus, DEFAULT_DRAFT_ID};
pub use error::{StoreError, UploadError};
pub use mirror::MirrorStore;
pub use probe::ReachabilityProbe;
pub use store::DurableStore;
pub use upload::UploadHandler;
