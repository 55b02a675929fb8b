//! Offline-first draft lifecycle engine.
//!
//! Keeps one piece of user text durable across restarts and network outages, and hands
//! it to a caller-supplied upload operation once connectivity allows:
//! - `connectivity`: reachability monitoring with push and polling sources
//! - `session`: the draft lifecycle state machine and its host handle
//! - `upload`: upload hand-off and store retirement

pub mod config;
pub mod connectivity;
mod error;
pub mod session;
pub mod upload;

pub use connectivity::{ConnectivityMonitor, ManualProbe, MonitorConfig, TcpProbe, WatchMode};
pub use error::DraftError;
pub use session::{DraftHandle, DraftSession, DraftView, SessionConfig, SubmitOutcome};
pub use upload::{upload_fn, HttpUploadHandler, UploadCoordinator};

pub use draft_store_core::{Draft, DraftStatus, StoreError, UploadError};
