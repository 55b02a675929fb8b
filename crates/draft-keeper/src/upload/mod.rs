//! Upload hand-off.

mod coordinator;
mod http;

pub use coordinator::{upload_fn, FnUploadHandler, UploadCoordinator};
pub use http::HttpUploadHandler;
