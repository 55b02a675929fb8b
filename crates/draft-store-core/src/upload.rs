use async_trait::async_trait;

use crate::error::UploadError;

/// The remote upload operation supplied by the host.
///
/// No latency or idempotency contract is assumed; the engine calls it at most once per
/// submit and never retries on its own.
#[async_trait]
pub trait UploadHandler: Send + Sync {
    async fn upload(&self, content: &str) -> Result<(), UploadError>;
}
