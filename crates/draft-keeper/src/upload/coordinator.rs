use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use draft_store_core::{
    content_digest, DurableStore, MirrorStore, StoreError, UploadError, UploadHandler,
};
use tracing::{info, instrument, warn};

/// Wraps the host's upload operation with store retirement.
///
/// `upload` calls the upload operation exactly once and never retries. Retirement is
/// split by store so the session can order the durable delete behind its other writes
/// and do the mirror delete inline; both report their outcome.
#[derive(Clone)]
pub struct UploadCoordinator {
    draft_id: String,
    handler: Arc<dyn UploadHandler>,
    durable: Arc<dyn DurableStore>,
    mirror: Arc<dyn MirrorStore>,
}

impl std::fmt::Debug for UploadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadCoordinator")
            .field("draft_id", &self.draft_id)
            .field("durable", &self.durable.backend_name())
            .field("mirror", &self.mirror.backend_name())
            .finish_non_exhaustive()
    }
}

impl UploadCoordinator {
    pub fn new(
        draft_id: impl Into<String>,
        handler: Arc<dyn UploadHandler>,
        durable: Arc<dyn DurableStore>,
        mirror: Arc<dyn MirrorStore>,
    ) -> Self {
        Self {
            draft_id: draft_id.into(),
            handler,
            durable,
            mirror,
        }
    }

    /// Hand `content` to the upload operation. Stores are not touched.
    #[instrument(
        skip(self, content),
        fields(
            draft_id = %self.draft_id,
            attempt_id = %uuid::Uuid::new_v4(),
            content_len = content.len(),
            digest = %content_digest(content),
        )
    )]
    pub async fn upload(&self, content: &str) -> Result<(), UploadError> {
        match self.handler.upload(content).await {
            Ok(()) => {
                info!("Uploaded draft {}", self.draft_id);
                Ok(())
            }
            Err(e) => {
                warn!("Upload of draft {} failed: {}", self.draft_id, e);
                Err(e)
            }
        }
    }

    /// Remove the uploaded draft from the durable store.
    ///
    /// Returns whether a record existed.
    #[instrument(skip(self), level = "debug", fields(draft_id = %self.draft_id))]
    pub async fn retire_durable(&self) -> Result<bool, StoreError> {
        match self.durable.delete(&self.draft_id).await {
            Ok(existed) => {
                info!(
                    "Retired draft {} from {} store (existed: {})",
                    self.draft_id,
                    self.durable.backend_name(),
                    existed
                );
                Ok(existed)
            }
            Err(e) => {
                warn!(
                    "Failed to retire draft {} from {} store: {}",
                    self.draft_id,
                    self.durable.backend_name(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Remove the uploaded draft from the mirror.
    pub fn retire_mirror(&self) -> Result<bool, StoreError> {
        self.mirror.delete(&self.draft_id).inspect_err(|e| {
            warn!("Failed to retire mirror of draft {}: {}", self.draft_id, e);
        })
    }
}

/// Upload handler backed by an async closure.
pub struct FnUploadHandler<F> {
    f: F,
}

/// Build an `UploadHandler` from an async closure taking the draft content.
pub fn upload_fn<F, Fut>(f: F) -> FnUploadHandler<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), UploadError>> + Send + 'static,
{
    FnUploadHandler { f }
}

#[async_trait]
impl<F, Fut> UploadHandler for FnUploadHandler<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), UploadError>> + Send + 'static,
{
    async fn upload(&self, content: &str) -> Result<(), UploadError> {
        (self.f)(content.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draft_store_core::Draft;
    use draft_store_local::{MemoryDraftStore, MemoryMirrorStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        durable: Arc<MemoryDraftStore>,
        mirror: Arc<MemoryMirrorStore>,
        calls: Arc<AtomicUsize>,
    }

    fn fixture(succeed: bool) -> (UploadCoordinator, Fixture) {
        let durable = Arc::new(MemoryDraftStore::new().with_draft(Draft::new("default", "hello")));
        let mirror = Arc::new(MemoryMirrorStore::default().with_entry("default", "hello"));
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let handler = upload_fn(move |_content| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if succeed {
                    Ok(())
                } else {
                    Err(UploadError::Rejected("server said no".to_string()))
                }
            }
        });

        let coordinator = UploadCoordinator::new(
            "default",
            Arc::new(handler),
            durable.clone(),
            mirror.clone(),
        );
        (
            coordinator,
            Fixture {
                durable,
                mirror,
                calls,
            },
        )
    }

    #[tokio::test]
    async fn test_upload_calls_handler_once() {
        let (coordinator, fx) = fixture(true);

        coordinator.upload("hello").await.unwrap();

        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
        // Retirement is a separate step
        assert!(fx.durable.peek("default").is_some());
        assert!(fx.mirror.peek("default").is_some());
    }

    #[tokio::test]
    async fn test_failure_is_not_retried() {
        let (coordinator, fx) = fixture(false);

        let err = coordinator.upload("hello").await.unwrap_err();
        assert!(matches!(err, UploadError::Rejected(_)));

        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.durable.peek("default").unwrap().content, "hello");
        assert_eq!(fx.mirror.peek("default").as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_retirement_reports_outcome() {
        let (coordinator, fx) = fixture(true);

        assert_eq!(coordinator.retire_durable().await, Ok(true));
        assert_eq!(coordinator.retire_mirror(), Ok(true));
        assert!(fx.durable.peek("default").is_none());
        assert!(fx.mirror.peek("default").is_none());

        // Nothing left to remove
        assert_eq!(coordinator.retire_durable().await, Ok(false));
        assert_eq!(coordinator.retire_mirror(), Ok(false));
    }

    #[tokio::test]
    async fn test_retirement_failures_are_returned() {
        let (coordinator, fx) = fixture(true);
        fx.durable.fail_writes(true);
        fx.mirror.fail_writes(true);

        assert!(matches!(
            coordinator.retire_durable().await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            coordinator.retire_mirror(),
            Err(StoreError::Unavailable(_))
        ));
        assert!(fx.durable.peek("default").is_some());
        assert_eq!(fx.mirror.peek("default").as_deref(), Some("hello"));
    }
}
