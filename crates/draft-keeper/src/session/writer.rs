use std::sync::Arc;

use draft_store_core::{Draft, DurableStore};
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use super::SessionEvent;
use crate::upload::UploadCoordinator;

pub(crate) enum WriteOp {
    /// Upsert the draft with this content.
    Put(String),
    /// Delete the draft after a successful upload.
    Retire,
}

pub(crate) struct WriteJob {
    pub(crate) seq: u64,
    pub(crate) op: WriteOp,
}

/// Durable store traffic for one draft, one operation at a time in submission order.
///
/// The recovery read goes first, so no write can land before it and record timestamps
/// continue from whatever was recovered. Queued writes are drained even after the
/// session stops listening for completions.
#[instrument(skip_all, level = "debug", fields(draft_id = %draft_id))]
pub(crate) async fn run_writer(
    draft_id: String,
    durable: Arc<dyn DurableStore>,
    coordinator: UploadCoordinator,
    mut jobs: mpsc::UnboundedReceiver<WriteJob>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    let recovered = durable.get(&draft_id).await;
    let mut last_timestamp = match &recovered {
        Ok(Some(draft)) => Some(draft.timestamp),
        _ => None,
    };
    let _ = events.send(SessionEvent::Recovered(recovered));

    while let Some(job) = jobs.recv().await {
        let result = match job.op {
            WriteOp::Put(content) => {
                let draft = Draft::successor(draft_id.clone(), content, last_timestamp);
                let result = durable.put(&draft).await;
                if result.is_ok() {
                    last_timestamp = Some(draft.timestamp);
                }
                result
            }
            WriteOp::Retire => coordinator.retire_durable().await.map(|_| ()),
        };

        if events
            .send(SessionEvent::Written {
                seq: job.seq,
                result,
            })
            .is_err()
        {
            debug!("Write {} completed after the session stopped", job.seq);
        }
    }
}
