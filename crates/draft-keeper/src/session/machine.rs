use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use draft_store_core::{
    content_digest, Draft, DraftStatus, MirrorStore, StoreError, UploadError,
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::writer::{WriteJob, WriteOp};
use super::{DraftView, SessionConfig, SessionEvent, SubmitOutcome};
use crate::error::DraftError;
use crate::upload::UploadCoordinator;

type SubmitReply = oneshot::Sender<Result<SubmitOutcome, DraftError>>;

/// Why a queued durable write was issued, and who is waiting on it.
enum PendingWrite {
    Edit {
        reply: oneshot::Sender<()>,
    },
    OfflineSubmit {
        text: String,
        reply: SubmitReply,
    },
    Accept {
        candidate: String,
        reply: oneshot::Sender<Result<String, DraftError>>,
    },
    Retire {
        reply: SubmitReply,
    },
}

/// An upload running in its own task.
struct InFlightUpload {
    text: String,
    reply: SubmitReply,
    task: JoinHandle<()>,
}

/// The draft lifecycle state machine.
///
/// Owns the in-memory draft, its status, and the pending reconciliation candidate.
/// It runs on the session task and never awaits: durable writes go to the writer task
/// and uploads run in their own task, both reporting back as [`SessionEvent`]s.
pub(crate) struct DraftMachine {
    config: SessionConfig,
    mirror: Arc<dyn MirrorStore>,
    coordinator: UploadCoordinator,

    content: String,
    status: DraftStatus,
    /// Single revert deadline; every status change replaces it.
    revert_at: Option<Instant>,
    online: bool,
    /// What the mirror is known to hold: read at start, then every successful write.
    mirror_snapshot: String,
    pending: Option<String>,
    /// Set by dismissal; cleared when any input to the candidate changes.
    dismissed: bool,

    writes: mpsc::UnboundedSender<WriteJob>,
    /// Completions arrive in queue order.
    in_flight_writes: VecDeque<(u64, PendingWrite)>,
    next_seq: u64,
    events: mpsc::UnboundedSender<SessionEvent>,
    upload: Option<InFlightUpload>,
    /// Set from submit until its outcome is known, including retirement.
    submitting: bool,

    view: watch::Sender<DraftView>,
    transitions: broadcast::Sender<DraftStatus>,
}

impl DraftMachine {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: SessionConfig,
        mirror: Arc<dyn MirrorStore>,
        coordinator: UploadCoordinator,
        online: bool,
        writes: mpsc::UnboundedSender<WriteJob>,
        events: mpsc::UnboundedSender<SessionEvent>,
        view: watch::Sender<DraftView>,
        transitions: broadcast::Sender<DraftStatus>,
    ) -> Self {
        Self {
            config,
            mirror,
            coordinator,
            content: String::new(),
            status: DraftStatus::Idle,
            revert_at: None,
            online,
            mirror_snapshot: String::new(),
            pending: None,
            dismissed: false,
            writes,
            in_flight_writes: VecDeque::new(),
            next_seq: 0,
            events,
            upload: None,
            submitting: false,
            view,
            transitions,
        }
    }

    pub(crate) fn draft_id(&self) -> &str {
        &self.config.draft_id
    }

    pub(crate) fn revert_deadline(&self) -> Option<Instant> {
        self.revert_at
    }

    fn display_interval(&self) -> Duration {
        self.config.status_display
    }

    fn set_status(&mut self, status: DraftStatus) {
        self.revert_at = if status.reverts_on_timer() {
            Some(Instant::now() + self.display_interval())
        } else {
            None
        };
        if self.status != status {
            debug!("Draft {} status {} -> {}", self.config.draft_id, self.status, status);
        }
        self.status = status;
        // No receivers is fine; the host may not render transitions
        let _ = self.transitions.send(status);
    }

    /// Publish the observable state.
    fn publish(&self) {
        self.view.send_replace(DraftView {
            draft_id: self.config.draft_id.clone(),
            content: self.content.clone(),
            status: self.status,
            online: self.online,
            pending: self.pending.clone(),
            placeholder: self.config.placeholder.clone(),
        });
    }

    /// Recompute the reconciliation candidate from its inputs.
    fn reconcile(&mut self) {
        let surfaced = self.online
            && !self.dismissed
            && !self.mirror_snapshot.is_empty()
            && self.mirror_snapshot != self.content;

        let candidate = surfaced.then(|| self.mirror_snapshot.clone());
        if candidate != self.pending {
            match &candidate {
                Some(text) => info!(
                    "Pending draft surfaced for {} ({} bytes, digest {})",
                    self.config.draft_id,
                    text.len(),
                    content_digest(text)
                ),
                None => debug!("Pending draft withdrawn for {}", self.config.draft_id),
            }
            self.pending = candidate;
        }
    }

    fn write_mirror(&mut self, text: &str) {
        match self.mirror.put(&self.config.draft_id, text) {
            Ok(()) => self.mirror_snapshot = text.to_string(),
            Err(e) => warn!(
                "Mirror write for draft {} failed (ignored): {}",
                self.config.draft_id, e
            ),
        }
    }

    /// Write the current content to the mirror now and queue the durable write.
    fn persist(&mut self, purpose: PendingWrite) {
        let content = self.content.clone();
        self.write_mirror(&content);
        self.enqueue(WriteOp::Put(content), purpose);
    }

    fn enqueue(&mut self, op: WriteOp, purpose: PendingWrite) {
        self.next_seq += 1;
        let seq = self.next_seq;
        if self.writes.send(WriteJob { seq, op }).is_err() {
            warn!("Store writer for draft {} has stopped", self.config.draft_id);
            self.complete_write(
                purpose,
                Err(StoreError::Unavailable("store writer stopped".to_string())),
            );
            return;
        }
        self.in_flight_writes.push_back((seq, purpose));
    }

    // =========================================================================
    // Session start
    // =========================================================================

    /// Read the mirror at session start. Only the snapshot is seeded; content is not.
    pub(crate) fn load_mirror_snapshot(&mut self) {
        match self.mirror.get(&self.config.draft_id) {
            Ok(Some(text)) if !text.is_empty() => {
                debug!(
                    "Mirror holds a saved draft for {} ({} bytes)",
                    self.config.draft_id,
                    text.len()
                );
                self.mirror_snapshot = text;
            }
            Ok(_) => {}
            Err(e) => warn!(
                "Mirror read for draft {} failed (ignored): {}",
                self.config.draft_id, e
            ),
        }
        self.reconcile();
        self.publish();
    }

    /// Apply the durable recovery read. Only an empty buffer is seeded.
    fn apply_recovery(&mut self, result: Result<Option<Draft>, StoreError>) {
        match result {
            Ok(Some(draft)) if !draft.is_empty() => {
                if self.content.is_empty() {
                    info!(
                        "Recovered draft {} ({} bytes, saved {})",
                        self.config.draft_id,
                        draft.content.len(),
                        draft.timestamp
                    );
                    self.content = draft.content;
                    self.set_status(DraftStatus::Recovered);
                } else {
                    debug!(
                        "Skipping recovery of {}: content was edited before the read completed",
                        self.config.draft_id
                    );
                }
            }
            Ok(_) => debug!("No draft to recover for {}", self.config.draft_id),
            Err(e) => {
                warn!("Recovery of draft {} failed: {}", self.config.draft_id, e);
                self.set_status(DraftStatus::Error);
            }
        }
    }

    // =========================================================================
    // Host actions
    // =========================================================================

    /// Replace the content. `reply` fires once the durable write has completed.
    pub(crate) fn edit(&mut self, text: String, reply: oneshot::Sender<()>) {
        if text == self.content {
            let _ = reply.send(());
            return;
        }
        self.content = text;
        self.dismissed = false;

        if self.content.is_empty() {
            // Empty drafts are never saved
            let _ = reply.send(());
        } else {
            self.set_status(DraftStatus::Saving);
            self.persist(PendingWrite::Edit { reply });
        }
        self.reconcile();
        self.publish();
    }

    pub(crate) fn submit(&mut self, reply: SubmitReply) {
        if self.content.is_empty() {
            let _ = reply.send(Err(DraftError::EmptyDraft));
            return;
        }
        if self.submitting {
            let _ = reply.send(Err(DraftError::SubmitInProgress));
            return;
        }
        self.submitting = true;

        if self.online {
            self.start_upload(reply);
        } else {
            self.persist(PendingWrite::OfflineSubmit {
                text: self.content.clone(),
                reply,
            });
        }
        self.reconcile();
        self.publish();
    }

    fn start_upload(&mut self, reply: SubmitReply) {
        self.set_status(DraftStatus::Uploading);

        let text = self.content.clone();
        let coordinator = self.coordinator.clone();
        let events = self.events.clone();
        let upload_text = text.clone();
        let task = tokio::spawn(async move {
            let result = coordinator.upload(&upload_text).await;
            let _ = events.send(SessionEvent::Uploaded(result));
        });

        self.upload = Some(InFlightUpload { text, reply, task });
    }

    pub(crate) fn accept_pending(&mut self, reply: oneshot::Sender<Result<String, DraftError>>) {
        let Some(candidate) = self.pending.take() else {
            let _ = reply.send(Err(DraftError::NoPendingCandidate));
            return;
        };

        self.content = candidate.clone();
        self.dismissed = false;
        // Re-persists the mirror too. Status is left alone
        self.persist(PendingWrite::Accept { candidate, reply });

        self.reconcile();
        self.publish();
    }

    pub(crate) fn dismiss_pending(&mut self) -> Result<(), DraftError> {
        if self.pending.take().is_none() {
            return Err(DraftError::NoPendingCandidate);
        }
        self.dismissed = true;
        debug!("Pending draft dismissed for {}", self.config.draft_id);
        self.publish();
        Ok(())
    }

    // =========================================================================
    // Environment
    // =========================================================================

    pub(crate) fn set_online(&mut self, online: bool) {
        if online == self.online {
            return;
        }
        self.online = online;
        self.dismissed = false;
        self.reconcile();
        self.publish();
    }

    /// The revert deadline elapsed.
    pub(crate) fn on_revert_deadline(&mut self) {
        self.revert_at = None;
        if self.status.reverts_on_timer() {
            self.set_status(DraftStatus::Idle);
            self.publish();
        }
    }

    pub(crate) fn on_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Recovered(result) => self.apply_recovery(result),
            SessionEvent::Written { seq, result } => self.on_written(seq, result),
            SessionEvent::Uploaded(result) => self.on_uploaded(result),
        }
        self.reconcile();
        self.publish();
    }

    fn on_written(&mut self, seq: u64, result: Result<(), StoreError>) {
        let Some((expected, purpose)) = self.in_flight_writes.pop_front() else {
            warn!("Unexpected write completion {} for {}", seq, self.config.draft_id);
            return;
        };
        if expected != seq {
            warn!(
                "Write completion {} for {} arrived while expecting {}",
                seq, self.config.draft_id, expected
            );
        }
        self.complete_write(purpose, result);
    }

    fn complete_write(&mut self, purpose: PendingWrite, result: Result<(), StoreError>) {
        match purpose {
            PendingWrite::Edit { reply } => {
                match result {
                    Ok(()) => {
                        let newer_edit = self
                            .in_flight_writes
                            .iter()
                            .any(|(_, p)| matches!(p, PendingWrite::Edit { .. }));
                        if self.status == DraftStatus::Saving && !newer_edit {
                            self.set_status(DraftStatus::Idle);
                        }
                    }
                    Err(e) => {
                        warn!("Saving draft {} failed: {}", self.config.draft_id, e);
                        self.set_status(DraftStatus::Error);
                    }
                }
                let _ = reply.send(());
            }
            PendingWrite::OfflineSubmit { text, reply } => {
                self.submitting = false;
                match result {
                    Ok(()) => {
                        info!(
                            "Saved draft {} offline ({} bytes)",
                            self.config.draft_id,
                            text.len()
                        );
                        // Anything typed since the submit stays
                        if self.content == text {
                            self.content.clear();
                        }
                        self.dismissed = false;
                        self.set_status(DraftStatus::SavedOffline);
                        let _ = reply.send(Ok(SubmitOutcome::SavedOffline));
                    }
                    Err(e) => {
                        warn!("Offline save of draft {} failed: {}", self.config.draft_id, e);
                        self.set_status(DraftStatus::Error);
                        let _ = reply.send(Err(e.into()));
                    }
                }
            }
            PendingWrite::Accept { candidate, reply } => {
                // A failed durable write here only costs durability
                if let Err(e) = result {
                    warn!(
                        "Persisting accepted draft {} failed: {}",
                        self.config.draft_id, e
                    );
                }
                let _ = reply.send(Ok(candidate));
            }
            PendingWrite::Retire { reply } => {
                self.submitting = false;
                if result.is_err() {
                    // Already logged by the coordinator; the record is offered again on restart
                    self.set_status(DraftStatus::Error);
                }
                let _ = reply.send(Ok(SubmitOutcome::Uploaded));
            }
        }
    }

    fn on_uploaded(&mut self, result: Result<(), UploadError>) {
        let Some(upload) = self.upload.take() else {
            debug!("Upload result for {} arrived with no upload in flight", self.config.draft_id);
            return;
        };

        if let Err(e) = result {
            self.submitting = false;
            self.set_status(DraftStatus::Error);
            let _ = upload.reply.send(Err(DraftError::UploadFailed(e)));
            return;
        }

        self.set_status(DraftStatus::Uploaded);
        self.dismissed = false;

        if self.content != upload.text && !self.content.is_empty() {
            // Newer edits landed during the upload. The stores hold them, not the
            // uploaded text, so there is nothing to retire
            info!(
                "Draft {} was edited during its upload; keeping the newer text",
                self.config.draft_id
            );
            self.submitting = false;
            let _ = upload.reply.send(Ok(SubmitOutcome::Uploaded));
            return;
        }

        self.content.clear();
        match self.coordinator.retire_mirror() {
            Ok(_) => self.mirror_snapshot.clear(),
            Err(_) => self.set_status(DraftStatus::Error),
        }
        self.enqueue(WriteOp::Retire, PendingWrite::Retire { reply: upload.reply });
    }
}

impl Drop for DraftMachine {
    fn drop(&mut self) {
        if let Some(upload) = self.upload.take() {
            upload.task.abort();
        }
    }
}
