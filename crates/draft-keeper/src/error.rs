use draft_store_core::{StoreError, UploadError};
use thiserror::Error;

/// Errors returned to the host by a draft session.
///
/// None of these are fatal: every failure leaves the session running with a visible
/// status, and the in-memory draft intact.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Upload failed: {0}")]
    UploadFailed(#[from] UploadError),

    /// Submit was invoked with nothing to submit. The submit control is inert in this state.
    #[error("Nothing to submit: the draft is empty")]
    EmptyDraft,

    /// A previous submit has not finished yet.
    #[error("A submit is already in progress")]
    SubmitInProgress,

    #[error("No pending draft to reconcile")]
    NoPendingCandidate,

    #[error("Draft session is closed")]
    SessionClosed,
}
