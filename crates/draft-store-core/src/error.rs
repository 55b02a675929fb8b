use thiserror::Error;

/// Errors that can occur in a draft store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store cannot be opened, read, or written.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The record cannot be encoded or decoded, or the store refused its size.
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Errors raised by a caller-supplied upload operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// The remote side received the draft and refused it.
    #[error("Upload rejected: {0}")]
    Rejected(String),

    /// The draft never reached the remote side.
    #[error("Upload transport error: {0}")]
    Transport(String),
}
