use crate::namespace::Namespace;

/// Errors from keyed object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Persisted text under a storage key could not be decoded.
    ///
    /// Never papered over with an empty mapping: a corrupted entry must
    /// surface to the caller.
    #[error("corrupted state under {key}: {reason}")]
    Corrupted { key: String, reason: String },

    /// A mapping operation was attempted on a scalar namespace.
    #[error("namespace {0} holds a scalar and has no sub-keys")]
    ScalarNamespace(Namespace),

    /// The namespace name is not one of the known categories.
    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),

    /// The operation only makes sense for a remote-mirrored store.
    #[error("store is not remote-mirrored")]
    NotMirrored,

    /// Remote-mirrored stores need a tokio runtime to issue writes on.
    #[error("no tokio runtime available for remote writes")]
    NoRuntime,

    /// Serialization of a caller-supplied value failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A remote call that the caller explicitly awaited failed.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// I/O error from a file-backed storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal lock was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    LockPoisoned,
}

/// Errors from a [`RemoteSink`](crate::remote::RemoteSink).
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The endpoint answered with a non-success status.
    #[error("[{status}] {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result alias for remote sink operations.
pub type RemoteResult<T> = Result<T, RemoteError>;
