//! Error types for gallery operations.

use thiserror::Error;

/// Result type alias for gallery operations.
pub type Result<T> = std::result::Result<T, GalleryError>;

/// Top-level error returned by every `Gallery` operation.
#[derive(Error, Debug)]
pub enum GalleryError {
    /// Candidate entry failed validation; nothing was written.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Durable storage could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A read or a remove could not be resolved against the pool.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Mutation attempted without admin authorization.
    #[error("operation requires admin authorization")]
    Unauthorized,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("title cannot be empty")]
    InvalidTitle,
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// First run: nothing has been persisted yet.
    #[error("store not found at {0}")]
    StoreNotFound(String),

    /// Persisted content exists but cannot be trusted.
    #[error("store corrupt: {0}")]
    StoreCorrupt(String),

    /// Atomic save failed; the previous file is untouched.
    #[error("write failed: {0}")]
    WriteFailed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("the gallery is empty")]
    EmptyPool,

    #[error("no entries match {0}")]
    NoMatch(String),

    #[error("entry not found: {0}")]
    NotFound(String),

    #[error("entry is not available in this context")]
    Forbidden,

    #[error("{count} entries match {title:?}; remove by index instead")]
    AmbiguousMatch { title: String, count: usize },

    /// Listing was taken from an older snapshot than the current one.
    #[error("listing is stale (generation {listed}, current {current}); list again")]
    StaleIndex { listed: u64, current: u64 },
}

impl StoreError {
    pub fn corrupt<T: ToString>(msg: T) -> Self {
        Self::StoreCorrupt(msg.to_string())
    }

    pub fn write_failed<T: ToString>(msg: T) -> Self {
        Self::WriteFailed(msg.to_string())
    }
}

impl GalleryError {
    /// True for `StoreError::StoreNotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GalleryError::Store(StoreError::StoreNotFound(_)))
    }
}
