use hoard_types::{BlobId, TypeError};

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested blob was not found in any probed store.
    #[error("blob not found: {0}")]
    BlobNotFound(BlobId),

    /// Stored content no longer hashes to its id (data corruption).
    #[error("hash mismatch for blob {0}")]
    HashMismatch(BlobId),

    /// A blob operation was attempted on a store that is not started.
    #[error("store {name} is not started (state: {state})")]
    NotStarted { name: String, state: String },

    /// A group had no member it could write to.
    #[error("group {group} has no live members")]
    NoLiveMembers { group: String },

    /// The member chosen by the fill policy failed the write.
    #[error("write to member {member} failed: {source}")]
    WriteFailed {
        member: String,
        #[source]
        source: Box<StoreError>,
    },

    /// One or more group members failed a broadcast delete.
    #[error("delete failed on {} member(s): {}", .failures.len(), describe_failures(.failures))]
    PartialDeleteFailure {
        /// Whether at least one member did delete the blob.
        deleted: bool,
        /// `(member, error)` for every member that failed.
        failures: Vec<(String, StoreError)>,
    },

    /// The store configuration is unusable.
    #[error("invalid configuration for {name}: {reason}")]
    InvalidConfiguration { name: String, reason: String },

    /// On-disk store metadata could not be read.
    #[error("corrupt store metadata at {path}: {reason}")]
    CorruptMetadata { path: String, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Shorthand for [`StoreError::InvalidConfiguration`].
    pub fn invalid_config(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for a clean miss, as opposed to a backend failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::BlobNotFound(_))
    }
}

impl From<TypeError> for StoreError {
    fn from(e: TypeError) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

fn describe_failures(failures: &[(String, StoreError)]) -> String {
    failures
        .iter()
        .map(|(member, err)| format!("{member}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
