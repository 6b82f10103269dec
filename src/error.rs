//! Error types for the etcd operator
//!
//! Every reconciliation pass either succeeds or fails with one of these
//! variants. A failed pass is retried by the controller runtime according to
//! [`Error::is_retryable`].

use thiserror::Error;

use crate::template::TemplateError;

/// Main error type for etcd operator operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Backup destination path template failed to parse or render
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// Storage type has no usable backend or source configuration
    #[error("unsupported storage: {0}")]
    UnsupportedStorage(String),

    /// Backup URL does not follow `scheme://bucket/object`
    #[error("invalid backup url '{url}': {message}")]
    InvalidBackupUrl {
        /// The URL as given
        url: String,
        /// What is wrong with it
        message: String,
    },

    /// Optimistic concurrency conflicts persisted past the retry budget
    #[error("{kind}/{name} still conflicting after {attempts} attempts")]
    ConflictRetriesExhausted {
        /// Kind of the object being converged
        kind: String,
        /// Name of the object being converged
        name: String,
        /// Number of attempts made
        attempts: u32,
    },

    /// A required metadata field is missing on a resource
    #[error("missing object key: {0}")]
    MissingObjectKey(&'static str),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Taking the etcd snapshot failed
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// Uploading the snapshot to object storage failed
    #[error("upload error: {0}")]
    Upload(String),

    /// The backup sequence exceeded its deadline
    #[error("backup timed out after {0}s")]
    Timeout(u64),
}

impl Error {
    /// Create an unsupported storage error with the given message
    pub fn unsupported_storage(msg: impl Into<String>) -> Self {
        Self::UnsupportedStorage(msg.into())
    }

    /// Create an invalid backup URL error
    pub fn invalid_backup_url(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidBackupUrl {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a snapshot error with the given message
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot(msg.into())
    }

    /// Create an upload error with the given message
    pub fn upload(msg: impl Into<String>) -> Self {
        Self::Upload(msg.into())
    }

    /// Whether a failed pass should be requeued.
    ///
    /// Configuration errors stay broken until an operator edits the resource,
    /// and that edit triggers a new pass on its own.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::UnsupportedStorage(_) | Self::InvalidBackupUrl { .. } | Self::MissingObjectKey(_)
        )
    }

    /// Whether this error is an optimistic concurrency conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Kube(e) if is_conflict(e))
    }

    /// Whether a create lost a race with another create of the same name
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::Kube(e) if is_already_exists(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Returns true if the API server rejected a write on a stale resourceVersion
///
/// `AlreadyExists` also answers 409 but is not a version conflict.
pub fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 409 && ae.reason == "Conflict")
}

/// Returns true if a create raced with another create of the same name
pub fn is_already_exists(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists")
}

/// Build a kube API error response, used by fakes in tests
#[cfg(test)]
pub(crate) fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{reason} ({code})"),
        reason: reason.to_string(),
        code,
    })
}
