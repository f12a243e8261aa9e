//! Error taxonomy for sync runs.

use std::path::PathBuf;

/// A storage backend request that did not succeed.
///
/// Every list, put, or delete failure is fatal to the sync that issued it.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// `ListObjectsV2` failed.
    #[error("Failed to list s3://{bucket}/{prefix}: {source}")]
    List {
        /// Bucket name.
        bucket: String,
        /// Key prefix (empty when unscoped).
        prefix: String,
        /// Underlying backend error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// `PutObject` failed.
    #[error("Failed to upload s3://{bucket}/{key}: {source}")]
    Put {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying backend error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// `DeleteObjects` failed.
    #[error("Failed to delete {count} object(s) from s3://{bucket}: {source}")]
    Delete {
        /// Bucket name.
        bucket: String,
        /// Number of keys in the failed batch.
        count: usize,
        /// Underlying backend error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Errors that abort a sync run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Required configuration is missing.
    #[error("Invalid configuration: {message}")]
    Config {
        /// What is missing.
        message: String,
    },

    /// The resolved sync root is not an existing directory.
    #[error("Sync root not found: {}", path.display())]
    NotFound {
        /// The resolved (absolute) root path.
        path: PathBuf,
    },

    /// A storage backend request failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Two local files map to the same remote key.
    #[error("{} and {} both map to key {key}", first.display(), second.display())]
    KeyCollision {
        /// The shared remote key.
        key: String,
        /// File seen first in traversal order.
        first: PathBuf,
        /// File seen second.
        second: PathBuf,
    },

    /// A local file or directory could not be read.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// File or directory being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
