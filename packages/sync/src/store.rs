//! Storage backend abstraction.
//!
//! The reconciler only needs three bucket operations: paginated listing,
//! single-object put, and batch delete. [`ObjectStore`] captures exactly
//! those so the engine can run against S3, R2, or an in-memory double.

use crate::error::StorageError;

/// One `ListObjects` page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListRequest<'a> {
    /// Bucket to list.
    pub bucket: &'a str,
    /// Only list keys starting with this prefix.
    pub prefix: Option<&'a str>,
    /// Group keys sharing a prefix up to this delimiter.
    pub delimiter: Option<&'a str>,
    /// Token from the previous page, `None` for the first page.
    pub continuation_token: Option<&'a str>,
}

/// An object as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    /// Object key.
    pub key: String,
    /// Backend content identity, usually a quoted hex digest.
    pub etag: Option<String>,
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Objects on this page.
    pub objects: Vec<ListedObject>,
    /// Present when more pages follow.
    pub next_continuation_token: Option<String>,
}

/// Bucket operations required by the sync engine.
///
/// An `Err` is the backend reporting a non-success status; callers treat
/// every error as fatal.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetches one page of the bucket listing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::List`] if the request fails.
    async fn list_objects(&self, request: ListRequest<'_>) -> Result<ListPage, StorageError>;

    /// Writes `body` to `key` with the given content type.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Put`] if the request fails.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Removes every key in `keys`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Delete`] if the request fails or the backend
    /// reports any key as not deleted.
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), StorageError>;
}
