#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Content-hash based directory-to-bucket sync.
//!
//! Uploads only the local files whose content differs from the remote copy
//! and, optionally, deletes remote objects that no longer exist locally.
//!
//! ## Smart sync
//!
//! Change detection compares the **MD5 digest** of each local file against
//! the remote object's `ETag` (case-insensitively, quotes stripped) rather
//! than modification times or sizes. Pass `force` to upload everything.
//!
//! ## Flow
//!
//! 1. [`inventory::list_inventory`] pages through the bucket listing.
//! 2. [`diff::compute_upload_set`] walks the local tree and classifies each
//!    file as "upload" or "skip".
//! 3. [`reconcile::Reconciler`] uploads, then deletes orphaned keys when
//!    asked to, aborting on the first failure.
//!
//! The backend is injected as an [`store::ObjectStore`];
//! [`s3::S3Store`] is the production implementation.

pub mod diff;
pub mod error;
pub mod hash;
pub mod inventory;
pub mod mime;
pub mod progress;
pub mod reconcile;
pub mod s3;
pub mod store;

#[cfg(test)]
mod testing;

pub use bucket_sync_models as models;
pub use error::{StorageError, SyncError};
pub use reconcile::{Reconciler, SyncProgress};
pub use store::ObjectStore;
