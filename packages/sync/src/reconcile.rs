//! Top-level sync orchestration.
//!
//! A sync runs strictly in sequence: list the remote inventory, hash and
//! classify local files, upload, then (optionally) delete. The first
//! failure at any step aborts the run. Uploads already performed stay in
//! place; nothing is rolled back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bucket_sync_models::{LocalFileEntry, SyncConfig, SyncReport};

use crate::diff::compute_upload_set;
use crate::error::SyncError;
use crate::inventory::list_inventory;
use crate::mime::content_type_for;
use crate::progress::{ProgressCallback, null_progress};
use crate::store::ObjectStore;

/// Progress sinks for the two per-file phases of a sync.
#[derive(Clone)]
pub struct SyncProgress {
    /// Advanced once per local file classified.
    pub hashing: Arc<dyn ProgressCallback>,
    /// Advanced once per file uploaded.
    pub uploading: Arc<dyn ProgressCallback>,
}

impl Default for SyncProgress {
    fn default() -> Self {
        Self {
            hashing: null_progress(),
            uploading: null_progress(),
        }
    }
}

/// Runs syncs against an injected [`ObjectStore`].
pub struct Reconciler {
    store: Arc<dyn ObjectStore>,
    progress: SyncProgress,
}

impl Reconciler {
    /// Creates a reconciler that reports no progress.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            progress: SyncProgress::default(),
        }
    }

    /// Replaces the progress sinks.
    #[must_use]
    pub fn with_progress(mut self, progress: SyncProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Synchronizes `config.root` into `config.bucket`.
    ///
    /// In dry-run mode every step up to the mutating requests runs normally
    /// (listing, hashing, diffing) so the returned report is an accurate
    /// prediction; only `PutObject` and `DeleteObjects` are withheld.
    ///
    /// # Errors
    ///
    /// * [`SyncError::Config`] if the root or bucket is missing.
    /// * [`SyncError::NotFound`] if the resolved root is not a directory.
    /// * [`SyncError::Storage`] on the first failed list, put, or delete.
    /// * [`SyncError::Io`] if the root cannot be inspected or a local file
    ///   cannot be read.
    /// * [`SyncError::KeyCollision`] if two local files map to one key.
    pub async fn sync(&self, config: &SyncConfig) -> Result<SyncReport, SyncError> {
        let (root, bucket) = validate(config)?;
        let root = resolve_root(root, std::env::current_dir)?;
        ensure_dir(&root).await?;

        let prefix = non_empty(config.prefix.as_deref());
        let delimiter = non_empty(config.delimiter.as_deref());

        let inventory = Arc::new(
            list_inventory(self.store.as_ref(), bucket, prefix, delimiter).await?,
        );

        let actions = {
            let task_root = root.clone();
            let inventory = Arc::clone(&inventory);
            let prefix = prefix.map(str::to_string);
            let force = config.force;
            let progress = Arc::clone(&self.progress.hashing);
            tokio::task::spawn_blocking(move || {
                compute_upload_set(
                    &task_root,
                    &inventory,
                    prefix.as_deref(),
                    force,
                    progress.as_ref(),
                )
            })
            .await
            .map_err(|e| SyncError::io(&root, std::io::Error::other(e)))??
        };
        log::info!(
            "{} file(s) to upload, {} unchanged",
            actions.uploads().len(),
            actions.skipped().len()
        );

        let uploaded = self
            .upload_all(bucket, actions.uploads(), config.dry_run)
            .await?;

        let deleted = if config.delete {
            let deletions = inventory.deletion_set(actions.retained_keys());
            self.delete_all(bucket, deletions, config.dry_run).await?
        } else {
            Vec::new()
        };

        Ok(SyncReport {
            uploaded,
            skipped: actions.skipped().len() as u64,
            deleted,
            dry_run: config.dry_run,
        })
    }

    /// Uploads each entry in order, stopping at the first failure.
    async fn upload_all(
        &self,
        bucket: &str,
        uploads: &[LocalFileEntry],
        dry_run: bool,
    ) -> Result<Vec<String>, SyncError> {
        let progress = &self.progress.uploading;
        progress.set_total(uploads.len() as u64);

        let mut uploaded = Vec::with_capacity(uploads.len());
        for entry in uploads {
            let content_type = content_type_for(&entry.path);
            progress.set_message(entry.key.clone());

            if dry_run {
                log::info!(
                    "(dry run) would upload {} -> s3://{bucket}/{} ({content_type})",
                    entry.path.display(),
                    entry.key
                );
            } else {
                let data = tokio::fs::read(&entry.path)
                    .await
                    .map_err(|e| SyncError::io(&entry.path, e))?;
                #[allow(clippy::cast_precision_loss)] // display-only KB value
                let kb = data.len() as f64 / 1024.0;
                log::info!(
                    "Uploading {} -> s3://{bucket}/{} ({kb:.1} KB, {content_type})",
                    entry.path.display(),
                    entry.key
                );
                self.store
                    .put_object(bucket, &entry.key, data, content_type)
                    .await?;
            }

            uploaded.push(entry.key.clone());
            progress.inc(1);
        }

        let verb = if dry_run { "would upload" } else { "uploaded" };
        progress.finish(format!("{verb} {} file(s)", uploaded.len()));
        Ok(uploaded)
    }

    /// Deletes `keys` in a single batch request. No request is made when
    /// `keys` is empty.
    async fn delete_all(
        &self,
        bucket: &str,
        keys: Vec<String>,
        dry_run: bool,
    ) -> Result<Vec<String>, SyncError> {
        if keys.is_empty() {
            return Ok(keys);
        }

        if dry_run {
            for key in &keys {
                log::info!("(dry run) would delete s3://{bucket}/{key}");
            }
        } else {
            for key in &keys {
                log::info!("Deleting s3://{bucket}/{key}");
            }
            self.store.delete_objects(bucket, &keys).await?;
        }

        Ok(keys)
    }
}

/// Returns the root and bucket, or a config error naming the missing one.
fn validate(config: &SyncConfig) -> Result<(&Path, &str), SyncError> {
    let root = config
        .root
        .as_deref()
        .filter(|root| !root.as_os_str().is_empty())
        .ok_or_else(|| SyncError::Config {
            message: "root directory is required".to_string(),
        })?;
    let bucket = non_empty(config.bucket.as_deref()).ok_or_else(|| SyncError::Config {
        message: "bucket is required".to_string(),
    })?;
    Ok((root, bucket))
}

/// Joins a relative `root` onto the working directory returned by `cwd`.
/// Absolute roots are returned as is and `cwd` is not called.
///
/// # Errors
///
/// Returns [`SyncError::Io`] if the working directory cannot be determined.
pub fn resolve_root(
    root: &Path,
    cwd: impl FnOnce() -> std::io::Result<PathBuf>,
) -> Result<PathBuf, SyncError> {
    if root.is_absolute() {
        return Ok(root.to_path_buf());
    }
    let cwd = cwd().map_err(|e| SyncError::io(root, e))?;
    Ok(cwd.join(root))
}

/// Missing paths and non-directories are `NotFound`; any other failure to
/// stat the root is an I/O error.
async fn ensure_dir(root: &Path) -> Result<(), SyncError> {
    match tokio::fs::metadata(root).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(SyncError::NotFound {
            path: root.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(SyncError::NotFound {
            path: root.to_path_buf(),
        }),
        Err(e) => Err(SyncError::io(root, e)),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
