#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Data types shared by the bucket sync engine.
//!
//! Everything here is plain data with no I/O: the remote key-to-digest
//! snapshot ([`RemoteInventory`]), the local files discovered under the
//! sync root ([`LocalFileEntry`]), the upload/skip classification
//! ([`ActionSet`]), and the inputs ([`SyncConfig`]) and outputs
//! ([`SyncReport`]) of a single sync run.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// Hex-encoded content hash used as a content-identity proxy.
///
/// Local digests are produced uppercase; remote digests keep whatever case
/// the backend reports. Comparisons between the two are ASCII
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(String);

impl Digest {
    /// Wraps an already hex-encoded digest.
    #[must_use]
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Builds a digest from a backend `ETag`, stripping the surrounding
    /// quote characters S3-compatible stores wrap it in.
    #[must_use]
    pub fn from_etag(etag: &str) -> Self {
        Self(etag.trim_matches('"').to_string())
    }

    /// Returns the hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether two digests identify the same content, ignoring hex case.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of the remote bucket (or a prefix/delimiter-scoped subset of it)
/// taken at the start of a sync: remote key to remote digest.
///
/// Keys are unique. If the backend ever lists the same key twice, the last
/// listing wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteInventory {
    objects: BTreeMap<String, Digest>,
}

impl RemoteInventory {
    /// Creates an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a listed object, replacing any earlier listing of the same key.
    pub fn insert(&mut self, key: impl Into<String>, digest: Digest) {
        self.objects.insert(key.into(), digest);
    }

    /// Looks up the remote digest for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Digest> {
        self.objects.get(key)
    }

    /// Iterates over all remote keys in lexicographic order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    /// Number of remote objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the inventory holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Remote keys with no corresponding local file: every inventory key
    /// that is not in `retained`, in lexicographic order.
    #[must_use]
    pub fn deletion_set(&self, retained: &BTreeSet<String>) -> Vec<String> {
        self.objects
            .keys()
            .filter(|key| !retained.contains(*key))
            .cloned()
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, Digest)> for RemoteInventory {
    fn from_iter<I: IntoIterator<Item = (K, Digest)>>(iter: I) -> Self {
        let mut inventory = Self::new();
        for (key, digest) in iter {
            inventory.insert(key, digest);
        }
        inventory
    }
}

/// A regular file found under the sync root and the remote key it maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileEntry {
    /// Absolute path of the local file.
    pub path: PathBuf,
    /// `prefix + relative path`, `/`-separated.
    pub key: String,
}

/// Classification of every discovered local file as "upload" or "skip".
///
/// The two collections are disjoint and together cover every local file.
/// [`ActionSet::retained_keys`] holds the keys of both, since all of them
/// will exist remotely once the sync completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSet {
    uploads: Vec<LocalFileEntry>,
    skipped: Vec<LocalFileEntry>,
    retained: BTreeSet<String>,
}

impl ActionSet {
    /// Creates an empty action set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `entry` as needing transfer.
    pub fn push_upload(&mut self, entry: LocalFileEntry) {
        self.retained.insert(entry.key.clone());
        self.uploads.push(entry);
    }

    /// Marks `entry` as already in sync.
    pub fn push_skip(&mut self, entry: LocalFileEntry) {
        self.retained.insert(entry.key.clone());
        self.skipped.push(entry);
    }

    /// Files to transfer, in traversal order.
    #[must_use]
    pub fn uploads(&self) -> &[LocalFileEntry] {
        &self.uploads
    }

    /// Files whose remote copy already matches.
    #[must_use]
    pub fn skipped(&self) -> &[LocalFileEntry] {
        &self.skipped
    }

    /// Keys that will correspond to a local file after the sync.
    #[must_use]
    pub const fn retained_keys(&self) -> &BTreeSet<String> {
        &self.retained
    }
}

/// Inputs of a single sync run.
///
/// `root` and `bucket` are mandatory; they are optional here only so that a
/// missing value can be reported as a configuration error instead of being
/// impossible to represent. Empty strings count as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncConfig {
    /// Local directory to sync; relative paths resolve against the current
    /// working directory.
    pub root: Option<PathBuf>,
    /// Target bucket name.
    pub bucket: Option<String>,
    /// Prepended verbatim to every relative path to form a key. Also scopes
    /// the remote listing.
    pub prefix: Option<String>,
    /// Listing delimiter (e.g. `/`), passed through to the backend.
    pub delimiter: Option<String>,
    /// Delete remote objects that have no local counterpart.
    pub delete: bool,
    /// Compute and report every action but issue no mutating request.
    pub dry_run: bool,
    /// Upload every local file regardless of remote digests.
    pub force: bool,
}

impl SyncConfig {
    /// Creates a config with the two mandatory fields set and every flag off.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            root: Some(root.into()),
            bucket: Some(bucket.into()),
            ..Self::default()
        }
    }
}

/// Outcome of a completed sync run.
///
/// In dry-run mode the key lists describe what *would* have been uploaded
/// and deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Keys uploaded, in upload order.
    pub uploaded: Vec<String>,
    /// Number of local files skipped because the remote copy matched.
    pub skipped: u64,
    /// Keys deleted from the bucket.
    pub deleted: Vec<String>,
    /// Whether this run was a dry run.
    pub dry_run: bool,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            f.write_str("dry run: ")?;
        }
        write!(
            f,
            "{} uploaded, {} skipped (unchanged), {} deleted",
            self.uploaded.len(),
            self.skipped,
            self.deleted.len()
        )
    }
}
