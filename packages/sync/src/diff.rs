//! Local tree walking and upload/skip classification.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use bucket_sync_models::{ActionSet, LocalFileEntry, RemoteInventory};
use walkdir::WalkDir;

use crate::error::SyncError;
use crate::hash::hash_file;
use crate::progress::ProgressCallback;

/// Builds the remote key for `relative`: `prefix` followed by the path's
/// components joined with `/`.
///
/// Backslashes are rewritten to `/` as well, so a key never contains one no
/// matter which separator the host uses or what the prefix holds.
#[must_use]
pub fn derive_key(prefix: &str, relative: &Path) -> String {
    let path = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");

    format!("{prefix}{path}").replace('\\', "/")
}

/// Lists every regular file under `root` with its remote key, in a stable
/// (file-name sorted) order.
///
/// Symlinks are not followed. Directories produce no entries of their own.
///
/// # Errors
///
/// * [`SyncError::Io`] if any directory under `root` cannot be read.
/// * [`SyncError::KeyCollision`] if two files derive the same key, e.g.
///   `odd\name.txt` next to `odd/name.txt` on a host that allows
///   backslashes in file names.
pub fn collect_local_files(root: &Path, prefix: &str) -> Result<Vec<LocalFileEntry>, SyncError> {
    let mut entries = Vec::new();
    let mut seen: BTreeMap<String, PathBuf> = BTreeMap::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            SyncError::io(path, e.into())
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or_else(|_| entry.path());
        let key = derive_key(prefix, relative);
        if let Some(first) = seen.get(&key) {
            log::warn!(
                "{} and {} both map to key {key}",
                first.display(),
                entry.path().display()
            );
            return Err(SyncError::KeyCollision {
                key,
                first: first.clone(),
                second: entry.into_path(),
            });
        }
        seen.insert(key.clone(), entry.path().to_path_buf());
        entries.push(LocalFileEntry {
            key,
            path: entry.into_path(),
        });
    }

    Ok(entries)
}

/// Classifies every local file under `root` as "upload" or "skip".
///
/// A file is uploaded when `force` is set, when its key is absent from
/// `inventory`, or when its digest differs (case-insensitively) from the
/// remote one. A file is hashed only when `force` is off and its key exists
/// remotely.
///
/// Hashing is blocking I/O.
///
/// # Errors
///
/// * [`SyncError::Io`] if the tree cannot be walked or a file cannot be
///   hashed.
/// * [`SyncError::KeyCollision`] if two files derive the same key.
pub fn compute_upload_set(
    root: &Path,
    inventory: &RemoteInventory,
    prefix: Option<&str>,
    force: bool,
    progress: &dyn ProgressCallback,
) -> Result<ActionSet, SyncError> {
    let files = collect_local_files(root, prefix.unwrap_or_default())?;
    progress.set_total(files.len() as u64);

    let mut actions = ActionSet::new();
    for entry in files {
        progress.set_message(entry.key.clone());

        if force {
            actions.push_upload(entry);
        } else if let Some(remote) = inventory.get(&entry.key) {
            let local = hash_file(&entry.path).map_err(|e| SyncError::io(&entry.path, e))?;
            if local.matches(remote) {
                log::debug!("  {}: unchanged", entry.key);
                actions.push_skip(entry);
            } else {
                log::debug!("  {}: changed ({remote} -> {local})", entry.key);
                actions.push_upload(entry);
            }
        } else {
            log::debug!("  {}: new", entry.key);
            actions.push_upload(entry);
        }

        progress.inc(1);
    }

    progress.finish_and_clear();
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::fs;

    use bucket_sync_models::Digest;
    use tempfile::TempDir;

    use super::*;
    use crate::hash::hash_reader;
    use crate::progress::NullProgress;

    fn tree(files: &[(&str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        dir
    }

    fn digest(content: &str) -> Digest {
        hash_reader(content.as_bytes()).unwrap()
    }

    fn upload_keys(actions: &ActionSet) -> Vec<&str> {
        actions.uploads().iter().map(|e| e.key.as_str()).collect()
    }

    fn skip_keys(actions: &ActionSet) -> Vec<&str> {
        actions.skipped().iter().map(|e| e.key.as_str()).collect()
    }

    #[test]
    fn derives_prefixed_key_with_forward_slashes() {
        let relative = Path::new("sub").join("dir").join("file.txt");
        assert_eq!(derive_key("pfx/", &relative), "pfx/sub/dir/file.txt");
    }

    #[test]
    fn derives_key_without_prefix() {
        assert_eq!(derive_key("", Path::new("a.txt")), "a.txt");
    }

    #[test]
    fn derived_keys_never_contain_backslashes() {
        let key = derive_key("pfx\\", Path::new("sub/odd\\name.txt"));
        assert_eq!(key, "pfx/sub/odd/name.txt");
    }

    #[test]
    fn collects_nested_files_in_stable_order() {
        let dir = tree(&[("b.txt", "b"), ("a/z.txt", "z"), ("a/y/x.txt", "x")]);
        fs::create_dir_all(dir.path().join("empty")).unwrap();

        let entries = collect_local_files(dir.path(), "pfx/").unwrap();
        let keys: Vec<_> = entries.iter().map(|e| e.key.as_str()).collect();

        assert_eq!(keys, vec!["pfx/a/y/x.txt", "pfx/a/z.txt", "pfx/b.txt"]);
        assert_eq!(entries[2].path, dir.path().join("b.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn backslash_name_colliding_with_nested_file_is_rejected() {
        let dir = tree(&[("odd\\name.txt", "flat"), ("odd/name.txt", "nested")]);

        let err = collect_local_files(dir.path(), "").unwrap_err();

        assert!(matches!(
            err,
            SyncError::KeyCollision { ref key, ref first, ref second }
                if key == "odd/name.txt"
                    && first == &dir.path().join("odd").join("name.txt")
                    && second == &dir.path().join("odd\\name.txt")
        ));
    }

    #[cfg(unix)]
    #[test]
    fn colliding_keys_abort_classification() {
        let dir = tree(&[("odd\\name.txt", "flat"), ("odd/name.txt", "nested")]);

        let err =
            compute_upload_set(dir.path(), &RemoteInventory::new(), None, false, &NullProgress)
                .unwrap_err();

        assert!(matches!(err, SyncError::KeyCollision { .. }));
    }

    #[test]
    fn empty_root_yields_empty_set() {
        let dir = tempfile::tempdir().unwrap();

        let actions =
            compute_upload_set(dir.path(), &RemoteInventory::new(), None, false, &NullProgress)
                .unwrap();

        assert!(actions.uploads().is_empty());
        assert!(actions.skipped().is_empty());
    }

    #[test]
    fn classifies_new_changed_and_unchanged() {
        let dir = tree(&[("new.txt", "n"), ("changed.txt", "c2"), ("same.txt", "s")]);
        let inventory: RemoteInventory = [
            ("changed.txt", digest("c1")),
            ("same.txt", digest("s")),
        ]
        .into_iter()
        .collect();

        let actions =
            compute_upload_set(dir.path(), &inventory, None, false, &NullProgress).unwrap();

        assert_eq!(upload_keys(&actions), vec!["changed.txt", "new.txt"]);
        assert_eq!(skip_keys(&actions), vec!["same.txt"]);
    }

    #[test]
    fn digest_comparison_ignores_case() {
        let dir = tree(&[("a.txt", "X")]);
        let lower = Digest::new(digest("X").as_str().to_ascii_lowercase());
        let inventory: RemoteInventory = [("a.txt", lower)].into_iter().collect();

        let actions =
            compute_upload_set(dir.path(), &inventory, None, false, &NullProgress).unwrap();

        assert!(actions.uploads().is_empty());
        assert_eq!(skip_keys(&actions), vec!["a.txt"]);
    }

    #[test]
    fn prefix_applies_to_inventory_lookup() {
        let dir = tree(&[("a.txt", "X")]);
        let inventory: RemoteInventory = [("site/a.txt", digest("X"))].into_iter().collect();

        let unprefixed =
            compute_upload_set(dir.path(), &inventory, None, false, &NullProgress).unwrap();
        let prefixed =
            compute_upload_set(dir.path(), &inventory, Some("site/"), false, &NullProgress)
                .unwrap();

        assert_eq!(upload_keys(&unprefixed), vec!["a.txt"]);
        assert_eq!(skip_keys(&prefixed), vec!["site/a.txt"]);
    }

    #[test]
    fn force_uploads_everything() {
        let dir = tree(&[("a.txt", "X"), ("b.txt", "Y")]);
        let inventory: RemoteInventory = [("a.txt", digest("X")), ("b.txt", digest("Y"))]
            .into_iter()
            .collect();

        let actions =
            compute_upload_set(dir.path(), &inventory, None, true, &NullProgress).unwrap();

        assert_eq!(upload_keys(&actions), vec!["a.txt", "b.txt"]);
        assert!(actions.skipped().is_empty());
    }

    #[test]
    fn every_file_is_either_uploaded_or_skipped() {
        let dir = tree(&[
            ("a.txt", "1"),
            ("b/c.txt", "2"),
            ("b/d.txt", "3"),
            ("e.bin", "4"),
        ]);
        let inventory: RemoteInventory = [
            ("a.txt", digest("1")),
            ("b/c.txt", digest("changed")),
            ("e.bin", digest("4")),
            ("gone.txt", digest("5")),
        ]
        .into_iter()
        .collect();

        let actions =
            compute_upload_set(dir.path(), &inventory, None, false, &NullProgress).unwrap();

        let uploads: BTreeSet<_> = upload_keys(&actions).into_iter().collect();
        let skips: BTreeSet<_> = skip_keys(&actions).into_iter().collect();
        assert!(uploads.is_disjoint(&skips));

        let all: BTreeSet<_> = uploads.union(&skips).copied().collect();
        assert_eq!(
            all,
            BTreeSet::from(["a.txt", "b/c.txt", "b/d.txt", "e.bin"])
        );
        for key in &skips {
            let local = digest(&fs::read_to_string(dir.path().join(key)).unwrap());
            assert!(inventory.get(key).unwrap().matches(&local));
        }
    }
}
