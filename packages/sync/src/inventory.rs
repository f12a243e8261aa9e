//! Remote inventory building.

use bucket_sync_models::{Digest, RemoteInventory};

use crate::error::StorageError;
use crate::store::{ListRequest, ObjectStore};

/// Lists `bucket` page by page and collects a key-to-digest snapshot.
///
/// Each request carries the continuation token of the previous response;
/// listing stops as soon as a response carries none. `ETag` quotes are
/// stripped. Objects without an `ETag` get an empty digest, which never
/// matches a local one.
///
/// # Errors
///
/// Returns the first [`StorageError`] from any page. No partial inventory is
/// returned.
pub async fn list_inventory(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: Option<&str>,
    delimiter: Option<&str>,
) -> Result<RemoteInventory, StorageError> {
    log::info!("Listing s3://{bucket}/{}*", prefix.unwrap_or_default());

    let mut inventory = RemoteInventory::new();
    let mut continuation_token: Option<String> = None;
    let mut pages = 0u64;

    loop {
        let page = store
            .list_objects(ListRequest {
                bucket,
                prefix,
                delimiter,
                continuation_token: continuation_token.as_deref(),
            })
            .await?;
        pages += 1;
        log::debug!("  page {pages}: {} object(s)", page.objects.len());

        for object in page.objects {
            let digest = object
                .etag
                .as_deref()
                .map_or_else(|| Digest::new(""), Digest::from_etag);
            inventory.insert(object.key, digest);
        }

        match page.next_continuation_token {
            Some(token) => continuation_token = Some(token),
            None => break,
        }
    }

    log::info!(
        "  found {} object(s) across {pages} page(s)",
        inventory.len()
    );
    Ok(inventory)
}
