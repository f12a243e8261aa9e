//! [`ObjectStore`] over the AWS S3 SDK.
//!
//! Works against AWS S3 and any S3-compatible service (Cloudflare R2,
//! `MinIO`, ...).
//!
//! # Environment Variables
//!
//! | Variable | Description |
//! |---|---|
//! | `CLOUDFLARE_ACCOUNT_ID` | When set, targets Cloudflare R2 (builds the R2 endpoint) |
//! | `R2_ACCESS_KEY_ID` | S3-compatible access key for R2 (required with the above) |
//! | `R2_SECRET_ACCESS_KEY` | S3-compatible secret key for R2 (required with the above) |
//!
//! Without `CLOUDFLARE_ACCOUNT_ID` the standard AWS provider chain is used
//! (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_PROFILE`,
//! `AWS_REGION`, `AWS_ENDPOINT_URL`, ...).

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::{Credentials, StalledStreamProtectionConfig};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};

use crate::error::{StorageError, SyncError};
use crate::store::{ListPage, ListRequest, ListedObject, ObjectStore};

/// Maximum number of keys S3 accepts in one `DeleteObjects` request.
const MAX_DELETE_BATCH: usize = 1000;

/// Overrides applied on top of the environment-derived client config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct S3Options {
    /// Custom endpoint URL. Enables path-style addressing.
    pub endpoint: Option<String>,
    /// Region name.
    pub region: Option<String>,
}

/// S3-backed [`ObjectStore`].
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    /// Wraps an already configured SDK client.
    #[must_use]
    pub const fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    /// Creates a client from environment variables, then applies `options`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if `CLOUDFLARE_ACCOUNT_ID` is set but
    /// the R2 key pair is incomplete.
    pub async fn from_env(options: &S3Options) -> Result<Self, SyncError> {
        let mut builder = if let Ok(account_id) = std::env::var("CLOUDFLARE_ACCOUNT_ID") {
            let access_key = require_env("R2_ACCESS_KEY_ID")?;
            let secret_key = require_env("R2_SECRET_ACCESS_KEY")?;
            log::debug!("Using Cloudflare R2 account {account_id}");

            let creds = Credentials::new(&access_key, &secret_key, None, None, "r2-env");
            aws_sdk_s3::Config::builder()
                .endpoint_url(r2_endpoint(&account_id))
                .region(Region::new("auto"))
                .credentials_provider(creds)
                .force_path_style(true)
                .stalled_stream_protection(StalledStreamProtectionConfig::disabled())
        } else {
            let shared = aws_config::defaults(BehaviorVersion::latest()).load().await;
            aws_sdk_s3::config::Builder::from(&shared)
        };

        if let Some(endpoint) = &options.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        if let Some(region) = &options.region {
            builder = builder.region(Region::new(region.clone()));
        }

        Ok(Self::new(aws_sdk_s3::Client::from_conf(builder.build())))
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3Store {
    async fn list_objects(&self, request: ListRequest<'_>) -> Result<ListPage, StorageError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(request.bucket)
            .set_prefix(request.prefix.map(str::to_string))
            .set_delimiter(request.delimiter.map(str::to_string))
            .set_continuation_token(request.continuation_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| StorageError::List {
                bucket: request.bucket.to_string(),
                prefix: request.prefix.unwrap_or_default().to_string(),
                source: Box::new(e),
            })?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|obj| {
                obj.key().map(|key| ListedObject {
                    key: key.to_string(),
                    etag: obj.e_tag().map(str::to_string),
                })
            })
            .collect();

        Ok(ListPage {
            objects,
            next_continuation_token: output.next_continuation_token().map(str::to_string),
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Put {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: Box::new(e),
            })?;

        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), StorageError> {
        for batch in keys.chunks(MAX_DELETE_BATCH) {
            let delete_error = |source: Box<dyn std::error::Error + Send + Sync>| {
                StorageError::Delete {
                    bucket: bucket.to_string(),
                    count: batch.len(),
                    source,
                }
            };

            let objects = batch
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| delete_error(Box::new(e)))?;
            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| delete_error(Box::new(e)))?;

            let output = self
                .client
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| delete_error(Box::new(e)))?;

            // DeleteObjects answers 200 even when individual keys fail.
            if let Some(failed) = output.errors().first() {
                return Err(delete_error(
                    format!(
                        "{} key(s) not deleted, first: {} ({})",
                        output.errors().len(),
                        failed.key().unwrap_or("<unknown>"),
                        failed.message().or(failed.code()).unwrap_or("unknown error"),
                    )
                    .into(),
                ));
            }
        }

        Ok(())
    }
}

/// R2's S3-compatible endpoint for an account.
fn r2_endpoint(account_id: &str) -> String {
    format!("https://{account_id}.r2.cloudflarestorage.com")
}

/// Reads a required environment variable.
fn require_env(name: &str) -> Result<String, SyncError> {
    std::env::var(name).map_err(|_| SyncError::Config {
        message: format!("Missing environment variable: {name}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_r2_endpoint() {
        assert_eq!(
            r2_endpoint("abc123"),
            "https://abc123.r2.cloudflarestorage.com"
        );
    }
}
