#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for syncing a local directory to an S3-compatible bucket.
//!
//! Credentials and endpoint come from the environment (see
//! [`bucket_sync::s3`]); `--endpoint` and `--region` override them.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use bucket_sync::models::SyncConfig;
use bucket_sync::s3::{S3Options, S3Store};
use bucket_sync::{Reconciler, SyncError, SyncProgress};
use bucket_sync_cli_utils::{IndicatifProgress, MultiProgress};
use clap::Parser;

/// Upload changed files from a local directory to a bucket.
#[derive(Parser)]
#[command(name = "bucket_sync", about = "Sync a local directory to an S3-compatible bucket")]
struct Cli {
    /// Local directory to sync (relative paths resolve against the
    /// current directory).
    root: PathBuf,

    /// Target bucket name.
    bucket: String,

    /// Delete remote objects that no longer exist locally.
    #[arg(short, long)]
    delete: bool,

    /// Report what would be uploaded and deleted without changing the bucket.
    #[arg(long)]
    dry_run: bool,

    /// Upload every file, even if the remote copy is unchanged.
    #[arg(short, long)]
    force: bool,

    /// Key prefix prepended to every uploaded path (e.g. "site/").
    #[arg(long)]
    prefix: Option<String>,

    /// Delimiter used when listing the bucket.
    #[arg(long)]
    delimiter: Option<String>,

    /// Custom S3-compatible endpoint URL.
    #[arg(long)]
    endpoint: Option<String>,

    /// Bucket region.
    #[arg(long)]
    region: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let multi = bucket_sync_cli_utils::init_logger();
    let cli = Cli::parse();

    match run(cli, &multi).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            multi.suspend(|| eprintln!("error: {e}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, multi: &MultiProgress) -> Result<(), SyncError> {
    let store = S3Store::from_env(&S3Options {
        endpoint: cli.endpoint,
        region: cli.region,
    })
    .await?;

    let config = SyncConfig {
        root: Some(cli.root),
        bucket: Some(cli.bucket),
        prefix: cli.prefix,
        delimiter: cli.delimiter,
        delete: cli.delete,
        dry_run: cli.dry_run,
        force: cli.force,
    };

    let reconciler = Reconciler::new(Arc::new(store)).with_progress(SyncProgress {
        hashing: IndicatifProgress::phase_bar(multi, "Hashing"),
        uploading: IndicatifProgress::phase_bar(multi, "Uploading"),
    });

    let start = Instant::now();
    let report = reconciler.sync(&config).await?;

    log::info!("Sync complete in {:.1}s", start.elapsed().as_secs_f64());
    multi.suspend(|| println!("{report}"));

    Ok(())
}
