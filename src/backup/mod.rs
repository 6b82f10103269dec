//! Backup executable contract
//!
//! A backup pod runs a one-shot process that snapshots an etcd member and
//! uploads the snapshot to object storage. The operator generates the
//! process arguments ([`BackupArgs`]), so both sides share these types.
//!
//! The etcd snapshot client and the storage clients sit behind
//! [`SnapshotSource`] and [`Uploader`]; [`run_backup`] only orchestrates.

mod args;
mod uploader;
mod url;

use std::time::Duration;

use tracing::info;

pub use args::{BackupArgs, StorageCredentials};
pub use uploader::{SnapshotSource, UnimplementedUploader, Uploader, Uploaders};
pub use url::BackupUrl;

use crate::{Error, Result};

/// File name of the snapshot inside `--backup-tmp-dir`
pub const SNAPSHOT_FILE_NAME: &str = "snapshot.db";

/// Snapshot etcd and upload the result, bounded by `--timeout-seconds`.
///
/// The destination is validated before etcd is contacted, so a bad URL never
/// costs a snapshot. Returns the uploaded size in bytes.
pub async fn run_backup(
    args: &BackupArgs,
    snapshot: &dyn SnapshotSource,
    uploaders: &Uploaders,
) -> Result<u64> {
    let destination = BackupUrl::parse(&args.backup_url)?;
    let uploader = uploaders.for_storage(destination.storage);
    let local_path = args.backup_tmp_dir.join(SNAPSHOT_FILE_NAME);
    let dial_timeout = Duration::from_secs(args.dial_timeout_seconds);

    let sequence = async {
        info!(etcd_url = %args.etcd_url, path = %local_path.display(), "Saving etcd snapshot");
        snapshot
            .save(&args.etcd_url, dial_timeout, &local_path)
            .await?;

        info!(destination = %destination, "Uploading snapshot");
        let size = uploader.upload(&destination, &local_path).await?;
        info!(destination = %destination, upload_size = size, "Backup complete");
        Ok::<_, Error>(size)
    };

    tokio::time::timeout(Duration::from_secs(args.timeout_seconds), sequence)
        .await
        .map_err(|_| Error::Timeout(args.timeout_seconds))?
}
