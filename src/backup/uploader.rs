//! Seams to etcd and object storage used by the backup executable

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::url::BackupUrl;
use crate::crd::StorageType;
use crate::{Error, Result};

/// Writes a consistent etcd snapshot to a local file
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Snapshot the member at `endpoint` into `local_path`
    async fn save(&self, endpoint: &str, dial_timeout: Duration, local_path: &Path)
        -> Result<()>;
}

/// Ships a local snapshot file to object storage
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Upload `local_path` to `destination`, returning the bytes written
    async fn upload(&self, destination: &BackupUrl, local_path: &Path) -> Result<u64>;
}

/// Uploader for a backend that has no client yet
pub struct UnimplementedUploader {
    storage: StorageType,
}

impl UnimplementedUploader {
    /// Uploader that rejects every upload to `storage`
    pub fn new(storage: StorageType) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl Uploader for UnimplementedUploader {
    async fn upload(&self, _destination: &BackupUrl, _local_path: &Path) -> Result<u64> {
        Err(Error::unsupported_storage(format!(
            "no uploader for {} storage",
            self.storage
        )))
    }
}

/// One uploader per storage backend
#[derive(Clone)]
pub struct Uploaders {
    /// S3-compatible storage
    pub s3: Arc<dyn Uploader>,
    /// Alibaba Cloud OSS
    pub oss: Arc<dyn Uploader>,
}

impl Uploaders {
    /// Uploaders with the given S3 client; OSS uploads are rejected
    pub fn new(s3: Arc<dyn Uploader>) -> Self {
        Self {
            s3,
            oss: Arc::new(UnimplementedUploader::new(StorageType::Oss)),
        }
    }

    /// Replace the OSS uploader
    pub fn with_oss(mut self, oss: Arc<dyn Uploader>) -> Self {
        self.oss = oss;
        self
    }

    /// Uploader responsible for `storage`
    pub fn for_storage(&self, storage: StorageType) -> &dyn Uploader {
        match storage {
            StorageType::S3 => self.s3.as_ref(),
            StorageType::Oss => self.oss.as_ref(),
        }
    }
}
