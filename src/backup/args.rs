//! Command-line arguments of the backup executable

use std::path::PathBuf;

use clap::Parser;

/// Arguments of the one-shot backup process run inside a backup pod
#[derive(Parser, Debug, Clone)]
#[command(name = "etcd-backup", version, about = "Snapshot an etcd cluster to object storage")]
pub struct BackupArgs {
    /// Directory the snapshot is written to before upload
    #[arg(long, default_value_os_t = std::env::temp_dir())]
    pub backup_tmp_dir: PathBuf,

    /// Client URL of the etcd member to snapshot
    #[arg(long)]
    pub etcd_url: String,

    /// Destination, `<storageType>://<bucket>/<object>`
    #[arg(long)]
    pub backup_url: String,

    /// Timeout for dialing etcd
    #[arg(long, default_value_t = 5)]
    pub dial_timeout_seconds: u64,

    /// Deadline for the whole snapshot-and-upload sequence
    #[arg(long, default_value_t = 60)]
    pub timeout_seconds: u64,

    /// Object storage endpoint
    #[arg(long, env = "ENDPOINT", default_value = "")]
    pub endpoint: String,

    /// Object storage access key
    #[arg(long, env = "MINIO_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,

    /// Object storage secret key
    #[arg(long, env = "MINIO_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,
}

impl BackupArgs {
    /// Credentials for the object storage client
    pub fn credentials(&self) -> StorageCredentials {
        StorageCredentials {
            endpoint: self.endpoint.clone(),
            access_key: self.access_key.clone().unwrap_or_default(),
            secret_key: self.secret_key.clone().unwrap_or_default(),
        }
    }
}

/// Connection settings for an object storage backend
#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    /// Endpoint host (and port)
    pub endpoint: String,
    /// Access key id
    pub access_key: String,
    /// Secret access key
    pub secret_key: String,
}

impl std::fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}
