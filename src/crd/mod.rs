//! Custom Resource Definitions for the etcd operator
//!
//! Both resources live in the `etcd.ydzs.io/v1alpha1` API group.

mod backup;
mod cluster;
mod types;

pub use backup::{EtcdBackup, EtcdBackupSpec, EtcdBackupStatus};
pub use cluster::{EtcdCluster, EtcdClusterSpec, DEFAULT_CLUSTER_SIZE};
pub use types::{BackupPhase, BackupSource, StorageType};
