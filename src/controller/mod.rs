//! Controller implementations for the etcd CRDs
//!
//! Both controllers follow the observe-decide-act pattern: every pass reads
//! the live state, computes what should exist and performs the minimal writes.

pub mod backup;
pub mod cluster;

pub use backup::{BackupClient, BackupContext, KubeBackupClient};
pub use cluster::ClusterContext;
