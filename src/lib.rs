//! etcd-operator - Kubernetes operator for etcd clusters and their backups
//!
//! Two custom resources drive the operator:
//! - `EtcdCluster` is converged into a headless Service and a StatefulSet
//! - `EtcdBackup` runs a one-shot pod that snapshots etcd into object storage
//!   and records the outcome in the backup's status phase
//!
//! # Modules
//!
//! - [`crd`] - Custom Resource Definitions (EtcdBackup, EtcdCluster)
//! - [`controller`] - Kubernetes controller reconciliation logic
//! - [`workload`] - Desired-state builders for pods, services and statefulsets
//! - [`kube_utils`] - Create-or-update and owner reference helpers
//! - [`template`] - Backup path templating
//! - [`backup`] - Contract of the backup executable run inside backup pods
//! - [`events`] - Kubernetes Event publishing
//! - [`retry`] - Backoff and conflict retry helpers
//! - [`telemetry`] - Tracing setup
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod backup;
pub mod controller;
pub mod crd;
pub mod error;
pub mod events;
pub mod kube_utils;
pub mod retry;
pub mod telemetry;
pub mod template;
pub mod workload;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Seconds before a failed pass with a retryable error is requeued
pub const REQUEUE_ERROR_SECS: u64 = 10;

/// Image of the backup executable used when none is configured
pub const DEFAULT_BACKUP_IMAGE: &str = "ghcr.io/etcd-operator/etcd-backup:latest";
