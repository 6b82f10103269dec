//! Integration tests for etcd-operator
//!
//! These tests require a Kubernetes cluster (kind) and tell the story of how
//! users interact with the operator's resources.
//!
//! # Test Organization
//!
//! - `crd_operations`: creating, reading and updating EtcdBackup and
//!   EtcdCluster resources through the Kubernetes API
//! - `cluster_convergence`: the cluster controller's Service and StatefulSet
//!   convergence against a real API server
//! - `backup_lifecycle`: the backup controller walking a backup from an unset
//!   phase to a running backup pod

mod backup_lifecycle;
mod cluster_convergence;
mod crd_operations;
mod helpers;
