//! Kubernetes objects derived from the etcd custom resources
//!
//! - [`backup`]: the Desired-State Builder for an EtcdBackup's pod
//! - [`cluster`]: mutate functions for an EtcdCluster's Service and StatefulSet
//!
//! Builders are pure: they never talk to the API server.

pub mod backup;
pub mod cluster;

use std::collections::BTreeMap;

/// Recommended label: application name
pub const LABEL_NAME: &str = "app.kubernetes.io/name";
/// Recommended label: instance of the application
pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";
/// Recommended label: tool managing the object
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
/// Value of [`LABEL_MANAGED_BY`] on every derived object
pub const MANAGED_BY: &str = "etcd-operator";

/// Standard labels for a derived object
pub fn standard_labels(app: &str, instance: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_NAME.to_string(), app.to_string()),
        (LABEL_INSTANCE.to_string(), instance.to_string()),
        (LABEL_MANAGED_BY.to_string(), MANAGED_BY.to_string()),
    ])
}

/// Insert `labels` into `target`, keeping keys set by other writers
pub fn merge_labels(target: &mut Option<BTreeMap<String, String>>, labels: &BTreeMap<String, String>) {
    target
        .get_or_insert_with(BTreeMap::new)
        .extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
}
