//! EtcdCluster Custom Resource Definition
//!
//! An EtcdCluster is realised as a headless Service plus a StatefulSet, both
//! named after the resource.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Replica count used when `size` is not set
pub const DEFAULT_CLUSTER_SIZE: i32 = 3;

/// Specification for an EtcdCluster
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "etcd.ydzs.io",
    version = "v1alpha1",
    kind = "EtcdCluster",
    plural = "etcdclusters",
    shortname = "ec",
    namespaced,
    printcolumn = r#"{"name":"Size","type":"integer","jsonPath":".spec.size"}"#,
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".spec.image"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct EtcdClusterSpec {
    /// Number of etcd members
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i32>,

    /// etcd container image
    pub image: String,
}

impl EtcdClusterSpec {
    /// Desired member count
    pub fn replicas(&self) -> i32 {
        self.size.unwrap_or(DEFAULT_CLUSTER_SIZE)
    }
}
