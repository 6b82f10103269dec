//! Shared setup for kind-backed tests

use std::time::Duration;

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, CustomResourceExt};

use etcd_operator::crd::{EtcdBackup, EtcdCluster};

/// Namespace every story runs in
pub const TEST_NAMESPACE: &str = "etcd-operator-test";

/// Connect to the current cluster and make sure CRDs and namespace exist
pub async fn ensure_test_cluster() -> Result<Client, kube::Error> {
    let client = Client::try_default().await?;
    let params = PatchParams::apply("etcd-operator-test").force();

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    for crd in [EtcdCluster::crd(), EtcdBackup::crd()] {
        let name = crd.metadata.name.clone().unwrap_or_default();
        crds.patch(&name, &params, &Patch::Apply(&crd)).await?;
    }

    let namespaces: Api<Namespace> = Api::all(client.clone());
    let ns = Namespace {
        metadata: ObjectMeta {
            name: Some(TEST_NAMESPACE.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    namespaces
        .patch(TEST_NAMESPACE, &params, &Patch::Apply(&ns))
        .await?;

    // Freshly applied CRDs take a moment to be served
    tokio::time::sleep(Duration::from_secs(2)).await;
    Ok(client)
}
