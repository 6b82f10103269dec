//! Integration tests for EtcdCluster convergence
//!
//! These tests drive `converge` against a real API server, so the
//! server's own defaulting is part of what the idempotence checks see.

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, DeleteParams, PostParams};

use etcd_operator::controller::cluster::converge;
use etcd_operator::crd::{EtcdCluster, EtcdClusterSpec};
use etcd_operator::kube_utils::OperationResult;
use etcd_operator::retry::RetryConfig;

use super::helpers::{ensure_test_cluster, TEST_NAMESPACE};

/// Story: a new cluster gets its Service and StatefulSet, and a repeat pass
/// leaves them alone
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_cluster_converges_and_stays_converged() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let clusters: Api<EtcdCluster> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let services: Api<Service> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let statefulsets: Api<StatefulSet> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let name = "converge-demo";

    let _ = clusters.delete(name, &DeleteParams::default()).await;
    let _ = services.delete(name, &DeleteParams::default()).await;
    let _ = statefulsets.delete(name, &DeleteParams::default()).await;

    let cluster = clusters
        .create(
            &PostParams::default(),
            &EtcdCluster::new(
                name,
                EtcdClusterSpec {
                    size: Some(1),
                    image: "quay.io/coreos/etcd:v3.5.9".to_string(),
                },
            ),
        )
        .await
        .expect("failed to create cluster");

    let retry = RetryConfig::conflict();
    let first = converge(&cluster, &services, &statefulsets, &retry)
        .await
        .expect("first pass failed");
    assert_eq!(first.service, OperationResult::Created);
    assert_eq!(first.statefulset, OperationResult::Created);

    let second = converge(&cluster, &services, &statefulsets, &retry)
        .await
        .expect("second pass failed");
    assert_eq!(second.service, OperationResult::Unchanged);
    assert_eq!(second.statefulset, OperationResult::Unchanged);

    let svc = services.get(name).await.expect("service missing");
    assert_eq!(
        svc.spec.and_then(|s| s.cluster_ip).as_deref(),
        Some("None")
    );

    let _ = clusters.delete(name, &DeleteParams::default()).await;
}
