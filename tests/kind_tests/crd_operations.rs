//! Integration tests for CRD operations
//!
//! These tests tell the story of how users create and inspect etcd resources
//! through the Kubernetes API.

use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};

use etcd_operator::crd::{
    BackupPhase, BackupSource, EtcdBackup, EtcdBackupSpec, EtcdCluster, EtcdClusterSpec,
    StorageType,
};

use super::helpers::{ensure_test_cluster, TEST_NAMESPACE};

// =============================================================================
// Test Fixtures
// =============================================================================

fn sample_backup(name: &str) -> EtcdBackup {
    EtcdBackup::new(
        name,
        EtcdBackupSpec {
            etcd_url: "http://etcd-demo:2379".to_string(),
            storage_type: StorageType::S3,
            s3: Some(BackupSource {
                path: "backups/{{.Namespace}}-{{.Name}}.db".to_string(),
                endpoint: Some("minio:9000".to_string()),
                secret: "minio-creds".to_string(),
            }),
            oss: None,
        },
    )
}

// =============================================================================
// EtcdBackup Stories
// =============================================================================

/// Story: a user requests a backup and it starts without a phase
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_user_creates_backup() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<EtcdBackup> = Api::namespaced(client, TEST_NAMESPACE);
    let name = "crd-create-backup";
    let _ = api.delete(name, &DeleteParams::default()).await;

    let created = api
        .create(&PostParams::default(), &sample_backup(name))
        .await
        .expect("failed to create backup");

    assert_eq!(created.metadata.name.as_deref(), Some(name));
    assert_eq!(created.spec.storage_type, StorageType::S3);
    assert!(created.phase().is_none());

    let _ = api.delete(name, &DeleteParams::default()).await;
}

/// Story: the phase lives in the status subresource
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_status_phase_round_trips() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<EtcdBackup> = Api::namespaced(client, TEST_NAMESPACE);
    let name = "crd-status-backup";
    let _ = api.delete(name, &DeleteParams::default()).await;

    api.create(&PostParams::default(), &sample_backup(name))
        .await
        .expect("failed to create backup");

    let status = serde_json::json!({"status": {"phase": "Completed"}});
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&status))
        .await
        .expect("failed to patch status");

    let fetched = api.get(name).await.expect("failed to get backup");
    assert_eq!(fetched.phase(), Some(BackupPhase::Completed));

    let _ = api.delete(name, &DeleteParams::default()).await;
}

// =============================================================================
// EtcdCluster Stories
// =============================================================================

/// Story: omitting the size leaves it for the operator to default
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_user_creates_cluster_without_size() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<EtcdCluster> = Api::namespaced(client, TEST_NAMESPACE);
    let name = "crd-create-cluster";
    let _ = api.delete(name, &DeleteParams::default()).await;

    let cluster = EtcdCluster::new(
        name,
        EtcdClusterSpec {
            size: None,
            image: "quay.io/coreos/etcd:v3.5.9".to_string(),
        },
    );
    let created = api
        .create(&PostParams::default(), &cluster)
        .await
        .expect("failed to create cluster");

    assert!(created.spec.size.is_none());
    assert_eq!(created.spec.replicas(), 3);

    let _ = api.delete(name, &DeleteParams::default()).await;
}
