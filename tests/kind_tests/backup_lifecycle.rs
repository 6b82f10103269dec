//! Integration tests for the EtcdBackup lifecycle
//!
//! The controller runtime is not started; each story calls `reconcile`
//! directly so passes happen in a known order.

use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, PostParams};

use etcd_operator::controller::backup::reconcile;
use etcd_operator::controller::{BackupContext, KubeBackupClient};
use etcd_operator::crd::{BackupPhase, BackupSource, EtcdBackup, EtcdBackupSpec, StorageType};
use etcd_operator::events::NoopEventPublisher;

use super::helpers::{ensure_test_cluster, TEST_NAMESPACE};

const BACKUP_IMAGE: &str = "busybox:1.36";

/// Story: the first pass marks the backup BackingUp, the second creates the pod
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_backup_starts_and_creates_its_pod() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let backups: Api<EtcdBackup> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let pods: Api<Pod> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let name = "lifecycle-backup";

    let _ = backups.delete(name, &DeleteParams::default()).await;
    let _ = pods.delete(name, &DeleteParams::default()).await;

    let backup = EtcdBackup::new(
        name,
        EtcdBackupSpec {
            etcd_url: "http://etcd-demo:2379".to_string(),
            storage_type: StorageType::S3,
            s3: Some(BackupSource {
                path: "backups/{{.Name}}.db".to_string(),
                endpoint: None,
                secret: "minio-creds".to_string(),
            }),
            oss: None,
        },
    );
    let created = backups
        .create(&PostParams::default(), &backup)
        .await
        .expect("failed to create backup");

    let ctx = Arc::new(BackupContext::new(
        Arc::new(KubeBackupClient::new(client.clone())),
        Arc::new(NoopEventPublisher),
        BACKUP_IMAGE,
    ));

    reconcile(Arc::new(created.clone()), ctx.clone())
        .await
        .expect("first pass failed");
    let fetched = backups.get(name).await.expect("backup missing");
    assert_eq!(fetched.phase(), Some(BackupPhase::BackingUp));

    reconcile(Arc::new(fetched), ctx)
        .await
        .expect("second pass failed");
    let pod = pods.get(name).await.expect("backup pod missing");
    let args = pod.spec.unwrap().containers[0].args.clone().unwrap();
    assert!(args.contains(&format!("s3://backups/{name}.db")));

    let _ = backups.delete(name, &DeleteParams::default()).await;
}
