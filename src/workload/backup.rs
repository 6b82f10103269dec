//! Desired-State Builder for EtcdBackup
//!
//! An EtcdBackup is carried out by one pod running the backup executable.
//! The pod shares the backup's name and namespace, so the observer can find
//! it by identity alone.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Container, EnvFromSource, EnvVar, Pod, PodSpec, ResourceRequirements, SecretEnvSource,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

use super::standard_labels;
use crate::crd::{BackupSource, EtcdBackup};
use crate::kube_utils::controller_owner_ref;
use crate::template::{TemplateContext, TemplateEngine};
use crate::{Error, Result};

/// Name of the only container in a backup pod
pub const BACKUP_CONTAINER_NAME: &str = "etcd-backup";
/// `app.kubernetes.io/name` of backup pods
pub const BACKUP_APP_NAME: &str = "etcd-backup";
/// Environment variable carrying the storage endpoint
pub const ENDPOINT_ENV: &str = "ENDPOINT";

const BACKUP_CPU: &str = "100m";
const BACKUP_MEMORY: &str = "50Mi";

/// Destination URL for a backup: `<storageType>://<rendered path>`
///
/// # Errors
///
/// - `UnsupportedStorage` when the block matching `storageType` is absent
/// - `Template` when the path fails to render
pub fn backup_url(backup: &EtcdBackup, engine: &TemplateEngine) -> Result<String> {
    let source = storage_source(backup)?;
    let ctx = TemplateContext::from_resource(backup)?;
    let path = engine.render(&source.path, &ctx)?;
    Ok(format!("{}://{}", backup.spec.storage_type, path))
}

fn storage_source(backup: &EtcdBackup) -> Result<&BackupSource> {
    let storage_type = backup.spec.storage_type;
    backup.spec.source().ok_or_else(|| {
        Error::unsupported_storage(format!(
            "storageType is {storage_type} but spec.{storage_type} is not set"
        ))
    })
}

/// Build the pod that performs `backup` using the backup executable `image`
pub fn build_backup_pod(backup: &EtcdBackup, image: &str) -> Result<Pod> {
    let name = backup
        .metadata
        .name
        .clone()
        .ok_or(Error::MissingObjectKey(".metadata.name"))?;
    let namespace = backup
        .namespace()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
    let owner_ref = controller_owner_ref(backup)?;

    let source = storage_source(backup)?;
    let url = backup_url(backup, &TemplateEngine::new())?;

    let limits = BTreeMap::from([
        ("cpu".to_string(), Quantity(BACKUP_CPU.to_string())),
        ("memory".to_string(), Quantity(BACKUP_MEMORY.to_string())),
    ]);

    let container = Container {
        name: BACKUP_CONTAINER_NAME.to_string(),
        image: Some(image.to_string()),
        args: Some(vec![
            "--etcd-url".to_string(),
            backup.spec.etcd_url.clone(),
            "--backup-url".to_string(),
            url,
        ]),
        env: Some(vec![EnvVar {
            name: ENDPOINT_ENV.to_string(),
            value: Some(source.endpoint.clone().unwrap_or_default()),
            ..Default::default()
        }]),
        env_from: Some(vec![EnvFromSource {
            secret_ref: Some(SecretEnvSource {
                name: source.secret.clone().into(),
                optional: None,
            }),
            ..Default::default()
        }]),
        resources: Some(ResourceRequirements {
            requests: Some(limits.clone()),
            limits: Some(limits),
            ..Default::default()
        }),
        ..Default::default()
    };

    Ok(Pod {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: Some(namespace),
            labels: Some(standard_labels(BACKUP_APP_NAME, &name)),
            owner_references: Some(vec![owner_ref]),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![container],
            restart_policy: Some("Never".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    })
}
