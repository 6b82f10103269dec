//! EtcdBackup Custom Resource Definition
//!
//! An EtcdBackup requests one snapshot of an etcd cluster, uploaded to object
//! storage by a short-lived pod. Its phase only moves forward: unset, then
//! BackingUp, then Failed or Completed.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{BackupPhase, BackupSource, StorageType};

/// Specification for an EtcdBackup
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "etcd.ydzs.io",
    version = "v1alpha1",
    kind = "EtcdBackup",
    plural = "etcdbackups",
    shortname = "eb",
    status = "EtcdBackupStatus",
    namespaced,
    derive = "PartialEq",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"StorageType","type":"string","jsonPath":".spec.storageType"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct EtcdBackupSpec {
    /// Client URL of the etcd cluster to snapshot
    pub etcd_url: String,

    /// Backend the snapshot is uploaded to
    pub storage_type: StorageType,

    /// S3 destination, required when `storageType` is `s3`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<BackupSource>,

    /// OSS destination, required when `storageType` is `oss`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oss: Option<BackupSource>,
}

impl EtcdBackupSpec {
    /// The destination matching `storage_type`, if configured
    pub fn source(&self) -> Option<&BackupSource> {
        match self.storage_type {
            StorageType::S3 => self.s3.as_ref(),
            StorageType::Oss => self.oss.as_ref(),
        }
    }
}

/// Status for an EtcdBackup
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EtcdBackupStatus {
    /// Current phase; unset until the controller first sees the backup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<BackupPhase>,
}

impl EtcdBackup {
    /// Current phase, `None` while unset
    pub fn phase(&self) -> Option<BackupPhase> {
        self.status.as_ref().and_then(|s| s.phase)
    }

    /// Clone of this backup with only the status phase replaced
    pub fn with_phase(&self, phase: BackupPhase) -> Self {
        let mut updated = self.clone();
        updated.status.get_or_insert_with(Default::default).phase = Some(phase);
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    fn s3_source() -> BackupSource {
        BackupSource {
            path: "bucket/{{.Name}}.db".to_string(),
            endpoint: Some("minio:9000".to_string()),
            secret: "minio-creds".to_string(),
        }
    }

    fn sample_backup() -> EtcdBackup {
        EtcdBackup::new(
            "nightly",
            EtcdBackupSpec {
                etcd_url: "http://etcd-demo:2379".to_string(),
                storage_type: StorageType::S3,
                s3: Some(s3_source()),
                oss: None,
            },
        )
    }

    // =========================================================================
    // Source Selection Stories
    // =========================================================================

    #[test]
    fn story_source_follows_storage_type() {
        let backup = sample_backup();
        assert_eq!(backup.spec.source(), Some(&s3_source()));

        let mut oss = backup.spec.clone();
        oss.storage_type = StorageType::Oss;
        assert!(oss.source().is_none(), "s3 block must not satisfy oss");
    }

    // =========================================================================
    // Phase Stories
    // =========================================================================

    #[test]
    fn story_new_backup_has_unset_phase() {
        assert_eq!(sample_backup().phase(), None);
    }

    #[test]
    fn story_with_phase_changes_nothing_else() {
        let original = sample_backup();
        let updated = original.with_phase(BackupPhase::BackingUp);

        assert_eq!(updated.phase(), Some(BackupPhase::BackingUp));
        assert_eq!(updated.spec, original.spec);
        assert_eq!(updated.metadata, original.metadata);
        assert_eq!(original.phase(), None, "original is untouched");
    }

    // =========================================================================
    // Wire Format
    // =========================================================================

    #[test]
    fn test_spec_uses_camel_case() {
        let json = serde_json::to_value(&sample_backup().spec).unwrap();
        assert_eq!(json["etcdUrl"], "http://etcd-demo:2379");
        assert_eq!(json["storageType"], "s3");
        assert_eq!(json["s3"]["secret"], "minio-creds");
        assert!(json.get("oss").is_none());
    }

    #[test]
    fn test_manifest_parses() {
        let yaml = r#"
apiVersion: etcd.ydzs.io/v1alpha1
kind: EtcdBackup
metadata:
  name: nightly
  namespace: db
spec:
  etcdUrl: http://etcd-demo:2379
  storageType: oss
  oss:
    path: snapshots/nightly.db
    secret: oss-creds
status:
  phase: Completed
"#;
        let backup: EtcdBackup = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(backup.spec.storage_type, StorageType::Oss);
        assert_eq!(backup.spec.source().unwrap().endpoint, None);
        assert_eq!(backup.phase(), Some(BackupPhase::Completed));
    }

    #[test]
    fn test_crd_metadata() {
        let crd = EtcdBackup::crd();
        assert_eq!(crd.spec.group, "etcd.ydzs.io");
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(
            crd.spec.names.short_names,
            Some(vec!["eb".to_string()])
        );
    }
}
