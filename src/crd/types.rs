//! Shared types for the etcd Custom Resource Definitions

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Object storage backend a backup is shipped to
///
/// The lowercase wire form doubles as the scheme of the backup URL.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// S3-compatible storage (AWS S3, MinIO, ...)
    S3,
    /// Alibaba Cloud OSS
    Oss,
}

impl StorageType {
    /// Wire name, also used as the backup URL scheme
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Oss => "oss",
        }
    }
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StorageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s3" => Ok(Self::S3),
            "oss" => Ok(Self::Oss),
            other => Err(format!("unknown storage type: {other}")),
        }
    }
}

/// Where and how a snapshot is stored
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupSource {
    /// `bucket/object` destination; a template evaluated against the backup
    pub path: String,

    /// Storage endpoint handed to the backup pod as `ENDPOINT`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Secret with the storage credentials, injected with `envFrom`
    pub secret: String,
}

/// Backup lifecycle phase
///
/// An unset phase (`None` on the status) means the backup has not started.
/// Failed and Completed are terminal.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum BackupPhase {
    /// The backup pod has been requested or is running
    BackingUp,
    /// The backup pod failed
    Failed,
    /// The snapshot was uploaded
    Completed,
}

impl BackupPhase {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Completed)
    }
}

impl std::fmt::Display for BackupPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BackingUp => write!(f, "BackingUp"),
            Self::Failed => write!(f, "Failed"),
            Self::Completed => write!(f, "Completed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_type_wire_form_is_lowercase() {
        assert_eq!(serde_json::to_string(&StorageType::S3).unwrap(), "\"s3\"");
        assert_eq!(
            serde_json::from_str::<StorageType>("\"oss\"").unwrap(),
            StorageType::Oss
        );
        assert!(serde_json::from_str::<StorageType>("\"gcs\"").is_err());
    }

    #[test]
    fn storage_type_round_trips_through_scheme() {
        for t in [StorageType::S3, StorageType::Oss] {
            assert_eq!(t.as_str().parse::<StorageType>().unwrap(), t);
        }
        assert!("S3".parse::<StorageType>().is_err());
    }

    #[test]
    fn only_failed_and_completed_are_terminal() {
        assert!(!BackupPhase::BackingUp.is_terminal());
        assert!(BackupPhase::Failed.is_terminal());
        assert!(BackupPhase::Completed.is_terminal());
    }

    #[test]
    fn phase_wire_form_matches_display() {
        for p in [BackupPhase::BackingUp, BackupPhase::Failed, BackupPhase::Completed] {
            assert_eq!(serde_json::to_string(&p).unwrap(), format!("\"{p}\""));
        }
    }
}
