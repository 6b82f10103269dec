//! Backup destination URLs: `<storageType>://<bucket>/<object>`

use url::Url;

use crate::crd::StorageType;
use crate::{Error, Result};

/// A parsed backup destination
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackupUrl {
    /// Backend, taken from the scheme
    pub storage: StorageType,
    /// Bucket, taken from the host
    pub bucket: String,
    /// Object key, the path without its leading slash
    pub object: String,
}

impl BackupUrl {
    /// Parse `s3://bucket1/dir/obj.db` into storage `s3`, bucket `bucket1`
    /// and object `dir/obj.db`.
    ///
    /// # Errors
    ///
    /// - `UnsupportedStorage` for a scheme other than `s3` or `oss`
    /// - `InvalidBackupUrl` when the URL is malformed or lacks a bucket or object
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw).map_err(|e| Error::invalid_backup_url(raw, e.to_string()))?;

        let storage = url
            .scheme()
            .parse::<StorageType>()
            .map_err(Error::unsupported_storage)?;

        let bucket = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::invalid_backup_url(raw, "missing bucket"))?
            .to_string();

        let object = url.path().trim_start_matches('/');
        if object.is_empty() {
            return Err(Error::invalid_backup_url(raw, "missing object"));
        }

        Ok(Self {
            storage,
            bucket,
            object: object.to_string(),
        })
    }
}

impl std::fmt::Display for BackupUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}/{}", self.storage, self.bucket, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_url() {
        let url = BackupUrl::parse("s3://bucket1/dir/obj.db").unwrap();
        assert_eq!(url.storage, StorageType::S3);
        assert_eq!(url.bucket, "bucket1");
        assert_eq!(url.object, "dir/obj.db");
        assert_eq!(url.to_string(), "s3://bucket1/dir/obj.db");
    }

    #[test]
    fn test_parse_oss_url() {
        let url = BackupUrl::parse("oss://snapshots/etcd.db").unwrap();
        assert_eq!(url.storage, StorageType::Oss);
        assert_eq!(url.bucket, "snapshots");
        assert_eq!(url.object, "etcd.db");
    }

    #[test]
    fn test_unknown_scheme_is_unsupported() {
        let err = BackupUrl::parse("gcs://bucket/obj.db").unwrap_err();
        assert!(matches!(err, Error::UnsupportedStorage(_)));
        assert!(err.to_string().contains("gcs"));
    }

    #[test]
    fn test_missing_parts_are_invalid() {
        assert!(matches!(
            BackupUrl::parse("s3://bucket"),
            Err(Error::InvalidBackupUrl { .. })
        ));
        assert!(matches!(
            BackupUrl::parse("s3://bucket/"),
            Err(Error::InvalidBackupUrl { .. })
        ));
        assert!(matches!(
            BackupUrl::parse("not a url"),
            Err(Error::InvalidBackupUrl { .. })
        ));
    }
}
