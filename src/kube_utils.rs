//! Create-or-update plumbing over the Kubernetes API
//!
//! [`ObjectApi`] is the narrow seam the cluster controller writes through; it
//! is implemented for `kube::Api<K>` and faked in memory by tests.
//! [`create_or_update`] reads the live object, applies a mutate function to a
//! copy and writes only when something changed.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::{Api, PostParams};
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::Error;

/// Outcome of a [`create_or_update`] call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationResult {
    /// The object did not exist and was created
    Created,
    /// The object existed and the mutation changed it
    Updated,
    /// The object already matched; no write was made
    Unchanged,
}

impl std::fmt::Display for OperationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Namespaced read/create/replace for one kind of object
#[async_trait]
pub trait ObjectApi<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    /// Fetch an object, `None` when it does not exist
    async fn get_opt(&self, name: &str) -> Result<Option<K>, kube::Error>;

    /// Create an object
    async fn create(&self, obj: &K) -> Result<K, kube::Error>;

    /// Replace an object; fails with 409 Conflict on a stale resourceVersion
    async fn replace(&self, name: &str, obj: &K) -> Result<K, kube::Error>;
}

#[async_trait]
impl<K> ObjectApi<K> for Api<K>
where
    K: Resource + Clone + DeserializeOwned + Serialize + Debug + Send + Sync + 'static,
{
    async fn get_opt(&self, name: &str) -> Result<Option<K>, kube::Error> {
        Api::<K>::get_opt(self, name).await
    }

    async fn create(&self, obj: &K) -> Result<K, kube::Error> {
        Api::<K>::create(self, &PostParams::default(), obj).await
    }

    async fn replace(&self, name: &str, obj: &K) -> Result<K, kube::Error> {
        Api::<K>::replace(self, name, &PostParams::default(), obj).await
    }
}

/// Converge one object: fetch it, mutate a copy, then create or replace.
///
/// `skeleton` carries the identity (name and namespace) and is the starting
/// point when the object does not exist yet. When it does exist, `mutate`
/// sees the live object, so fields it does not touch (resourceVersion,
/// assigned addresses, status, other writers' labels) are written back
/// unchanged. No write happens if the mutated copy equals the live object.
///
/// A stale resourceVersion surfaces as a 409 Conflict; wrap the call in
/// [`crate::retry::retry_on_conflict`] to re-run the whole cycle.
pub async fn create_or_update<K, A, F>(
    api: &A,
    skeleton: K,
    mutate: F,
) -> Result<(OperationResult, K), Error>
where
    K: Resource + Clone + PartialEq + Send + Sync + 'static,
    A: ObjectApi<K> + ?Sized,
    F: FnOnce(&mut K) -> Result<(), Error>,
{
    let name = skeleton
        .meta()
        .name
        .clone()
        .ok_or(Error::MissingObjectKey(".metadata.name"))?;

    match api.get_opt(&name).await? {
        None => {
            let mut obj = skeleton;
            mutate(&mut obj)?;
            let created = api.create(&obj).await?;
            debug!(name = %name, "object created");
            Ok((OperationResult::Created, created))
        }
        Some(live) => {
            let mut obj = live.clone();
            mutate(&mut obj)?;
            if obj == live {
                return Ok((OperationResult::Unchanged, live));
            }
            let updated = api.replace(&name, &obj).await?;
            debug!(name = %name, "object updated");
            Ok((OperationResult::Updated, updated))
        }
    }
}

/// Controller owner reference pointing at `owner`
pub fn controller_owner_ref<K>(owner: &K) -> Result<OwnerReference, Error>
where
    K: Resource<DynamicType = ()>,
{
    if owner.meta().name.is_none() {
        return Err(Error::MissingObjectKey(".metadata.name"));
    }
    owner
        .controller_owner_ref(&())
        .ok_or(Error::MissingObjectKey(".metadata.uid"))
}

/// Make `owner` the controller of the object described by `meta`.
///
/// An existing reference to the same owner (by uid) is replaced; references
/// to other owners are kept.
pub fn set_controller_reference<K>(owner: &K, meta: &mut ObjectMeta) -> Result<(), Error>
where
    K: Resource<DynamicType = ()>,
{
    let owner_ref = controller_owner_ref(owner)?;
    let refs = meta.owner_references.get_or_insert_with(Vec::new);
    refs.retain(|r| r.uid != owner_ref.uid);
    refs.push(owner_ref);
    Ok(())
}

/// In-memory [`ObjectApi`] holding at most one object, for tests
#[cfg(test)]
pub(crate) mod fake {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::error::api_error;

    /// Enforces resourceVersion checks and can inject conflicts
    pub(crate) struct FakeObjectApi<K> {
        object: Mutex<Option<K>>,
        conflicts: AtomicU32,
        writes: AtomicU32,
    }

    impl<K: Resource + Clone> FakeObjectApi<K> {
        pub(crate) fn empty() -> Self {
            Self {
                object: Mutex::new(None),
                conflicts: AtomicU32::new(0),
                writes: AtomicU32::new(0),
            }
        }

        /// Start with `obj` already stored at resourceVersion "1"
        pub(crate) fn with_object(mut obj: K) -> Self {
            obj.meta_mut().resource_version = Some("1".to_string());
            let api = Self::empty();
            *api.object.lock().unwrap() = Some(obj);
            api
        }

        /// Fail the next `n` writes with 409 Conflict
        pub(crate) fn conflict_next(self, n: u32) -> Self {
            self.conflicts.store(n, Ordering::SeqCst);
            self
        }

        pub(crate) fn stored(&self) -> Option<K> {
            self.object.lock().unwrap().clone()
        }

        /// Writes that reached storage
        pub(crate) fn writes(&self) -> u32 {
            self.writes.load(Ordering::SeqCst)
        }

        fn injected_conflict(&self) -> Result<(), kube::Error> {
            let pending = self.conflicts.load(Ordering::SeqCst);
            if pending > 0 {
                self.conflicts.store(pending - 1, Ordering::SeqCst);
                return Err(api_error(409, "Conflict"));
            }
            Ok(())
        }
    }

    fn bump(version: &Option<String>) -> String {
        let current: u64 = version.as_deref().and_then(|v| v.parse().ok()).unwrap_or(0);
        (current + 1).to_string()
    }

    #[async_trait]
    impl<K> ObjectApi<K> for FakeObjectApi<K>
    where
        K: Resource + Clone + Send + Sync + 'static,
    {
        async fn get_opt(&self, _name: &str) -> Result<Option<K>, kube::Error> {
            Ok(self.stored())
        }

        async fn create(&self, obj: &K) -> Result<K, kube::Error> {
            self.injected_conflict()?;
            let mut slot = self.object.lock().unwrap();
            if slot.is_some() {
                return Err(api_error(409, "AlreadyExists"));
            }
            let mut created = obj.clone();
            created.meta_mut().resource_version = Some("1".to_string());
            created.meta_mut().uid = Some("fake-uid".to_string());
            *slot = Some(created.clone());
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(created)
        }

        async fn replace(&self, _name: &str, obj: &K) -> Result<K, kube::Error> {
            self.injected_conflict()?;
            let mut slot = self.object.lock().unwrap();
            let Some(current) = slot.as_ref() else {
                return Err(api_error(404, "NotFound"));
            };
            if current.meta().resource_version != obj.meta().resource_version {
                return Err(api_error(409, "Conflict"));
            }
            let mut replaced = obj.clone();
            replaced.meta_mut().resource_version = Some(bump(&current.meta().resource_version));
            *slot = Some(replaced.clone());
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(replaced)
        }
    }
}
