//! EtcdCluster controller implementation
//!
//! An EtcdCluster is realised as a headless Service plus a StatefulSet, both
//! named after the cluster. Each pass converges the two objects with
//! [`create_or_update`] under [`retry_on_conflict`], so a write that loses a
//! resourceVersion race is re-read and re-applied rather than failing the pass.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use kube::api::Api;
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{info, instrument, warn};

use crate::crd::EtcdCluster;
use crate::kube_utils::{create_or_update, ObjectApi, OperationResult};
use crate::retry::{retry_on_conflict, RetryConfig};
use crate::workload::cluster::{
    mutate_service, mutate_statefulset, service_skeleton, statefulset_skeleton,
};
use crate::{Error, Result, REQUEUE_ERROR_SECS};

/// Shared state for EtcdCluster reconciliation
pub struct ClusterContext {
    /// Kubernetes client for API operations
    pub client: Client,
    /// Budget for version-conflict retries
    pub retry: RetryConfig,
}

impl ClusterContext {
    /// Create a new ClusterContext
    pub fn new(client: Client, retry: RetryConfig) -> Self {
        Self { client, retry }
    }
}

/// What one convergence pass did to each object
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConvergeOutcome {
    /// Result for the headless Service
    pub service: OperationResult,
    /// Result for the StatefulSet
    pub statefulset: OperationResult,
}

/// Converge the Service and then the StatefulSet of `cluster`.
///
/// The Service goes first because the StatefulSet's pods resolve their peers
/// through it. A failure on the Service leaves the StatefulSet untouched.
pub async fn converge(
    cluster: &EtcdCluster,
    services: &dyn ObjectApi<Service>,
    statefulsets: &dyn ObjectApi<StatefulSet>,
    retry: &RetryConfig,
) -> Result<ConvergeOutcome> {
    let name = cluster.name_any();

    let service = service_skeleton(cluster)?;
    let (service, _) = retry_on_conflict(retry, "Service", &name, || {
        create_or_update(services, service.clone(), |svc| {
            mutate_service(cluster, svc)
        })
    })
    .await?;
    info!(result = %service, "service converged");

    let statefulset = statefulset_skeleton(cluster)?;
    let (statefulset, _) = retry_on_conflict(retry, "StatefulSet", &name, || {
        create_or_update(statefulsets, statefulset.clone(), |sts| {
            mutate_statefulset(cluster, sts)
        })
    })
    .await?;
    info!(result = %statefulset, "statefulset converged");

    Ok(ConvergeOutcome {
        service,
        statefulset,
    })
}

/// Reconcile an EtcdCluster
///
/// Changes to the owned Service and StatefulSet trigger a new pass through
/// the controller's owner watches.
#[instrument(skip(cluster, ctx), fields(cluster = %cluster.name_any()))]
pub async fn reconcile(cluster: Arc<EtcdCluster>, ctx: Arc<ClusterContext>) -> Result<Action> {
    let namespace = cluster
        .namespace()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;

    if cluster.metadata.deletion_timestamp.is_some() {
        // Owned objects are garbage-collected through their owner references
        info!("cluster is being deleted, ignoring");
        return Ok(Action::await_change());
    }

    let services: Api<Service> = Api::namespaced(ctx.client.clone(), &namespace);
    let statefulsets: Api<StatefulSet> = Api::namespaced(ctx.client.clone(), &namespace);

    converge(&cluster, &services, &statefulsets, &ctx.retry).await?;
    Ok(Action::await_change())
}

/// Error policy for the EtcdCluster controller
pub fn error_policy(cluster: Arc<EtcdCluster>, error: &Error, _ctx: Arc<ClusterContext>) -> Action {
    warn!(
        ?error,
        cluster = %cluster.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(Duration::from_secs(REQUEUE_ERROR_SECS))
    } else {
        Action::await_change()
    }
}
