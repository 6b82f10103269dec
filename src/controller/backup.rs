//! EtcdBackup controller implementation
//!
//! Each pass runs the same pipeline:
//!
//! 1. [`observe`] fetches the backup and its pod and builds the desired pod.
//! 2. [`decide`] picks at most one [`BackupAction`] from that snapshot. It is
//!    pure, so the whole state machine is testable without a cluster.
//! 3. [`execute`] performs the action and then publishes the decision's event.
//!
//! The phase only moves forward: unset, BackingUp, then Failed or Completed.
//! Terminal backups are never touched again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ObjectReference, Pod};
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use crate::crd::{BackupPhase, EtcdBackup};
use crate::events::{actions, reasons, EventPublisher, KubeEventPublisher};
use crate::workload::backup::build_backup_pod;
use crate::{Error, Result, REQUEUE_ERROR_SECS};

/// Field manager and event reporter name of this controller
pub const FIELD_MANAGER: &str = "etcd-backup-controller";

/// Pod phase reported when every container exited successfully
const POD_SUCCEEDED: &str = "Succeeded";
/// Pod phase reported when a container exited with an error
const POD_FAILED: &str = "Failed";

/// Trait abstracting Kubernetes client operations for EtcdBackup
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BackupClient: Send + Sync {
    /// Fetch a backup, `None` if it does not exist
    async fn get_backup(&self, name: &str, namespace: &str) -> Result<Option<EtcdBackup>>;

    /// Fetch the pod sharing the backup's identity, `None` if it does not exist
    async fn get_pod(&self, name: &str, namespace: &str) -> Result<Option<Pod>>;

    /// Create a pod
    async fn create_pod(&self, pod: &Pod) -> Result<()>;

    /// Apply a JSON Patch to the status subresource of a backup
    async fn patch_status(
        &self,
        name: &str,
        namespace: &str,
        patch: &json_patch::Patch,
    ) -> Result<()>;
}

/// Real Kubernetes client implementation
pub struct KubeBackupClient {
    client: Client,
}

impl KubeBackupClient {
    /// Create a new KubeBackupClient wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BackupClient for KubeBackupClient {
    async fn get_backup(&self, name: &str, namespace: &str) -> Result<Option<EtcdBackup>> {
        let api: Api<EtcdBackup> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_pod(&self, name: &str, namespace: &str) -> Result<Option<Pod>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_pod(&self, pod: &Pod) -> Result<()> {
        let namespace = pod
            .metadata
            .namespace
            .as_deref()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), pod).await?;
        Ok(())
    }

    async fn patch_status(
        &self,
        name: &str,
        namespace: &str,
        patch: &json_patch::Patch,
    ) -> Result<()> {
        let api: Api<EtcdBackup> = Api::namespaced(self.client.clone(), namespace);
        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::<()>::Json(patch.clone()),
        )
        .await?;
        Ok(())
    }
}

// =============================================================================
// State
// =============================================================================

/// What exists in the cluster right now
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObservedState {
    /// The backup pod, if it has been created
    pub pod: Option<Pod>,
}

/// What should exist for the backup
#[derive(Clone, Debug, PartialEq)]
pub struct DesiredState {
    /// The pod that performs the backup
    pub pod: Pod,
}

/// Everything one pass knows about a backup that still exists
#[derive(Clone, Debug, PartialEq)]
pub struct BackupState {
    /// The backup as fetched at the start of the pass
    pub backup: EtcdBackup,
    /// Observed objects
    pub actual: ObservedState,
    /// Objects the builder wants
    pub desired: DesiredState,
}

/// The single write a pass may perform
#[derive(Clone, Debug, PartialEq)]
pub enum BackupAction {
    /// Create exactly this pod
    CreateObject(Pod),
    /// Write the status difference between two snapshots of the backup
    PatchStatus {
        /// The backup as observed
        original: EtcdBackup,
        /// The backup with the new phase
        new: EtcdBackup,
    },
}

/// Event published after a successful action
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackupEvent {
    /// The backup pod was created
    Created {
        /// Name of the pod
        pod: String,
    },
    /// The backup pod failed
    Failed,
    /// The backup pod succeeded
    Succeeded,
}

impl BackupEvent {
    /// Normal or Warning
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Created { .. } | Self::Succeeded => EventType::Normal,
            Self::Failed => EventType::Warning,
        }
    }

    /// Event reason
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Created { .. } => reasons::SUCCESSFUL_CREATE,
            Self::Failed => reasons::BACKUP_FAILED,
            Self::Succeeded => reasons::BACKUP_SUCCEEDED,
        }
    }

    /// Event action
    pub fn action(&self) -> &'static str {
        match self {
            Self::Created { .. } => actions::CREATE,
            Self::Failed | Self::Succeeded => actions::UPDATE_STATUS,
        }
    }

    /// Human-readable message
    pub fn note(&self) -> String {
        match self {
            Self::Created { pod } => format!("Created pod: {pod}"),
            Self::Failed => "Backup failed, see the backup pod for details".to_string(),
            Self::Succeeded => "Backup completed successfully".to_string(),
        }
    }
}

/// Outcome of [`decide`]
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    /// The write to perform, if any
    pub action: Option<BackupAction>,
    /// Event to publish once the action succeeds
    pub event: Option<BackupEvent>,
    /// Why this decision was taken, for logs
    pub note: &'static str,
}

impl Decision {
    fn ignore(note: &'static str) -> Self {
        Self {
            action: None,
            event: None,
            note,
        }
    }

    fn transition(
        backup: &EtcdBackup,
        phase: BackupPhase,
        event: Option<BackupEvent>,
        note: &'static str,
    ) -> Self {
        Self {
            action: Some(BackupAction::PatchStatus {
                original: backup.clone(),
                new: backup.with_phase(phase),
            }),
            event,
            note,
        }
    }
}

// =============================================================================
// Observe
// =============================================================================

/// Fetch the backup and its pod and compute the desired pod.
///
/// Returns `None` when the backup no longer exists. Any other read failure,
/// and any failure to build the desired pod, fails the pass.
pub async fn observe(
    client: &dyn BackupClient,
    name: &str,
    namespace: &str,
    image: &str,
) -> Result<Option<BackupState>> {
    let Some(backup) = client.get_backup(name, namespace).await? else {
        return Ok(None);
    };

    let pod = client.get_pod(name, namespace).await?;
    let desired = build_backup_pod(&backup, image)?;

    Ok(Some(BackupState {
        backup,
        actual: ObservedState { pod },
        desired: DesiredState { pod: desired },
    }))
}

// =============================================================================
// Decide
// =============================================================================

/// Choose the next step for a backup. First matching rule wins.
pub fn decide(state: Option<&BackupState>) -> Decision {
    let Some(state) = state else {
        return Decision::ignore("backup not found, ignoring");
    };
    let backup = &state.backup;

    if backup.metadata.deletion_timestamp.is_some() {
        return Decision::ignore("backup is being deleted, ignoring");
    }

    match backup.phase() {
        None => {
            return Decision::transition(
                backup,
                BackupPhase::BackingUp,
                None,
                "backup starting, updating status",
            )
        }
        Some(BackupPhase::Failed) => return Decision::ignore("backup has failed, ignoring"),
        Some(BackupPhase::Completed) => return Decision::ignore("backup has completed, ignoring"),
        Some(BackupPhase::BackingUp) => {}
    }

    let Some(pod) = &state.actual.pod else {
        let desired = state.desired.pod.clone();
        return Decision {
            event: Some(BackupEvent::Created {
                pod: desired.name_any(),
            }),
            action: Some(BackupAction::CreateObject(desired)),
            note: "backup pod does not exist, creating",
        };
    };

    match pod.status.as_ref().and_then(|s| s.phase.as_deref()) {
        Some(POD_FAILED) => Decision::transition(
            backup,
            BackupPhase::Failed,
            Some(BackupEvent::Failed),
            "backup pod failed, updating status",
        ),
        Some(POD_SUCCEEDED) => Decision::transition(
            backup,
            BackupPhase::Completed,
            Some(BackupEvent::Succeeded),
            "backup pod succeeded, updating status",
        ),
        _ => Decision::ignore("backup pod still running"),
    }
}

// =============================================================================
// Act
// =============================================================================

/// JSON Patch turning `original`'s status into `new`'s.
///
/// Operations outside `/status` are dropped, so spec or metadata drift
/// between the two snapshots is never written.
pub fn status_patch(original: &EtcdBackup, new: &EtcdBackup) -> Result<json_patch::Patch> {
    let before = serde_json::to_value(original)?;
    let after = serde_json::to_value(new)?;
    let json_patch::Patch(ops) = json_patch::diff(&before, &after);

    Ok(json_patch::Patch(
        ops.into_iter()
            .filter(|op| is_status_path(operation_path(op)))
            .collect(),
    ))
}

fn operation_path(op: &json_patch::PatchOperation) -> &str {
    use json_patch::PatchOperation::*;
    match op {
        Add(o) => o.path.as_str(),
        Remove(o) => o.path.as_str(),
        Replace(o) => o.path.as_str(),
        Move(o) => o.path.as_str(),
        Copy(o) => o.path.as_str(),
        Test(o) => o.path.as_str(),
    }
}

fn is_status_path(path: &str) -> bool {
    path == "/status" || path.starts_with("/status/")
}

/// Perform one action against the API server
pub async fn execute(client: &dyn BackupClient, action: &BackupAction) -> Result<()> {
    match action {
        BackupAction::CreateObject(pod) => {
            info!(pod = %pod.name_any(), "creating backup pod");
            client.create_pod(pod).await.inspect_err(|e| {
                if e.is_already_exists() {
                    // The pod is observed on the next pass
                    warn!(pod = %pod.name_any(), "backup pod already exists");
                }
            })
        }
        BackupAction::PatchStatus { original, new } => {
            let patch = status_patch(original, new)?;
            if patch.0.is_empty() {
                debug!("status unchanged, skipping patch");
                return Ok(());
            }
            let namespace = original
                .namespace()
                .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
            info!(phase = ?new.phase(), "patching backup status");
            client
                .patch_status(&original.name_any(), &namespace, &patch)
                .await
        }
    }
}

// =============================================================================
// Controller context
// =============================================================================

/// Shared state for EtcdBackup reconciliation
pub struct BackupContext {
    /// Kubernetes client for API operations
    pub client: Arc<dyn BackupClient>,
    /// Event publisher for emitting Kubernetes Events
    pub events: Arc<dyn EventPublisher>,
    /// Image of the backup executable
    pub backup_image: String,
}

impl BackupContext {
    /// Create a new BackupContext with the given dependencies
    pub fn new(
        client: Arc<dyn BackupClient>,
        events: Arc<dyn EventPublisher>,
        backup_image: impl Into<String>,
    ) -> Self {
        Self {
            client,
            events,
            backup_image: backup_image.into(),
        }
    }

    /// Create a context backed by a real Kubernetes client
    pub fn from_client(client: Client, backup_image: impl Into<String>) -> Self {
        Self::new(
            Arc::new(KubeBackupClient::new(client.clone())),
            Arc::new(KubeEventPublisher::new(client, FIELD_MANAGER)),
            backup_image,
        )
    }
}

// =============================================================================
// EtcdBackup reconciliation
// =============================================================================

/// Reconcile an EtcdBackup
///
/// Runs one observe-decide-act pass. Progress is driven by watch events on
/// the backup and its pod, so a successful pass waits for the next change.
#[instrument(skip(backup, ctx), fields(backup = %backup.name_any()))]
pub async fn reconcile(backup: Arc<EtcdBackup>, ctx: Arc<BackupContext>) -> Result<Action> {
    let name = backup.name_any();
    let namespace = backup
        .namespace()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;

    let state = observe(ctx.client.as_ref(), &name, &namespace, &ctx.backup_image).await?;
    let decision = decide(state.as_ref());
    info!(note = decision.note, "decided next step");

    if let Some(action) = &decision.action {
        execute(ctx.client.as_ref(), action).await?;
    }

    if let (Some(event), Some(state)) = (&decision.event, &state) {
        let object_ref: ObjectReference = state.backup.object_ref(&());
        ctx.events
            .publish(
                &object_ref,
                event.event_type(),
                event.reason(),
                event.action(),
                Some(event.note()),
            )
            .await;
    }

    Ok(Action::await_change())
}

/// Error policy for the EtcdBackup controller
pub fn error_policy(backup: Arc<EtcdBackup>, error: &Error, _ctx: Arc<BackupContext>) -> Action {
    warn!(
        ?error,
        backup = %backup.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(Duration::from_secs(REQUEUE_ERROR_SECS))
    } else {
        // Permanent error - requires spec change to fix
        Action::await_change()
    }
}
