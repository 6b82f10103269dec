//! Kubernetes Events for EtcdBackup phase changes
//!
//! Publishing never fails a pass. A rejected event is logged and dropped.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
#[cfg(test)]
use mockall::automock;
use tracing::warn;

/// Env var naming the operator pod, recorded as the reporting instance
const INSTANCE_ENV: &str = "POD_NAME";

/// Sink for events about a single object
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Record `reason`/`action` against `resource_ref`
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Publisher backed by the events API
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Report as `controller`, from the pod named by `POD_NAME` when set
    pub fn new(client: Client, controller: &str) -> Self {
        let reporter = reporter(controller, std::env::var(INSTANCE_ENV).ok());
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

fn reporter(controller: &str, instance: Option<String>) -> Reporter {
    Reporter {
        controller: controller.to_string(),
        instance: instance.filter(|i| !i.is_empty()),
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(
                reason,
                object = ?resource_ref.name,
                namespace = ?resource_ref.namespace,
                error = %e,
                "dropping event"
            );
        }
    }
}

/// Drops everything; used where no recorder is wanted
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Event reasons
pub mod reasons {
    /// The backup pod was created
    pub const SUCCESSFUL_CREATE: &str = "SuccessfulCreate";
    /// The backup pod failed
    pub const BACKUP_FAILED: &str = "BackupFailed";
    /// The backup pod succeeded
    pub const BACKUP_SUCCEEDED: &str = "BackupSucceeded";
}

/// Event actions
pub mod actions {
    /// The backup pod was created
    pub const CREATE: &str = "Create";
    /// The backup phase was written
    pub const UPDATE_STATUS: &str = "UpdateStatus";
}
