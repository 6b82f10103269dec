//! etcd-operator - Kubernetes operator for etcd clusters and their backups

use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};

use etcd_operator::controller::{backup, cluster, BackupContext, ClusterContext};
use etcd_operator::crd::{EtcdBackup, EtcdCluster};
use etcd_operator::retry::{retry_with_backoff, RetryConfig};
use etcd_operator::telemetry::init_tracing;
use etcd_operator::DEFAULT_BACKUP_IMAGE;

/// Field manager used when installing CRDs
const CRD_FIELD_MANAGER: &str = "etcd-operator";

/// etcd-operator - manages etcd clusters and etcd backups
#[derive(Parser, Debug)]
#[command(name = "etcd-operator", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    /// Image of the backup executable run in backup pods
    #[arg(long, env = "BACKUP_IMAGE", default_value = DEFAULT_BACKUP_IMAGE)]
    backup_image: String,

    /// Attempts per object when writes hit resourceVersion conflicts
    #[arg(long, env = "CONFLICT_RETRIES", default_value_t = 5)]
    conflict_retries: u32,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the EtcdCluster and EtcdBackup controllers (default mode)
    Controller,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        for crd in [EtcdCluster::crd(), EtcdBackup::crd()] {
            let yaml = serde_yaml::to_string(&crd)
                .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
            println!("---\n{yaml}");
        }
        return Ok(());
    }

    init_tracing().map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    match cli.command {
        Some(Commands::Controller) | None => run_controller(cli).await,
    }
}

/// Ensure both etcd CRDs are installed
///
/// The operator installs its own CRDs on startup using server-side apply so
/// the CRD versions always match the operator version.
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(CRD_FIELD_MANAGER).force();
    let retry = RetryConfig::with_max_attempts(5);

    for crd in [EtcdCluster::crd(), EtcdBackup::crd()] {
        let name = crd
            .metadata
            .name
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generated CRD has no name"))?;

        tracing::info!(crd = %name, "Installing CRD");
        let patch = Patch::Apply(&crd);
        retry_with_backoff(&retry, "install_crd", || {
            crds.patch(&name, &params, &patch)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Failed to install CRD {}: {}", name, e))?;
    }

    tracing::info!("All etcd CRDs installed/updated");
    Ok(())
}

/// Run both controllers until a shutdown signal arrives
async fn run_controller(cli: Cli) -> anyhow::Result<()> {
    tracing::info!("Starting etcd-operator controller");

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    ensure_crds_installed(&client).await?;

    let conflict_retry = RetryConfig {
        max_attempts: cli.conflict_retries,
        ..RetryConfig::conflict()
    };
    let cluster_ctx = Arc::new(ClusterContext::new(client.clone(), conflict_retry));
    let backup_ctx = Arc::new(BackupContext::from_client(
        client.clone(),
        cli.backup_image.clone(),
    ));

    tracing::info!(backup_image = %cli.backup_image, "Controllers configured");

    let cluster_controller = Controller::new(
        Api::<EtcdCluster>::all(client.clone()),
        WatcherConfig::default(),
    )
    .owns(Api::<Service>::all(client.clone()), WatcherConfig::default())
    .owns(
        Api::<StatefulSet>::all(client.clone()),
        WatcherConfig::default(),
    )
    .shutdown_on_signal()
    .run(cluster::reconcile, cluster::error_policy, cluster_ctx)
    .for_each(|result| async move {
        match result {
            Ok(action) => {
                tracing::debug!(?action, "Cluster reconciliation completed");
            }
            Err(e) => {
                tracing::error!(error = ?e, "Cluster reconciliation error");
            }
        }
    });

    let backup_controller = Controller::new(
        Api::<EtcdBackup>::all(client.clone()),
        WatcherConfig::default(),
    )
    .owns(Api::<Pod>::all(client.clone()), WatcherConfig::default())
    .shutdown_on_signal()
    .run(backup::reconcile, backup::error_policy, backup_ctx)
    .for_each(|result| async move {
        match result {
            Ok(action) => {
                tracing::debug!(?action, "Backup reconciliation completed");
            }
            Err(e) => {
                tracing::error!(error = ?e, "Backup reconciliation error");
            }
        }
    });

    tokio::join!(cluster_controller, backup_controller);

    tracing::info!("Controllers stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["etcd-operator"]).unwrap();
        assert!(!cli.crd);
        assert!(cli.command.is_none());
        assert_eq!(cli.conflict_retries, 5);
    }

    #[test]
    fn test_controller_subcommand() {
        let cli = Cli::try_parse_from(["etcd-operator", "--conflict-retries", "2", "controller"])
            .unwrap();
        assert!(matches!(cli.command, Some(Commands::Controller)));
        assert_eq!(cli.conflict_retries, 2);
    }
}
