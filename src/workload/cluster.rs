//! Mutate functions for EtcdCluster workloads
//!
//! Each function receives either a fresh skeleton or the live object and
//! sets only the fields the operator owns. Everything else on the object,
//! including fields the API server fills in, is left as found so that an
//! unchanged cluster converges to no write at all.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PodTemplateSpec, Service, ServicePort, ServiceSpec, VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::ResourceExt;

use super::{merge_labels, standard_labels, LABEL_INSTANCE, LABEL_NAME};
use crate::crd::EtcdCluster;
use crate::kube_utils::set_controller_reference;
use crate::{Error, Result};

/// `app.kubernetes.io/name` of etcd members
pub const ETCD_APP_NAME: &str = "etcd";
/// Name of the etcd container in the member pod template
pub const ETCD_CONTAINER_NAME: &str = "etcd";
/// Name of the member data volume claim template
pub const DATA_VOLUME_NAME: &str = "datadir";
/// Client port
pub const CLIENT_PORT: i32 = 2379;
/// Peer port
pub const PEER_PORT: i32 = 2380;

const DATA_DIR: &str = "/var/run/etcd";
const DATA_VOLUME_SIZE: &str = "1Gi";

/// Bootstraps a static member list from the StatefulSet's stable pod names
const ETCD_BOOTSTRAP_SCRIPT: &str = r#"HOSTNAME=$(hostname)
PEERS=""
for i in $(seq 0 $((${INITIAL_CLUSTER_SIZE} - 1))); do
  PEERS="${PEERS}${PEERS:+,}${SET_NAME}-${i}=http://${SET_NAME}-${i}.${SET_NAME}:2380"
done
exec etcd --name ${HOSTNAME} \
  --listen-peer-urls http://0.0.0.0:2380 \
  --listen-client-urls http://0.0.0.0:2379 \
  --advertise-client-urls http://${HOSTNAME}.${SET_NAME}:2379 \
  --initial-advertise-peer-urls http://${HOSTNAME}.${SET_NAME}:2380 \
  --initial-cluster-token ${SET_NAME} \
  --initial-cluster ${PEERS} \
  --initial-cluster-state new \
  --data-dir /var/run/etcd/default.etcd
"#;

/// Labels that select the members of `cluster`
pub fn selector_labels(cluster: &EtcdCluster) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_NAME.to_string(), ETCD_APP_NAME.to_string()),
        (LABEL_INSTANCE.to_string(), cluster.name_any()),
    ])
}

fn identity(cluster: &EtcdCluster) -> Result<ObjectMeta> {
    Ok(ObjectMeta {
        name: Some(
            cluster
                .metadata
                .name
                .clone()
                .ok_or(Error::MissingObjectKey(".metadata.name"))?,
        ),
        namespace: Some(
            cluster
                .namespace()
                .ok_or(Error::MissingObjectKey(".metadata.namespace"))?,
        ),
        ..Default::default()
    })
}

/// Service carrying only the identity of `cluster`
pub fn service_skeleton(cluster: &EtcdCluster) -> Result<Service> {
    Ok(Service {
        metadata: identity(cluster)?,
        ..Default::default()
    })
}

/// StatefulSet carrying only the identity of `cluster`
pub fn statefulset_skeleton(cluster: &EtcdCluster) -> Result<StatefulSet> {
    Ok(StatefulSet {
        metadata: identity(cluster)?,
        ..Default::default()
    })
}

/// Shape `svc` into the headless Service fronting the members of `cluster`
pub fn mutate_service(cluster: &EtcdCluster, svc: &mut Service) -> Result<()> {
    let name = cluster.name_any();
    merge_labels(&mut svc.metadata.labels, &standard_labels(ETCD_APP_NAME, &name));

    let spec = svc.spec.get_or_insert_with(ServiceSpec::default);
    if spec.cluster_ip.is_none() {
        // Headless; the address is immutable once assigned
        spec.cluster_ip = Some("None".to_string());
    }
    spec.selector = Some(selector_labels(cluster));
    spec.publish_not_ready_addresses = Some(true);

    let ports = spec.ports.get_or_insert_with(Vec::new);
    upsert_service_port(ports, "peer", PEER_PORT);
    upsert_service_port(ports, "client", CLIENT_PORT);

    set_controller_reference(cluster, &mut svc.metadata)
}

fn upsert_service_port(ports: &mut Vec<ServicePort>, name: &str, port: i32) {
    match ports.iter_mut().find(|p| p.name.as_deref() == Some(name)) {
        Some(existing) => existing.port = port,
        None => ports.push(ServicePort {
            name: Some(name.to_string()),
            port,
            ..Default::default()
        }),
    }
}

/// Shape `sts` into the StatefulSet running the members of `cluster`
pub fn mutate_statefulset(cluster: &EtcdCluster, sts: &mut StatefulSet) -> Result<()> {
    let name = cluster.name_any();
    let selector = selector_labels(cluster);
    merge_labels(&mut sts.metadata.labels, &standard_labels(ETCD_APP_NAME, &name));

    let spec = sts.spec.get_or_insert_with(StatefulSetSpec::default);
    spec.replicas = Some(cluster.spec.replicas());
    spec.service_name = name.clone().into();
    spec.selector = LabelSelector {
        match_labels: Some(selector.clone()),
        ..Default::default()
    };

    mutate_pod_template(cluster, &mut spec.template);

    let claims = spec.volume_claim_templates.get_or_insert_with(Vec::new);
    if claims.is_empty() {
        claims.push(data_volume_claim());
    }

    set_controller_reference(cluster, &mut sts.metadata)
}

fn mutate_pod_template(cluster: &EtcdCluster, template: &mut PodTemplateSpec) {
    let metadata = template.metadata.get_or_insert_with(ObjectMeta::default);
    merge_labels(&mut metadata.labels, &selector_labels(cluster));

    let pod_spec = template.spec.get_or_insert_with(Default::default);
    match pod_spec
        .containers
        .iter_mut()
        .find(|c| c.name == ETCD_CONTAINER_NAME)
    {
        Some(container) => sync_etcd_container(container, etcd_container(cluster)),
        None => pod_spec.containers.push(etcd_container(cluster)),
    }
}

/// Bring the owned fields of a live etcd container in line with `desired`.
///
/// Env vars, ports and mounts are upserted by name so entries added by other
/// writers, and fields the API server defaults (port protocol), survive.
fn sync_etcd_container(live: &mut Container, desired: Container) {
    live.image = desired.image;
    live.command = desired.command;

    let env = live.env.get_or_insert_with(Vec::new);
    for var in desired.env.unwrap_or_default() {
        match env.iter_mut().find(|e| e.name == var.name) {
            Some(existing) => {
                existing.value = var.value;
                existing.value_from = None;
            }
            None => env.push(var),
        }
    }

    let ports = live.ports.get_or_insert_with(Vec::new);
    for port in desired.ports.unwrap_or_default() {
        match ports.iter_mut().find(|p| p.name == port.name) {
            Some(existing) => existing.container_port = port.container_port,
            None => ports.push(port),
        }
    }

    let mounts = live.volume_mounts.get_or_insert_with(Vec::new);
    for mount in desired.volume_mounts.unwrap_or_default() {
        match mounts.iter_mut().find(|m| m.name == mount.name) {
            Some(existing) => existing.mount_path = mount.mount_path,
            None => mounts.push(mount),
        }
    }
}

fn etcd_container(cluster: &EtcdCluster) -> Container {
    Container {
        name: ETCD_CONTAINER_NAME.to_string(),
        image: Some(cluster.spec.image.clone()),
        command: Some(vec![
            "/bin/sh".to_string(),
            "-ec".to_string(),
            ETCD_BOOTSTRAP_SCRIPT.to_string(),
        ]),
        env: Some(vec![
            EnvVar {
                name: "INITIAL_CLUSTER_SIZE".to_string(),
                value: Some(cluster.spec.replicas().to_string()),
                ..Default::default()
            },
            EnvVar {
                name: "SET_NAME".to_string(),
                value: Some(cluster.name_any()),
                ..Default::default()
            },
        ]),
        ports: Some(vec![
            ContainerPort {
                name: Some("peer".to_string()),
                container_port: PEER_PORT,
                ..Default::default()
            },
            ContainerPort {
                name: Some("client".to_string()),
                container_port: CLIENT_PORT,
                ..Default::default()
            },
        ]),
        volume_mounts: Some(vec![VolumeMount {
            name: DATA_VOLUME_NAME.to_string(),
            mount_path: DATA_DIR.to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    }
}

fn data_volume_claim() -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(DATA_VOLUME_NAME.to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(DATA_VOLUME_SIZE.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}
