//! Kubernetes-backed implementation of [`ClusterClient`]

use super::ClusterClient;
use crate::models::{ChaosEvent, HelperSpec, Instance, NodeDescriptor, WorkloadPhase};
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, Event, Node, ObjectReference, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;
use std::collections::BTreeMap;
use tracing::debug;

/// Kind of the object that owns chaos events
const ENGINE_KIND: &str = "ChaosEngine";
const ENGINE_API_VERSION: &str = "litmuschaos.io/v1alpha1";

/// Cluster client talking to the Kubernetes API server
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from in-cluster config or the local kubeconfig
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default()
            .await
            .context("Failed to create Kubernetes client")?;
        Ok(Self::new(client))
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn nodes(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn list_instances(&self, namespace: &str, label_selector: &str) -> Result<Vec<Instance>> {
        let pods = self
            .pods(namespace)
            .list(&ListParams::default().labels(label_selector))
            .await
            .with_context(|| format!("Failed to list pods in namespace {}", namespace))?;

        Ok(pods.items.iter().filter_map(running_instance).collect())
    }

    async fn get_node(&self, name: &str) -> Result<NodeDescriptor> {
        let node = self
            .nodes()
            .get(name)
            .await
            .with_context(|| format!("Failed to get node {}", name))?;

        Ok(node_descriptor(name, &node))
    }

    async fn create_workload(&self, spec: &HelperSpec) -> Result<()> {
        let pod = helper_pod(spec);
        self.pods(&spec.namespace)
            .create(&PostParams::default(), &pod)
            .await
            .with_context(|| format!("Failed to create pod {}", spec.name))?;

        debug!(pod = %spec.name, namespace = %spec.namespace, "Created helper pod");
        Ok(())
    }

    async fn get_workload_phase(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Option<WorkloadPhase>> {
        let pods = self
            .pods(namespace)
            .list(&ListParams::default().labels(label_selector))
            .await
            .with_context(|| format!("Failed to list pods with label {}", label_selector))?;

        Ok(pods.items.first().map(|pod| {
            pod.status
                .as_ref()
                .and_then(|status| status.phase.as_deref())
                .map(WorkloadPhase::from_phase)
                .unwrap_or(WorkloadPhase::Unknown)
        }))
    }

    async fn delete_workload(&self, namespace: &str, label_selector: &str) -> Result<()> {
        self.pods(namespace)
            .delete_collection(
                &DeleteParams::default(),
                &ListParams::default().labels(label_selector),
            )
            .await
            .with_context(|| format!("Failed to delete pods with label {}", label_selector))?;
        Ok(())
    }

    async fn get_node_readiness(&self, name: &str) -> Result<bool> {
        let node = self
            .nodes()
            .get(name)
            .await
            .with_context(|| format!("Failed to get node {}", name))?;

        Ok(is_node_ready(&node))
    }

    async fn emit_event(&self, event: &ChaosEvent) -> Result<()> {
        let api: Api<Event> = Api::namespaced(self.client.clone(), &event.namespace);
        api.create(&PostParams::default(), &kube_event(event))
            .await
            .with_context(|| format!("Failed to create {} event", event.reason))?;
        Ok(())
    }
}

/// Convert a pod into an instance if it is running on a node
fn running_instance(pod: &Pod) -> Option<Instance> {
    let phase = pod.status.as_ref()?.phase.as_deref()?;
    if phase != "Running" {
        return None;
    }

    let node_name = pod.spec.as_ref()?.node_name.clone()?;
    Some(Instance {
        name: pod.metadata.name.clone().unwrap_or_default(),
        node_name,
    })
}

fn node_descriptor(name: &str, node: &Node) -> NodeDescriptor {
    let status = node.status.as_ref();
    let cpu = |resources: Option<&BTreeMap<String, Quantity>>| {
        resources
            .and_then(|resources| resources.get("cpu"))
            .map(|quantity| quantity.0.clone())
    };

    // Capacity only when the kubelet has not reported allocatable
    let cpu_allocatable = cpu(status.and_then(|s| s.allocatable.as_ref()))
        .or_else(|| cpu(status.and_then(|s| s.capacity.as_ref())))
        .unwrap_or_default();

    NodeDescriptor {
        name: name.to_string(),
        cpu_allocatable,
        ready: is_node_ready(node),
    }
}

fn is_node_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

/// Render the helper spec as a pod pinned to its node
pub(crate) fn helper_pod(spec: &HelperSpec) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(spec.name.clone()),
            namespace: Some(spec.namespace.clone()),
            labels: Some(spec.labels.clone()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            restart_policy: Some(spec.restart_policy.to_string()),
            node_name: Some(spec.node_name.clone()),
            containers: vec![Container {
                name: spec.container_name.clone(),
                image: Some(spec.image.clone()),
                image_pull_policy: Some("Always".to_string()),
                command: Some(spec.command.clone()),
                args: Some(spec.args.clone()),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn kube_event(event: &ChaosEvent) -> Event {
    let now = chrono::Utc::now();
    Event {
        metadata: ObjectMeta {
            name: Some(format!(
                "{}.{:x}",
                event.involved_object,
                now.timestamp_nanos_opt().unwrap_or_default()
            )),
            namespace: Some(event.namespace.clone()),
            ..Default::default()
        },
        involved_object: ObjectReference {
            api_version: Some(ENGINE_API_VERSION.to_string()),
            kind: Some(ENGINE_KIND.to_string()),
            name: Some(event.involved_object.clone()),
            namespace: Some(event.namespace.clone()),
            ..Default::default()
        },
        reason: Some(event.reason.clone()),
        message: Some(event.message.clone()),
        type_: Some(event.event_type.clone()),
        count: Some(1),
        first_timestamp: Some(Time(now)),
        last_timestamp: Some(Time(now)),
        ..Default::default()
    }
}
