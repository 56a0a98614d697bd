//! Cluster API capability used by the experiment
//!
//! The experiment never talks to Kubernetes directly; every read and write
//! goes through [`ClusterClient`] so a fake cluster can stand in for tests.

mod kubernetes;

pub use kubernetes::KubeCluster;

use crate::models::{ChaosEvent, HelperSpec, Instance, NodeDescriptor, WorkloadPhase};
use anyhow::Result;

pub use async_trait::async_trait;

/// Operations the experiment needs from the cluster
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// List running instances matching `label_selector` in `namespace`
    async fn list_instances(&self, namespace: &str, label_selector: &str) -> Result<Vec<Instance>>;

    /// Read a node's descriptor
    async fn get_node(&self, name: &str) -> Result<NodeDescriptor>;

    /// Submit the helper pod
    async fn create_workload(&self, spec: &HelperSpec) -> Result<()>;

    /// Phase of the workload matching `label_selector`, `None` when nothing matches
    async fn get_workload_phase(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Option<WorkloadPhase>>;

    /// Delete every workload matching `label_selector`
    async fn delete_workload(&self, namespace: &str, label_selector: &str) -> Result<()>;

    /// Whether the node reports a Ready condition of True
    async fn get_node_readiness(&self, name: &str) -> Result<bool>;

    /// Publish a notification event
    async fn emit_event(&self, event: &ChaosEvent) -> Result<()>;
}
