//! Helper pod lifecycle
//!
//! Builds the disposable stress pod pinned to the target node, submits it
//! once, and removes it by label during cleanup.

use crate::clock::{poll_attempts, Clock};
use crate::cluster::ClusterClient;
use crate::error::{ChaosError, Result};
use crate::models::{ExperimentConfig, HelperSpec, RestartPolicy, TargetNode, STRESS_COMMAND};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Label keys stamped on every helper pod
pub mod labels {
    pub const APP: &str = "app";
    pub const NAME: &str = "name";
    pub const CHAOS_UID: &str = "chaosUID";
}

/// Build the helper pod spec for this run
pub fn build_helper_spec(
    config: &ExperimentConfig,
    node: &TargetNode,
    cpu_cores: u32,
) -> HelperSpec {
    let name = config.helper_name();
    let labels = BTreeMap::from([
        (labels::APP.to_string(), config.experiment_name.clone()),
        (labels::NAME.to_string(), name.clone()),
        (labels::CHAOS_UID.to_string(), config.chaos_uid.clone()),
    ]);

    HelperSpec {
        name,
        namespace: config.chaos_namespace.clone(),
        labels,
        node_name: node.name().to_string(),
        container_name: config.experiment_name.clone(),
        image: config.lib_image.clone(),
        command: vec![STRESS_COMMAND.to_string()],
        args: vec![
            "--cpu".to_string(),
            cpu_cores.to_string(),
            "--timeout".to_string(),
            config.chaos_duration_secs.to_string(),
        ],
        restart_policy: RestartPolicy::Never,
    }
}

/// Creates and deletes the run's helper pod
pub struct HelperWorkloadManager {
    client: Arc<dyn ClusterClient>,
    clock: Arc<dyn Clock>,
}

impl HelperWorkloadManager {
    pub fn new(client: Arc<dyn ClusterClient>, clock: Arc<dyn Clock>) -> Self {
        Self { client, clock }
    }

    /// Submit the helper pod; a rejected submission is not retried
    pub async fn create(&self, spec: &HelperSpec) -> Result<()> {
        self.client
            .create_workload(spec)
            .await
            .map_err(|e| ChaosError::HelperCreationFailed {
                name: spec.name.clone(),
                reason: format!("{:#}", e),
            })?;

        info!(
            pod = %spec.name,
            node = %spec.node_name,
            args = ?spec.args,
            "Helper pod created"
        );
        Ok(())
    }

    /// Delete the helper pod by label and wait until it is gone
    pub async fn delete(&self, config: &ExperimentConfig) -> Result<()> {
        let name = config.helper_name();
        let selector = config.helper_selector();
        let namespace = &config.chaos_namespace;
        let cleanup_failed = |reason: String| ChaosError::CleanupFailed {
            name: name.clone(),
            reason,
        };

        self.client
            .delete_workload(namespace, &selector)
            .await
            .map_err(|e| cleanup_failed(format!("{:#}", e)))?;

        let attempts = poll_attempts(config.poll_timeout(), config.poll_delay());
        for attempt in 1..=attempts {
            match self.client.get_workload_phase(namespace, &selector).await {
                Ok(None) => {
                    info!(pod = %name, "Helper pod deleted");
                    return Ok(());
                }
                Ok(Some(phase)) => {
                    debug!(pod = %name, %phase, attempt, "Helper pod still terminating");
                }
                Err(e) => return Err(cleanup_failed(format!("{:#}", e))),
            }

            if attempt < attempts {
                self.clock.sleep(config.poll_delay()).await;
            }
        }

        Err(cleanup_failed(format!(
            "pod still present after {}s",
            config.timeout_secs
        )))
    }
}
