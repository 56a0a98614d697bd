//! Post-fault node readiness check

use crate::clock::{poll_attempts, Clock};
use crate::cluster::ClusterClient;
use crate::error::{ChaosError, Result};
use crate::models::TargetNode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Re-checks that the target node reports Ready after the fault window
pub struct HealthVerifier {
    client: Arc<dyn ClusterClient>,
    clock: Arc<dyn Clock>,
}

impl HealthVerifier {
    pub fn new(client: Arc<dyn ClusterClient>, clock: Arc<dyn Clock>) -> Self {
        Self { client, clock }
    }

    /// Poll node readiness every `delay` for at most `timeout`
    ///
    /// Lookup errors count as "not ready yet"; the node may be flapping while
    /// it recovers. The returned error is a warning for the caller.
    pub async fn verify(&self, node: &TargetNode, timeout: Duration, delay: Duration) -> Result<()> {
        let attempts = poll_attempts(timeout, delay);

        for attempt in 1..=attempts {
            match self.client.get_node_readiness(node.name()).await {
                Ok(true) => {
                    info!(node = %node, attempt, "Target node is ready");
                    return Ok(());
                }
                Ok(false) => debug!(node = %node, attempt, "Target node not ready yet"),
                Err(e) => debug!(node = %node, attempt, error = %e, "Failed to read node readiness"),
            }

            if attempt < attempts {
                self.clock.sleep(delay).await;
            }
        }

        Err(ChaosError::NodeUnhealthyAfterFault {
            node: node.name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::tests::{FakeCluster, TestClock};

    #[tokio::test]
    async fn test_ready_node_passes() {
        let cluster = Arc::new(FakeCluster::new().with_node("node-a", "4", true));
        let verifier = HealthVerifier::new(cluster, Arc::new(TestClock::new()));

        verifier
            .verify(&TargetNode::new("node-a"), Duration::from_secs(10), Duration::from_secs(2))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_node_recovering_within_timeout() {
        let cluster = Arc::new(
            FakeCluster::new()
                .with_node("node-a", "4", true)
                .with_readiness(vec![false, false, true]),
        );
        let clock = Arc::new(TestClock::new());
        let verifier = HealthVerifier::new(cluster, clock.clone());

        verifier
            .verify(&TargetNode::new("node-a"), Duration::from_secs(10), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(clock.sleeps(), 2);
    }

    #[tokio::test]
    async fn test_lookup_errors_count_as_not_ready() {
        let cluster = Arc::new(
            FakeCluster::new()
                .with_node("node-a", "4", true)
                .with_readiness_errors(2),
        );
        let clock = Arc::new(TestClock::new());
        let verifier = HealthVerifier::new(cluster.clone(), clock.clone());

        verifier
            .verify(&TargetNode::new("node-a"), Duration::from_secs(10), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(cluster.calls().get_node_readiness, 3);
        assert_eq!(clock.sleeps(), 2);
    }

    #[tokio::test]
    async fn test_persistent_lookup_errors_are_warning() {
        let cluster = Arc::new(
            FakeCluster::new()
                .with_node("node-a", "4", true)
                .failing_readiness(),
        );
        let verifier = HealthVerifier::new(cluster.clone(), Arc::new(TestClock::new()));

        let err = verifier
            .verify(&TargetNode::new("node-a"), Duration::from_secs(6), Duration::from_secs(2))
            .await
            .unwrap_err();

        assert!(matches!(err, ChaosError::NodeUnhealthyAfterFault { .. }));
        assert_eq!(cluster.calls().get_node_readiness, 3);
    }

    #[tokio::test]
    async fn test_unready_node_is_warning() {
        let cluster = Arc::new(FakeCluster::new().with_node("node-a", "4", false));
        let verifier = HealthVerifier::new(cluster, Arc::new(TestClock::new()));

        let err = verifier
            .verify(&TargetNode::new("node-a"), Duration::from_secs(6), Duration::from_secs(2))
            .await
            .unwrap_err();

        assert!(matches!(err, ChaosError::NodeUnhealthyAfterFault { .. }));
        assert!(err.is_warning());
    }
}
