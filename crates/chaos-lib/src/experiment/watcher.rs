//! Helper pod phase polling
//!
//! Two sequential phases: wait for the pod to start running, then wait for
//! it to reach a terminal phase within the chaos window plus a grace period.

use crate::clock::{poll_attempts, Clock};
use crate::cluster::ClusterClient;
use crate::error::{ChaosError, Result};
use crate::models::WorkloadPhase;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Interval between completion polls
pub const COMPLETION_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default slack absorbing scheduling and image pull latency
pub const DEFAULT_COMPLETION_GRACE_SECS: u64 = 30;

/// Upper bound of the completion phase
pub fn completion_bound(chaos_duration_secs: u64, grace_secs: u64) -> Duration {
    Duration::from_secs(chaos_duration_secs.saturating_add(grace_secs))
}

/// Polls the phase of the pod matched by a label selector
pub struct CompletionWatcher {
    client: Arc<dyn ClusterClient>,
    clock: Arc<dyn Clock>,
    namespace: String,
    selector: String,
}

impl CompletionWatcher {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        clock: Arc<dyn Clock>,
        namespace: impl Into<String>,
        selector: impl Into<String>,
    ) -> Self {
        Self {
            client,
            clock,
            namespace: namespace.into(),
            selector: selector.into(),
        }
    }

    /// Poll every `delay` until the pod is running, for at most `timeout`
    ///
    /// A pod that already succeeded also counts as having run.
    pub async fn wait_until_running(
        &self,
        timeout: Duration,
        delay: Duration,
    ) -> Result<WorkloadPhase> {
        let not_running = |reason: String| ChaosError::HelperNotRunning {
            name: self.selector.clone(),
            reason,
        };

        let attempts = poll_attempts(timeout, delay);
        let mut last_seen = None;

        for attempt in 1..=attempts {
            let phase = self
                .client
                .get_workload_phase(&self.namespace, &self.selector)
                .await
                .map_err(|e| not_running(format!("{:#}", e)))?;

            match phase {
                Some(phase @ (WorkloadPhase::Running | WorkloadPhase::Succeeded)) => {
                    info!(selector = %self.selector, %phase, attempt, "Helper pod is running");
                    return Ok(phase);
                }
                Some(WorkloadPhase::Failed) => {
                    return Err(not_running("pod failed before running".to_string()));
                }
                other => {
                    debug!(selector = %self.selector, phase = ?other, attempt, "Waiting for helper pod to run");
                    last_seen = other;
                }
            }

            if attempt < attempts {
                self.clock.sleep(delay).await;
            }
        }

        Err(not_running(format!(
            "timed out after {}s, last phase {}",
            timeout.as_secs(),
            last_seen.map(|p| p.to_string()).unwrap_or_else(|| "absent".to_string())
        )))
    }

    /// Poll once per second until the pod terminates, for at most `bound`
    pub async fn wait_for_completion(&self, bound: Duration) -> Result<WorkloadPhase> {
        let helper_failed = |reason: String| ChaosError::HelperFailed {
            name: self.selector.clone(),
            reason,
        };

        info!(selector = %self.selector, bound_secs = bound.as_secs(), "Waiting for helper pod to complete");

        let attempts = poll_attempts(bound, COMPLETION_POLL_INTERVAL);
        for attempt in 1..=attempts {
            let phase = self
                .client
                .get_workload_phase(&self.namespace, &self.selector)
                .await
                .map_err(|e| helper_failed(format!("{:#}", e)))?;

            match phase {
                Some(WorkloadPhase::Succeeded) => return Ok(WorkloadPhase::Succeeded),
                Some(WorkloadPhase::Failed) => {
                    return Err(helper_failed("pod phase is Failed".to_string()));
                }
                None => return Err(helper_failed("pod disappeared".to_string())),
                Some(_) => {}
            }

            if attempt < attempts {
                self.clock.sleep(COMPLETION_POLL_INTERVAL).await;
            }
        }

        Err(helper_failed(format!(
            "did not complete within {}s",
            bound.as_secs()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::tests::{FakeCluster, TestClock};
    use crate::models::WorkloadPhase::*;

    fn watcher(cluster: FakeCluster, clock: Arc<TestClock>) -> CompletionWatcher {
        CompletionWatcher::new(Arc::new(cluster), clock, "litmus", "name=hog-abc")
    }

    #[test]
    fn test_completion_bound_adds_grace() {
        assert_eq!(completion_bound(60, 30), Duration::from_secs(90));
        assert_eq!(completion_bound(0, DEFAULT_COMPLETION_GRACE_SECS), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_running_after_pending() {
        let clock = Arc::new(TestClock::new());
        let cluster = FakeCluster::new().with_phases(vec![Pending, Pending, Running]);
        let watcher = watcher(cluster, clock.clone());

        let phase = watcher
            .wait_until_running(Duration::from_secs(10), Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(phase, Running);
        assert_eq!(clock.total_slept(), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_already_succeeded_counts_as_running() {
        let clock = Arc::new(TestClock::new());
        let watcher = watcher(
            FakeCluster::new().with_phases(vec![Pending, Succeeded]),
            clock.clone(),
        );

        let phase = watcher
            .wait_until_running(Duration::from_secs(10), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(phase, Succeeded);
        assert_eq!(clock.sleeps(), 1);

        let phase = watcher
            .wait_for_completion(completion_bound(60, 30))
            .await
            .unwrap();
        assert_eq!(phase, Succeeded);
    }

    #[tokio::test]
    async fn test_never_running_times_out() {
        let clock = Arc::new(TestClock::new());
        let cluster = FakeCluster::new().with_phases(vec![Pending]);
        let watcher = watcher(cluster, clock.clone());

        let err = watcher
            .wait_until_running(Duration::from_secs(10), Duration::from_secs(2))
            .await
            .unwrap_err();

        assert!(matches!(err, ChaosError::HelperNotRunning { .. }));
        assert_eq!(clock.sleeps(), 4);
    }

    #[tokio::test]
    async fn test_failed_before_running() {
        let watcher = watcher(
            FakeCluster::new().with_phases(vec![Pending, Failed]),
            Arc::new(TestClock::new()),
        );

        let err = watcher
            .wait_until_running(Duration::from_secs(10), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ChaosError::HelperNotRunning { .. }));
    }

    #[tokio::test]
    async fn test_completion_returns_succeeded() {
        let clock = Arc::new(TestClock::new());
        let watcher = watcher(
            FakeCluster::new().with_phases(vec![Running, Running, Succeeded]),
            clock.clone(),
        );

        let phase = watcher
            .wait_for_completion(completion_bound(60, 30))
            .await
            .unwrap();

        assert_eq!(phase, Succeeded);
        assert_eq!(clock.total_slept(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_completion_failed_phase() {
        let watcher = watcher(
            FakeCluster::new().with_phases(vec![Running, Failed]),
            Arc::new(TestClock::new()),
        );

        let err = watcher.wait_for_completion(Duration::from_secs(90)).await.unwrap_err();
        assert!(matches!(err, ChaosError::HelperFailed { .. }));
    }

    #[tokio::test]
    async fn test_completion_bound_elapses() {
        let clock = Arc::new(TestClock::new());
        let watcher = watcher(FakeCluster::new().with_phases(vec![Running]), clock.clone());

        let err = watcher
            .wait_for_completion(completion_bound(60, 30))
            .await
            .unwrap_err();

        assert!(matches!(err, ChaosError::HelperFailed { .. }));
        assert_eq!(clock.total_slept(), Duration::from_secs(89));
    }
}
