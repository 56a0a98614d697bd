//! Experiment orchestration
//!
//! Sequences target resolution, core derivation, helper creation, phase
//! polling, node verification and cleanup. Steps never run concurrently and
//! no state is revisited. Once the helper pod exists, cleanup runs on every
//! exit path; node-health and cleanup failures are downgraded to warnings.

use super::capacity::effective_cpu_cores;
use super::helper::{build_helper_spec, HelperWorkloadManager};
use super::node_health::HealthVerifier;
use super::resolver::resolve_target;
use super::watcher::{completion_bound, CompletionWatcher};
use crate::clock::{Clock, TokioClock};
use crate::cluster::ClusterClient;
use crate::error::{ChaosError, Result};
use crate::models::{
    ChaosEvent, ExperimentConfig, RunReport, RunWarning, TargetNode, WorkloadPhase,
    CHAOS_INJECT_REASON,
};
use crate::observability::{ExperimentMetrics, StructuredLogger};
use crate::status::{ExperimentState, StateTracker};
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// A single node cpu hog run
pub struct Experiment {
    config: ExperimentConfig,
    client: Arc<dyn ClusterClient>,
    clock: Arc<dyn Clock>,
    tracker: StateTracker,
    metrics: ExperimentMetrics,
    logger: StructuredLogger,
}

impl Experiment {
    pub fn new(config: ExperimentConfig, client: Arc<dyn ClusterClient>) -> Self {
        let tracker = StateTracker::new(&config.experiment_name, &config.run_id);
        let logger = StructuredLogger::new(&config.experiment_name, &config.run_id);
        Self {
            config,
            client,
            clock: Arc::new(TokioClock),
            tracker,
            metrics: ExperimentMetrics::new(),
            logger,
        }
    }

    /// Replace the clock used for ramp delays and polling
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish state transitions to an externally held tracker
    pub fn with_tracker(mut self, tracker: StateTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    /// Run the experiment to completion
    ///
    /// Returns the report of a completed run, or the error that aborted it
    /// after the cleanup attempt.
    pub async fn run<R: Rng + Send + ?Sized>(&self, rng: &mut R) -> Result<RunReport> {
        let outcome = self.execute(rng).await;

        match &outcome {
            Ok(report) => {
                self.tracker.transition(ExperimentState::Done).await;
                self.metrics.inc_run(report.result().as_str());
                self.logger
                    .log_result(report.result(), Some(report.target_node.name()), None);
            }
            Err(err) => {
                let result = err.result();
                self.tracker.transition(ExperimentState::Error(result)).await;
                self.metrics.inc_run(result.as_str());
                let node = self.tracker.snapshot().await.target_node;
                let message = err.to_string();
                self.logger
                    .log_result(result, node.as_deref(), Some(message.as_str()));
            }
        }

        outcome
    }

    async fn execute<R: Rng + Send + ?Sized>(&self, rng: &mut R) -> Result<RunReport> {
        let config = &self.config;
        config.validate()?;
        self.logger
            .log_run_started(&config.app_namespace, &config.app_label, config.chaos_duration_secs);

        let node =
            resolve_target(self.client.as_ref(), &config.app_namespace, &config.app_label, rng)
                .await?;
        self.tracker.set_target(node.name()).await;
        self.tracker.transition(ExperimentState::TargetResolved).await;

        let cpu_cores =
            effective_cpu_cores(self.client.as_ref(), &node, config.node_cpu_cores).await?;
        if config.node_cpu_cores == 0 {
            self.tracker.transition(ExperimentState::ParametersDerived).await;
        }
        self.tracker.set_cpu_cores(cpu_cores).await;
        self.metrics.set_cpu_cores(cpu_cores as i64);
        self.logger.log_target(node.name(), cpu_cores);

        if config.ramp_time_secs != 0 {
            self.tracker.transition(ExperimentState::RampWaitPre).await;
            self.logger.log_ramp("before", config.ramp_time_secs);
            self.clock.sleep(config.ramp_time()).await;
        }

        self.emit_injection_event(&node).await;

        let manager = HelperWorkloadManager::new(self.client.clone(), self.clock.clone());
        let spec = build_helper_spec(config, &node, cpu_cores);
        manager.create(&spec).await?;
        self.tracker.transition(ExperimentState::HelperCreated).await;
        self.logger.log_injection(node.name(), &spec.name);

        let mut warnings = Vec::new();
        let fault = self.observe_fault(&node, &mut warnings).await;

        info!(pod = %spec.name, "Deleting the helper pod");
        match manager.delete(config).await {
            Ok(()) => self.tracker.transition(ExperimentState::HelperDeleted).await,
            Err(err) => self.record_warning(&err, &mut warnings).await,
        }

        let helper_phase = fault?;

        if config.ramp_time_secs != 0 {
            self.tracker.transition(ExperimentState::RampWaitPost).await;
            self.logger.log_ramp("after", config.ramp_time_secs);
            self.clock.sleep(config.ramp_time()).await;
        }

        Ok(RunReport {
            target_node: node,
            cpu_cores,
            helper_name: spec.name,
            helper_phase,
            warnings,
        })
    }

    /// Wait for the helper to run and finish, then check the node
    async fn observe_fault(
        &self,
        node: &TargetNode,
        warnings: &mut Vec<RunWarning>,
    ) -> Result<WorkloadPhase> {
        let config = &self.config;
        let watcher = CompletionWatcher::new(
            self.client.clone(),
            self.clock.clone(),
            &config.chaos_namespace,
            config.helper_selector(),
        );

        let started = Instant::now();
        watcher
            .wait_until_running(config.poll_timeout(), config.poll_delay())
            .await?;
        self.metrics
            .observe_helper_wait("running", started.elapsed().as_secs_f64());
        self.tracker.transition(ExperimentState::HelperRunning).await;

        let started = Instant::now();
        let bound = completion_bound(config.chaos_duration_secs, config.completion_grace_secs);
        let phase = watcher.wait_for_completion(bound).await?;
        self.metrics
            .observe_helper_wait("completion", started.elapsed().as_secs_f64());
        self.tracker.transition(ExperimentState::HelperCompleted).await;

        let verifier = HealthVerifier::new(self.client.clone(), self.clock.clone());
        if let Err(err) = verifier
            .verify(node, config.poll_timeout(), config.poll_delay())
            .await
        {
            self.record_warning(&err, warnings).await;
        }
        self.tracker.transition(ExperimentState::NodeChecked).await;

        Ok(phase)
    }

    async fn emit_injection_event(&self, node: &TargetNode) {
        let Some(engine) = self.config.engine_name.as_deref().filter(|e| !e.is_empty()) else {
            return;
        };

        let event = ChaosEvent {
            namespace: self.config.chaos_namespace.clone(),
            involved_object: engine.to_string(),
            reason: CHAOS_INJECT_REASON.to_string(),
            message: format!(
                "Injecting {} chaos on {} node",
                self.config.experiment_name, node
            ),
            event_type: "Normal".to_string(),
        };

        if let Err(e) = self.client.emit_event(&event).await {
            warn!(engine = %engine, error = %e, "Failed to emit chaos inject event");
        }
    }

    async fn record_warning(&self, err: &ChaosError, warnings: &mut Vec<RunWarning>) {
        let warning = RunWarning::from(err);
        self.logger
            .log_warning(warning.kind.as_str(), &warning.message);
        self.metrics.inc_warning(warning.kind.as_str());
        self.tracker.add_warning(warning.message.clone()).await;
        warnings.push(warning);
    }
}
