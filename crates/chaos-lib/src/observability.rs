//! Observability infrastructure for the experiment
//!
//! Provides:
//! - Prometheus metrics (run results, helper wait latency, effective cores, warnings)
//! - Structured JSON logging with tracing

use crate::error::RunResult;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for helper wait durations (in seconds)
const WAIT_BUCKETS: &[f64] = &[1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ExperimentMetricsInner> = OnceLock::new();

struct ExperimentMetricsInner {
    runs: IntCounterVec,
    warnings: IntCounterVec,
    helper_wait_seconds: HistogramVec,
    cpu_cores: IntGauge,
}

impl ExperimentMetricsInner {
    fn new() -> Self {
        Self {
            runs: register_int_counter_vec!(
                "node_cpu_hog_runs_total",
                "Experiment runs by terminal result",
                &["result"]
            )
            .expect("Failed to register runs_total"),

            warnings: register_int_counter_vec!(
                "node_cpu_hog_warnings_total",
                "Non-fatal problems recorded during runs",
                &["kind"]
            )
            .expect("Failed to register warnings_total"),

            helper_wait_seconds: register_histogram_vec!(
                "node_cpu_hog_helper_wait_seconds",
                "Time spent waiting on the helper pod per phase",
                &["phase"],
                WAIT_BUCKETS.to_vec()
            )
            .expect("Failed to register helper_wait_seconds"),

            cpu_cores: register_int_gauge!(
                "node_cpu_hog_cpu_cores",
                "Cores saturated by the current run"
            )
            .expect("Failed to register cpu_cores"),
        }
    }
}

/// Experiment metrics for Prometheus exposition
///
/// Clones share the same underlying global metrics.
#[derive(Clone)]
pub struct ExperimentMetrics {
    _private: (),
}

impl Default for ExperimentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ExperimentMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ExperimentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ExperimentMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn inc_run(&self, result: &str) {
        self.inner().runs.with_label_values(&[result]).inc();
    }

    pub fn inc_warning(&self, kind: &str) {
        self.inner().warnings.with_label_values(&[kind]).inc();
    }

    /// Record how long a helper wait phase ("running", "completion") took
    pub fn observe_helper_wait(&self, phase: &str, duration_secs: f64) {
        self.inner()
            .helper_wait_seconds
            .with_label_values(&[phase])
            .observe(duration_secs);
    }

    pub fn set_cpu_cores(&self, cores: i64) {
        self.inner().cpu_cores.set(cores);
    }
}

/// Structured logger for experiment milestones
#[derive(Clone)]
pub struct StructuredLogger {
    experiment: String,
    run_id: String,
}

impl StructuredLogger {
    pub fn new(experiment: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            experiment: experiment.into(),
            run_id: run_id.into(),
        }
    }

    pub fn log_run_started(&self, app_namespace: &str, app_label: &str, duration_secs: u64) {
        info!(
            event = "experiment_started",
            experiment = %self.experiment,
            run_id = %self.run_id,
            app_namespace = %app_namespace,
            app_label = %app_label,
            chaos_duration_secs = duration_secs,
            "Node cpu hog experiment started"
        );
    }

    /// Log the details of the application under chaos
    pub fn log_target(&self, node: &str, cpu_cores: u32) {
        info!(
            event = "target_selected",
            experiment = %self.experiment,
            run_id = %self.run_id,
            node = %node,
            cpu_cores = cpu_cores,
            "Details of application under chaos injection"
        );
    }

    pub fn log_ramp(&self, when: &str, ramp_secs: u64) {
        info!(
            event = "ramp_wait",
            experiment = %self.experiment,
            run_id = %self.run_id,
            when = %when,
            ramp_secs = ramp_secs,
            "Waiting for the ramp time {} injecting chaos",
            when
        );
    }

    pub fn log_injection(&self, node: &str, helper: &str) {
        info!(
            event = "chaos_injected",
            experiment = %self.experiment,
            run_id = %self.run_id,
            node = %node,
            helper = %helper,
            "Injecting cpu hog on target node"
        );
    }

    pub fn log_warning(&self, kind: &str, message: &str) {
        warn!(
            event = "experiment_warning",
            experiment = %self.experiment,
            run_id = %self.run_id,
            kind = %kind,
            message = %message,
            "Non-fatal problem during experiment"
        );
    }

    pub fn log_result(&self, result: RunResult, node: Option<&str>, message: Option<&str>) {
        match result {
            RunResult::Completed => info!(
                event = "experiment_finished",
                experiment = %self.experiment,
                run_id = %self.run_id,
                result = %result,
                node = ?node,
                "Node cpu hog experiment completed"
            ),
            _ => warn!(
                event = "experiment_finished",
                experiment = %self.experiment,
                run_id = %self.run_id,
                result = %result,
                node = ?node,
                message = ?message,
                "Node cpu hog experiment failed"
            ),
        }
    }
}
