//! Core data models for the node CPU hog experiment

use crate::error::{ChaosError, RunResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Entry point of the stress tool inside the helper image
pub const STRESS_COMMAND: &str = "/stress-ng";

/// Length of generated run identifiers
pub const RUN_ID_LEN: usize = 6;

/// Experiment configuration, read-only for the duration of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Namespace of the application under chaos
    pub app_namespace: String,

    /// Label selector of the application under chaos (e.g. "app=nginx")
    pub app_label: String,

    /// Namespace in which the helper pod is created
    #[serde(default = "default_chaos_namespace")]
    pub chaos_namespace: String,

    #[serde(default = "default_experiment_name")]
    pub experiment_name: String,

    /// Unique token for this run; generated when left empty
    #[serde(default)]
    pub run_id: String,

    /// Correlation id of the parent experiment run
    #[serde(default)]
    pub chaos_uid: String,

    /// Owning chaos engine; event emission is enabled only when present
    #[serde(default)]
    pub engine_name: Option<String>,

    /// Cores to saturate, 0 means "use the node's allocatable cpu"
    #[serde(default, alias = "node_cpu_core")]
    pub node_cpu_cores: u32,

    #[serde(default = "default_chaos_duration", alias = "total_chaos_duration")]
    pub chaos_duration_secs: u64,

    #[serde(default, alias = "ramp_time")]
    pub ramp_time_secs: u64,

    /// Upper bound for readiness style polls
    #[serde(default = "default_timeout", alias = "status_check_timeout")]
    pub timeout_secs: u64,

    /// Interval between readiness style polls
    #[serde(default = "default_delay", alias = "status_check_delay")]
    pub delay_secs: u64,

    /// Image providing the stress tool
    #[serde(default = "default_lib_image")]
    pub lib_image: String,

    /// Slack added to the chaos duration while waiting for helper completion
    #[serde(default = "default_completion_grace")]
    pub completion_grace_secs: u64,
}

fn default_chaos_namespace() -> String {
    "default".to_string()
}

fn default_experiment_name() -> String {
    "node-cpu-hog".to_string()
}

fn default_chaos_duration() -> u64 {
    60
}

fn default_timeout() -> u64 {
    180
}

fn default_delay() -> u64 {
    2
}

fn default_lib_image() -> String {
    "litmuschaos/go-runner:latest".to_string()
}

fn default_completion_grace() -> u64 {
    30
}

impl ExperimentConfig {
    /// Create a configuration with defaults for everything but the target
    pub fn new(app_namespace: impl Into<String>, app_label: impl Into<String>) -> Self {
        Self {
            app_namespace: app_namespace.into(),
            app_label: app_label.into(),
            chaos_namespace: default_chaos_namespace(),
            experiment_name: default_experiment_name(),
            run_id: String::new(),
            chaos_uid: String::new(),
            engine_name: None,
            node_cpu_cores: 0,
            chaos_duration_secs: default_chaos_duration(),
            ramp_time_secs: 0,
            timeout_secs: default_timeout(),
            delay_secs: default_delay(),
            lib_image: default_lib_image(),
            completion_grace_secs: default_completion_grace(),
        }
    }

    /// Check the fields a run cannot proceed without
    pub fn validate(&self) -> Result<(), ChaosError> {
        let required = [
            ("app_namespace", &self.app_namespace),
            ("app_label", &self.app_label),
            ("chaos_namespace", &self.chaos_namespace),
            ("experiment_name", &self.experiment_name),
            ("run_id", &self.run_id),
            ("lib_image", &self.lib_image),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ChaosError::InvalidConfig(format!("{} must not be empty", field)));
            }
        }

        if self.delay_secs == 0 {
            return Err(ChaosError::InvalidConfig(
                "delay_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Fill in a fresh run id if none was supplied
    pub fn ensure_run_id<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.run_id.trim().is_empty() {
            self.run_id = generate_run_id(rng);
        }
    }

    /// Name of this run's helper pod
    pub fn helper_name(&self) -> String {
        format!("{}-{}", self.experiment_name, self.run_id)
    }

    /// Label selector matching only this run's helper pod
    pub fn helper_selector(&self) -> String {
        format!("name={}", self.helper_name())
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    pub fn ramp_time(&self) -> Duration {
        Duration::from_secs(self.ramp_time_secs)
    }
}

/// Generate a short lowercase run identifier
pub fn generate_run_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..RUN_ID_LEN)
        .map(|_| char::from(b'a' + rng.gen_range(0..26u8)))
        .collect()
}

/// A running instance of the application under chaos
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    /// Node the instance is scheduled on; empty while unscheduled
    pub node_name: String,
}

/// The subset of a node's description the experiment reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub name: String,
    /// Allocatable CPU as a Kubernetes quantity string ("4", "3500m")
    pub cpu_allocatable: String,
    pub ready: bool,
}

/// Node selected to receive the fault
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetNode(String);

impl TargetNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TargetNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Restart behaviour of the helper pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartPolicy {
    Never,
}

impl std::fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestartPolicy::Never => write!(f, "Never"),
        }
    }
}

/// Specification of the disposable CPU hog pod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperSpec {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    /// Node the pod is bound to, bypassing the scheduler
    pub node_name: String,
    pub container_name: String,
    pub image: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub restart_policy: RestartPolicy,
}

/// Lifecycle phase of the helper pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl WorkloadPhase {
    /// Parse a pod status phase string
    pub fn from_phase(phase: &str) -> Self {
        match phase {
            "Pending" => WorkloadPhase::Pending,
            "Running" => WorkloadPhase::Running,
            "Succeeded" => WorkloadPhase::Succeeded,
            "Failed" => WorkloadPhase::Failed,
            _ => WorkloadPhase::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkloadPhase::Succeeded | WorkloadPhase::Failed)
    }
}

impl std::fmt::Display for WorkloadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkloadPhase::Pending => write!(f, "Pending"),
            WorkloadPhase::Running => write!(f, "Running"),
            WorkloadPhase::Succeeded => write!(f, "Succeeded"),
            WorkloadPhase::Failed => write!(f, "Failed"),
            WorkloadPhase::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Notification published when chaos is injected under an owning engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaosEvent {
    pub namespace: String,
    /// Name of the owning chaos engine
    pub involved_object: String,
    pub reason: String,
    pub message: String,
    /// "Normal" or "Warning"
    pub event_type: String,
}

/// Reason attached to the chaos injection event
pub const CHAOS_INJECT_REASON: &str = "ChaosInject";

/// Summary of a run that reached the end of the workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub target_node: TargetNode,
    pub cpu_cores: u32,
    pub helper_name: String,
    pub helper_phase: WorkloadPhase,
    /// Non-fatal problems observed along the way
    pub warnings: Vec<RunWarning>,
}

impl RunReport {
    pub fn result(&self) -> RunResult {
        RunResult::Completed
    }

    pub fn has_warning(&self, kind: RunResult) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }
}

/// A non-fatal problem recorded on the run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunWarning {
    pub kind: RunResult,
    pub message: String,
}

impl From<&ChaosError> for RunWarning {
    fn from(err: &ChaosError) -> Self {
        Self {
            kind: err.result(),
            message: err.to_string(),
        }
    }
}
