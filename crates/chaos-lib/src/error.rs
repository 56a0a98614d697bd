//! Error taxonomy and run classification

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Terminal classification of an experiment run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunResult {
    Completed,
    NoTargetFound,
    CapacityLookupFailed,
    HelperCreationFailed,
    HelperNotRunning,
    HelperFailed,
    NodeUnhealthyAfterFault,
    CleanupFailed,
    InvalidConfig,
}

impl RunResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunResult::Completed => "completed",
            RunResult::NoTargetFound => "no_target_found",
            RunResult::CapacityLookupFailed => "capacity_lookup_failed",
            RunResult::HelperCreationFailed => "helper_creation_failed",
            RunResult::HelperNotRunning => "helper_not_running",
            RunResult::HelperFailed => "helper_failed",
            RunResult::NodeUnhealthyAfterFault => "node_unhealthy_after_fault",
            RunResult::CleanupFailed => "cleanup_failed",
            RunResult::InvalidConfig => "invalid_config",
        }
    }
}

impl std::fmt::Display for RunResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while running the experiment
#[derive(Debug, Error)]
pub enum ChaosError {
    #[error("no running application instance found in namespace {namespace} with label {label}: {reason}")]
    NoTargetFound {
        namespace: String,
        label: String,
        reason: String,
    },

    #[error("failed to read allocatable cpu of node {node}: {reason}")]
    CapacityLookupFailed { node: String, reason: String },

    #[error("unable to create the helper pod {name}: {reason}")]
    HelperCreationFailed { name: String, reason: String },

    #[error("helper pod {name} is not in running state: {reason}")]
    HelperNotRunning { name: String, reason: String },

    #[error("helper pod {name} failed: {reason}")]
    HelperFailed { name: String, reason: String },

    /// Non-fatal: the node may need manual recovery
    #[error("node {node} is not in the ready state, you may need to manually recover the node")]
    NodeUnhealthyAfterFault { node: String },

    /// Non-fatal: a stray helper pod may be left behind
    #[error("unable to delete the helper pod {name}: {reason}")]
    CleanupFailed { name: String, reason: String },

    #[error("invalid experiment configuration: {0}")]
    InvalidConfig(String),
}

impl ChaosError {
    /// Classification used for run results and metrics
    pub fn result(&self) -> RunResult {
        match self {
            ChaosError::NoTargetFound { .. } => RunResult::NoTargetFound,
            ChaosError::CapacityLookupFailed { .. } => RunResult::CapacityLookupFailed,
            ChaosError::HelperCreationFailed { .. } => RunResult::HelperCreationFailed,
            ChaosError::HelperNotRunning { .. } => RunResult::HelperNotRunning,
            ChaosError::HelperFailed { .. } => RunResult::HelperFailed,
            ChaosError::NodeUnhealthyAfterFault { .. } => RunResult::NodeUnhealthyAfterFault,
            ChaosError::CleanupFailed { .. } => RunResult::CleanupFailed,
            ChaosError::InvalidConfig(_) => RunResult::InvalidConfig,
        }
    }

    /// Warnings are recorded on the report and never fail a run
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            ChaosError::NodeUnhealthyAfterFault { .. } | ChaosError::CleanupFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ChaosError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_classification() {
        let unhealthy = ChaosError::NodeUnhealthyAfterFault {
            node: "node-a".to_string(),
        };
        assert!(unhealthy.is_warning());
        assert_eq!(unhealthy.result(), RunResult::NodeUnhealthyAfterFault);

        let failed = ChaosError::HelperFailed {
            name: "hog-abc".to_string(),
            reason: "phase Failed".to_string(),
        };
        assert!(!failed.is_warning());
        assert_eq!(failed.result().as_str(), "helper_failed");
    }

    #[test]
    fn test_each_error_has_a_distinct_result() {
        let reason = || "boom".to_string();
        let errors = vec![
            ChaosError::NoTargetFound {
                namespace: "default".to_string(),
                label: "app=web".to_string(),
                reason: reason(),
            },
            ChaosError::CapacityLookupFailed {
                node: "node-a".to_string(),
                reason: reason(),
            },
            ChaosError::HelperCreationFailed {
                name: "hog-abc".to_string(),
                reason: reason(),
            },
            ChaosError::HelperNotRunning {
                name: "hog-abc".to_string(),
                reason: reason(),
            },
            ChaosError::HelperFailed {
                name: "hog-abc".to_string(),
                reason: reason(),
            },
            ChaosError::NodeUnhealthyAfterFault {
                node: "node-a".to_string(),
            },
            ChaosError::CleanupFailed {
                name: "hog-abc".to_string(),
                reason: reason(),
            },
            ChaosError::InvalidConfig(reason()),
        ];

        let mut results: Vec<&str> = errors.iter().map(|e| e.result().as_str()).collect();
        results.sort_unstable();
        results.dedup();
        assert_eq!(results.len(), errors.len());
        assert!(!results.contains(&RunResult::Completed.as_str()));
    }

    #[test]
    fn test_error_messages_name_the_subject() {
        let err = ChaosError::CleanupFailed {
            name: "hog-abc".to_string(),
            reason: "forbidden".to_string(),
        };
        assert_eq!(err.to_string(), "unable to delete the helper pod hog-abc: forbidden");
    }
}
