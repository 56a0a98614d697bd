//! Run state tracking
//!
//! The orchestrator publishes every state transition here; the status
//! endpoint reads snapshots without touching the run itself.

use crate::error::RunResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// States of the experiment workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentState {
    Init,
    TargetResolved,
    ParametersDerived,
    RampWaitPre,
    HelperCreated,
    HelperRunning,
    HelperCompleted,
    NodeChecked,
    HelperDeleted,
    RampWaitPost,
    Done,
    Error(RunResult),
}

impl ExperimentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExperimentState::Done | ExperimentState::Error(_))
    }
}

/// A recorded state change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub state: ExperimentState,
    pub timestamp: i64,
}

/// Point-in-time view of the run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub experiment: String,
    pub run_id: String,
    pub state: ExperimentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_cores: Option<u32>,
    pub warnings: Vec<String>,
    pub history: Vec<Transition>,
}

/// Shared handle to the current run's state
#[derive(Debug, Clone)]
pub struct StateTracker {
    inner: Arc<RwLock<StatusSnapshot>>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl StateTracker {
    pub fn new(experiment: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StatusSnapshot {
                experiment: experiment.into(),
                run_id: run_id.into(),
                state: ExperimentState::Init,
                target_node: None,
                cpu_cores: None,
                warnings: Vec::new(),
                history: vec![Transition {
                    state: ExperimentState::Init,
                    timestamp: chrono::Utc::now().timestamp(),
                }],
            })),
        }
    }

    /// Move to a new state
    pub async fn transition(&self, state: ExperimentState) {
        let mut snapshot = self.inner.write().await;
        snapshot.state = state;
        snapshot.history.push(Transition {
            state,
            timestamp: chrono::Utc::now().timestamp(),
        });
    }

    pub async fn set_target(&self, node: &str) {
        self.inner.write().await.target_node = Some(node.to_string());
    }

    pub async fn set_cpu_cores(&self, cores: u32) {
        self.inner.write().await.cpu_cores = Some(cores);
    }

    pub async fn add_warning(&self, message: impl Into<String>) {
        self.inner.write().await.warnings.push(message.into());
    }

    pub async fn state(&self) -> ExperimentState {
        self.inner.read().await.state
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().await.clone()
    }

    /// States visited so far, in order
    pub async fn visited(&self) -> Vec<ExperimentState> {
        self.inner
            .read()
            .await
            .history
            .iter()
            .map(|t| t.state)
            .collect()
    }
}
