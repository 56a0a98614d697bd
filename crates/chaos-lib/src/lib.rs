//! Node CPU hog chaos experiment
//!
//! This crate provides:
//! - Target node selection from a live application's instances
//! - A disposable stress pod lifecycle pinned to that node
//! - Bounded phase polling and post-fault node verification
//! - Run state tracking and observability

pub mod clock;
pub mod cluster;
pub mod error;
pub mod experiment;
pub mod models;
pub mod observability;
pub mod status;

pub use clock::{Clock, TokioClock};
pub use cluster::{ClusterClient, KubeCluster};
pub use error::{ChaosError, RunResult};
pub use experiment::Experiment;
pub use models::*;
pub use observability::{ExperimentMetrics, StructuredLogger};
pub use status::{ExperimentState, StateTracker, StatusSnapshot};
