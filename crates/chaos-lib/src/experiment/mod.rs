//! Node CPU hog experiment workflow
//!
//! Components, in the order the orchestrator drives them:
//! - target resolution from the application's running instances
//! - derivation of the number of cores to saturate
//! - helper pod creation, phase polling, and deletion
//! - post-fault node readiness verification

mod capacity;
mod helper;
mod node_health;
mod orchestrator;
mod resolver;
mod watcher;


pub use capacity::{effective_cpu_cores, parse_cpu_cores};
pub use helper::{build_helper_spec, labels, HelperWorkloadManager};
pub use node_health::HealthVerifier;
pub use orchestrator::Experiment;
pub use resolver::{pick_instance, resolve_target};
pub use watcher::{
    completion_bound, CompletionWatcher, COMPLETION_POLL_INTERVAL, DEFAULT_COMPLETION_GRACE_SECS,
};
