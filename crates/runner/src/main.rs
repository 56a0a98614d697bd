//! Node CPU hog - chaos experiment runner
//!
//! Runs as a one-shot job: picks a node hosting the target application,
//! saturates its CPU through a helper pod, and reports whether it recovered.

use anyhow::{Context, Result};
use chaos_lib::{Experiment, ExperimentMetrics, KubeCluster, StateTracker};
use clap::Parser;
use node_cpu_hog::{
    api,
    config::{self, Cli, LogFormat},
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let mut rng = StdRng::from_entropy();

    let mut experiment_config = config::load(&cli)?;
    experiment_config.ensure_run_id(&mut rng);
    info!(
        experiment = %experiment_config.experiment_name,
        run_id = %experiment_config.run_id,
        "Experiment configured"
    );

    let metrics = ExperimentMetrics::new();
    let tracker = StateTracker::new(&experiment_config.experiment_name, &experiment_config.run_id);

    if let Some(port) = cli.status_port {
        let state = Arc::new(api::AppState::new(tracker.clone(), metrics.clone()));
        tokio::spawn(async move {
            if let Err(e) = api::serve(port, state).await {
                warn!(port, error = %e, "Status server stopped");
            }
        });
    }

    let cluster = KubeCluster::try_default().await?;
    let experiment = Experiment::new(experiment_config, Arc::new(cluster)).with_tracker(tracker);

    let report = experiment.run(&mut rng).await?;

    let summary = serde_json::to_string_pretty(&report).context("Failed to serialize run report")?;
    println!("{}", summary);

    Ok(())
}
