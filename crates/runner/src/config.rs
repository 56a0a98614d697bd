//! Runner configuration
//!
//! Experiment settings come from an optional config file, then `CHAOS_*`
//! environment variables, then command-line overrides.

use anyhow::{Context, Result};
use chaos_lib::ExperimentConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Environment variable prefix for experiment settings
pub const ENV_PREFIX: &str = "CHAOS";

/// Node CPU hog chaos experiment
#[derive(Debug, Parser)]
#[command(name = "node-cpu-hog")]
#[command(author, version, about = "Node CPU hog chaos experiment", long_about = None)]
pub struct Cli {
    /// Experiment config file (TOML, YAML or JSON)
    #[arg(long, short, env = "CHAOS_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Run identifier (generated when not set)
    #[arg(long)]
    pub run_id: Option<String>,

    /// Cores to saturate, 0 derives them from the node capacity
    #[arg(long)]
    pub cpu_cores: Option<u32>,

    /// Chaos duration in seconds
    #[arg(long)]
    pub duration: Option<u64>,

    /// Serve /healthz, /status and /metrics on this port during the run
    #[arg(long, env = "STATUS_PORT")]
    pub status_port: Option<u16>,

    /// Log output format
    #[arg(long, value_enum, default_value = "json")]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Text,
}

/// Load the experiment configuration from file and environment, then apply CLI overrides
pub fn load(cli: &Cli) -> Result<ExperimentConfig> {
    let mut builder = config::Config::builder();

    if let Some(path) = &cli.config {
        builder = builder.add_source(config::File::from(path.as_path()));
    }

    let settings = builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()
        .context("Failed to read experiment configuration")?;

    let mut experiment: ExperimentConfig = settings
        .try_deserialize()
        .context("Invalid experiment configuration")?;

    apply_overrides(cli, &mut experiment);
    Ok(experiment)
}

/// Command-line values win over file and environment
pub fn apply_overrides(cli: &Cli, experiment: &mut ExperimentConfig) {
    if let Some(run_id) = &cli.run_id {
        experiment.run_id = run_id.clone();
    }
    if let Some(cores) = cli.cpu_cores {
        experiment.node_cpu_cores = cores;
    }
    if let Some(duration) = cli.duration {
        experiment.chaos_duration_secs = duration;
    }
}
