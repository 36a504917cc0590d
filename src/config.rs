//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};

use clap::Parser;

use crate::{controller::ControllerConfig, tasks::SchedulerConfig};

/// CLI argument parsing structure
#[derive(Debug, Parser)]
#[command(name = "kitchen-timers")]
#[command(about = "Durable kitchen countdown timers with a local HTTP API")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Directory holding persisted timers
    #[arg(short, long, default_value = "./timers")]
    pub data_dir: PathBuf,

    /// Keep timers in memory only (nothing survives a restart)
    #[arg(long)]
    pub ephemeral: bool,

    /// Scheduler tick period in milliseconds
    #[arg(long, default_value = "1000")]
    pub tick_ms: u64,

    /// Smallest remaining time an adjustment may leave, in seconds
    #[arg(long, default_value = "10")]
    pub min_remaining_secs: u64,

    /// Hours to keep finished and cancelled timers
    #[arg(long, default_value = "24")]
    pub retention_hours: u64,

    /// Seconds between retention sweeps
    #[arg(long, default_value = "900")]
    pub retention_interval_secs: u64,

    /// Publish a progress event for each running timer on every tick
    #[arg(long)]
    pub progress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_period: Duration::from_millis(self.tick_ms.max(1)),
            emit_progress: self.progress,
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            min_remaining: Duration::from_secs(self.min_remaining_secs),
            retention: Duration::from_secs(self.retention_hours.saturating_mul(3600)),
        }
    }

    pub fn retention_interval(&self) -> Duration {
        Duration::from_secs(self.retention_interval_secs.max(1))
    }
}
