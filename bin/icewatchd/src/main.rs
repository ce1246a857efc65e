//! ---
//! iw_section: "01-core-functionality"
//! iw_subsection: "binary"
//! iw_type: "source"
//! iw_scope: "code"
//! iw_description: "Binary entrypoint for the Icewatch daemon."
//! iw_version: "v0.1.0"
//! iw_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use icewatch_common::config::AppConfig;
use icewatch_common::logging::init_tracing;
use icewatch_publish::ConsolePublisherFactory;
use icewatch_runtime::{SimulationPlan, SimulationReport, SimulationSupervisor};
use tokio::signal;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Icewatch sensor fleet simulator daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "SECONDS", help = "Override the send interval")]
    interval: Option<u64>,

    #[arg(long, value_name = "SEED", help = "Override the base random seed")]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/example.dev.toml"));

    let mut config = AppConfig::load(&candidates)?;
    if let Some(secs) = cli.interval {
        config.send.interval = Duration::from_secs(secs);
    }
    if let Some(seed) = cli.seed {
        config.supervisor.random_seed = seed;
    }
    init_tracing("icewatchd", &config.logging)?;
    info!(
        devices = config.devices.len(),
        sensors = config.sensors.len(),
        interval_secs = config.send.interval.as_secs(),
        "configuration loaded"
    );

    // The real ingestion transport is an external collaborator; the daemon
    // drives the console publisher, which logs each message it would send.
    let factory = Arc::new(ConsolePublisherFactory);
    let plan = SimulationPlan::from_config(&config, factory);

    let shutdown = async {
        let _ = signal::ctrl_c().await;
        info!("ctrl-c received; shutting down");
    };

    let report = SimulationSupervisor::run(plan, shutdown)
        .await
        .context("simulation failed to start")?;
    render_report(&report);

    if report.has_unexpected_failures() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn render_report(report: &SimulationReport) {
    for session in &report.sessions {
        match session.error() {
            None => println!(
                "{:<16} stopped  cycles={}",
                session.device_id, session.cycles
            ),
            Some(error) => println!(
                "{:<16} failed   cycles={} cause={}",
                session.device_id, session.cycles, error
            ),
        }
    }
    for device_id in &report.aborted {
        println!("{:<16} aborted  missed the shutdown grace period", device_id);
    }
    for device_id in &report.skipped {
        println!("{:<16} skipped  placeholder credentials", device_id);
    }
}
