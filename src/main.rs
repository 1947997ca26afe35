//! Drive a toy per-rank simulation and monitor it in rank order.
//!
//! ```sh
//! rank-order-monitor local --engines 6 --steps 50
//! mpirun -n 4 rank-order-monitor mpi --config monitor.toml
//! ```

mod assemble;
mod cluster;
mod config;
mod error;
mod monitor;
mod mpi_helpers;
mod reorder;
mod simulation;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cluster::{LocalCluster, wave_field_for};
use config::MonitorConfig;
use monitor::{LogSink, Monitor};

#[derive(Parser)]
#[command(name = "rank-order-monitor")]
#[command(about = "Monitor a distributed simulation and reassemble its mesh in rank order")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run engines as threads in this process and poll them.
    Local {
        /// Path to a TOML configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of engines (overrides config file setting).
        #[arg(long)]
        engines: Option<usize>,
        /// Steps per engine (overrides config file setting).
        #[arg(long)]
        steps: Option<usize>,
    },
    /// Run one engine per MPI process; launch with mpirun.
    Mpi {
        /// Path to a TOML configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn read_config(path: Option<&Path>) -> anyhow::Result<MonitorConfig> {
    let config = match path {
        Some(path) => config::load_config(path)?,
        None => MonitorConfig::default(),
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Local {
            config,
            engines,
            steps,
        } => {
            let mut config = read_config(config.as_deref())?;
            if let Some(engines) = engines {
                config.simulation.engines = engines;
            }
            if let Some(steps) = steps {
                config.simulation.nsteps = steps;
            }
            config.validate()?;

            let sim = &config.simulation;
            let cluster = LocalCluster::launch(sim, wave_field_for(sim.rows, sim.cols))?;
            let mut monitor = Monitor::connect(cluster)?;

            let report = monitor
                .run(
                    &mut LogSink,
                    config.monitor.refresh(),
                    config.monitor.timeout(),
                )
                .await;

            let statuses = monitor.into_client().shutdown()?;
            info!(
                "{:?} with {} frames, engines ended {:?}",
                report.outcome, report.frames, statuses
            );
        }
        Commands::Mpi { config } => {
            let config = read_config(config.as_deref())?;
            mpi_helpers::session::run_mpi_session(&config, &mut LogSink)?;
        }
    }

    Ok(())
}
