mod algorithm;
mod angle;
mod config;
mod coordinator;
mod fault;
mod gateway;
mod simulation;
mod telemetry;
mod web;

use chrono::Utc;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;

use crate::algorithm::construct;
use crate::config::Config;
use crate::coordinator::{Coordinator, ShutdownOutcome};
use crate::gateway::{CommandGateway, DryRunGateway};
use crate::simulation::{MockDome, MockTelescope};
use crate::telemetry::TelemetryCache;

#[derive(Parser)]
#[command(name = "dome-trajectory")]
#[command(about = "Keep a telescope dome pointed along the telescope's line of sight")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file
    Validate { config: String },
    /// Run the coordinator until interrupted
    Run {
        config: String,
        /// Drive a simulated dome and telescope
        #[arg(long)]
        simulate: bool,
        /// Enable the coordinator at start-up
        #[arg(long)]
        enable: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Run {
            config,
            simulate,
            enable,
        } => run(&config, simulate, enable).await,
    }
}

fn load(path: &str) -> Option<Config> {
    match Config::from_file(path) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("Error loading {}: {}", path, e);
            None
        }
    }
}

fn validate(path: &str) -> ExitCode {
    let Some(config) = load(path) else {
        return ExitCode::FAILURE;
    };

    match construct(&config.algorithm()) {
        Ok(algorithm) => {
            println!("Config is valid");
            println!("  algorithm: {}", algorithm.name());
            println!(
                "  heartbeat: {:?}, stale after: {:?}",
                config.coordinator.heartbeat_interval, config.coordinator.telescope_stale_after
            );
            println!(
                "  command timeout: {:?}, shutdown timeout: {:?}",
                config.coordinator.command_timeout, config.coordinator.shutdown_timeout
            );
            if let Some(web) = &config.web {
                println!("  web: {} ({} API keys)", web.bind, config.api_keys.len());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Algorithm error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(path: &str, simulate: bool, enable: bool) -> ExitCode {
    let Some(config) = load(path) else {
        return ExitCode::FAILURE;
    };
    let config = Arc::new(config);

    let cache = TelemetryCache::new(config.coordinator.stale_window());
    let mut coordinator = Coordinator::new(cache, config.coordinator.dead_band);
    if let Err(e) = coordinator.configure(config.algorithm(), Utc::now()) {
        eprintln!("Algorithm error: {}", e);
        return ExitCode::FAILURE;
    }

    let simulation = config.simulation.clone().unwrap_or_default();
    let dome = simulate.then(|| Arc::new(MockDome::new((&simulation).into())));
    let gateway: Arc<dyn CommandGateway> = match &dome {
        Some(dome) => dome.clone(),
        None => {
            log::warn!("No dome attached; moves are only logged");
            Arc::new(DryRunGateway)
        }
    };

    let (handle, join) = coordinator::spawn(coordinator, gateway, &config.coordinator);

    let telescope = dome.as_ref().map(|dome| {
        dome.start(handle.ingress());
        MockTelescope::start((&simulation).into(), handle.ingress())
    });

    let server = config.web.as_ref().map(|web| {
        tokio::spawn(web::run_server(
            web.bind.clone(),
            config.clone(),
            handle.clone(),
        ))
    });

    if enable {
        match handle.enable().await {
            Ok(state) => log::info!("Coordinator {}", state),
            Err(e) => log::error!("Could not enable coordinator: {}", e),
        }
    }

    let mut exit = ExitCode::SUCCESS;
    match server {
        Some(mut server) => {
            tokio::select! {
                result = &mut server => {
                    match result {
                        Ok(Ok(())) => log::warn!("Web server exited"),
                        Ok(Err(e)) => log::error!("Web server failed: {}", e),
                        Err(e) => log::error!("Web server task failed: {}", e),
                    }
                    exit = ExitCode::FAILURE;
                }
                _ = tokio::signal::ctrl_c() => {}
            }
            server.abort();
        }
        None => {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl-C: {}", e);
            }
        }
    }

    log::info!("Shutting down");
    match handle.shutdown().await {
        Ok(ShutdownOutcome::Idle) => log::info!("No command in flight"),
        Ok(ShutdownOutcome::Drained) => log::info!("In-flight command finished"),
        Ok(ShutdownOutcome::Abandoned(id)) => {
            log::warn!("Command {} still outstanding at shutdown", id)
        }
        Err(e) => log::error!("Coordinator already stopped: {}", e),
    }
    if let Some(telescope) = telescope {
        telescope.stop().await;
    }
    if let Some(dome) = &dome {
        dome.stop().await;
    }
    if let Err(e) = join.await {
        log::error!("Coordinator task failed: {}", e);
        exit = ExitCode::FAILURE;
    }
    exit
}
