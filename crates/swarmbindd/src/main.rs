// # swarmbindd - swarmbind daemon and command line
//
// This binary is a THIN integration layer: all reconciliation logic lives in
// swarmbind-core.
//
// It is responsible for:
// 1. Parsing arguments (flags fall back to environment variables and `.env`)
// 2. Initializing logging and the runtime
// 3. Running one-shot record commands (`add`, `remove`, `reconfigure`)
// 4. Wiring the OPNsense gateway and the Docker source into the engine (`events`)
//
// ## Configuration
//
// Variables are read from the environment, or from a `.env` file in the
// working directory or one of its parents.
//
// - `GW_API_URL`: Base URL of the firewall (e.g. https://fw.example.org)
// - `GW_API_KEY` / `GW_API_SECRET`: API credentials
// - `DOCKER_HOST`: Docker Engine API endpoint (`events` only)
// - `SWARMBIND_LABEL_PREFIX`: Label prefix (`events` only)
// - `SWARMBIND_LOG_LEVEL`: trace, debug, info, warn, error
// - `SWARMBIND_TIMEOUT_SECS`: Request timeout
//
// ## Example
//
// ```bash
// export GW_API_URL=https://fw.example.org
// export GW_API_KEY=your_key
// export GW_API_SECRET=your_secret
// export DOCKER_HOST=unix:///var/run/docker.sock
//
// swarmbindd events
// ```

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use swarmbind_core::registry::ServiceRegistry;
use swarmbind_core::{SyncEngine, ops};
use swarmbind_gateway_opnsense::OpnsenseGateway;
use swarmbind_source_docker::DockerEventSource;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::cli::{Cli, Command};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Command succeeded or clean shutdown
/// - 1: Configuration error or failed command
/// - 2: Runtime error (event loop ended unexpectedly)
#[derive(Debug, Clone, Copy)]
enum SwarmbindExitCode {
    /// Command succeeded or clean shutdown
    Success = 0,
    /// Configuration error or failed command
    Failure = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<SwarmbindExitCode> for ExitCode {
    fn from(code: SwarmbindExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    // Load .env before parsing so that flag fallbacks see it
    let env_file = dotenvy::dotenv();
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::from(cli.log_level))
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SwarmbindExitCode::Failure.into();
    }

    match env_file {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => debug!("No .env file found"),
        Err(e) => warn!("Failed to load .env file: {}", e),
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SwarmbindExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run(cli)).into()
}

async fn run(cli: Cli) -> SwarmbindExitCode {
    match &cli.command {
        Command::Events {
            docker_host,
            label_prefix,
        } => {
            let config = match cli.sync_config(label_prefix) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Configuration error: {:#}", e);
                    return SwarmbindExitCode::Failure;
                }
            };

            match run_daemon(config, docker_host).await {
                Ok(()) => SwarmbindExitCode::Success,
                Err(e) => {
                    error!("Daemon error: {:#}", e);
                    SwarmbindExitCode::RuntimeError
                }
            }
        }
        _ => match run_command(&cli).await {
            Ok(outcome) => {
                println!("{}", outcome);
                SwarmbindExitCode::Success
            }
            Err(e) => {
                eprintln!("{:#}", e);
                SwarmbindExitCode::Failure
            }
        },
    }
}

/// Run a one-shot record command and describe its outcome
async fn run_command(cli: &Cli) -> Result<String> {
    let gateway_config = cli.gateway_config()?;
    let timeout = std::time::Duration::from_secs(cli.timeout_secs);
    let gateway = OpnsenseGateway::new(&gateway_config, timeout)?;

    match &cli.command {
        Command::Add {
            domain,
            name,
            record_type,
            value,
        } => {
            let record_id = ops::add_record(&gateway, domain, name, record_type, value).await?;
            Ok(format!(
                "Added {} record {}.{} -> {} (uuid: {})",
                record_type,
                name,
                domain,
                value,
                record_id.as_deref().unwrap_or("unknown")
            ))
        }
        Command::Remove {
            domain,
            name,
            record_type,
        } => {
            let record_id = ops::remove_record(&gateway, domain, name, record_type).await?;
            Ok(format!(
                "Removed {} record {}.{} (uuid: {})",
                record_type, name, domain, record_id
            ))
        }
        Command::Reconfigure => {
            ops::reconfigure(&gateway).await?;
            Ok("Reconfigured bind service".to_string())
        }
        Command::Events { .. } => anyhow::bail!("events is not a one-shot command"),
    }
}

/// Run the event-driven daemon until a shutdown signal or a stream failure
async fn run_daemon(config: swarmbind_core::SyncConfig, docker_host: &str) -> Result<()> {
    info!("Starting swarmbindd daemon");

    let gateway = OpnsenseGateway::from_config(&config)?;
    let source = DockerEventSource::new(docker_host, config.engine.request_timeout())?;
    info!(
        "Gateway {}, docker endpoint {}, label prefix {}",
        config.gateway.trimmed_base_url(),
        source.endpoint(),
        config.labels.prefix
    );

    let (engine, mut engine_events) = SyncEngine::new(
        Box::new(source),
        Arc::new(gateway),
        ServiceRegistry::new(),
        &config,
    )?;

    let monitor = tokio::spawn(async move {
        while let Some(event) = engine_events.recv().await {
            debug!("Engine event: {:?}", event);
        }
    });

    let result = engine.run_until(wait_for_shutdown()).await;

    // Closing the engine closes its event channel and ends the monitor
    drop(engine);
    if let Err(e) = monitor.await {
        error!("Engine event monitor failed: {}", e);
    }

    result?;
    info!("Shutting down daemon");
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() {
    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to setup signal handlers: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to wait for CTRL-C: {}", e);
            }
            return;
        }
    };

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    info!("Received shutdown signal: {}", signal);
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal: SIGINT"),
        Err(e) => error!("Failed to wait for CTRL-C: {}", e),
    }
}
