//! The `registry` executable.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use nimo_registry::config::RegistryConfig;
use nimo_registry::service::RegistryService;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// The authoritative catalog service for an nImO network.
#[derive(Debug, Parser)]
#[command(name = "registry", version, about)]
struct Cli {
    /// Enable per-operation logging.
    #[arg(long)]
    log: bool,

    /// Configuration file (TOML).
    #[arg(long, env = "NIMO_REGISTRY_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the command TCP port; 0 = OS-assigned.
    #[arg(long, value_name = "N")]
    port: Option<u16>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.log {
        "nimo_registry=debug,info"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => match RegistryConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                error!(path = %path.display(), %err, "could not load configuration");
                return ExitCode::FAILURE;
            }
        },
        None => RegistryConfig::default(),
    };
    if let Some(port) = cli.port {
        config.command_port = port;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%err, "could not start the runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(RegistryService::new(config).run()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "Registry exiting");
            ExitCode::from(err.exit_code())
        }
    }
}
