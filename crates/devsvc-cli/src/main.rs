//! Command-line interface for the devsvc device service.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use devsvc_api::ServerState;
use devsvc_core::ServiceConfig;
use devsvc_devices::{DeviceService, DriverAdapter, HttpMetadataClient};

mod drivers;

use drivers::{RandomDriver, TemplateDriver};

/// devsvc - expose a protocol driver as a managed device service.
#[derive(Parser, Debug)]
#[command(name = "devsvc")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Run the device service.
    Serve {
        /// Configuration file (TOML).
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Service name; overrides the configuration file.
        #[arg(short, long)]
        name: Option<String>,
        /// Port to listen on; overrides the configuration file.
        #[arg(short, long)]
        port: Option<u16>,
        /// Driver to host.
        #[arg(long, value_enum, default_value_t = DriverKind::Random)]
        driver: DriverKind,
    },
    /// Print the resolved configuration and exit.
    Config {
        /// Configuration file (TOML).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum DriverKind {
    Random,
    Template,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Serve {
            config,
            name,
            port,
            driver,
        } => {
            let mut config = load_config(config)?;
            if let Some(name) = name {
                config.service.name = name;
            }
            if let Some(port) = port {
                config.service.port = port;
            }
            config.validate()?;
            init_logging(&config, args.verbose);
            run_serve(config, driver).await
        }
        Command::Config { config } => {
            let config = load_config(config)?;
            print!("{}", config.to_toml_string());
            Ok(())
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<ServiceConfig> {
    ServiceConfig::load(path.as_deref()).context("Failed to load configuration")
}

fn init_logging(config: &ServiceConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };

    // Build the env filter for log level control
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives = if verbose {
            format!("devsvc={},tower_http=debug", level)
        } else {
            format!("devsvc={}", level)
        };
        tracing_subscriber::EnvFilter::new(directives)
            .add_directive(tracing::Level::WARN.into())
    });

    // JSON format for container environments, set via [logging] or DEVSVC_LOG_JSON
    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .compact()
            .init();
    }
}

async fn run_serve(config: ServiceConfig, kind: DriverKind) -> Result<()> {
    let metadata = Arc::new(
        HttpMetadataClient::new(&config.metadata).context("Failed to create metadata client")?,
    );
    tracing::info!("Using metadata authority at {}", metadata.base_url());

    let addr = config.listen_addr();
    let service = match kind {
        DriverKind::Random => {
            let driver: Arc<dyn DriverAdapter> = Arc::new(RandomDriver::new());
            Arc::new(DeviceService::new(config, driver, metadata))
        }
        DriverKind::Template => {
            let driver = Arc::new(TemplateDriver::new());
            let service = Arc::new(DeviceService::new(config, driver.clone(), metadata));
            service.register_lifecycle_hooks(driver)?;
            service
        }
    };

    service
        .start()
        .await
        .with_context(|| format!("Failed to start device service '{}'", service.name()))?;

    let state = ServerState::new(service.clone());
    let result = devsvc_api::serve(state, &addr, shutdown_signal()).await;

    if let Err(e) = service.stop(true).await {
        tracing::warn!("Error while stopping service: {}", e);
    }
    result
}

/// Resolves on ctrl-c, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
