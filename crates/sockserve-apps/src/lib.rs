#![deny(unsafe_code)]

//! Example sockserve services.
//!
//! Each binary in this crate is one independent demo process. They share a
//! command line and differ only in the [`ServiceIdentity`] they report.
//! Configuration comes from the environment (`PORT`, `SOCKET_PATH`,
//! `APP_ENV`, `APP_VERSION`); see `sockserve_config`.

use anyhow::{Context, Result};
use clap::{ArgAction, CommandFactory, FromArgMatches, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sockserve_config::ServerConfig;
use sockserve_core::{Daemon, EndpointAddr, EndpointClient, ServiceIdentity};

/// Identity of the `python-api` binary.
pub const PYTHON_API: ServiceIdentity = ServiceIdentity::new("python-api", "python");

/// Identity of the `rust-cache` binary.
pub const RUST_CACHE: ServiceIdentity = ServiceIdentity::new("rust-cache", "rust");

/// Serve a small JSON API over TCP or a Unix domain socket.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Bind the configured transport and serve until interrupted (default).
    Serve,

    /// Probe /health on the configured transport; exit non-zero if unhealthy.
    Check,
}

/// Entry point shared by every binary.
pub async fn run(identity: ServiceIdentity) -> Result<()> {
    let matches = Cli::command().name(identity.name).get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    init_logging(cli.verbose);

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => cmd_serve(identity).await,
        Commands::Check => cmd_check(identity).await,
    };
    if let Err(e) = &result {
        error!(service = identity.name, error = %format_args!("{e:#}"), "fatal");
    }
    result
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();
}

async fn cmd_serve(identity: ServiceIdentity) -> Result<()> {
    let config = ServerConfig::from_env().context("invalid configuration")?;
    info!(service = identity.name, transport = %config.transport, "starting");

    let daemon = Daemon::new(config, identity);
    let trigger = daemon.run().await?;

    info!(service = identity.name, %trigger, "exiting");
    Ok(())
}

async fn cmd_check(identity: ServiceIdentity) -> Result<()> {
    let config = ServerConfig::from_env().context("invalid configuration")?;
    let addr = EndpointAddr::from_transport(&config.transport);

    let health = EndpointClient::new(addr.clone())
        .health()
        .await
        .with_context(|| format!("health check against {addr} failed"))?;
    if health.service != identity.name {
        anyhow::bail!(
            "{addr} is answered by {:?}, expected {:?}",
            health.service,
            identity.name
        );
    }

    println!("{}", serde_json::to_string(&health)?);
    Ok(())
}
