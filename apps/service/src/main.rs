use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use pill::{Agent, Collaborators, Config, config};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file (defaults to $XDG_CONFIG_HOME/pill/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Raise the default log level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Probe configured sites until interrupted (default)
    Run,
    /// Validate the configuration and show upcoming firings
    Check,
    /// Write a sample configuration if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logger::init(cli.verbose).context("failed to initialise logging")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(cli.config).await,
        Command::Check => check(cli.config),
        Command::Init => init(cli.config),
    }
}

async fn run(path: Option<PathBuf>) -> Result<()> {
    let config = Config::from_config(path)?;
    let collaborators = Collaborators::production(&config)?;
    let agent = Agent::build(&config, collaborators)?;

    if agent.target_count() == 0 {
        warn!("No sites configured; nothing will be probed");
    }

    agent.run(shutdown_signal()).await;
    Ok(())
}

fn check(path: Option<PathBuf>) -> Result<()> {
    let config = Config::from_config(path)?;
    let targets = config.targets()?;

    println!("{config}");
    let now = Utc::now();
    for target in &targets {
        println!("{} -> {} [{}]", target.url, target.channel, target.schedule);
        for firing in target.schedule.upcoming(now, 3) {
            println!("    {}", firing.to_rfc3339());
        }
    }
    println!("{} site(s) OK", targets.len());

    Ok(())
}

fn init(path: Option<PathBuf>) -> Result<()> {
    let path = config::resolve_path(path)?;
    if path.exists() {
        info!("Configuration already exists at {}", path.display());
        return Ok(());
    }

    Config::sample().write_config(&path)?;
    info!("Wrote sample configuration to {}", path.display());
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Ctrl+C received"),
        () = terminate => info!("SIGTERM received"),
    }
}
