//! bridge-rs: Remote command execution bridge CLI
//!
//! # Usage
//!
//! ```bash
//! # Show how a command line is compiled
//! bridge-rs compile "Get-Mailbox -ResultSize 10 | Select-Object Name, Alias"
//!
//! # Run a command line against the configured endpoint
//! BRIDGE_TOKEN=... bridge-rs --config bridge.toml run "Get-Mailbox -Identity alice"
//! ```
//!
//! The credential is read from `BRIDGE_USERNAME` and `BRIDGE_PASSWORD`, or
//! from `BRIDGE_TOKEN`.

use anyhow::Context;
use bridge_rs::config::LoggingConfig;
use bridge_rs::remote::http::HttpConnector;
use bridge_rs::{compile, BridgeConfig, Credential, RemoteBridge};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "bridge-rs")]
#[command(about = "Run administrative commands against a remote management endpoint", long_about = None)]
struct Cli {
    /// Configuration file (development defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the compiled pipeline as JSON
    Compile {
        /// Command line to compile
        command: String,
    },
    /// Run a command line and print the flattened results as JSON
    Run {
        /// Command line to run
        command: String,
    },
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("bridge_rs={}", logging.level).into());
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command output
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn credential_from_env() -> Option<Credential> {
    if let (Ok(username), Ok(password)) = (
        std::env::var("BRIDGE_USERNAME"),
        std::env::var("BRIDGE_PASSWORD"),
    ) {
        return Some(Credential::password(username, password));
    }
    std::env::var("BRIDGE_TOKEN").ok().map(Credential::token)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => BridgeConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BridgeConfig::development(),
    };
    config.validate()?;

    init_logging(&config.logging);

    match cli.command {
        Commands::Compile { command } => {
            let pipeline = compile(&command);
            println!("{}", serde_json::to_string_pretty(&pipeline)?);
        }
        Commands::Run { command } => {
            info!("Starting bridge-rs v{}", env!("CARGO_PKG_VERSION"));

            let connector = HttpConnector::new(config.timeouts.execution_timeout())?;
            let bridge = RemoteBridge::from_config(&config, Arc::new(connector))?;

            if let Some(credential) = credential_from_env() {
                bridge.set_credential(credential).await;
            }

            let result = bridge.run(&command).await;
            bridge.shutdown().await;

            let records = result?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }

    Ok(())
}
