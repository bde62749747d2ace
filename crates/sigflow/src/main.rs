//! sigflow server binary

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sigflow::infra_common::{log_welcome, setup_logging, LoggingConfig, SigflowConfig};
use sigflow::Server;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sigflow", version)]
#[command(about = "SIP/SDP signaling pipeline server")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:5060
    #[arg(short, long)]
    address: Option<String>,

    /// Log level
    #[arg(short, long)]
    log_level: Option<String>,

    /// Log as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn apply(&self, config: &mut SigflowConfig) {
        if let Some(address) = &self.address {
            config.engine.address = address.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.json = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = SigflowConfig::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply(&mut config);
    config.validate()?;

    setup_logging(&LoggingConfig::from_section(&config.logging)?)?;
    log_welcome("sigflow", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    let server = Server::build(&config, cancel.clone()).await?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            cancel.cancel();
        }
    });

    server.run().await
}
