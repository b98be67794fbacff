//! DoIP ECU emulator
//!
//! Emulates a DoIP entity answering vehicle identification on UDP and UDS
//! over DoIP on TCP.
//!
//! # Usage
//!
//! Defaults (port 13400 on all interfaces):
//! ```bash
//! ./doip-ecu
//! ```
//!
//! With config file and a different VIN:
//! ```bash
//! ./doip-ecu --config config/doip-ecu.toml --vin WDB1234567890ABCD
//! ```

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use doip_ecu::config::parse_u16;
use doip_ecu::{EcuConfig, EcuServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "doip-ecu")]
#[command(about = "DoIP/UDS ECU emulator for diagnostic tester development")]
struct Args {
    /// Configuration file path (TOML, or YAML by .yaml/.yml extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Vehicle identification number, overrides the config file
    #[arg(long)]
    vin: Option<String>,

    /// Entity logical address ("0x0001" or decimal), overrides the config file
    #[arg(short, long)]
    logical_address: Option<String>,

    /// Address to bind both sockets to
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// UDP discovery and TCP data port
    #[arg(short, long)]
    port: Option<u16>,

    /// Alive check interval in seconds (0 disables the heartbeat)
    #[arg(long)]
    heartbeat_secs: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "doip_ecu=debug"
    } else {
        "doip_ecu=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let mut config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "Loading config");
            EcuConfig::load_any(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => EcuConfig::default(),
    };
    apply_overrides(&mut config, &args)?;
    config.validate().context("Invalid configuration")?;

    info!("Starting DoIP ECU emulator");

    let server = EcuServer::new(config)
        .start()
        .await
        .context("Failed to start server")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    server.shutdown().await;
    info!("Stopped");
    Ok(())
}

/// Command-line values take precedence over the config file
fn apply_overrides(config: &mut EcuConfig, args: &Args) -> Result<()> {
    if let Some(vin) = &args.vin {
        config.identity.vin = vin.clone();
    }
    if let Some(raw) = &args.logical_address {
        config.identity.logical_address =
            parse_u16(raw).with_context(|| format!("Invalid logical address: {}", raw))?;
    }
    if let Some(bind) = args.bind {
        config.network.bind = bind;
    }
    if let Some(port) = args.port {
        config.network.udp_port = port;
        config.network.tcp_port = port;
    }
    match args.heartbeat_secs {
        Some(0) => config.heartbeat.enabled = false,
        Some(secs) => {
            config.heartbeat.enabled = true;
            config.heartbeat.interval_secs = secs;
        }
        None => {}
    }
    Ok(())
}
