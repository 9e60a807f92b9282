/// Interactive console for BLE peripherals exposing the Nordic UART Service
// Import modules
mod ble;
mod config;
mod service;
mod terminal;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgGroup, Parser};
use tracing::{error, info};

// Use public API from modules
use config::{BridgeConfig, ConfigLoader, init_logging};
use service::{ExitReason, RelayOptions, run_session};
use terminal::{Console, CrosstermTerminal, StdinSource};

/// Connect to a NUS peripheral and relay the local terminal to it. Ctrl-X exits.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("target").args(["name", "address"])))]
struct Cli {
    /// Connect to the device advertising this name
    #[arg(short, long)]
    name: Option<String>,

    /// Connect to the device with this address
    #[arg(short, long)]
    address: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Stop scanning after this many seconds
    #[arg(long, value_name = "SECS")]
    scan_timeout: Option<u64>,

    /// Leave the device connected on exit
    #[arg(long, default_value_t = false)]
    keep_connected: bool,
}

impl Cli {
    /// Flags override the configuration file
    fn apply(&self, config: &mut BridgeConfig) {
        if let Some(name) = &self.name {
            config.device.name = Some(name.clone());
            config.device.address = None;
        }
        if let Some(address) = &self.address {
            config.device.address = Some(address.clone());
            config.device.name = None;
        }
        if let Some(secs) = self.scan_timeout {
            config.device.scan_timeout_secs = Some(secs);
        }
        if self.keep_connected {
            config.device.disconnect_on_exit = false;
        }
    }
}

fn exit_code(reason: ExitReason) -> i32 {
    match reason {
        ExitReason::UserExit | ExitReason::InputClosed => 0,
        ExitReason::LinkLost => 1,
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitReason> {
    // Load configuration
    let mut config = ConfigLoader::new()
        .load_config(cli.config.as_deref())
        .context("Failed to load configuration")?;
    cli.apply(&mut config);
    config
        .validate()
        .context("Invalid command line arguments")?;

    // Initialize logging; the guard flushes file logs when dropped
    let _logging = init_logging(&config.logging, cli.debug).context("Failed to initialize logging")?;
    info!("Starting with {:?}", config.device);

    let adapter = ble::create_adapter()
        .await
        .context("No usable Bluetooth adapter")?;

    let options = RelayOptions::from(&config.device);
    let mut input = StdinSource::new();
    let reason = run_session(
        adapter,
        Arc::new(CrosstermTerminal),
        &mut input,
        Console::stdio(),
        &options,
    )
    .await
    .inspect_err(|e| error!("Session failed: {}", e))?;

    Ok(reason)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(reason) => exit_code(reason),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}
