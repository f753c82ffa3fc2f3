//! mbe - Command-line tools for MBE engine ECUs
//!
//! Identify, scan live parameters, simulate an ECU or watch broadcast
//! frames over SocketCAN.

mod commands;
mod config;
mod output;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mbe_proto::{
    load_params, CanTransport, Connection, FakeEcu, MockTransport, ParamSet, Session, ECU_ID,
    TOOL_ID,
};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::commands::ScanOptions;
use crate::config::{Config, MergedConfig, Overrides};
use crate::output::OutputContext;

#[derive(Parser)]
#[command(name = "mbe")]
#[command(author, version, about = "MBE engine ECU diagnostics over CAN")]
#[command(propagate_version = true)]
struct Cli {
    /// CAN interface name
    #[arg(short, long, env = "MBE_DEVICE")]
    device: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "MBE_CONFIG")]
    config: Option<PathBuf>,

    /// Send/receive timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Delay before each request in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Use an in-memory bus with a simulated ECU instead of SocketCAN
    #[arg(long)]
    mock: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the ECU version string
    Ver,

    /// Poll parameters and print their values
    Scan {
        /// Parameter list (YAML)
        #[arg(short, long)]
        params: Option<PathBuf>,

        /// Also show the raw bytes
        #[arg(long)]
        raw: bool,

        /// Poll once and exit
        #[arg(long)]
        once: bool,

        /// Time between polls in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Answer requests as a simulated ECU
    Fake {
        /// Serial to report (a trailing NUL is appended)
        #[arg(long)]
        serial: Option<String>,
    },

    /// Print decoded broadcast frames
    Bcast,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    // Load config file
    let file_config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::default(),
    };

    let (params, interval_ms) = match &cli.command {
        Commands::Scan {
            params,
            interval_ms,
            ..
        } => (params.clone(), *interval_ms),
        _ => (None, None),
    };

    // Merge CLI args with config
    let merged = file_config.merge_with_args(Overrides {
        device: cli.device.clone(),
        timeout_ms: cli.timeout_ms,
        delay_ms: cli.delay_ms,
        interval_ms,
        params,
    });

    let ctx = OutputContext::new(cli.no_color, cli.quiet);

    if cli.mock {
        return run(MockTransport::default(), &cli.command, &merged, &ctx).await;
    }
    run_socketcan(&cli.command, &merged, &ctx).await
}

#[cfg(all(target_os = "linux", feature = "socketcan"))]
async fn run_socketcan(
    command: &Commands,
    config: &MergedConfig,
    ctx: &OutputContext,
) -> Result<()> {
    run(mbe_proto::SocketCanTransport, command, config, ctx).await
}

#[cfg(not(all(target_os = "linux", feature = "socketcan")))]
async fn run_socketcan(_: &Commands, _: &MergedConfig, _: &OutputContext) -> Result<()> {
    use mbe_proto::TransportError;

    let err = TransportError::Unsupported("SocketCAN is not available in this build".into());
    Err(err).context("Use --mock to run against the simulated ECU")
}

/// Execute a command on the given transport
async fn run<T: CanTransport>(
    transport: T,
    command: &Commands,
    config: &MergedConfig,
    ctx: &OutputContext,
) -> Result<()> {
    match command {
        Commands::Ver => {
            let mut session = open_session(transport, config).await?;
            commands::ver(&mut session, ctx).await?;
        }

        Commands::Scan { raw, once, .. } => {
            let path = match &config.params {
                Some(path) => path,
                None => {
                    bail!("No parameter list given; pass --params or set it in the config file")
                }
            };
            let params = load_params(path)
                .with_context(|| format!("Failed to load parameters from {}", path.display()))?;
            let params = ParamSet::new(params);

            let mut session = open_session(transport, config).await?;
            let opts = ScanOptions {
                raw: *raw,
                once: *once,
                interval: config.interval,
            };
            commands::scan(&mut session, &params, opts, ctx).await?;
        }

        Commands::Fake { serial } => {
            let mut ecu = FakeEcu::new();
            if let Some(serial) = serial {
                let mut bytes = serial.clone().into_bytes();
                bytes.push(0);
                ecu = ecu.with_serial(bytes);
            }

            // Receive from the tool, transmit as the ECU
            let mut conn = Connection::open(transport, config.device.as_str(), TOOL_ID, ECU_ID)
                .await
                .with_context(|| format!("Failed to open CAN device {}", config.device))?;
            conn.set_timeout(config.timeout);
            commands::fake(&mut conn, &ecu, ctx).await?;
        }

        Commands::Bcast => {
            commands::bcast(&transport, &config.device, ctx).await?;
        }
    }

    Ok(())
}

/// Open a tool-side session with the configured timeout and delay
async fn open_session<T: CanTransport>(transport: T, config: &MergedConfig) -> Result<Session<T>> {
    let mut conn = Connection::open(transport, config.device.as_str(), ECU_ID, TOOL_ID)
        .await
        .with_context(|| format!("Failed to open CAN device {}", config.device))?;
    conn.set_timeout(config.timeout);
    Ok(Session::new(conn).with_request_delay(config.request_delay))
}
