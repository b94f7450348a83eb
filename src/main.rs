//! `utms`: run one vehicle command and print a single JSON line

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use utms_edge::command::{execute, Command, Reply};
use utms_edge::{
    Backend, FixedPorts, LinkProvider, PortScanner, SerialPortScanner, SessionConfig,
    SessionManager,
};
use utms_shared::codec::encode_line;

#[derive(Parser, Debug)]
#[command(name = "utms", version, about = "One-shot UAV vehicle command")]
struct Cli {
    /// Vehicle link backend
    #[arg(long, env = "UTMS_BACKEND", value_enum, default_value_t = Backend::default())]
    backend: Backend,

    /// Ports tried by scan_ports/auto_connect instead of host enumeration
    #[arg(long = "candidate-port", env = "UTMS_CANDIDATE_PORTS", value_delimiter = ',')]
    candidate_ports: Vec<String>,

    /// Wait for the vehicle to report the requested mode
    #[arg(long, env = "UTMS_VERIFY_MODE")]
    verify_mode: bool,

    /// scan_ports, auto_connect, connect, disconnect, telemetry, arm, disarm,
    /// mode, takeoff, land or goto
    #[arg(default_value = "telemetry")]
    command: String,

    /// Positional command arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the reply; logs go to stderr
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    debug!(?cli, "starting");

    let reply = match Command::parse(&cli.command, cli.args.as_slice()) {
        Ok(command) => run(&cli, command).await,
        Err(err) => Reply::from(err),
    };

    println!("{}", encode_line(&reply.to_value())?);
    Ok(())
}

async fn run(cli: &Cli, command: Command) -> Reply {
    let scanner: Arc<dyn PortScanner> = if cli.candidate_ports.is_empty() {
        Arc::new(SerialPortScanner)
    } else {
        Arc::new(FixedPorts::from_names(cli.candidate_ports.iter().cloned()))
    };
    let config = SessionConfig {
        verify_mode_change: cli.verify_mode,
        ..Default::default()
    };
    let mut manager = SessionManager::new(LinkProvider::from_backend(cli.backend), scanner, config);

    let reply = tokio::select! {
        reply = execute(&mut manager, &command) => reply,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            Reply::Interrupted
        }
    };

    manager.close().await;
    reply
}
