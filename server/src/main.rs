//! `utms-server`: persistent vehicle session over HTTP

mod routes;
mod stream;

use clap::Parser;
use routes::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use utms_edge::{
    Backend, FixedPorts, LinkProvider, PortScanner, SerialPortScanner, SessionConfig,
    SessionManager,
};
use utms_shared::defaults;

#[derive(Parser, Debug)]
#[command(name = "utms-server", version, about = "Persistent UAV vehicle session server")]
struct Args {
    /// Address the HTTP server listens on
    #[arg(long, env = "UTMS_BIND", default_value = "0.0.0.0:5555")]
    bind: SocketAddr,

    /// Vehicle link backend
    #[arg(long, env = "UTMS_BACKEND", value_enum, default_value_t = Backend::default())]
    backend: Backend,

    /// Ports tried by scan/auto-connect instead of host enumeration
    #[arg(long = "candidate-port", env = "UTMS_CANDIDATE_PORTS", value_delimiter = ',')]
    candidate_ports: Vec<String>,

    /// Wait for the vehicle to report the requested mode
    #[arg(long, env = "UTMS_VERIFY_MODE")]
    verify_mode: bool,

    /// Port used by /connect when the body names none
    #[arg(long, env = "UTMS_DEFAULT_PORT", default_value = defaults::SERVER_PORT)]
    default_port: String,

    /// Baud used by /connect when the body names none
    #[arg(long, env = "UTMS_DEFAULT_BAUD", default_value_t = defaults::SERVER_BAUD)]
    default_baud: u32,

    /// Period of the /ws telemetry stream
    #[arg(long, env = "UTMS_TELEMETRY_INTERVAL_MS", default_value_t = 500)]
    telemetry_interval_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();

    let scanner: Arc<dyn PortScanner> = if args.candidate_ports.is_empty() {
        Arc::new(SerialPortScanner)
    } else {
        Arc::new(FixedPorts::from_names(args.candidate_ports.iter().cloned()))
    };
    let config = SessionConfig {
        verify_mode_change: args.verify_mode,
        default_port: args.default_port.clone(),
        ..Default::default()
    };
    let provider = LinkProvider::from_backend(args.backend);
    info!(backend = provider.name(), "starting utms server");
    let manager = SessionManager::new(provider, scanner.clone(), config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState {
        manager: Arc::new(Mutex::new(manager)),
        scanner,
        default_port: args.default_port,
        default_baud: args.default_baud,
        telemetry_interval: Duration::from_millis(args.telemetry_interval_ms.max(1)),
        shutdown: shutdown_rx,
    };

    let listener = TcpListener::bind(args.bind).await?;
    info!(address = %listener.local_addr()?, "listening");

    axum::serve(listener, routes::router(state.clone()))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutting down");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    state.manager.lock().await.close().await;
    info!("server stopped");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal as unix_signal, SignalKind};

    match unix_signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = signal::ctrl_c() => {},
                _ = term.recv() => {},
            }
        }
        Err(err) => {
            warn!(error = %err, "SIGTERM handler unavailable");
            let _ = signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
}
