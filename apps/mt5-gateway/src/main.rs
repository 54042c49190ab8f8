//! MT5 Gateway Binary
//!
//! Starts the gateway: one terminal session, one HTTP server.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin mt5-gateway
//! ```
//!
//! # Environment Variables
//!
//! - `MT5_API_PORT`: HTTP port (default: 5001)
//! - `MT5_BRIDGE_HOST` / `MT5_BRIDGE_PORT`: terminal bridge endpoint
//! - `MT5_LOGIN` / `MT5_PASSWORD` / `MT5_SERVER`: terminal login (optional)
//! - `MT5_RECONNECT_ATTEMPTS`: login attempts per reconnect (default: 3)
//! - `MT5_RECONNECT_BASE_DELAY`: first retry delay in seconds (default: 1.0)
//! - `MT5_CONNECTION_ERROR_CODES`: terminal error codes treated as session
//!   faults (default: 10004,10005,10006)
//! - `MT5_CONNECTION_FAULT_RETCODES`: trade retcodes treated as session
//!   faults (default: 10018,10019,10020)
//! - `RUST_LOG`: log filter (default: info)

use std::net::SocketAddr;
use std::sync::Arc;

use mt5_gateway::infrastructure::config::Settings;
use mt5_gateway::infrastructure::http::{AppState, create_router};
use mt5_gateway::infrastructure::terminal::BridgeTerminal;
use mt5_gateway::{ConnectionManager, MockTerminal, TerminalPort};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    tracing::info!("Starting MT5 gateway");

    let settings = Settings::from_env()?;
    log_config(&settings);

    if std::env::var("MT5_MOCK_TERMINAL").is_ok_and(|v| v == "1") {
        // Scripted terminal for local development without a real bridge.
        tracing::warn!("Running against the mock terminal - no real trades");
        let terminal = Arc::new(MockTerminal::new());
        run(settings, terminal).await
    } else {
        let terminal = Arc::new(BridgeTerminal::new(settings.bridge.clone()));
        run(settings, terminal).await
    }
}

async fn run<T: TerminalPort + 'static>(
    settings: Settings,
    terminal: Arc<T>,
) -> anyhow::Result<()> {
    let manager = Arc::new(ConnectionManager::new(terminal, settings.reconnect.clone()));

    // The session self-heals per request, so a failed first login is not
    // fatal; the server starts and readiness reports the state.
    if !manager.initialize().await {
        tracing::error!("Failed to initialize terminal session, starting server anyway");
    }

    let state = AppState::new(Arc::clone(&manager), settings.fault_codes.clone());
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.http_port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(port = settings.http_port, "HTTP server listening");

    let shutdown_token = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown_token.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_token.cancelled_owned())
        .await?;

    tracing::info!("Received shutdown signal, closing terminal session");
    manager.shutdown().await;

    tracing::info!("MT5 gateway stopped");
    Ok(())
}

/// Initialize the tracing subscriber with environment filter.
#[allow(clippy::expect_used)]
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "mt5_gateway=info"
                    .parse()
                    .expect("static directive 'mt5_gateway=info' is valid"),
            ),
        )
        .init();
}

fn log_config(settings: &Settings) {
    tracing::info!(
        http_port = settings.http_port,
        bridge_host = %settings.bridge.host,
        bridge_port = settings.bridge.port,
        reconnect_attempts = settings.reconnect.max_attempts,
        reconnect_base_delay_secs = settings.reconnect.base_delay.as_secs_f64(),
        "Configuration loaded"
    );
}

/// Cancel the token on SIGTERM or ctrl-c.
async fn watch_signals(token: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    token.cancel();
}
