//! Connection lifecycle management for the terminal session.
//!
//! The terminal allows exactly one session per process, and that session
//! drops silently whenever the terminal restarts or loses its own link. This
//! manager owns the handle and heals it on demand: every operation calls
//! [`ConnectionManager::ensure_connection`] before touching the venue, so no
//! background heartbeat thread is needed. Reconnection uses bounded
//! exponential backoff; the waits happen on the calling task, mirroring the
//! synchronous nature of the underlying session protocol.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use std::fmt;

use crate::application::ports::TerminalPort;

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No usable session.
    Disconnected,
    /// A reconnection attempt is in flight.
    Reconnecting,
    /// Session established and last probe answered.
    Connected,
}

impl ConnectionStatus {
    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Reconnecting => "reconnecting",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reconnection policy.
#[derive(Debug, Clone)]
pub struct ReconnectSettings {
    /// Maximum login attempts per `initialize` call (at least 1).
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for each retry after that.
    pub base_delay: Duration,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
struct StateCell {
    status: ConnectionStatus,
    last_error: Option<String>,
}

/// Owns the single terminal session and keeps it alive.
///
/// Constructed once in `main` and injected into every use case. Status reads
/// and transitions are guarded by a lock; concurrent health probes may race,
/// which is fine because probes and reconnects are idempotent and the
/// terminal tolerates concurrent session calls.
#[derive(Debug)]
pub struct ConnectionManager<T: TerminalPort> {
    terminal: Arc<T>,
    settings: ReconnectSettings,
    state: RwLock<StateCell>,
}

impl<T: TerminalPort> ConnectionManager<T> {
    /// Create a manager in the `Disconnected` state.
    pub fn new(terminal: Arc<T>, settings: ReconnectSettings) -> Self {
        Self {
            terminal,
            settings,
            state: RwLock::new(StateCell {
                status: ConnectionStatus::Disconnected,
                last_error: None,
            }),
        }
    }

    /// The session handle.
    #[must_use]
    pub fn terminal(&self) -> &Arc<T> {
        &self.terminal
    }

    /// Current state.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .status
    }

    /// Diagnostic from the most recent failure, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_error
            .clone()
    }

    /// Whether the last known state is `Connected`.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// The only place status changes. Records the transition and diagnostic.
    fn set_status(&self, new_status: ConnectionStatus, error: Option<String>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let old_status = state.status;
        state.status = new_status;
        state.last_error = error.clone();
        drop(state);

        if old_status != new_status {
            tracing::info!(
                old_status = %old_status,
                new_status = %new_status,
                error = error.as_deref(),
                "Terminal connection state changed"
            );
        }
    }

    /// One handshake + account-probe attempt.
    async fn try_login(&self) -> Result<(), String> {
        self.terminal
            .connect()
            .await
            .map_err(|e| format!("Terminal handshake failed: {e}"))?;

        match self.terminal.account_info().await {
            Ok(Some(account)) => {
                tracing::info!(
                    account = account.login,
                    server = %account.server,
                    "Terminal session initialized"
                );
                Ok(())
            }
            Ok(None) => {
                let (code, message) = self.terminal.last_error().await;
                Err(format!(
                    "Terminal initialization failed: {message} (code: {code})"
                ))
            }
            Err(e) => Err(format!("Account probe failed: {e}")),
        }
    }

    /// Log in, retrying with exponential backoff.
    ///
    /// Attempt *k* > 1 first sets the state to `Reconnecting` with an attempt
    /// diagnostic; the delay before it is `base_delay * 2^(k-2)`, awaited on
    /// the calling task. Success requires the handshake and a non-empty
    /// account probe. Returns `false` after exhausting all attempts, leaving
    /// the state `Disconnected` with a final diagnostic.
    pub async fn initialize(&self) -> bool {
        let max_attempts = self.settings.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                self.set_status(
                    ConnectionStatus::Reconnecting,
                    Some(format!("Reconnection attempt {attempt}/{max_attempts}")),
                );
            }

            match self.try_login().await {
                Ok(()) => {
                    self.set_status(ConnectionStatus::Connected, None);
                    return true;
                }
                Err(message) => {
                    tracing::error!(attempt, error = %message, "Terminal login attempt failed");
                    self.set_status(ConnectionStatus::Disconnected, Some(message));
                }
            }

            if attempt < max_attempts {
                let delay = self
                    .settings
                    .base_delay
                    .saturating_mul(2_u32.saturating_pow(attempt - 1));
                tracing::info!(attempt, delay_secs = delay.as_secs_f64(), "Retrying login");
                tokio::time::sleep(delay).await;
            }
        }

        let final_error =
            format!("Failed to initialize terminal session after {max_attempts} attempts");
        tracing::error!("{final_error}");
        self.set_status(ConnectionStatus::Disconnected, Some(final_error));
        false
    }

    /// Verify the session is alive, reconnecting if it is not.
    ///
    /// A connected session is probed cheaply with an account fetch; if the
    /// probe answers, nothing changes. An empty or failed probe marks the
    /// session `Disconnected` and falls through to [`Self::initialize`],
    /// which makes every caller self-healing without a background thread.
    pub async fn ensure_connection(&self) -> bool {
        if self.is_connected() {
            match self.terminal.account_info().await {
                Ok(Some(_)) => return true,
                Ok(None) => {
                    tracing::warn!("Terminal connection lost, account probe returned no data");
                    self.set_status(
                        ConnectionStatus::Disconnected,
                        Some("Connection lost".to_string()),
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Terminal connection check failed");
                    self.set_status(ConnectionStatus::Disconnected, Some(e.to_string()));
                }
            }
        }

        tracing::info!("Attempting to reconnect to terminal");
        self.initialize().await
    }

    /// Gracefully log out. Idempotent; logout failures are logged, never
    /// propagated, and the state always ends `Disconnected`.
    pub async fn shutdown(&self) {
        if self.status() == ConnectionStatus::Disconnected {
            return;
        }

        match self.terminal.disconnect().await {
            Ok(()) => tracing::info!("Terminal session shut down gracefully"),
            Err(e) => tracing::error!(error = %e, "Error during terminal shutdown"),
        }
        self.set_status(ConnectionStatus::Disconnected, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::terminal::MockTerminal;
    use tokio::time::Instant;

    fn manager_with(terminal: Arc<MockTerminal>, settings: ReconnectSettings) -> ConnectionManager<MockTerminal> {
        ConnectionManager::new(terminal, settings)
    }

    #[tokio::test]
    async fn initialize_success_connects_on_first_attempt() {
        let terminal = Arc::new(MockTerminal::new());
        let manager = manager_with(Arc::clone(&terminal), ReconnectSettings::default());

        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
        assert!(manager.initialize().await);
        assert_eq!(manager.status(), ConnectionStatus::Connected);
        assert_eq!(terminal.connect_calls(), 1);
        assert!(manager.last_error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_backs_off_exponentially_then_gives_up() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.fail_all_connects();
        let manager = manager_with(
            Arc::clone(&terminal),
            ReconnectSettings {
                max_attempts: 3,
                base_delay: Duration::from_secs(1),
            },
        );

        let started = Instant::now();
        let ok = manager.initialize().await;
        let elapsed = started.elapsed();

        assert!(!ok);
        // 1s after attempt 1, 2s after attempt 2, none after the last.
        assert_eq!(elapsed, Duration::from_secs(3));
        assert_eq!(terminal.connect_calls(), 3);
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
        let error = manager.last_error().unwrap();
        assert!(error.contains("after 3 attempts"), "got: {error}");
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_recovers_after_transient_failures() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.fail_connects(2);
        let manager = manager_with(
            Arc::clone(&terminal),
            ReconnectSettings {
                max_attempts: 3,
                base_delay: Duration::from_millis(100),
            },
        );

        assert!(manager.initialize().await);
        assert_eq!(terminal.connect_calls(), 3);
        assert_eq!(manager.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn initialize_fails_when_account_probe_is_empty() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.set_account(None);
        terminal.set_last_error(10005, "no connection to trade server");
        let manager = manager_with(
            Arc::clone(&terminal),
            ReconnectSettings {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
            },
        );

        assert!(!manager.initialize().await);
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn ensure_connection_probes_without_reconnecting_when_healthy() {
        let terminal = Arc::new(MockTerminal::new());
        let manager = manager_with(Arc::clone(&terminal), ReconnectSettings::default());

        assert!(manager.initialize().await);
        assert_eq!(terminal.connect_calls(), 1);

        assert!(manager.ensure_connection().await);
        // Probe only; no new handshake.
        assert_eq!(terminal.connect_calls(), 1);
        assert_eq!(manager.status(), ConnectionStatus::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_connection_reinitializes_after_lost_probe() {
        let terminal = Arc::new(MockTerminal::new());
        let manager = manager_with(Arc::clone(&terminal), ReconnectSettings::default());
        assert!(manager.initialize().await);

        // Session drops: probe fails once, then the reconnect succeeds.
        terminal.fail_account_probes(1);
        assert!(manager.ensure_connection().await);
        assert_eq!(terminal.connect_calls(), 2);
        assert_eq!(manager.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn ensure_connection_initializes_when_disconnected() {
        let terminal = Arc::new(MockTerminal::new());
        let manager = manager_with(Arc::clone(&terminal), ReconnectSettings::default());

        assert!(manager.ensure_connection().await);
        assert_eq!(terminal.connect_calls(), 1);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let terminal = Arc::new(MockTerminal::new());
        let manager = manager_with(Arc::clone(&terminal), ReconnectSettings::default());
        assert!(manager.initialize().await);

        manager.shutdown().await;
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
        assert_eq!(terminal.disconnect_calls(), 1);

        // Already disconnected: no second logout.
        manager.shutdown().await;
        assert_eq!(terminal.disconnect_calls(), 1);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ConnectionStatus::Reconnecting).unwrap(),
            "\"reconnecting\""
        );
    }
}
