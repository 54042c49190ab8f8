//! TCP bridge client implementing [`TerminalPort`].
//!
//! The terminal side runs a bridge that accepts one TCP connection and
//! executes terminal calls on its behalf. The session is stateful and
//! serial: one request is in flight at a time, guarded by an async mutex.
//! Any transport fault drops the connection; the connection manager is the
//! only component that re-establishes it.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;

use crate::application::ports::{
    AccountInfo, Deal, HistoryOrder, OrderCheckResult, PendingOrder, Position, Rate,
    SnapshotFilter, SymbolInfo, TerminalError, TerminalPort, Tick, TradeRequest, TradeResult,
};
use crate::domain::trading::{OrderKind, Timeframe};

use super::protocol::{
    DealRecord, Envelope, Frame, HistoryOrderRecord, OrderRecord, PositionRecord,
    TradeRequestRecord,
};

/// Bridge endpoint and login configuration.
#[derive(Clone)]
pub struct BridgeConfig {
    /// Bridge host.
    pub host: String,
    /// Bridge port.
    pub port: u16,
    /// Account number to log in with (terminal default when absent).
    pub login: Option<i64>,
    /// Account password.
    pub password: Option<String>,
    /// Trade server name.
    pub server: Option<String>,
    /// Per-call timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .field("server", &self.server)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Failures at the bridge transport.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// Socket-level failure.
    #[error("bridge I/O error: {0}")]
    Io(String),

    /// The bridge did not answer within the configured timeout.
    #[error("bridge call timed out")]
    Timeout,

    /// The bridge answered with an undecodable frame.
    #[error("bridge protocol error: {0}")]
    Protocol(String),

    /// The bridge executed the call and the terminal reported an error.
    #[error("terminal call failed: {message} (code: {code})")]
    Call {
        /// Terminal error code.
        code: i32,
        /// Terminal error message.
        message: String,
    },

    /// No connection established.
    #[error("bridge not connected")]
    NotConnected,
}

impl From<BridgeError> for TerminalError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Protocol(message) => Self::Protocol(message),
            BridgeError::NotConnected => Self::NotConnected,
            other => Self::Transport(other.to_string()),
        }
    }
}

struct BridgeIo {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// The production terminal session: a single TCP connection to the bridge.
#[derive(Debug)]
pub struct BridgeTerminal {
    config: BridgeConfig,
    io: Mutex<Option<BridgeIo>>,
    last_error: std::sync::Mutex<(i32, String)>,
}

impl std::fmt::Debug for BridgeIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeIo").finish_non_exhaustive()
    }
}

impl BridgeTerminal {
    /// Create a disconnected bridge client.
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            io: Mutex::new(None),
            last_error: std::sync::Mutex::new((0, String::new())),
        }
    }

    fn record_last_error(&self, code: i32, message: &str) {
        let mut guard = self
            .last_error
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = (code, message.to_string());
    }

    fn stored_last_error(&self) -> (i32, String) {
        self.last_error
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Execute one bridge call, serialized with every other call.
    async fn call(&self, op: &str, params: Value) -> Result<Value, BridgeError> {
        let mut guard = self.io.lock().await;
        let io = guard.as_mut().ok_or(BridgeError::NotConnected)?;

        let mut frame = serde_json::to_string(&Frame { op, params })
            .map_err(|e| BridgeError::Protocol(e.to_string()))?;
        frame.push('\n');

        let exchange = async {
            io.writer
                .write_all(frame.as_bytes())
                .await
                .map_err(|e| BridgeError::Io(e.to_string()))?;

            let mut line = String::new();
            let n = io
                .reader
                .read_line(&mut line)
                .await
                .map_err(|e| BridgeError::Io(e.to_string()))?;
            if n == 0 {
                return Err(BridgeError::Io("connection closed by bridge".to_string()));
            }
            Ok(line)
        };

        let outcome = tokio::time::timeout(self.config.timeout, exchange).await;
        let line = match outcome {
            Ok(Ok(line)) => line,
            Ok(Err(e)) => {
                // The stream is in an unknown state; force a fresh handshake.
                *guard = None;
                return Err(e);
            }
            Err(_) => {
                *guard = None;
                return Err(BridgeError::Timeout);
            }
        };
        drop(guard);

        let envelope: Envelope =
            serde_json::from_str(&line).map_err(|e| BridgeError::Protocol(e.to_string()))?;

        if envelope.ok {
            Ok(envelope.data)
        } else {
            self.record_last_error(envelope.code, &envelope.message);
            Err(BridgeError::Call {
                code: envelope.code,
                message: envelope.message,
            })
        }
    }

    fn filter_params(filter: &SnapshotFilter) -> Value {
        match filter {
            SnapshotFilter::All => Value::Null,
            SnapshotFilter::Ticket(ticket) => json!({ "ticket": ticket }),
            SnapshotFilter::Symbol(symbol) => json!({ "symbol": symbol }),
        }
    }
}

fn decode<T: DeserializeOwned>(data: Value) -> Result<T, TerminalError> {
    serde_json::from_value(data).map_err(|e| TerminalError::Protocol(e.to_string()))
}

fn decode_opt<T: DeserializeOwned>(data: Value) -> Result<Option<T>, TerminalError> {
    if data.is_null() {
        Ok(None)
    } else {
        decode(data).map(Some)
    }
}

fn decode_records<R, T>(data: Value) -> Result<Vec<T>, TerminalError>
where
    R: DeserializeOwned,
    T: TryFrom<R, Error = String>,
{
    if data.is_null() {
        return Ok(Vec::new());
    }
    let records: Vec<R> = decode(data)?;
    records
        .into_iter()
        .map(|r| T::try_from(r).map_err(TerminalError::Protocol))
        .collect()
}

#[async_trait]
impl TerminalPort for BridgeTerminal {
    async fn connect(&self) -> Result<(), TerminalError> {
        let address = format!("{}:{}", self.config.host, self.config.port);

        let stream = tokio::time::timeout(self.config.timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| TerminalError::Transport(format!("connect to {address} timed out")))?
            .map_err(|e| TerminalError::Transport(format!("connect to {address} failed: {e}")))?;

        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();
        *self.io.lock().await = Some(BridgeIo {
            reader: BufReader::new(read_half),
            writer: write_half,
        });

        tracing::debug!(address = %address, "Bridge socket established, logging in");

        let params = json!({
            "login": self.config.login,
            "password": self.config.password,
            "server": self.config.server,
        });

        match self.call("initialize", params).await {
            Ok(_) => Ok(()),
            Err(e) => {
                *self.io.lock().await = None;
                Err(e.into())
            }
        }
    }

    async fn disconnect(&self) -> Result<(), TerminalError> {
        // Best-effort logout; the socket drops either way.
        let result = self.call("shutdown", Value::Null).await;
        *self.io.lock().await = None;
        match result {
            Ok(_) | Err(BridgeError::NotConnected) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn account_info(&self) -> Result<Option<AccountInfo>, TerminalError> {
        decode_opt(self.call("account_info", Value::Null).await.map_err(TerminalError::from)?)
    }

    async fn symbol_select(&self, symbol: &str) -> Result<bool, TerminalError> {
        let data = self
            .call("symbol_select", json!({ "symbol": symbol, "enable": true }))
            .await
            .map_err(TerminalError::from)?;
        decode(data)
    }

    async fn symbol_info(&self, symbol: &str) -> Result<Option<SymbolInfo>, TerminalError> {
        decode_opt(
            self.call("symbol_info", json!({ "symbol": symbol }))
                .await
                .map_err(TerminalError::from)?,
        )
    }

    async fn symbol_tick(&self, symbol: &str) -> Result<Option<Tick>, TerminalError> {
        decode_opt(
            self.call("symbol_info_tick", json!({ "symbol": symbol }))
                .await
                .map_err(TerminalError::from)?,
        )
    }

    async fn symbol_names(&self, search: &str) -> Result<Vec<String>, TerminalError> {
        let data = self
            .call("symbols_get", json!({ "group": search }))
            .await
            .map_err(TerminalError::from)?;
        if data.is_null() {
            return Ok(Vec::new());
        }
        decode(data)
    }

    async fn rates_from_pos(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: u32,
        count: u32,
    ) -> Result<Option<Vec<Rate>>, TerminalError> {
        decode_opt(
            self.call(
                "copy_rates_from_pos",
                json!({
                    "symbol": symbol,
                    "timeframe": timeframe.code(),
                    "start": start,
                    "count": count,
                }),
            )
            .await
            .map_err(TerminalError::from)?,
        )
    }

    async fn rates_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<Vec<Rate>>, TerminalError> {
        decode_opt(
            self.call(
                "copy_rates_range",
                json!({
                    "symbol": symbol,
                    "timeframe": timeframe.code(),
                    "from": from.timestamp(),
                    "to": to.timestamp(),
                }),
            )
            .await
            .map_err(TerminalError::from)?,
        )
    }

    async fn order_send(
        &self,
        request: &TradeRequest,
    ) -> Result<Option<TradeResult>, TerminalError> {
        let record = TradeRequestRecord::from(request);
        let params =
            serde_json::to_value(&record).map_err(|e| TerminalError::Protocol(e.to_string()))?;
        decode_opt(self.call("order_send", params).await.map_err(TerminalError::from)?)
    }

    async fn order_check(
        &self,
        request: &TradeRequest,
    ) -> Result<Option<OrderCheckResult>, TerminalError> {
        let record = TradeRequestRecord::from(request);
        let params =
            serde_json::to_value(&record).map_err(|e| TerminalError::Protocol(e.to_string()))?;
        decode_opt(self.call("order_check", params).await.map_err(TerminalError::from)?)
    }

    async fn order_calc_margin(
        &self,
        kind: OrderKind,
        symbol: &str,
        volume: f64,
        price: f64,
    ) -> Result<Option<f64>, TerminalError> {
        decode_opt(
            self.call(
                "order_calc_margin",
                json!({
                    "type": kind.code(),
                    "symbol": symbol,
                    "volume": volume,
                    "price": price,
                }),
            )
            .await
            .map_err(TerminalError::from)?,
        )
    }

    async fn order_calc_profit(
        &self,
        kind: OrderKind,
        symbol: &str,
        volume: f64,
        price_open: f64,
        price_close: f64,
    ) -> Result<Option<f64>, TerminalError> {
        decode_opt(
            self.call(
                "order_calc_profit",
                json!({
                    "type": kind.code(),
                    "symbol": symbol,
                    "volume": volume,
                    "price_open": price_open,
                    "price_close": price_close,
                }),
            )
            .await
            .map_err(TerminalError::from)?,
        )
    }

    async fn positions(&self, filter: &SnapshotFilter) -> Result<Vec<Position>, TerminalError> {
        let data = self
            .call("positions_get", Self::filter_params(filter))
            .await
            .map_err(TerminalError::from)?;
        decode_records::<PositionRecord, Position>(data)
    }

    async fn positions_total(&self) -> Result<u64, TerminalError> {
        decode(self.call("positions_total", Value::Null).await.map_err(TerminalError::from)?)
    }

    async fn pending_orders(
        &self,
        filter: &SnapshotFilter,
    ) -> Result<Vec<PendingOrder>, TerminalError> {
        let data = self
            .call("orders_get", Self::filter_params(filter))
            .await
            .map_err(TerminalError::from)?;
        decode_records::<OrderRecord, PendingOrder>(data)
    }

    async fn deals_for_position(&self, position: u64) -> Result<Vec<Deal>, TerminalError> {
        let data = self
            .call("history_deals_get", json!({ "position": position }))
            .await
            .map_err(TerminalError::from)?;
        decode_records::<DealRecord, Deal>(data)
    }

    async fn deals_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        position: u64,
    ) -> Result<Vec<Deal>, TerminalError> {
        let data = self
            .call(
                "history_deals_get",
                json!({
                    "from": from.timestamp(),
                    "to": to.timestamp(),
                    "position": position,
                }),
            )
            .await
            .map_err(TerminalError::from)?;
        decode_records::<DealRecord, Deal>(data)
    }

    async fn history_orders(&self, ticket: u64) -> Result<Vec<HistoryOrder>, TerminalError> {
        let data = self
            .call("history_orders_get", json!({ "ticket": ticket }))
            .await
            .map_err(TerminalError::from)?;
        decode_records::<HistoryOrderRecord, HistoryOrder>(data)
    }

    async fn last_error(&self) -> (i32, String) {
        match self.call("last_error", Value::Null).await {
            Ok(data) => decode::<(i32, String)>(data).unwrap_or_else(|_| self.stored_last_error()),
            Err(_) => self.stored_last_error(),
        }
    }
}
