//! Terminal Port (Driven Port)
//!
//! Interface to the single native terminal session. One implementation talks
//! to the real terminal bridge; tests swap in a scripted mock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::trading::{FillingMode, OrderKind, TimePolicy, TradeAction};

use super::snapshots::{
    AccountInfo, Deal, HistoryOrder, PendingOrder, Position, Rate, SnapshotFilter, SymbolInfo,
    Tick,
};

/// A venue-native trade instruction, derived from a validated intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    /// What to do.
    pub action: TradeAction,
    /// Instrument (deals and pending placements).
    pub symbol: Option<String>,
    /// Volume in lots.
    pub volume: Option<f64>,
    /// Order kind.
    pub kind: Option<OrderKind>,
    /// Execution or trigger price.
    pub price: Option<f64>,
    /// Stop loss.
    pub sl: Option<f64>,
    /// Take profit.
    pub tp: Option<f64>,
    /// Maximum price deviation, in points.
    pub deviation: Option<u32>,
    /// Strategy tag.
    pub magic: Option<i64>,
    /// Free-form comment.
    pub comment: Option<String>,
    /// Position ticket (close / partial close / SLTP).
    pub position: Option<u64>,
    /// Pending order ticket (modify / remove).
    pub order: Option<u64>,
    /// Order lifetime policy.
    pub time_policy: TimePolicy,
    /// Filling policy.
    pub filling: FillingMode,
}

impl TradeRequest {
    fn base(action: TradeAction, filling: FillingMode) -> Self {
        Self {
            action,
            symbol: None,
            volume: None,
            kind: None,
            price: None,
            sl: None,
            tp: None,
            deviation: None,
            magic: None,
            comment: None,
            position: None,
            order: None,
            time_policy: TimePolicy::Gtc,
            filling,
        }
    }

    /// A market deal or pending placement.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        action: TradeAction,
        symbol: &str,
        kind: OrderKind,
        volume: f64,
        price: f64,
        sl: Option<f64>,
        tp: Option<f64>,
        deviation: u32,
        magic: i64,
        comment: &str,
        filling: FillingMode,
    ) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            volume: Some(volume),
            kind: Some(kind),
            price: Some(price),
            sl,
            tp,
            deviation: Some(deviation),
            magic: Some(magic),
            comment: Some(comment.to_string()),
            ..Self::base(action, filling)
        }
    }

    /// A deal that flattens (part of) an open position.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn close(
        position: u64,
        symbol: &str,
        kind: OrderKind,
        volume: f64,
        price: f64,
        deviation: u32,
        magic: i64,
        comment: &str,
        filling: FillingMode,
    ) -> Self {
        Self {
            position: Some(position),
            symbol: Some(symbol.to_string()),
            volume: Some(volume),
            kind: Some(kind),
            price: Some(price),
            deviation: Some(deviation),
            magic: Some(magic),
            comment: Some(comment.to_string()),
            ..Self::base(TradeAction::Deal, filling)
        }
    }

    /// Change an open position's protective stops.
    #[must_use]
    pub fn position_sltp(position: u64, sl: Option<f64>, tp: Option<f64>) -> Self {
        Self {
            position: Some(position),
            sl,
            tp,
            ..Self::base(TradeAction::Sltp, FillingMode::Return)
        }
    }

    /// Re-price a pending order.
    #[must_use]
    pub fn modify_pending(order: u64, price: f64, sl: f64, tp: f64) -> Self {
        Self {
            order: Some(order),
            price: Some(price),
            sl: Some(sl),
            tp: Some(tp),
            ..Self::base(TradeAction::Modify, FillingMode::Return)
        }
    }

    /// Delete a pending order.
    #[must_use]
    pub fn remove_pending(order: u64) -> Self {
        Self {
            order: Some(order),
            ..Self::base(TradeAction::Remove, FillingMode::Return)
        }
    }
}

/// Outcome the terminal reports for a trade request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    /// Venue return code.
    pub retcode: u32,
    /// Deal ticket, if a deal executed.
    pub deal: u64,
    /// Order ticket, if an order was placed or touched.
    pub order: u64,
    /// Executed volume.
    pub volume: f64,
    /// Execution price.
    pub price: f64,
    /// Bid at execution.
    pub bid: f64,
    /// Ask at execution.
    pub ask: f64,
    /// Venue comment.
    pub comment: String,
}

/// Outcome of a dry-run order check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCheckResult {
    /// Venue return code (0 or done = feasible).
    pub retcode: u32,
    /// Balance after the hypothetical execution.
    pub balance: f64,
    /// Equity after the hypothetical execution.
    pub equity: f64,
    /// Floating profit after the hypothetical execution.
    pub profit: f64,
    /// Margin the order would require.
    pub margin: f64,
    /// Free margin remaining after the order.
    pub margin_free: f64,
    /// Margin level after the order, percent.
    pub margin_level: f64,
    /// Venue comment.
    pub comment: String,
}

/// Failures at the terminal session boundary.
#[derive(Debug, Clone, Error)]
pub enum TerminalError {
    /// The transport to the terminal failed.
    #[error("terminal transport error: {0}")]
    Transport(String),

    /// No session is established.
    #[error("terminal session not connected")]
    NotConnected,

    /// The terminal answered with something the codec cannot decode.
    #[error("terminal protocol error: {0}")]
    Protocol(String),
}

/// Port for the native terminal session.
///
/// The session is inherently singular and stateful; implementations own the
/// one handle and serialize access to it. All reads are point-in-time
/// snapshots.
#[async_trait]
pub trait TerminalPort: Send + Sync {
    /// Perform the native handshake and log in.
    async fn connect(&self) -> Result<(), TerminalError>;

    /// Log out and drop the session.
    async fn disconnect(&self) -> Result<(), TerminalError>;

    /// Fetch the account snapshot. `None` means the session answered empty,
    /// which callers treat as a dead session.
    async fn account_info(&self) -> Result<Option<AccountInfo>, TerminalError>;

    /// Ensure a symbol exists and is selected in the watch-list.
    async fn symbol_select(&self, symbol: &str) -> Result<bool, TerminalError>;

    /// Fetch an instrument snapshot.
    async fn symbol_info(&self, symbol: &str) -> Result<Option<SymbolInfo>, TerminalError>;

    /// Fetch the latest quote.
    async fn symbol_tick(&self, symbol: &str) -> Result<Option<Tick>, TerminalError>;

    /// List symbol names matching a glob pattern.
    async fn symbol_names(&self, search: &str) -> Result<Vec<String>, TerminalError>;

    /// Fetch bars counted back from a bar index.
    async fn rates_from_pos(
        &self,
        symbol: &str,
        timeframe: crate::domain::trading::Timeframe,
        start: u32,
        count: u32,
    ) -> Result<Option<Vec<Rate>>, TerminalError>;

    /// Fetch bars within a UTC time range.
    async fn rates_range(
        &self,
        symbol: &str,
        timeframe: crate::domain::trading::Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<Vec<Rate>>, TerminalError>;

    /// Submit a trade request. `None` means the terminal gave no response.
    async fn order_send(&self, request: &TradeRequest)
    -> Result<Option<TradeResult>, TerminalError>;

    /// Dry-run a trade request.
    async fn order_check(
        &self,
        request: &TradeRequest,
    ) -> Result<Option<OrderCheckResult>, TerminalError>;

    /// Margin required for a hypothetical order.
    async fn order_calc_margin(
        &self,
        kind: OrderKind,
        symbol: &str,
        volume: f64,
        price: f64,
    ) -> Result<Option<f64>, TerminalError>;

    /// Profit of a hypothetical round trip.
    async fn order_calc_profit(
        &self,
        kind: OrderKind,
        symbol: &str,
        volume: f64,
        price_open: f64,
        price_close: f64,
    ) -> Result<Option<f64>, TerminalError>;

    /// Open positions matching a filter.
    async fn positions(&self, filter: &SnapshotFilter) -> Result<Vec<Position>, TerminalError>;

    /// Count of open positions.
    async fn positions_total(&self) -> Result<u64, TerminalError>;

    /// Pending orders matching a filter.
    async fn pending_orders(
        &self,
        filter: &SnapshotFilter,
    ) -> Result<Vec<PendingOrder>, TerminalError>;

    /// Deals belonging to one position.
    async fn deals_for_position(&self, position: u64) -> Result<Vec<Deal>, TerminalError>;

    /// Deals within a UTC range for one position.
    async fn deals_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        position: u64,
    ) -> Result<Vec<Deal>, TerminalError>;

    /// Archived orders for one ticket.
    async fn history_orders(&self, ticket: u64) -> Result<Vec<HistoryOrder>, TerminalError>;

    /// The terminal's last error diagnostic (code, message).
    async fn last_error(&self) -> (i32, String);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_request_carries_gtc_and_filling() {
        let request = TradeRequest::open(
            TradeAction::Deal,
            "EURUSD",
            OrderKind::Buy,
            0.10,
            1.0850,
            Some(1.0800),
            None,
            20,
            7,
            "entry",
            FillingMode::Ioc,
        );

        assert_eq!(request.action, TradeAction::Deal);
        assert_eq!(request.time_policy, TimePolicy::Gtc);
        assert_eq!(request.filling, FillingMode::Ioc);
        assert_eq!(request.sl, Some(1.0800));
        assert!(request.tp.is_none());
        assert!(request.position.is_none());
    }

    #[test]
    fn close_request_targets_the_position() {
        let request = TradeRequest::close(
            42,
            "EURUSD",
            OrderKind::Sell,
            0.10,
            1.0848,
            20,
            0,
            "",
            FillingMode::Ioc,
        );

        assert_eq!(request.action, TradeAction::Deal);
        assert_eq!(request.position, Some(42));
        assert_eq!(request.kind, Some(OrderKind::Sell));
    }

    #[test]
    fn remove_request_uses_return_filling() {
        let request = TradeRequest::remove_pending(9);
        assert_eq!(request.action, TradeAction::Remove);
        assert_eq!(request.order, Some(9));
        assert_eq!(request.filling, FillingMode::Return);
        assert!(request.symbol.is_none());
    }

    #[test]
    fn sltp_request_keeps_absent_stops_absent() {
        let request = TradeRequest::position_sltp(42, Some(1.08), None);
        assert_eq!(request.action, TradeAction::Sltp);
        assert_eq!(request.sl, Some(1.08));
        assert!(request.tp.is_none());
    }
}
