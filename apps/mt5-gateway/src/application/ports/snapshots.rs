//! Typed snapshots of terminal state.
//!
//! Everything the terminal reports is converted into these records at the
//! adapter boundary; untyped maps never travel further than the wire codec.
//! All of them are point-in-time reads keyed by venue-assigned tickets, with
//! no consistency guarantee between two reads.

use serde::{Deserialize, Serialize};

use crate::domain::trading::{OrderKind, OrderSide, SymbolConstraints};

/// Account state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Account number.
    pub login: i64,
    /// Trade server name.
    pub server: String,
    /// Account holder.
    pub name: String,
    /// Deposit currency.
    pub currency: String,
    /// Account leverage.
    pub leverage: i64,
    /// Balance, in deposit currency.
    pub balance: f64,
    /// Equity, in deposit currency.
    pub equity: f64,
    /// Margin currently in use.
    pub margin: f64,
    /// Free margin.
    pub margin_free: f64,
    /// Margin level, percent.
    pub margin_level: f64,
    /// Floating profit of open positions.
    pub profit: f64,
}

/// Instrument description snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// Symbol name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Price of one point.
    pub point: f64,
    /// Price decimal digits.
    pub digits: u32,
    /// Current spread, in points.
    pub spread: i64,
    /// Freeze distance from market, in points.
    pub trade_freeze_level: i64,
    /// Contract size.
    pub trade_contract_size: f64,
    /// Minimum volume, in lots.
    pub volume_min: f64,
    /// Maximum volume, in lots.
    pub volume_max: f64,
    /// Volume step, in lots.
    pub volume_step: f64,
    /// Filling-mode capability bitmask.
    pub filling_mode: u32,
    /// Base currency.
    pub currency_base: String,
    /// Profit currency.
    pub currency_profit: String,
    /// Current bid.
    pub bid: f64,
    /// Current ask.
    pub ask: f64,
}

impl SymbolInfo {
    /// The constraints the validator needs, extracted from this snapshot.
    #[must_use]
    pub fn constraints(&self) -> SymbolConstraints {
        SymbolConstraints {
            volume_min: self.volume_min,
            volume_max: self.volume_max,
            volume_step: self.volume_step,
            point: self.point,
            freeze_level: self.trade_freeze_level,
            filling_capability: self.filling_mode,
        }
    }
}

/// Latest quote for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Quote time, epoch seconds.
    pub time: i64,
    /// Best bid.
    pub bid: f64,
    /// Best ask.
    pub ask: f64,
    /// Last trade price.
    pub last: f64,
    /// Tick volume.
    pub volume: u64,
}

/// One historical OHLC bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    /// Bar open time, epoch seconds.
    pub time: i64,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Tick count.
    pub tick_volume: u64,
    /// Spread, in points.
    pub spread: i64,
    /// Traded volume.
    pub real_volume: u64,
}

/// Open position snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Venue-assigned position ticket.
    pub ticket: u64,
    /// Instrument.
    pub symbol: String,
    /// Position direction.
    pub side: OrderSide,
    /// Open volume, in lots.
    pub volume: f64,
    /// Open price.
    pub price_open: f64,
    /// Stop loss (0 = none).
    pub sl: f64,
    /// Take profit (0 = none).
    pub tp: f64,
    /// Current market price on the position's close side.
    pub price_current: f64,
    /// Accumulated swap.
    pub swap: f64,
    /// Floating profit.
    pub profit: f64,
    /// Strategy tag.
    pub magic: i64,
    /// Order comment.
    pub comment: String,
    /// Open time, epoch seconds.
    pub time: i64,
}

/// Pending order snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    /// Venue-assigned order ticket.
    pub ticket: u64,
    /// Instrument.
    pub symbol: String,
    /// Order kind.
    pub kind: OrderKind,
    /// Originally requested volume.
    pub volume_initial: f64,
    /// Still-unfilled volume.
    pub volume_current: f64,
    /// Trigger price.
    pub price_open: f64,
    /// Stop loss (0 = none).
    pub sl: f64,
    /// Take profit (0 = none).
    pub tp: f64,
    /// Current market price on the order's side.
    pub price_current: f64,
    /// Strategy tag.
    pub magic: i64,
    /// Order comment.
    pub comment: String,
    /// Placement time, epoch seconds.
    pub time_setup: i64,
}

/// Executed deal snapshot from account history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    /// Venue-assigned deal ticket.
    pub ticket: u64,
    /// Originating order ticket.
    pub order: u64,
    /// Position the deal belongs to.
    pub position: u64,
    /// Instrument.
    pub symbol: String,
    /// Deal direction.
    pub side: OrderSide,
    /// Dealt volume, in lots.
    pub volume: f64,
    /// Deal price.
    pub price: f64,
    /// Realized profit.
    pub profit: f64,
    /// Commission charged.
    pub commission: f64,
    /// Swap charged.
    pub swap: f64,
    /// Deal comment.
    pub comment: String,
    /// Deal time, epoch seconds.
    pub time: i64,
}

/// Historical order snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryOrder {
    /// Venue-assigned order ticket.
    pub ticket: u64,
    /// Instrument.
    pub symbol: String,
    /// Order kind.
    pub kind: OrderKind,
    /// Originally requested volume.
    pub volume_initial: f64,
    /// Requested price.
    pub price_open: f64,
    /// Stop loss (0 = none).
    pub sl: f64,
    /// Take profit (0 = none).
    pub tp: f64,
    /// Placement time, epoch seconds.
    pub time_setup: i64,
    /// Completion time, epoch seconds (0 if still pending when archived).
    pub time_done: i64,
    /// Strategy tag.
    pub magic: i64,
    /// Order comment.
    pub comment: String,
}

/// Server-side filter for position and pending-order queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotFilter {
    /// Everything on the account.
    All,
    /// A single ticket.
    Ticket(u64),
    /// Everything on one instrument.
    Symbol(String),
}
