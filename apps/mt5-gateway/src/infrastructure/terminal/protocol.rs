//! Wire protocol for the terminal-side bridge.
//!
//! One frame per line, JSON both ways: `{op, params}` out,
//! `{ok, data | code, message}` back. The terminal's numeric code families
//! (order types, actions, filling modes) exist only in this module; decoded
//! records convert into the typed snapshots before anything else sees them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::ports::{
    Deal, HistoryOrder, PendingOrder, Position, TradeRequest,
};
use crate::domain::trading::{OrderKind, OrderSide};

/// Outbound frame.
#[derive(Debug, Serialize)]
pub struct Frame<'a> {
    /// Operation name.
    pub op: &'a str,
    /// Operation parameters.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

/// Inbound frame.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Result payload; null both for "no data" results and on failure.
    #[serde(default)]
    pub data: Value,
    /// Terminal error code on failure.
    #[serde(default)]
    pub code: i32,
    /// Terminal error message on failure.
    #[serde(default)]
    pub message: String,
}

/// A trade request in the terminal's native field/code layout.
#[derive(Debug, Serialize)]
pub struct TradeRequestRecord {
    /// Action code.
    pub action: u8,
    /// Instrument.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Volume in lots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    /// Order-type code.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<u8>,
    /// Price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Stop loss.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sl: Option<f64>,
    /// Take profit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tp: Option<f64>,
    /// Maximum deviation, in points.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deviation: Option<u32>,
    /// Strategy tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magic: Option<i64>,
    /// Comment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Position ticket.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    /// Pending order ticket.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u64>,
    /// Time-policy code.
    pub type_time: u8,
    /// Filling-mode code.
    pub type_filling: u8,
}

impl From<&TradeRequest> for TradeRequestRecord {
    fn from(request: &TradeRequest) -> Self {
        Self {
            action: request.action.code(),
            symbol: request.symbol.clone(),
            volume: request.volume,
            kind: request.kind.map(|k| k.code()),
            price: request.price,
            sl: request.sl,
            tp: request.tp,
            deviation: request.deviation,
            magic: request.magic,
            comment: request.comment.clone(),
            position: request.position,
            order: request.order,
            type_time: request.time_policy.code(),
            type_filling: request.filling.code(),
        }
    }
}

/// Position snapshot as the terminal reports it.
#[derive(Debug, Deserialize)]
pub struct PositionRecord {
    /// Ticket.
    pub ticket: u64,
    /// Open time, epoch seconds.
    pub time: i64,
    /// Position-type code.
    #[serde(rename = "type")]
    pub kind: u8,
    /// Strategy tag.
    pub magic: i64,
    /// Volume in lots.
    pub volume: f64,
    /// Open price.
    pub price_open: f64,
    /// Stop loss.
    pub sl: f64,
    /// Take profit.
    pub tp: f64,
    /// Current price.
    pub price_current: f64,
    /// Swap.
    pub swap: f64,
    /// Floating profit.
    pub profit: f64,
    /// Instrument.
    pub symbol: String,
    /// Comment.
    #[serde(default)]
    pub comment: String,
}

impl TryFrom<PositionRecord> for Position {
    type Error = String;

    fn try_from(record: PositionRecord) -> Result<Self, Self::Error> {
        let side = OrderSide::from_position_code(record.kind)
            .ok_or_else(|| format!("unknown position type: {}", record.kind))?;
        Ok(Self {
            ticket: record.ticket,
            symbol: record.symbol,
            side,
            volume: record.volume,
            price_open: record.price_open,
            sl: record.sl,
            tp: record.tp,
            price_current: record.price_current,
            swap: record.swap,
            profit: record.profit,
            magic: record.magic,
            comment: record.comment,
            time: record.time,
        })
    }
}

/// Pending order snapshot as the terminal reports it.
#[derive(Debug, Deserialize)]
pub struct OrderRecord {
    /// Ticket.
    pub ticket: u64,
    /// Placement time, epoch seconds.
    pub time_setup: i64,
    /// Order-type code.
    #[serde(rename = "type")]
    pub kind: u8,
    /// Strategy tag.
    pub magic: i64,
    /// Requested volume.
    pub volume_initial: f64,
    /// Unfilled volume.
    pub volume_current: f64,
    /// Trigger price.
    pub price_open: f64,
    /// Stop loss.
    pub sl: f64,
    /// Take profit.
    pub tp: f64,
    /// Current price.
    pub price_current: f64,
    /// Instrument.
    pub symbol: String,
    /// Comment.
    #[serde(default)]
    pub comment: String,
}

impl TryFrom<OrderRecord> for PendingOrder {
    type Error = String;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        let kind = OrderKind::from_code(record.kind)
            .ok_or_else(|| format!("unknown order type: {}", record.kind))?;
        Ok(Self {
            ticket: record.ticket,
            symbol: record.symbol,
            kind,
            volume_initial: record.volume_initial,
            volume_current: record.volume_current,
            price_open: record.price_open,
            sl: record.sl,
            tp: record.tp,
            price_current: record.price_current,
            magic: record.magic,
            comment: record.comment,
            time_setup: record.time_setup,
        })
    }
}

/// Deal snapshot as the terminal reports it.
#[derive(Debug, Deserialize)]
pub struct DealRecord {
    /// Ticket.
    pub ticket: u64,
    /// Originating order ticket.
    pub order: u64,
    /// Owning position ticket.
    pub position_id: u64,
    /// Deal time, epoch seconds.
    pub time: i64,
    /// Deal-type code.
    #[serde(rename = "type")]
    pub kind: u8,
    /// Volume in lots.
    pub volume: f64,
    /// Price.
    pub price: f64,
    /// Commission.
    pub commission: f64,
    /// Swap.
    pub swap: f64,
    /// Profit.
    pub profit: f64,
    /// Instrument.
    pub symbol: String,
    /// Comment.
    #[serde(default)]
    pub comment: String,
}

impl TryFrom<DealRecord> for Deal {
    type Error = String;

    fn try_from(record: DealRecord) -> Result<Self, Self::Error> {
        let side = OrderSide::from_position_code(record.kind)
            .ok_or_else(|| format!("unknown deal type: {}", record.kind))?;
        Ok(Self {
            ticket: record.ticket,
            order: record.order,
            position: record.position_id,
            symbol: record.symbol,
            side,
            volume: record.volume,
            price: record.price,
            profit: record.profit,
            commission: record.commission,
            swap: record.swap,
            comment: record.comment,
            time: record.time,
        })
    }
}

/// Historical order snapshot as the terminal reports it.
#[derive(Debug, Deserialize)]
pub struct HistoryOrderRecord {
    /// Ticket.
    pub ticket: u64,
    /// Placement time, epoch seconds.
    pub time_setup: i64,
    /// Completion time, epoch seconds.
    pub time_done: i64,
    /// Order-type code.
    #[serde(rename = "type")]
    pub kind: u8,
    /// Strategy tag.
    pub magic: i64,
    /// Requested volume.
    pub volume_initial: f64,
    /// Requested price.
    pub price_open: f64,
    /// Stop loss.
    pub sl: f64,
    /// Take profit.
    pub tp: f64,
    /// Instrument.
    pub symbol: String,
    /// Comment.
    #[serde(default)]
    pub comment: String,
}

impl TryFrom<HistoryOrderRecord> for HistoryOrder {
    type Error = String;

    fn try_from(record: HistoryOrderRecord) -> Result<Self, Self::Error> {
        let kind = OrderKind::from_code(record.kind)
            .ok_or_else(|| format!("unknown order type: {}", record.kind))?;
        Ok(Self {
            ticket: record.ticket,
            symbol: record.symbol,
            kind,
            volume_initial: record.volume_initial,
            price_open: record.price_open,
            sl: record.sl,
            tp: record.tp,
            time_setup: record.time_setup,
            time_done: record.time_done,
            magic: record.magic,
            comment: record.comment,
        })
    }
}
