//! Inbound request DTOs.
//!
//! Required fields are modeled as options and checked by the handlers so a
//! missing field produces the gateway's error envelope rather than the
//! framework's default rejection.

use serde::Deserialize;

use crate::domain::trading::FillingMode;

/// Body of `POST /order` and `POST /order_check`.
#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    /// Instrument.
    pub symbol: Option<String>,
    /// Volume in lots.
    pub volume: Option<f64>,
    /// Order type name (BUY, SELL, BUY_LIMIT, ...).
    #[serde(rename = "type")]
    pub order_type: Option<String>,
    /// Price, required for pending kinds.
    pub price: Option<f64>,
    /// Stop loss.
    pub sl: Option<f64>,
    /// Take profit.
    pub tp: Option<f64>,
    /// Maximum deviation, in points.
    pub deviation: Option<u32>,
    /// Strategy tag.
    pub magic: Option<i64>,
    /// Comment.
    pub comment: Option<String>,
    /// Filling override, market orders only.
    pub type_filling: Option<FillingMode>,
}

/// Body of `POST /order_calc_margin`.
#[derive(Debug, Deserialize)]
pub struct MarginRequest {
    /// Instrument.
    pub symbol: Option<String>,
    /// Volume in lots.
    pub volume: Option<f64>,
    /// Order type name.
    #[serde(rename = "type")]
    pub order_type: Option<String>,
    /// Hypothetical open price.
    pub price: Option<f64>,
}

/// Body of `POST /order_calc_profit`.
#[derive(Debug, Deserialize)]
pub struct ProfitRequest {
    /// Instrument.
    pub symbol: Option<String>,
    /// Volume in lots.
    pub volume: Option<f64>,
    /// BUY or SELL.
    #[serde(rename = "type")]
    pub order_type: Option<String>,
    /// Hypothetical open price.
    pub price_open: Option<f64>,
    /// Hypothetical close price.
    pub price_close: Option<f64>,
}

/// Body of `POST /close_position`.
#[derive(Debug, Deserialize)]
pub struct ClosePositionRequest {
    /// Position ticket to flatten.
    pub position: Option<u64>,
    /// Maximum deviation, in points.
    pub deviation: Option<u32>,
    /// Comment for the closing deal.
    pub comment: Option<String>,
}

/// Body of `POST /position_close_partial`.
#[derive(Debug, Deserialize)]
pub struct PartialCloseRequest {
    /// Position ticket.
    pub ticket: Option<u64>,
    /// Volume to close; must be below the open volume.
    pub volume: Option<f64>,
    /// Maximum deviation, in points.
    pub deviation: Option<u32>,
    /// Strategy tag for the closing deal.
    pub magic: Option<i64>,
    /// Comment for the closing deal.
    pub comment: Option<String>,
}

/// Body of `POST /close_all_positions`.
#[derive(Debug, Default, Deserialize)]
pub struct CloseAllRequest {
    /// "BUY", "SELL", or "all" (default).
    pub order_type: Option<String>,
    /// Only close positions with this strategy tag.
    pub magic: Option<i64>,
}

/// Body of `POST /modify_sl_tp`.
#[derive(Debug, Deserialize)]
pub struct ModifySlTpRequest {
    /// Position ticket.
    pub position: Option<u64>,
    /// New stop loss.
    pub sl: Option<f64>,
    /// New take profit.
    pub tp: Option<f64>,
}

/// Body of `PUT /orders/{ticket}`.
#[derive(Debug, Default, Deserialize)]
pub struct ModifyOrderRequest {
    /// New trigger price.
    pub price: Option<f64>,
    /// New stop loss (0 removes it).
    pub sl: Option<f64>,
    /// New take profit (0 removes it).
    pub tp: Option<f64>,
}

/// Query of `GET /symbols`.
#[derive(Debug, Deserialize)]
pub struct SymbolsQuery {
    /// Name glob, e.g. `*EUR*`.
    pub search: Option<String>,
}

/// Query of `GET /fetch_data_pos`.
#[derive(Debug, Deserialize)]
pub struct BarsFromPosQuery {
    /// Instrument.
    pub symbol: Option<String>,
    /// Timeframe name, default M1.
    pub timeframe: Option<String>,
    /// Bar count, default 100.
    pub num_bars: Option<String>,
}

/// Query of `GET /fetch_data_range`.
#[derive(Debug, Deserialize)]
pub struct BarsRangeQuery {
    /// Instrument.
    pub symbol: Option<String>,
    /// Timeframe name, default M1.
    pub timeframe: Option<String>,
    /// Range start, ISO-8601 UTC.
    pub start: Option<String>,
    /// Range end, ISO-8601 UTC.
    pub end: Option<String>,
}

/// Query of `GET /get_positions`.
#[derive(Debug, Deserialize)]
pub struct PositionsQuery {
    /// Only positions with this strategy tag.
    pub magic: Option<i64>,
}

/// Query of `GET /orders`.
#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    /// Only orders on this instrument.
    pub symbol: Option<String>,
    /// Only this ticket.
    pub ticket: Option<String>,
}

/// Query of `GET /history_deals_get`.
#[derive(Debug, Deserialize)]
pub struct DealsRangeQuery {
    /// Range start, ISO-8601 UTC.
    pub from_date: Option<String>,
    /// Range end, ISO-8601 UTC.
    pub to_date: Option<String>,
    /// Position ticket.
    pub position: Option<String>,
}

/// Ticket-keyed history queries.
#[derive(Debug, Deserialize)]
pub struct TicketQuery {
    /// Ticket number.
    pub ticket: Option<String>,
}
