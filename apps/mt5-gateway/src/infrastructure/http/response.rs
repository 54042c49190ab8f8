//! Outbound response DTOs and the JSON error envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::DateTime;
use serde::Serialize;
use serde_json::Value;

use crate::application::errors::{OperationError, VenueErrorInfo};
use crate::application::ports::{Deal, OrderCheckResult, Rate, TradeResult};
use crate::application::services::ConnectionStatus;
use crate::domain::trading::OrderSide;

/// Wire format for bar timestamps.
const BAR_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Successful trade operation.
#[derive(Debug, Serialize)]
pub struct TradeResponse {
    /// Human-readable confirmation.
    pub message: String,
    /// The venue's result.
    pub result: TradeResult,
}

/// Successful dry-run check.
#[derive(Debug, Serialize)]
pub struct OrderCheckResponse {
    /// Always true here; infeasible checks use [`CheckRefusal`].
    pub valid: bool,
    /// Margin and balance figures.
    #[serde(flatten)]
    pub result: OrderCheckResult,
}

/// Infeasible dry-run check (HTTP 400).
#[derive(Debug, Serialize)]
pub struct CheckRefusal {
    /// Always false.
    pub valid: bool,
    /// Venue return code.
    pub retcode: u32,
    /// Venue comment.
    pub comment: String,
    /// Margin the order would require.
    pub margin: f64,
    /// Free margin remaining.
    pub margin_free: f64,
}

/// `POST /order_calc_margin` result.
#[derive(Debug, Serialize)]
pub struct MarginResponse {
    /// Required margin.
    pub margin: f64,
}

/// `POST /order_calc_profit` result.
#[derive(Debug, Serialize)]
pub struct ProfitResponse {
    /// Price-difference profit.
    pub profit: f64,
}

/// `GET /symbols` result.
#[derive(Debug, Serialize)]
pub struct SymbolsResponse {
    /// Number of symbols.
    pub total: usize,
    /// Sorted symbol names.
    pub symbols: Vec<String>,
}

/// `GET /orders` result.
#[derive(Debug, Serialize)]
pub struct OrdersResponse<O: Serialize> {
    /// Number of orders.
    pub total: usize,
    /// The orders.
    pub orders: Vec<O>,
}

/// Count responses (`GET /positions_total`).
#[derive(Debug, Serialize)]
pub struct TotalResponse {
    /// The count.
    pub total: u64,
}

/// `POST /close_all_positions` result.
#[derive(Debug, Serialize)]
pub struct CloseAllResponse {
    /// Aggregate confirmation with the success count.
    pub message: String,
    /// Results of the successful closures.
    pub results: Vec<TradeResult>,
}

/// One OHLC bar with an ISO-8601 UTC timestamp.
#[derive(Debug, Serialize)]
pub struct BarDto {
    /// Bar open time, ISO-8601 UTC.
    pub time: String,
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

/// Render an epoch-seconds timestamp in the wire format.
fn iso_time(epoch_secs: i64) -> String {
    DateTime::from_timestamp(epoch_secs, 0)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .format(BAR_TIME_FORMAT)
        .to_string()
}

impl From<&Rate> for BarDto {
    fn from(rate: &Rate) -> Self {
        Self {
            time: iso_time(rate.time),
            open: rate.open,
            high: rate.high,
            low: rate.low,
            close: rate.close,
            tick_volume: rate.tick_volume,
            spread: rate.spread,
            real_volume: rate.real_volume,
        }
    }
}

/// `GET /get_deal_from_ticket` result.
#[derive(Debug, Serialize)]
pub struct DealDetail {
    /// Deal ticket.
    pub ticket: u64,
    /// Instrument.
    pub symbol: String,
    /// Deal direction.
    #[serde(rename = "type")]
    pub side: OrderSide,
    /// Volume in lots.
    pub volume: f64,
    /// Deal time, ISO-8601 UTC.
    pub open_time: String,
    /// Deal time, ISO-8601 UTC.
    pub close_time: String,
    /// Deal price.
    pub open_price: f64,
    /// Deal price.
    pub close_price: f64,
    /// Realized profit.
    pub profit: f64,
    /// Commission.
    pub commission: f64,
    /// Swap.
    pub swap: f64,
    /// Comment.
    pub comment: String,
}

impl From<&Deal> for DealDetail {
    fn from(deal: &Deal) -> Self {
        let time = iso_time(deal.time);
        Self {
            ticket: deal.ticket,
            symbol: deal.symbol.clone(),
            side: deal.side,
            volume: deal.volume,
            open_time: time.clone(),
            close_time: time,
            open_price: deal.price,
            close_price: deal.price,
            profit: deal.profit,
            commission: deal.commission,
            swap: deal.swap,
            comment: deal.comment.clone(),
        }
    }
}

/// `GET /health` result.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Process status.
    pub status: &'static str,
    /// Terminal connection state.
    pub mt5_status: ConnectionStatus,
    /// Seconds since the gateway started.
    pub uptime_seconds: f64,
    /// Logged-in account, when the session is alive.
    pub mt5_account: Option<i64>,
    /// Most recent connection diagnostic.
    pub last_error: Option<String>,
}

/// `GET /health/ready` result.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,
    /// Terminal connection state.
    pub mt5_status: ConnectionStatus,
    /// Diagnostic when not ready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// Error envelope
// =============================================================================

/// The JSON error envelope every failed operation returns.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable class; absent on internal errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<&'static str>,
    /// Structured validation detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Venue diagnostic for rejected / faulted operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mt5_error: Option<VenueErrorInfo>,
    /// Connection manager diagnostic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// What was being attempted (internal errors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Correlation ID of the failed request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorEnvelope {
    fn bare(error: String, error_type: Option<&'static str>) -> Self {
        Self {
            error,
            error_type,
            details: None,
            mt5_error: None,
            detail: None,
            operation: None,
            request_id: None,
        }
    }
}

/// An operation failure bound to its request, ready to render.
#[derive(Debug)]
pub struct ApiError {
    error: OperationError,
    request_id: Option<String>,
}

impl ApiError {
    /// Bind an operation failure to a request ID.
    #[must_use]
    pub const fn new(error: OperationError, request_id: Option<String>) -> Self {
        Self { error, request_id }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + chars.as_str()
    })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = self.request_id;

        let (status, mut envelope) = match self.error {
            OperationError::Validation { message, details } => {
                tracing::warn!(request_id = request_id.as_deref(), error = %message, "Validation error");
                let mut envelope = ErrorEnvelope::bare(message, Some("validation_error"));
                envelope.details = details;
                (StatusCode::BAD_REQUEST, envelope)
            }
            OperationError::NotFound {
                resource,
                identifier,
            } => {
                let message = match identifier {
                    Some(id) => format!("{} not found: {id}", capitalize(&resource)),
                    None => format!("{} not found", capitalize(&resource)),
                };
                (
                    StatusCode::NOT_FOUND,
                    ErrorEnvelope::bare(message, Some("not_found")),
                )
            }
            OperationError::Connection {
                message,
                detail,
                venue,
            } => {
                tracing::error!(
                    request_id = request_id.as_deref(),
                    error = %message,
                    detail = detail.as_deref(),
                    "Connection error"
                );
                let mut envelope = ErrorEnvelope::bare(message, Some("connection_error"));
                envelope.detail = detail;
                envelope.mt5_error = venue;
                (StatusCode::SERVICE_UNAVAILABLE, envelope)
            }
            OperationError::Rejected {
                operation,
                retcode,
                comment,
                error_code,
                error_string,
            } => {
                tracing::error!(
                    request_id = request_id.as_deref(),
                    operation = %operation,
                    retcode,
                    error_code,
                    "Terminal rejected operation"
                );
                let mut envelope = ErrorEnvelope::bare(
                    format!("{operation} failed: {comment}"),
                    Some("mt5_rejected"),
                );
                envelope.mt5_error = Some(VenueErrorInfo {
                    retcode: Some(retcode),
                    comment: Some(comment),
                    error_code,
                    error_string,
                });
                (StatusCode::BAD_REQUEST, envelope)
            }
            OperationError::Internal { operation, detail } => {
                tracing::error!(
                    request_id = request_id.as_deref(),
                    operation = %operation,
                    detail = %detail,
                    "Internal error"
                );
                let mut envelope = ErrorEnvelope::bare("Internal server error".to_string(), None);
                envelope.operation = Some(operation);
                envelope.detail = Some(detail);
                (StatusCode::INTERNAL_SERVER_ERROR, envelope)
            }
        };

        envelope.request_id = request_id;
        (status, Json(envelope)).into_response()
    }
}
