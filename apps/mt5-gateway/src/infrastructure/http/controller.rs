//! HTTP Controller (Driver Adapter)
//!
//! Axum-based REST API that delegates to the application use cases. Handlers
//! stay thin: presence checks and DTO mapping here, every business rule in
//! the use cases.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router, middleware};
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::application::errors::{OperationError, VenueErrorInfo};
use crate::application::ports::TerminalPort;
use crate::application::services::ConnectionManager;
use crate::application::use_cases::{
    ClosePositionsUseCase, OrderCalcUseCase, OrderIntent, PendingModify, PendingOrdersUseCase,
    SendOrderUseCase, require_connection,
};
use crate::domain::trading::{FaultCodes, OrderKind, OrderSide, TIMEFRAME_NAMES, Timeframe};

use super::request::{
    BarsFromPosQuery, BarsRangeQuery, CloseAllRequest, ClosePositionRequest, DealsRangeQuery,
    MarginRequest, ModifyOrderRequest, ModifySlTpRequest, OrderRequest, OrdersQuery,
    PartialCloseRequest, PositionsQuery, ProfitRequest, SymbolsQuery, TicketQuery,
};
use super::request_id::{RequestId, propagate};
use super::response::{
    ApiError, BarDto, CheckRefusal, CloseAllResponse, DealDetail, HealthResponse, MarginResponse,
    OrderCheckResponse, OrdersResponse, ProfitResponse, ReadyResponse, SymbolsResponse,
    TotalResponse, TradeResponse,
};

/// Default deviation for trade requests, in points.
const DEFAULT_DEVIATION: u32 = 20;

/// Application state shared across handlers.
pub struct AppState<T: TerminalPort> {
    /// Connection lifecycle manager.
    pub manager: Arc<ConnectionManager<T>>,
    /// Order submission pipeline.
    pub send_order: Arc<SendOrderUseCase<T>>,
    /// Margin/profit calculators.
    pub order_calc: Arc<OrderCalcUseCase<T>>,
    /// Position query & close engine.
    pub positions: Arc<ClosePositionsUseCase<T>>,
    /// Pending order engine.
    pub pending: Arc<PendingOrdersUseCase<T>>,
    /// Gateway start time, for health uptime.
    pub started_at: Instant,
}

impl<T: TerminalPort> AppState<T> {
    /// Wire the use cases around one connection manager.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager<T>>, faults: FaultCodes) -> Self {
        Self {
            send_order: Arc::new(SendOrderUseCase::new(Arc::clone(&manager), faults.clone())),
            order_calc: Arc::new(OrderCalcUseCase::new(Arc::clone(&manager))),
            positions: Arc::new(ClosePositionsUseCase::new(
                Arc::clone(&manager),
                faults.clone(),
            )),
            pending: Arc::new(PendingOrdersUseCase::new(Arc::clone(&manager), faults)),
            manager,
            started_at: Instant::now(),
        }
    }
}

impl<T: TerminalPort> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            send_order: Arc::clone(&self.send_order),
            order_calc: Arc::clone(&self.order_calc),
            positions: Arc::clone(&self.positions),
            pending: Arc::clone(&self.pending),
            started_at: self.started_at,
        }
    }
}

/// Create the HTTP router with all endpoints.
pub fn create_router<T: TerminalPort + 'static>(state: AppState<T>) -> Router {
    Router::new()
        .route("/account", get(account))
        .route("/symbols", get(symbols))
        .route("/symbol_info/{symbol}", get(symbol_info))
        .route("/symbol_info_tick/{symbol}", get(symbol_tick))
        .route("/fetch_data_pos", get(fetch_data_pos))
        .route("/fetch_data_range", get(fetch_data_range))
        .route("/order", post(send_order))
        .route("/order_check", post(order_check))
        .route("/order_calc_margin", post(calc_margin))
        .route("/order_calc_profit", post(calc_profit))
        .route("/orders", get(list_orders))
        .route("/orders/{ticket}", delete(cancel_order).put(modify_order))
        .route("/get_positions", get(get_positions))
        .route("/positions_total", get(positions_total))
        .route("/close_position", post(close_position))
        .route("/position_close_partial", post(close_partial))
        .route("/close_all_positions", post(close_all))
        .route("/modify_sl_tp", post(modify_sl_tp))
        .route("/history_deals_get", get(history_deals))
        .route("/history_orders_get", get(history_orders))
        .route("/get_deal_from_ticket", get(deal_from_ticket))
        .route("/get_order_from_ticket", get(order_from_ticket))
        .route("/health", get(health))
        .route("/health/ready", get(health_ready))
        .route("/health/live", get(health_live))
        .layer(middleware::from_fn(propagate))
        .with_state(state)
}

// =============================================================================
// Helpers
// =============================================================================

fn respond(result: Result<Response, OperationError>, request_id: RequestId) -> Response {
    result.unwrap_or_else(|e| ApiError::new(e, Some(request_id.0)).into_response())
}

fn missing_fields(required: &[&str]) -> OperationError {
    OperationError::validation_with("Missing required fields", json!({ "required": required }))
}

fn parse_order_kind(raw: &str) -> Result<OrderKind, OperationError> {
    OrderKind::parse(raw)
        .ok_or_else(|| OperationError::validation(format!("Invalid order type: {raw}")))
}

fn parse_timeframe(raw: Option<&str>) -> Result<Timeframe, OperationError> {
    let name = raw.unwrap_or("M1");
    Timeframe::parse(name).ok_or_else(|| {
        OperationError::validation(format!(
            "Invalid timeframe: '{name}'. Valid options are: {}.",
            TIMEFRAME_NAMES.join(", ")
        ))
    })
}

fn parse_utc(raw: &str) -> Result<DateTime<Utc>, OperationError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| OperationError::validation(format!("Invalid parameter format: {e}")))
}

fn parse_ticket(raw: &str) -> Result<u64, OperationError> {
    raw.trim()
        .parse()
        .map_err(|_| OperationError::validation("Invalid ticket format"))
}

fn order_intent(request: OrderRequest) -> Result<OrderIntent, OperationError> {
    let (Some(symbol), Some(volume), Some(order_type)) =
        (request.symbol, request.volume, request.order_type)
    else {
        return Err(missing_fields(&["symbol", "volume", "type"]));
    };

    Ok(OrderIntent {
        symbol,
        kind: parse_order_kind(&order_type)?,
        volume,
        price: request.price,
        sl: request.sl,
        tp: request.tp,
        deviation: request.deviation.unwrap_or(DEFAULT_DEVIATION),
        magic: request.magic.unwrap_or(0),
        comment: request.comment.unwrap_or_default(),
        filling: request.type_filling,
    })
}

// =============================================================================
// Account & symbols
// =============================================================================

async fn account<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
) -> Response {
    let result = async {
        require_connection(&state.manager).await?;
        let terminal = state.manager.terminal();

        match terminal.account_info().await? {
            Some(account) => {
                tracing::info!(
                    login = account.login,
                    equity = account.equity,
                    margin_free = account.margin_free,
                    "Account info retrieved"
                );
                Ok(Json(account).into_response())
            }
            None => {
                let (error_code, error_string) = terminal.last_error().await;
                Err(OperationError::Connection {
                    message: "Failed to get account info".to_string(),
                    detail: None,
                    venue: Some(VenueErrorInfo {
                        retcode: None,
                        comment: None,
                        error_code,
                        error_string,
                    }),
                })
            }
        }
    }
    .await;
    respond(result, request_id)
}

async fn symbols<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<SymbolsQuery>,
) -> Response {
    let result = async {
        require_connection(&state.manager).await?;
        let search = query.search.unwrap_or_else(|| "*".to_string());
        let mut symbols = state.manager.terminal().symbol_names(&search).await?;
        symbols.sort();
        Ok(Json(SymbolsResponse {
            total: symbols.len(),
            symbols,
        })
        .into_response())
    }
    .await;
    respond(result, request_id)
}

async fn symbol_info<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    Path(symbol): Path<String>,
) -> Response {
    let result = async {
        require_connection(&state.manager).await?;
        let terminal = state.manager.terminal();

        if !terminal.symbol_select(&symbol).await? {
            return Err(OperationError::not_found("symbol", &symbol));
        }
        let info = terminal
            .symbol_info(&symbol)
            .await?
            .ok_or_else(|| OperationError::not_found("symbol info", &symbol))?;
        Ok(Json(info).into_response())
    }
    .await;
    respond(result, request_id)
}

async fn symbol_tick<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    Path(symbol): Path<String>,
) -> Response {
    let result = async {
        require_connection(&state.manager).await?;
        let terminal = state.manager.terminal();

        if !terminal.symbol_select(&symbol).await? {
            return Err(OperationError::not_found("symbol", &symbol));
        }
        let tick = terminal
            .symbol_tick(&symbol)
            .await?
            .ok_or_else(|| OperationError::not_found("symbol tick info", &symbol))?;
        Ok(Json(tick).into_response())
    }
    .await;
    respond(result, request_id)
}

// =============================================================================
// Market data
// =============================================================================

async fn fetch_data_pos<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<BarsFromPosQuery>,
) -> Response {
    let result = async {
        require_connection(&state.manager).await?;
        let symbol = query
            .symbol
            .ok_or_else(|| OperationError::validation("Symbol parameter is required"))?;
        let timeframe = parse_timeframe(query.timeframe.as_deref())?;
        let num_bars = match query.num_bars {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| OperationError::validation(format!("Invalid num_bars: '{raw}'")))?,
            None => 100,
        };

        let terminal = state.manager.terminal();
        if !terminal.symbol_select(&symbol).await? {
            return Err(OperationError::not_found("symbol", &symbol));
        }

        let rates = terminal
            .rates_from_pos(&symbol, timeframe, 0, num_bars)
            .await?
            .ok_or_else(|| OperationError::not_found("rates data", &symbol))?;

        let bars: Vec<BarDto> = rates.iter().map(BarDto::from).collect();
        Ok(Json(bars).into_response())
    }
    .await;
    respond(result, request_id)
}

async fn fetch_data_range<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<BarsRangeQuery>,
) -> Response {
    let result = async {
        require_connection(&state.manager).await?;
        let (Some(symbol), Some(start), Some(end)) = (query.symbol, query.start, query.end) else {
            return Err(OperationError::validation(
                "Symbol, start, and end parameters are required",
            ));
        };
        let timeframe = parse_timeframe(query.timeframe.as_deref())?;
        let start = parse_utc(&start)?;
        let end = parse_utc(&end)?;

        let terminal = state.manager.terminal();
        if !terminal.symbol_select(&symbol).await? {
            return Err(OperationError::not_found("symbol", &symbol));
        }

        tracing::info!(symbol = %symbol, timeframe = %timeframe, %start, %end, "Fetching rates");
        let rates = terminal
            .rates_range(&symbol, timeframe, start, end)
            .await?
            .ok_or_else(|| OperationError::not_found("rates data", &symbol))?;

        let bars: Vec<BarDto> = rates.iter().map(BarDto::from).collect();
        Ok(Json(bars).into_response())
    }
    .await;
    respond(result, request_id)
}

// =============================================================================
// Orders
// =============================================================================

async fn send_order<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<OrderRequest>,
) -> Response {
    let result = async {
        tracing::info!(request_id = %request_id.0, "Received order request");
        let intent = order_intent(request)?;
        let placement = state.send_order.execute(&intent).await?;

        let action = if placement.executed { "executed" } else { "placed" };
        Ok(Json(TradeResponse {
            message: format!("Order {action} successfully"),
            result: placement.result,
        })
        .into_response())
    }
    .await;
    respond(result, request_id)
}

async fn order_check<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<OrderRequest>,
) -> Response {
    let result = async {
        let intent = order_intent(request)?;
        let check = state.send_order.check(&intent).await?;

        if check.feasible {
            Ok(Json(OrderCheckResponse {
                valid: true,
                result: check.result,
            })
            .into_response())
        } else {
            Ok((
                StatusCode::BAD_REQUEST,
                Json(CheckRefusal {
                    valid: false,
                    retcode: check.result.retcode,
                    comment: check.result.comment,
                    margin: check.result.margin,
                    margin_free: check.result.margin_free,
                }),
            )
                .into_response())
        }
    }
    .await;
    respond(result, request_id)
}

async fn calc_margin<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<MarginRequest>,
) -> Response {
    let result = async {
        let (Some(symbol), Some(volume), Some(order_type), Some(price)) = (
            request.symbol,
            request.volume,
            request.order_type,
            request.price,
        ) else {
            return Err(missing_fields(&["symbol", "volume", "type", "price"]));
        };
        let kind = parse_order_kind(&order_type)?;

        let margin = state.order_calc.margin(&symbol, kind, volume, price).await?;
        Ok(Json(MarginResponse { margin }).into_response())
    }
    .await;
    respond(result, request_id)
}

async fn calc_profit<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<ProfitRequest>,
) -> Response {
    let result = async {
        let (Some(symbol), Some(volume), Some(order_type), Some(price_open), Some(price_close)) = (
            request.symbol,
            request.volume,
            request.order_type,
            request.price_open,
            request.price_close,
        ) else {
            return Err(missing_fields(&[
                "symbol",
                "volume",
                "type",
                "price_open",
                "price_close",
            ]));
        };
        let side = OrderSide::parse(&order_type).ok_or_else(|| {
            OperationError::validation(format!(
                "Invalid order type: {order_type}. Must be 'BUY' or 'SELL'"
            ))
        })?;

        let profit = state
            .order_calc
            .profit(&symbol, side, volume, price_open, price_close)
            .await?;
        Ok(Json(ProfitResponse { profit }).into_response())
    }
    .await;
    respond(result, request_id)
}

async fn list_orders<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<OrdersQuery>,
) -> Response {
    let result = async {
        let ticket = match &query.ticket {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .map_err(|_| OperationError::validation("Ticket must be an integer"))?,
            ),
            None => None,
        };

        let orders = state.pending.list(query.symbol.as_deref(), ticket).await?;
        Ok(Json(OrdersResponse {
            total: orders.len(),
            orders,
        })
        .into_response())
    }
    .await;
    respond(result, request_id)
}

async fn cancel_order<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    Path(ticket): Path<u64>,
) -> Response {
    let result = async {
        let trade = state.pending.cancel(ticket).await?;
        Ok(Json(TradeResponse {
            message: "Order cancelled successfully".to_string(),
            result: trade,
        })
        .into_response())
    }
    .await;
    respond(result, request_id)
}

async fn modify_order<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    Path(ticket): Path<u64>,
    Json(request): Json<ModifyOrderRequest>,
) -> Response {
    let result = async {
        let changes = PendingModify {
            price: request.price,
            sl: request.sl,
            tp: request.tp,
        };
        let trade = state.pending.modify(ticket, changes).await?;
        Ok(Json(TradeResponse {
            message: "Order modified successfully".to_string(),
            result: trade,
        })
        .into_response())
    }
    .await;
    respond(result, request_id)
}

// =============================================================================
// Positions
// =============================================================================

async fn get_positions<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<PositionsQuery>,
) -> Response {
    let result = async {
        let positions = state.positions.list(query.magic).await?;
        Ok(Json(positions).into_response())
    }
    .await;
    respond(result, request_id)
}

async fn positions_total<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
) -> Response {
    let result = async {
        let total = state.positions.total().await?;
        Ok(Json(TotalResponse { total }).into_response())
    }
    .await;
    respond(result, request_id)
}

async fn close_position<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<ClosePositionRequest>,
) -> Response {
    let result = async {
        let ticket = request
            .position
            .ok_or_else(|| OperationError::validation("Position data is required"))?;

        let trade = state
            .positions
            .close(
                ticket,
                request.deviation.unwrap_or(DEFAULT_DEVIATION),
                request.comment.as_deref().unwrap_or(""),
            )
            .await?;
        Ok(Json(TradeResponse {
            message: "Position closed successfully".to_string(),
            result: trade,
        })
        .into_response())
    }
    .await;
    respond(result, request_id)
}

async fn close_partial<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<PartialCloseRequest>,
) -> Response {
    let result = async {
        let (Some(ticket), Some(volume)) = (request.ticket, request.volume) else {
            return Err(missing_fields(&["ticket", "volume"]));
        };

        let trade = state
            .positions
            .close_partial(
                ticket,
                volume,
                request.deviation.unwrap_or(DEFAULT_DEVIATION),
                request.magic.unwrap_or(0),
                request.comment.as_deref().unwrap_or("Partial close"),
            )
            .await?;
        Ok(Json(TradeResponse {
            message: "Position partially closed successfully".to_string(),
            result: trade,
        })
        .into_response())
    }
    .await;
    respond(result, request_id)
}

async fn close_all<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    body: axum::body::Bytes,
) -> Response {
    let result = async {
        // The body is optional; an empty POST closes everything.
        let request: CloseAllRequest = if body.is_empty() {
            CloseAllRequest::default()
        } else {
            serde_json::from_slice(&body)
                .map_err(|e| OperationError::validation(format!("Invalid request body: {e}")))?
        };

        let side = match request.order_type.as_deref() {
            None | Some("all") => None,
            Some(raw) => Some(OrderSide::parse(raw).ok_or_else(|| {
                OperationError::validation(format!(
                    "Invalid order_type: {raw}. Must be 'BUY', 'SELL', or 'all'."
                ))
            })?),
        };

        let outcome = state.positions.close_all(side, request.magic).await?;
        if outcome.closed.is_empty() {
            return Ok(Json(json!({ "message": "No positions were closed" })).into_response());
        }

        Ok(Json(CloseAllResponse {
            message: format!("Closed {} positions", outcome.closed.len()),
            results: outcome.closed,
        })
        .into_response())
    }
    .await;
    respond(result, request_id)
}

async fn modify_sl_tp<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<ModifySlTpRequest>,
) -> Response {
    let result = async {
        let ticket = request
            .position
            .ok_or_else(|| OperationError::validation("Position data is required"))?;

        let trade = state
            .positions
            .modify_sl_tp(ticket, request.sl, request.tp)
            .await?;
        Ok(Json(TradeResponse {
            message: "SL/TP modified successfully".to_string(),
            result: trade,
        })
        .into_response())
    }
    .await;
    respond(result, request_id)
}

// =============================================================================
// History
// =============================================================================

async fn history_deals<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<DealsRangeQuery>,
) -> Response {
    let result = async {
        let (Some(from_raw), Some(to_raw), Some(position_raw)) =
            (query.from_date, query.to_date, query.position)
        else {
            return Err(OperationError::validation(
                "from_date, to_date, and position parameters are required",
            ));
        };

        let from = parse_utc(&from_raw)?;
        let to = parse_utc(&to_raw)?;
        let position = position_raw
            .parse::<u64>()
            .map_err(|e| OperationError::validation(format!("Invalid parameter format: {e}")))?;

        if from >= to {
            return Err(OperationError::validation("from_date must be before to_date"));
        }

        require_connection(&state.manager).await?;
        let deals = state
            .manager
            .terminal()
            .deals_in_range(from, to, position)
            .await?;
        Ok(Json(deals).into_response())
    }
    .await;
    respond(result, request_id)
}

async fn history_orders<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<TicketQuery>,
) -> Response {
    let result = async {
        let ticket = query
            .ticket
            .ok_or_else(|| OperationError::validation("Ticket parameter is required"))?;
        let ticket = parse_ticket(&ticket)?;

        require_connection(&state.manager).await?;
        let orders = state.manager.terminal().history_orders(ticket).await?;
        Ok(Json(orders).into_response())
    }
    .await;
    respond(result, request_id)
}

async fn deal_from_ticket<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<TicketQuery>,
) -> Response {
    let result = async {
        let ticket = query
            .ticket
            .ok_or_else(|| OperationError::validation("Ticket parameter is required"))?;
        let ticket = parse_ticket(&ticket)?;

        require_connection(&state.manager).await?;
        let deals = state.manager.terminal().deals_for_position(ticket).await?;

        // The first deal is the opening deal.
        let deal = deals
            .first()
            .ok_or_else(|| OperationError::not_found("deal", ticket))?;
        Ok(Json(DealDetail::from(deal)).into_response())
    }
    .await;
    respond(result, request_id)
}

async fn order_from_ticket<T: TerminalPort>(
    State(state): State<AppState<T>>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<TicketQuery>,
) -> Response {
    let result = async {
        let ticket = query
            .ticket
            .ok_or_else(|| OperationError::validation("Ticket parameter is required"))?;
        let ticket = parse_ticket(&ticket)?;

        require_connection(&state.manager).await?;
        let orders = state.manager.terminal().history_orders(ticket).await?;
        let order = orders
            .into_iter()
            .next()
            .ok_or_else(|| OperationError::not_found("order", ticket))?;
        Ok(Json(order).into_response())
    }
    .await;
    respond(result, request_id)
}

// =============================================================================
// Health
// =============================================================================

async fn health<T: TerminalPort>(State(state): State<AppState<T>>) -> Response {
    let mt5_account = if state.manager.is_connected() {
        state
            .manager
            .terminal()
            .account_info()
            .await
            .ok()
            .flatten()
            .map(|a| a.login)
    } else {
        None
    };

    Json(HealthResponse {
        status: "healthy",
        mt5_status: state.manager.status(),
        uptime_seconds: state.started_at.elapsed().as_secs_f64(),
        mt5_account,
        last_error: state.manager.last_error(),
    })
    .into_response()
}

async fn health_ready<T: TerminalPort>(State(state): State<AppState<T>>) -> Response {
    if state.manager.is_connected() {
        Json(ReadyResponse {
            status: "ready",
            mt5_status: state.manager.status(),
            error: None,
        })
        .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                status: "not_ready",
                mt5_status: state.manager.status(),
                error: state.manager.last_error(),
            }),
        )
            .into_response()
    }
}

async fn health_live() -> Response {
    Json(json!({ "status": "alive" })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::ReconnectSettings;
    use crate::application::ports::{SymbolInfo, Tick};
    use crate::infrastructure::terminal::MockTerminal;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_state(terminal: &Arc<MockTerminal>) -> AppState<MockTerminal> {
        // One attempt, tiny delay: failure paths should not sleep out the
        // production backoff schedule.
        let manager = Arc::new(ConnectionManager::new(
            Arc::clone(terminal),
            ReconnectSettings {
                max_attempts: 1,
                base_delay: std::time::Duration::from_millis(1),
            },
        ));
        AppState::new(manager, FaultCodes::default())
    }

    fn eurusd_info() -> SymbolInfo {
        SymbolInfo {
            name: "EURUSD".to_string(),
            description: String::new(),
            point: 0.0001,
            digits: 5,
            spread: 2,
            trade_freeze_level: 10,
            trade_contract_size: 100_000.0,
            volume_min: 0.01,
            volume_max: 100.0,
            volume_step: 0.01,
            filling_mode: 2,
            currency_base: "EUR".to_string(),
            currency_profit: "USD".to_string(),
            bid: 1.0848,
            ask: 1.0850,
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    #[tokio::test]
    async fn liveness_always_answers() {
        let terminal = Arc::new(MockTerminal::new());
        let app = create_router(test_state(&terminal));

        let response = app
            .oneshot(Request::builder().uri("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "alive");
    }

    #[tokio::test]
    async fn readiness_is_503_until_connected() {
        let terminal = Arc::new(MockTerminal::new());
        let state = test_state(&terminal);
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["status"], "not_ready");

        assert!(state.manager.initialize().await);
        let response = app
            .oneshot(Request::builder().uri("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn request_id_is_minted_and_echoed() {
        let terminal = Arc::new(MockTerminal::new());
        let app = create_router(test_state(&terminal));

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers().contains_key("x-request-id"));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/live")
                    .header("x-request-id", "caller-supplied")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "caller-supplied");
    }

    #[tokio::test]
    async fn send_order_happy_path() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.add_tick(
            "EURUSD",
            Tick {
                time: 0,
                bid: 1.0848,
                ask: 1.0850,
                last: 1.0849,
                volume: 1,
            },
        );
        let app = create_router(test_state(&terminal));

        let response = app
            .oneshot(post_json(
                "/order",
                json!({ "symbol": "EURUSD", "volume": 0.1, "type": "BUY" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Order executed successfully");
        assert!(body["result"]["order"].as_u64().is_some());
    }

    #[tokio::test]
    async fn send_order_missing_fields_uses_the_envelope() {
        let terminal = Arc::new(MockTerminal::new());
        let app = create_router(test_state(&terminal));

        let response = app
            .oneshot(post_json("/order", json!({ "symbol": "EURUSD" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error_type"], "validation_error");
        assert_eq!(body["details"]["required"][0], "symbol");
        assert!(body["request_id"].as_str().is_some());
    }

    #[tokio::test]
    async fn send_order_rejects_unknown_type() {
        let terminal = Arc::new(MockTerminal::new());
        let app = create_router(test_state(&terminal));

        let response = app
            .oneshot(post_json(
                "/order",
                json!({ "symbol": "EURUSD", "volume": 0.1, "type": "HOLD" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid order type: HOLD");
    }

    #[tokio::test]
    async fn account_failure_maps_to_503_when_terminal_is_down() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.fail_all_connects();
        let app = create_router(test_state(&terminal));

        let response = app
            .oneshot(Request::builder().uri("/account").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["error_type"], "connection_error");
    }

    #[tokio::test]
    async fn cancel_unknown_order_is_404() {
        let terminal = Arc::new(MockTerminal::new());
        let app = create_router(test_state(&terminal));

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/orders/99")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error_type"], "not_found");
    }

    #[tokio::test]
    async fn get_positions_returns_bare_list() {
        let terminal = Arc::new(MockTerminal::new());
        let app = create_router(test_state(&terminal));

        let response = app
            .oneshot(Request::builder().uri("/get_positions").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn fetch_data_pos_requires_a_symbol() {
        let terminal = Arc::new(MockTerminal::new());
        let app = create_router(test_state(&terminal));

        let response = app
            .oneshot(Request::builder().uri("/fetch_data_pos").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Symbol parameter is required"
        );
    }

    #[tokio::test]
    async fn fetch_data_pos_rejects_unknown_timeframe() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        let app = create_router(test_state(&terminal));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/fetch_data_pos?symbol=EURUSD&timeframe=M7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(
            body["error"].as_str().unwrap().contains("Invalid timeframe"),
            "got: {body}"
        );
    }
}
