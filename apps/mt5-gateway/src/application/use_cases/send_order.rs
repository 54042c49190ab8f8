//! Order execution pipeline.
//!
//! One pass per request: resolve the symbol, settle on an action and price,
//! run the validators, build the venue-native request, submit once, classify
//! the outcome. Validation failures stop the pipeline before any trade call
//! reaches the venue. Nothing here ever resubmits; a rejected trade could
//! otherwise duplicate a position.

use std::sync::Arc;

use crate::application::errors::{OperationError, classify_failure};
use crate::application::ports::{
    OrderCheckResult, TerminalPort, TradeRequest, TradeResult,
};
use crate::application::services::ConnectionManager;
use crate::application::use_cases::require_connection;
use crate::domain::trading::{
    FaultCodes, FillingMode, OrderKind, OrderSide, TRADE_RETCODE_DONE, TradeAction,
    validate_pending_price, validate_stops, validate_volume,
};

/// A caller's order, immutable once validated.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    /// Instrument to trade.
    pub symbol: String,
    /// Order kind.
    pub kind: OrderKind,
    /// Volume in lots.
    pub volume: f64,
    /// Trigger price; required for pending kinds, ignored for market kinds.
    pub price: Option<f64>,
    /// Stop loss.
    pub sl: Option<f64>,
    /// Take profit.
    pub tp: Option<f64>,
    /// Maximum price deviation, in points.
    pub deviation: u32,
    /// Strategy tag.
    pub magic: i64,
    /// Free-form comment.
    pub comment: String,
    /// Filling override; honored for market orders only.
    pub filling: Option<FillingMode>,
}

/// A successfully submitted order.
#[derive(Debug, Clone)]
pub struct OrderPlacement {
    /// True when a deal executed immediately, false for a resting placement.
    pub executed: bool,
    /// The venue's result, with order/deal tickets and fill price.
    pub result: TradeResult,
}

/// Outcome of a dry-run check.
#[derive(Debug, Clone)]
pub struct OrderCheck {
    /// Whether the venue considers the order feasible.
    pub feasible: bool,
    /// Margin and balance figures from the check.
    pub result: OrderCheckResult,
}

/// Use case for submitting and dry-running orders.
pub struct SendOrderUseCase<T: TerminalPort> {
    manager: Arc<ConnectionManager<T>>,
    faults: FaultCodes,
}

impl<T: TerminalPort> SendOrderUseCase<T> {
    /// Create a new `SendOrderUseCase`.
    pub const fn new(manager: Arc<ConnectionManager<T>>, faults: FaultCodes) -> Self {
        Self { manager, faults }
    }

    /// Steps shared by submit and check: resolve, price, validate, build.
    async fn prepare(&self, intent: &OrderIntent) -> Result<TradeRequest, OperationError> {
        require_connection(&self.manager).await?;
        let terminal = self.manager.terminal();

        if !terminal.symbol_select(&intent.symbol).await? {
            return Err(OperationError::not_found("symbol", &intent.symbol));
        }

        if intent.volume <= 0.0 {
            return Err(OperationError::validation("Volume must be positive"));
        }

        let info = terminal
            .symbol_info(&intent.symbol)
            .await?
            .ok_or_else(|| OperationError::validation("Symbol info unavailable"))?;
        let constraints = info.constraints();

        validate_volume(&constraints, intent.volume)?;

        let (action, price) = if intent.kind.is_market() {
            let tick = terminal.symbol_tick(&intent.symbol).await?.ok_or_else(|| {
                OperationError::validation(format!(
                    "Failed to get symbol price for {}",
                    intent.symbol
                ))
            })?;

            let price = match intent.kind.side() {
                OrderSide::Buy => tick.ask,
                OrderSide::Sell => tick.bid,
            };

            tracing::info!(
                kind = %intent.kind,
                bid = tick.bid,
                ask = tick.ask,
                price,
                "Market order priced from current tick"
            );

            if intent.price.is_some() {
                tracing::warn!(
                    symbol = %intent.symbol,
                    "Price ignored for market orders, using current tick"
                );
            }

            (TradeAction::Deal, price)
        } else {
            let price = intent
                .price
                .ok_or_else(|| OperationError::validation("Price required for pending orders"))?;
            if price <= 0.0 {
                return Err(OperationError::validation("Price must be positive"));
            }

            let tick = terminal
                .symbol_tick(&intent.symbol)
                .await?
                .ok_or_else(|| OperationError::validation("Unable to get current price"))?;

            validate_pending_price(intent.kind, &constraints, tick.bid, tick.ask, price)?;

            (TradeAction::Pending, price)
        };

        if intent.sl.is_some() || intent.tp.is_some() {
            validate_stops(intent.kind.side(), price, intent.sl, intent.tp)?;
        }

        // Pending orders always take the symbol's best supported mode; the
        // caller's override applies to market orders only.
        let selected = FillingMode::select(constraints.filling_capability);
        let filling = if intent.kind.is_market() {
            intent.filling.unwrap_or(selected)
        } else {
            selected
        };

        Ok(TradeRequest::open(
            action,
            &intent.symbol,
            intent.kind,
            intent.volume,
            price,
            intent.sl,
            intent.tp,
            intent.deviation,
            intent.magic,
            &intent.comment,
            filling,
        ))
    }

    /// Submit an order to the venue. Single-shot: one submission per call.
    pub async fn execute(&self, intent: &OrderIntent) -> Result<OrderPlacement, OperationError> {
        let request = self.prepare(intent).await?;

        tracing::info!(
            symbol = %intent.symbol,
            kind = %intent.kind,
            volume = intent.volume,
            price = request.price,
            sl = request.sl,
            tp = request.tp,
            filling = %request.filling,
            "Submitting order to terminal"
        );

        let result = self
            .manager
            .terminal()
            .order_send(&request)
            .await?
            .ok_or_else(|| {
                tracing::error!(symbol = %intent.symbol, kind = %intent.kind, "order_send returned no response");
                OperationError::validation("Order execution failed - no response from terminal")
            })?;

        if result.retcode != TRADE_RETCODE_DONE {
            let last_error = self.manager.terminal().last_error().await;
            tracing::error!(
                retcode = result.retcode,
                comment = %result.comment,
                "Terminal rejected order"
            );
            return Err(classify_failure("Send order", &result, last_error, &self.faults));
        }

        let executed = request.action == TradeAction::Deal;
        tracing::info!(
            kind = %intent.kind,
            symbol = %intent.symbol,
            volume = intent.volume,
            price = result.price,
            order = result.order,
            deal = result.deal,
            action = if executed { "executed" } else { "placed" },
            "Order accepted"
        );

        Ok(OrderPlacement { executed, result })
    }

    /// Dry-run an order to check margin requirements and feasibility.
    pub async fn check(&self, intent: &OrderIntent) -> Result<OrderCheck, OperationError> {
        let request = self.prepare(intent).await?;

        let result = self
            .manager
            .terminal()
            .order_check(&request)
            .await?
            .ok_or_else(|| {
                OperationError::validation("Order check failed - no response from terminal")
            })?;

        let feasible = result.retcode == 0 || result.retcode == TRADE_RETCODE_DONE;
        Ok(OrderCheck { feasible, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{SymbolInfo, Tick, TradeResult};
    use crate::infrastructure::terminal::MockTerminal;
    use crate::application::services::ReconnectSettings;

    fn eurusd_info() -> SymbolInfo {
        SymbolInfo {
            name: "EURUSD".to_string(),
            description: "Euro vs US Dollar".to_string(),
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

    fn eurusd_tick() -> Tick {
        Tick {
            time: 1_700_000_000,
            bid: 1.0848,
            ask: 1.0850,
            last: 1.0849,
            volume: 10,
        }
    }

    fn use_case(terminal: &Arc<MockTerminal>) -> SendOrderUseCase<MockTerminal> {
        let manager = Arc::new(ConnectionManager::new(
            Arc::clone(terminal),
            ReconnectSettings::default(),
        ));
        SendOrderUseCase::new(manager, FaultCodes::default())
    }

    fn market_buy() -> OrderIntent {
        OrderIntent {
            symbol: "EURUSD".to_string(),
            kind: OrderKind::Buy,
            volume: 0.10,
            price: None,
            sl: None,
            tp: None,
            deviation: 20,
            magic: 0,
            comment: String::new(),
            filling: None,
        }
    }

    #[tokio::test]
    async fn market_buy_executes_at_current_ask() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.add_tick("EURUSD", eurusd_tick());
        let use_case = use_case(&terminal);

        let placement = use_case.execute(&market_buy()).await.unwrap();
        assert!(placement.executed);

        let sent = terminal.sent_requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].action, TradeAction::Deal);
        assert_eq!(sent[0].price, Some(1.0850));
        assert_eq!(sent[0].filling, FillingMode::Ioc);
        assert_eq!(sent[0].deviation, Some(20));
    }

    #[tokio::test]
    async fn market_sell_executes_at_current_bid() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.add_tick("EURUSD", eurusd_tick());
        let use_case = use_case(&terminal);

        let intent = OrderIntent {
            kind: OrderKind::Sell,
            ..market_buy()
        };
        use_case.execute(&intent).await.unwrap();
        assert_eq!(terminal.sent_requests()[0].price, Some(1.0848));
    }

    #[tokio::test]
    async fn client_price_is_ignored_for_market_orders() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.add_tick("EURUSD", eurusd_tick());
        let use_case = use_case(&terminal);

        let intent = OrderIntent {
            price: Some(1.2000),
            ..market_buy()
        };
        use_case.execute(&intent).await.unwrap();
        assert_eq!(terminal.sent_requests()[0].price, Some(1.0850));
    }

    #[tokio::test]
    async fn unknown_symbol_is_not_found() {
        let terminal = Arc::new(MockTerminal::new());
        let use_case = use_case(&terminal);

        let err = use_case.execute(&market_buy()).await.unwrap_err();
        assert!(matches!(err, OperationError::NotFound { .. }));
        assert!(terminal.sent_requests().is_empty());
    }

    #[tokio::test]
    async fn off_grid_volume_stops_before_any_venue_call() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.add_tick("EURUSD", eurusd_tick());
        let use_case = use_case(&terminal);

        let intent = OrderIntent {
            volume: 0.015,
            ..market_buy()
        };
        let err = use_case.execute(&intent).await.unwrap_err();
        assert!(matches!(err, OperationError::Validation { .. }));
        assert!(terminal.sent_requests().is_empty());
    }

    #[tokio::test]
    async fn pending_order_requires_a_price() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.add_tick("EURUSD", eurusd_tick());
        let use_case = use_case(&terminal);

        let intent = OrderIntent {
            kind: OrderKind::BuyLimit,
            ..market_buy()
        };
        let err = use_case.execute(&intent).await.unwrap_err();
        match err {
            OperationError::Validation { message, .. } => {
                assert_eq!(message, "Price required for pending orders");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn buy_limit_inside_freeze_level_is_rejected() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.add_tick("EURUSD", eurusd_tick());
        let use_case = use_case(&terminal);

        let intent = OrderIntent {
            kind: OrderKind::BuyLimit,
            price: Some(1.0845),
            ..market_buy()
        };
        let err = use_case.execute(&intent).await.unwrap_err();
        assert!(matches!(err, OperationError::Validation { .. }));
    }

    #[tokio::test]
    async fn accepted_buy_limit_is_placed_not_executed() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.add_tick("EURUSD", eurusd_tick());
        let use_case = use_case(&terminal);

        let intent = OrderIntent {
            kind: OrderKind::BuyLimit,
            price: Some(1.0820),
            ..market_buy()
        };
        let placement = use_case.execute(&intent).await.unwrap();
        assert!(!placement.executed);
        assert_eq!(terminal.sent_requests()[0].action, TradeAction::Pending);
    }

    #[tokio::test]
    async fn misplaced_stop_loss_is_rejected_before_submission() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.add_tick("EURUSD", eurusd_tick());
        let use_case = use_case(&terminal);

        let intent = OrderIntent {
            sl: Some(1.0860),
            ..market_buy()
        };
        let err = use_case.execute(&intent).await.unwrap_err();
        assert!(matches!(err, OperationError::Validation { .. }));
        assert!(terminal.sent_requests().is_empty());
    }

    #[tokio::test]
    async fn venue_refusal_classifies_as_rejected() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.add_tick("EURUSD", eurusd_tick());
        terminal.queue_send_result(Some(TradeResult {
            retcode: 10016,
            comment: "Invalid stops".to_string(),
            ..MockTerminal::done_result(0, 0, 0.0)
        }));
        let use_case = use_case(&terminal);

        let err = use_case.execute(&market_buy()).await.unwrap_err();
        assert!(matches!(err, OperationError::Rejected { retcode: 10016, .. }));
    }

    #[tokio::test]
    async fn fault_retcode_classifies_as_connection_error() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.add_tick("EURUSD", eurusd_tick());
        terminal.queue_send_result(Some(TradeResult {
            retcode: 10019,
            comment: "Timeout".to_string(),
            ..MockTerminal::done_result(0, 0, 0.0)
        }));
        let use_case = use_case(&terminal);

        let err = use_case.execute(&market_buy()).await.unwrap_err();
        assert!(matches!(err, OperationError::Connection { .. }));
    }

    #[tokio::test]
    async fn missing_response_is_a_validation_error() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.add_tick("EURUSD", eurusd_tick());
        terminal.queue_send_result(None);
        let use_case = use_case(&terminal);

        let err = use_case.execute(&market_buy()).await.unwrap_err();
        match err {
            OperationError::Validation { message, .. } => {
                assert!(message.contains("no response"), "got: {message}");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn check_reports_margin_without_sending() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.add_tick("EURUSD", eurusd_tick());
        let use_case = use_case(&terminal);

        let check = use_case.check(&market_buy()).await.unwrap();
        assert!(check.feasible);
        assert!(check.result.margin > 0.0);

        // The check call is the only request the terminal saw.
        let sent = terminal.sent_requests();
        assert_eq!(sent.len(), 1);
    }
}
