//! Pending order queries, cancellation, and modification.

use std::sync::Arc;

use crate::application::errors::{OperationError, classify_failure};
use crate::application::ports::{
    PendingOrder, SnapshotFilter, TerminalPort, TradeRequest, TradeResult,
};
use crate::application::services::ConnectionManager;
use crate::application::use_cases::require_connection;
use crate::domain::trading::{
    FaultCodes, TRADE_RETCODE_DONE, validate_pending_price, validate_stops,
};

/// Requested changes to a pending order. Absent fields keep current values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PendingModify {
    /// New trigger price.
    pub price: Option<f64>,
    /// New stop loss (0 removes it).
    pub sl: Option<f64>,
    /// New take profit (0 removes it).
    pub tp: Option<f64>,
}

impl PendingModify {
    /// Whether anything is being changed at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.price.is_none() && self.sl.is_none() && self.tp.is_none()
    }
}

/// Use case for working pending orders.
pub struct PendingOrdersUseCase<T: TerminalPort> {
    manager: Arc<ConnectionManager<T>>,
    faults: FaultCodes,
}

impl<T: TerminalPort> PendingOrdersUseCase<T> {
    /// Create a new `PendingOrdersUseCase`.
    pub const fn new(manager: Arc<ConnectionManager<T>>, faults: FaultCodes) -> Self {
        Self { manager, faults }
    }

    /// List pending orders, optionally narrowed to one symbol or ticket.
    pub async fn list(
        &self,
        symbol: Option<&str>,
        ticket: Option<u64>,
    ) -> Result<Vec<PendingOrder>, OperationError> {
        require_connection(&self.manager).await?;
        let terminal = self.manager.terminal();

        let filter = if let Some(ticket) = ticket {
            SnapshotFilter::Ticket(ticket)
        } else if let Some(symbol) = symbol {
            if !terminal.symbol_select(symbol).await? {
                return Err(OperationError::validation(format!("Invalid symbol: {symbol}")));
            }
            SnapshotFilter::Symbol(symbol.to_string())
        } else {
            SnapshotFilter::All
        };

        let orders = terminal.pending_orders(&filter).await?;
        tracing::info!(count = orders.len(), "Retrieved pending orders");
        Ok(orders)
    }

    async fn resolve(&self, ticket: u64) -> Result<PendingOrder, OperationError> {
        let orders = self
            .manager
            .terminal()
            .pending_orders(&SnapshotFilter::Ticket(ticket))
            .await?;

        orders
            .into_iter()
            .next()
            .ok_or_else(|| OperationError::not_found("order", format!("ticket {ticket}")))
    }

    /// Cancel a pending order.
    pub async fn cancel(&self, ticket: u64) -> Result<TradeResult, OperationError> {
        require_connection(&self.manager).await?;
        let _ = self.resolve(ticket).await?;
        let terminal = self.manager.terminal();

        let request = TradeRequest::remove_pending(ticket);
        let result = terminal.order_send(&request).await?.ok_or_else(|| {
            tracing::error!(ticket, "order_send returned no response for cancel");
            OperationError::validation("Order cancellation failed - no response from terminal")
        })?;

        if result.retcode != TRADE_RETCODE_DONE {
            let last_error = terminal.last_error().await;
            tracing::error!(
                ticket,
                retcode = result.retcode,
                comment = %result.comment,
                "Failed to cancel order"
            );
            return Err(classify_failure("Cancel order", &result, last_error, &self.faults));
        }

        tracing::info!(ticket, "Order cancelled");
        Ok(result)
    }

    /// Modify a pending order's price and/or stops.
    ///
    /// Effective values (requested changes over current values) go through
    /// the same placement rules as order creation; a stop of exactly 0 means
    /// "remove" and skips placement checks.
    pub async fn modify(
        &self,
        ticket: u64,
        changes: PendingModify,
    ) -> Result<TradeResult, OperationError> {
        if changes.is_empty() {
            return Err(OperationError::validation(
                "At least one of price, sl, or tp must be provided",
            ));
        }

        require_connection(&self.manager).await?;
        let order = self.resolve(ticket).await?;
        let terminal = self.manager.terminal();

        let new_price = changes.price.unwrap_or(order.price_open);
        let new_sl = changes.sl.unwrap_or(order.sl);
        let new_tp = changes.tp.unwrap_or(order.tp);

        if new_price <= 0.0 {
            return Err(OperationError::validation("Price must be positive"));
        }
        if new_sl < 0.0 {
            return Err(OperationError::validation(
                "Stop loss must be non-negative (use 0 to remove)",
            ));
        }
        if new_tp < 0.0 {
            return Err(OperationError::validation(
                "Take profit must be non-negative (use 0 to remove)",
            ));
        }

        if changes.price.is_some() {
            let info = terminal
                .symbol_info(&order.symbol)
                .await?
                .ok_or_else(|| OperationError::validation("Symbol info unavailable"))?;
            let tick = terminal
                .symbol_tick(&order.symbol)
                .await?
                .ok_or_else(|| OperationError::validation("Unable to get current price"))?;

            validate_pending_price(order.kind, &info.constraints(), tick.bid, tick.ask, new_price)?;
        }

        if new_sl > 0.0 || new_tp > 0.0 {
            validate_stops(
                order.kind.side(),
                new_price,
                (new_sl > 0.0).then_some(new_sl),
                (new_tp > 0.0).then_some(new_tp),
            )?;
        }

        let request = TradeRequest::modify_pending(ticket, new_price, new_sl, new_tp);
        let result = terminal.order_send(&request).await?.ok_or_else(|| {
            tracing::error!(ticket, "order_send returned no response for modify");
            OperationError::validation("Order modification failed - no response from terminal")
        })?;

        if result.retcode != TRADE_RETCODE_DONE {
            let last_error = terminal.last_error().await;
            tracing::error!(
                ticket,
                retcode = result.retcode,
                comment = %result.comment,
                "Failed to modify order"
            );
            return Err(classify_failure("Modify order", &result, last_error, &self.faults));
        }

        tracing::info!(ticket, price = new_price, sl = new_sl, tp = new_tp, "Order modified");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{SymbolInfo, Tick};
    use crate::application::services::ReconnectSettings;
    use crate::domain::trading::{OrderKind, TradeAction};
    use crate::infrastructure::terminal::MockTerminal;

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

    fn buy_limit(ticket: u64) -> PendingOrder {
        PendingOrder {
            ticket,
            symbol: "EURUSD".to_string(),
            kind: OrderKind::BuyLimit,
            volume_initial: 0.10,
            volume_current: 0.10,
            price_open: 1.0800,
            sl: 0.0,
            tp: 0.0,
            price_current: 1.0850,
            magic: 0,
            comment: String::new(),
            time_setup: 1_700_000_000,
        }
    }

    fn use_case(terminal: &Arc<MockTerminal>) -> PendingOrdersUseCase<MockTerminal> {
        PendingOrdersUseCase::new(
            Arc::new(ConnectionManager::new(
                Arc::clone(terminal),
                ReconnectSettings::default(),
            )),
            FaultCodes::default(),
        )
    }

    #[tokio::test]
    async fn list_narrows_by_ticket_over_symbol() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.push_pending(buy_limit(1));
        terminal.push_pending(buy_limit(2));
        let use_case = use_case(&terminal);

        let by_ticket = use_case.list(Some("EURUSD"), Some(2)).await.unwrap();
        assert_eq!(by_ticket.len(), 1);
        assert_eq!(by_ticket[0].ticket, 2);

        let by_symbol = use_case.list(Some("EURUSD"), None).await.unwrap();
        assert_eq!(by_symbol.len(), 2);
    }

    #[tokio::test]
    async fn cancel_missing_order_is_not_found() {
        let terminal = Arc::new(MockTerminal::new());
        let use_case = use_case(&terminal);

        let err = use_case.cancel(404).await.unwrap_err();
        assert!(matches!(err, OperationError::NotFound { .. }));
        assert!(terminal.sent_requests().is_empty());
    }

    #[tokio::test]
    async fn cancel_sends_a_remove_action() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.push_pending(buy_limit(9));
        let use_case = use_case(&terminal);

        use_case.cancel(9).await.unwrap();

        let sent = terminal.sent_requests();
        assert_eq!(sent[0].action, TradeAction::Remove);
        assert_eq!(sent[0].order, Some(9));
    }

    #[tokio::test]
    async fn modify_requires_at_least_one_change() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.push_pending(buy_limit(9));
        let use_case = use_case(&terminal);

        let err = use_case.modify(9, PendingModify::default()).await.unwrap_err();
        assert!(matches!(err, OperationError::Validation { .. }));
    }

    #[tokio::test]
    async fn modify_missing_order_is_not_found() {
        let terminal = Arc::new(MockTerminal::new());
        let use_case = use_case(&terminal);

        let err = use_case
            .modify(
                404,
                PendingModify {
                    sl: Some(1.07),
                    ..PendingModify::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::NotFound { .. }));
    }

    #[tokio::test]
    async fn modify_revalidates_a_new_price() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.add_tick(
            "EURUSD",
            Tick {
                time: 1_700_000_000,
                bid: 1.0848,
                ask: 1.0850,
                last: 1.0849,
                volume: 10,
            },
        );
        terminal.push_pending(buy_limit(9));
        let use_case = use_case(&terminal);

        // Inside the freeze distance of the ask: rejected without a venue call.
        let err = use_case
            .modify(
                9,
                PendingModify {
                    price: Some(1.0845),
                    ..PendingModify::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::Validation { .. }));
        assert!(terminal.sent_requests().is_empty());

        // A sound price goes through as a Modify action.
        use_case
            .modify(
                9,
                PendingModify {
                    price: Some(1.0820),
                    ..PendingModify::default()
                },
            )
            .await
            .unwrap();
        let sent = terminal.sent_requests();
        assert_eq!(sent[0].action, TradeAction::Modify);
        assert_eq!(sent[0].price, Some(1.0820));
    }

    #[tokio::test]
    async fn modify_keeps_current_values_for_absent_fields() {
        let terminal = Arc::new(MockTerminal::new());
        let mut order = buy_limit(9);
        order.sl = 1.0700;
        order.tp = 1.0900;
        terminal.push_pending(order);
        let use_case = use_case(&terminal);

        use_case
            .modify(
                9,
                PendingModify {
                    sl: Some(1.0750),
                    ..PendingModify::default()
                },
            )
            .await
            .unwrap();

        let sent = terminal.sent_requests();
        assert_eq!(sent[0].price, Some(1.0800));
        assert_eq!(sent[0].sl, Some(1.0750));
        assert_eq!(sent[0].tp, Some(1.0900));
    }

    #[tokio::test]
    async fn modify_allows_zero_to_remove_stops() {
        let terminal = Arc::new(MockTerminal::new());
        let mut order = buy_limit(9);
        order.sl = 1.0700;
        terminal.push_pending(order);
        let use_case = use_case(&terminal);

        use_case
            .modify(
                9,
                PendingModify {
                    sl: Some(0.0),
                    ..PendingModify::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(terminal.sent_requests()[0].sl, Some(0.0));
    }
}
