//! Position query and close engine.
//!
//! Closing always re-resolves the live position by ticket first; the venue
//! is the system of record and the position may have changed or vanished
//! since the caller last looked.

use std::sync::Arc;

use crate::application::errors::{OperationError, classify_failure};
use crate::application::ports::{
    Position, SnapshotFilter, TerminalPort, TradeRequest, TradeResult,
};
use crate::application::services::ConnectionManager;
use crate::application::use_cases::require_connection;
use crate::domain::trading::{
    FaultCodes, FillingMode, OrderKind, OrderSide, TRADE_RETCODE_DONE,
};

/// Default price deviation for closing deals, in points.
pub const DEFAULT_CLOSE_DEVIATION: u32 = 20;

/// Outcome of a close-all sweep.
#[derive(Debug, Clone, Default)]
pub struct CloseAllOutcome {
    /// Results of the closures that succeeded.
    pub closed: Vec<TradeResult>,
    /// How many eligible positions failed to close.
    pub failed: usize,
}

impl CloseAllOutcome {
    /// Whether any position matched the filters at all.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.closed.len() + self.failed
    }
}

/// Use case for listing and flattening positions.
pub struct ClosePositionsUseCase<T: TerminalPort> {
    manager: Arc<ConnectionManager<T>>,
    faults: FaultCodes,
}

impl<T: TerminalPort> ClosePositionsUseCase<T> {
    /// Create a new `ClosePositionsUseCase`.
    pub const fn new(manager: Arc<ConnectionManager<T>>, faults: FaultCodes) -> Self {
        Self { manager, faults }
    }

    /// List open positions, optionally filtered by strategy tag.
    ///
    /// No matches is an empty list, not an error.
    pub async fn list(&self, magic: Option<i64>) -> Result<Vec<Position>, OperationError> {
        require_connection(&self.manager).await?;

        let mut positions = self
            .manager
            .terminal()
            .positions(&SnapshotFilter::All)
            .await?;

        if let Some(magic) = magic {
            positions.retain(|p| p.magic == magic);
        }

        Ok(positions)
    }

    /// Count of open positions.
    pub async fn total(&self) -> Result<u64, OperationError> {
        require_connection(&self.manager).await?;
        Ok(self.manager.terminal().positions_total().await?)
    }

    async fn resolve(&self, ticket: u64) -> Result<Position, OperationError> {
        let positions = self
            .manager
            .terminal()
            .positions(&SnapshotFilter::Ticket(ticket))
            .await?;

        positions
            .into_iter()
            .next()
            .ok_or_else(|| OperationError::not_found("position", ticket))
    }

    /// Build and submit the opposite-direction deal that flattens `volume`
    /// lots of a live position.
    async fn submit_close(
        &self,
        position: &Position,
        volume: f64,
        deviation: u32,
        magic: i64,
        comment: &str,
    ) -> Result<TradeResult, OperationError> {
        let terminal = self.manager.terminal();

        if !terminal.symbol_select(&position.symbol).await? {
            return Err(OperationError::validation(format!(
                "Symbol not found or not selectable: {}",
                position.symbol
            )));
        }

        let tick = terminal.symbol_tick(&position.symbol).await?.ok_or_else(|| {
            OperationError::validation(format!(
                "Failed to get tick for symbol: {}",
                position.symbol
            ))
        })?;

        // A buy position is closed at bid with a sell, a sell at ask.
        let price = match position.side {
            OrderSide::Buy => tick.bid,
            OrderSide::Sell => tick.ask,
        };
        if price == 0.0 {
            return Err(OperationError::validation(format!(
                "Invalid price retrieved for symbol: {}",
                position.symbol
            )));
        }

        let filling = match terminal.symbol_info(&position.symbol).await? {
            Some(info) => FillingMode::select(info.constraints().filling_capability),
            None => FillingMode::Return,
        };

        let kind = OrderKind::closing(position.side);
        tracing::info!(
            ticket = position.ticket,
            symbol = %position.symbol,
            volume,
            kind = %kind,
            price,
            filling = %filling,
            "Closing position"
        );

        let request = TradeRequest::close(
            position.ticket,
            &position.symbol,
            kind,
            volume,
            price,
            deviation,
            magic,
            comment,
            filling,
        );

        let result = terminal.order_send(&request).await?.ok_or_else(|| {
            tracing::error!(ticket = position.ticket, "order_send returned no response for close");
            OperationError::validation("Close failed - no response from terminal")
        })?;

        if result.retcode != TRADE_RETCODE_DONE {
            let last_error = terminal.last_error().await;
            tracing::error!(
                ticket = position.ticket,
                retcode = result.retcode,
                comment = %result.comment,
                "Failed to close position"
            );
            return Err(classify_failure("Close position", &result, last_error, &self.faults));
        }

        tracing::info!(ticket = position.ticket, price = result.price, "Position closed");
        Ok(result)
    }

    /// Close one position completely.
    pub async fn close(
        &self,
        ticket: u64,
        deviation: u32,
        comment: &str,
    ) -> Result<TradeResult, OperationError> {
        require_connection(&self.manager).await?;
        let position = self.resolve(ticket).await?;
        self.submit_close(&position, position.volume, deviation, position.magic, comment)
            .await
    }

    /// Close part of a position, leaving the remainder open.
    ///
    /// The requested volume must be strictly less than the open volume;
    /// flattening everything is the full-close operation's job.
    pub async fn close_partial(
        &self,
        ticket: u64,
        volume: f64,
        deviation: u32,
        magic: i64,
        comment: &str,
    ) -> Result<TradeResult, OperationError> {
        if volume <= 0.0 {
            return Err(OperationError::validation("Volume must be positive"));
        }

        require_connection(&self.manager).await?;
        let position = self.resolve(ticket).await?;

        if volume >= position.volume {
            return Err(OperationError::validation(format!(
                "Volume to close ({volume}) must be less than position volume ({}). \
                 Use /close_position to close entire position.",
                position.volume
            )));
        }

        self.submit_close(&position, volume, deviation, magic, comment)
            .await
    }

    /// Close every position matching the filters.
    ///
    /// Each closure is attempted independently; one failure never aborts the
    /// sweep, and the outcome reports how many succeeded.
    pub async fn close_all(
        &self,
        side: Option<OrderSide>,
        magic: Option<i64>,
    ) -> Result<CloseAllOutcome, OperationError> {
        require_connection(&self.manager).await?;

        let mut positions = self
            .manager
            .terminal()
            .positions(&SnapshotFilter::All)
            .await?;

        if let Some(magic) = magic {
            positions.retain(|p| p.magic == magic);
        }
        if let Some(side) = side {
            positions.retain(|p| p.side == side);
        }

        let mut outcome = CloseAllOutcome::default();
        for position in positions {
            match self
                .submit_close(
                    &position,
                    position.volume,
                    DEFAULT_CLOSE_DEVIATION,
                    position.magic,
                    "",
                )
                .await
            {
                Ok(result) => outcome.closed.push(result),
                Err(e) => {
                    tracing::error!(ticket = position.ticket, error = %e, "Failed to close position in sweep");
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }

    /// Change an open position's stop loss / take profit.
    pub async fn modify_sl_tp(
        &self,
        ticket: u64,
        sl: Option<f64>,
        tp: Option<f64>,
    ) -> Result<TradeResult, OperationError> {
        require_connection(&self.manager).await?;
        let terminal = self.manager.terminal();

        let request = TradeRequest::position_sltp(ticket, sl, tp);
        let result = terminal.order_send(&request).await?.ok_or_else(|| {
            OperationError::validation("Modify SL/TP failed - no response from terminal")
        })?;

        if result.retcode != TRADE_RETCODE_DONE {
            let last_error = terminal.last_error().await;
            return Err(classify_failure("Modify SL/TP", &result, last_error, &self.faults));
        }

        tracing::info!(ticket, sl, tp, "Position SL/TP modified");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{SymbolInfo, Tick};
    use crate::application::services::ReconnectSettings;
    use crate::domain::trading::TradeAction;
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

    fn eurusd_tick() -> Tick {
        Tick {
            time: 1_700_000_000,
            bid: 1.0848,
            ask: 1.0850,
            last: 1.0849,
            volume: 10,
        }
    }

    fn open_position(ticket: u64, side: OrderSide, volume: f64, magic: i64) -> Position {
        Position {
            ticket,
            symbol: "EURUSD".to_string(),
            side,
            volume,
            price_open: 1.0800,
            sl: 0.0,
            tp: 0.0,
            price_current: 1.0848,
            swap: 0.0,
            profit: 48.0,
            magic,
            comment: String::new(),
            time: 1_700_000_000,
        }
    }

    fn use_case(terminal: &Arc<MockTerminal>) -> ClosePositionsUseCase<MockTerminal> {
        ClosePositionsUseCase::new(
            Arc::new(ConnectionManager::new(
                Arc::clone(terminal),
                ReconnectSettings::default(),
            )),
            FaultCodes::default(),
        )
    }

    #[tokio::test]
    async fn list_filters_by_magic() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.push_position(open_position(1, OrderSide::Buy, 0.10, 7));
        terminal.push_position(open_position(2, OrderSide::Sell, 0.20, 9));
        let use_case = use_case(&terminal);

        let all = use_case.list(None).await.unwrap();
        assert_eq!(all.len(), 2);

        let tagged = use_case.list(Some(7)).await.unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].ticket, 1);

        let none = use_case.list(Some(99)).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn close_sends_opposite_deal_at_bid() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.add_tick("EURUSD", eurusd_tick());
        terminal.push_position(open_position(42, OrderSide::Buy, 0.10, 5));
        let use_case = use_case(&terminal);

        use_case.close(42, 20, "").await.unwrap();

        let sent = terminal.sent_requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].action, TradeAction::Deal);
        assert_eq!(sent[0].position, Some(42));
        assert_eq!(sent[0].kind, Some(OrderKind::Sell));
        assert_eq!(sent[0].price, Some(1.0848));
        assert_eq!(sent[0].volume, Some(0.10));
        assert_eq!(sent[0].magic, Some(5));
    }

    #[tokio::test]
    async fn close_missing_position_is_not_found() {
        let terminal = Arc::new(MockTerminal::new());
        let use_case = use_case(&terminal);

        let err = use_case.close(404, 20, "").await.unwrap_err();
        assert!(matches!(err, OperationError::NotFound { .. }));
    }

    #[tokio::test]
    async fn partial_close_requires_strictly_smaller_volume() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.add_tick("EURUSD", eurusd_tick());
        terminal.push_position(open_position(42, OrderSide::Buy, 0.10, 0));
        let use_case = use_case(&terminal);

        let err = use_case
            .close_partial(42, 0.10, 20, 0, "Partial close")
            .await
            .unwrap_err();
        match err {
            OperationError::Validation { message, .. } => {
                assert!(message.contains("/close_position"), "got: {message}");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(terminal.sent_requests().is_empty());
    }

    #[tokio::test]
    async fn partial_close_reports_the_close_price() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.add_tick("EURUSD", eurusd_tick());
        terminal.push_position(open_position(42, OrderSide::Buy, 0.10, 0));
        terminal.queue_send_result(Some(MockTerminal::done_result(43, 44, 1.0848)));
        let use_case = use_case(&terminal);

        let result = use_case
            .close_partial(42, 0.04, 20, 0, "Partial close")
            .await
            .unwrap();
        assert_eq!(result.price, 1.0848);
        assert_eq!(terminal.sent_requests()[0].volume, Some(0.04));
    }

    #[tokio::test]
    async fn close_all_continues_past_failures() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.add_tick("EURUSD", eurusd_tick());
        terminal.push_position(open_position(1, OrderSide::Buy, 0.10, 0));
        terminal.push_position(open_position(2, OrderSide::Buy, 0.10, 0));
        terminal.push_position(open_position(3, OrderSide::Sell, 0.10, 0));

        // Second closure fails at the venue; the other two succeed.
        terminal.queue_send_result(Some(MockTerminal::done_result(10, 10, 1.0848)));
        terminal.queue_send_result(Some(TradeResult {
            retcode: 10016,
            comment: "Invalid stops".to_string(),
            ..MockTerminal::done_result(0, 0, 0.0)
        }));
        terminal.queue_send_result(Some(MockTerminal::done_result(11, 11, 1.0850)));

        let use_case = use_case(&terminal);
        let outcome = use_case.close_all(None, None).await.unwrap();

        assert_eq!(outcome.closed.len(), 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.attempted(), 3);
    }

    #[tokio::test]
    async fn close_all_applies_side_and_magic_filters() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.add_tick("EURUSD", eurusd_tick());
        terminal.push_position(open_position(1, OrderSide::Buy, 0.10, 7));
        terminal.push_position(open_position(2, OrderSide::Sell, 0.10, 7));
        terminal.push_position(open_position(3, OrderSide::Buy, 0.10, 9));

        let use_case = use_case(&terminal);
        let outcome = use_case
            .close_all(Some(OrderSide::Buy), Some(7))
            .await
            .unwrap();

        assert_eq!(outcome.attempted(), 1);
        assert_eq!(terminal.sent_requests()[0].position, Some(1));
    }

    #[tokio::test]
    async fn modify_sl_tp_sends_an_sltp_action() {
        let terminal = Arc::new(MockTerminal::new());
        let use_case = use_case(&terminal);

        use_case.modify_sl_tp(42, Some(1.08), Some(1.10)).await.unwrap();

        let sent = terminal.sent_requests();
        assert_eq!(sent[0].action, TradeAction::Sltp);
        assert_eq!(sent[0].position, Some(42));
        assert_eq!(sent[0].sl, Some(1.08));
        assert_eq!(sent[0].tp, Some(1.10));
    }
}
