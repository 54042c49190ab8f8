//! Margin and profit calculators.
//!
//! Same front half as the execution pipeline (resolve symbol, validate
//! volume and price), then a venue calc call instead of a submission.

use std::sync::Arc;

use serde_json::json;

use crate::application::errors::OperationError;
use crate::application::ports::TerminalPort;
use crate::application::services::ConnectionManager;
use crate::application::use_cases::require_connection;
use crate::domain::trading::{OrderKind, OrderSide, validate_volume};

/// Use case for hypothetical margin and profit calculations.
pub struct OrderCalcUseCase<T: TerminalPort> {
    manager: Arc<ConnectionManager<T>>,
}

impl<T: TerminalPort> OrderCalcUseCase<T> {
    /// Create a new `OrderCalcUseCase`.
    pub const fn new(manager: Arc<ConnectionManager<T>>) -> Self {
        Self { manager }
    }

    async fn validate_symbol_and_volume(
        &self,
        symbol: &str,
        volume: f64,
    ) -> Result<(), OperationError> {
        require_connection(&self.manager).await?;
        let terminal = self.manager.terminal();

        if !terminal.symbol_select(symbol).await? {
            return Err(OperationError::not_found("symbol", symbol));
        }

        if volume <= 0.0 {
            return Err(OperationError::validation("Volume must be positive"));
        }

        let info = terminal
            .symbol_info(symbol)
            .await?
            .ok_or_else(|| OperationError::validation("Symbol info unavailable"))?;
        validate_volume(&info.constraints(), volume)?;

        Ok(())
    }

    /// Margin required to open a hypothetical order.
    pub async fn margin(
        &self,
        symbol: &str,
        kind: OrderKind,
        volume: f64,
        price: f64,
    ) -> Result<f64, OperationError> {
        self.validate_symbol_and_volume(symbol, volume).await?;

        if price <= 0.0 {
            return Err(OperationError::validation("Price must be positive"));
        }

        let margin = self
            .manager
            .terminal()
            .order_calc_margin(kind, symbol, volume, price)
            .await?;

        let Some(margin) = margin else {
            tracing::warn!(symbol, volume, price, "Margin calculation returned no value");
            return Err(OperationError::validation_with(
                "Margin calculation unavailable",
                json!({
                    "reason": "Symbol may not support this calculation or parameters are invalid"
                }),
            ));
        };

        if margin < 0.0 {
            tracing::warn!(symbol, margin, "Negative margin calculated");
            return Err(OperationError::validation("Invalid margin calculation result"));
        }

        Ok(margin)
    }

    /// Price-difference profit of a hypothetical round trip.
    ///
    /// Swap and commission are not included.
    pub async fn profit(
        &self,
        symbol: &str,
        side: OrderSide,
        volume: f64,
        price_open: f64,
        price_close: f64,
    ) -> Result<f64, OperationError> {
        self.validate_symbol_and_volume(symbol, volume).await?;

        if price_open <= 0.0 {
            return Err(OperationError::validation("Opening price must be positive"));
        }
        if price_close <= 0.0 {
            return Err(OperationError::validation("Closing price must be positive"));
        }

        let kind = match side {
            OrderSide::Buy => OrderKind::Buy,
            OrderSide::Sell => OrderKind::Sell,
        };
        let profit = self
            .manager
            .terminal()
            .order_calc_profit(kind, symbol, volume, price_open, price_close)
            .await?;

        let Some(profit) = profit else {
            tracing::warn!(
                symbol,
                volume,
                price_open,
                price_close,
                "Profit calculation returned no value"
            );
            return Err(OperationError::validation_with(
                "Profit calculation unavailable",
                json!({ "reason": "Symbol may not support this calculation" }),
            ));
        };

        tracing::info!(symbol, volume, price_open, price_close, profit, "Profit calculated");
        Ok(profit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::SymbolInfo;
    use crate::application::services::ReconnectSettings;
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

    fn use_case(terminal: &Arc<MockTerminal>) -> OrderCalcUseCase<MockTerminal> {
        OrderCalcUseCase::new(Arc::new(ConnectionManager::new(
            Arc::clone(terminal),
            ReconnectSettings::default(),
        )))
    }

    #[tokio::test]
    async fn margin_returns_the_venue_figure() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.set_margin(Some(107.25));
        let use_case = use_case(&terminal);

        let margin = use_case
            .margin("EURUSD", OrderKind::Buy, 0.10, 1.0850)
            .await
            .unwrap();
        assert_eq!(margin, 107.25);
    }

    #[tokio::test]
    async fn unavailable_margin_is_a_validation_error_with_reason() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.set_margin(None);
        let use_case = use_case(&terminal);

        let err = use_case
            .margin("EURUSD", OrderKind::Buy, 0.10, 1.0850)
            .await
            .unwrap_err();
        match err {
            OperationError::Validation { details, .. } => assert!(details.is_some()),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn negative_margin_is_rejected() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        terminal.set_margin(Some(-5.0));
        let use_case = use_case(&terminal);

        let err = use_case
            .margin("EURUSD", OrderKind::Buy, 0.10, 1.0850)
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::Validation { .. }));
    }

    #[tokio::test]
    async fn profit_validates_both_prices() {
        let terminal = Arc::new(MockTerminal::new());
        terminal.add_symbol(eurusd_info());
        let use_case = use_case(&terminal);

        let err = use_case
            .profit("EURUSD", OrderSide::Buy, 0.10, 0.0, 1.0900)
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::Validation { .. }));

        let profit = use_case
            .profit("EURUSD", OrderSide::Buy, 0.10, 1.0850, 1.0900)
            .await
            .unwrap();
        assert_eq!(profit, 50.0);
    }

    #[tokio::test]
    async fn unknown_symbol_is_not_found() {
        let terminal = Arc::new(MockTerminal::new());
        let use_case = use_case(&terminal);

        let err = use_case
            .margin("XXXYYY", OrderKind::Buy, 0.10, 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::NotFound { .. }));
    }
}
