//! Scripted in-memory terminal for testing.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::application::ports::{
    AccountInfo, Deal, HistoryOrder, OrderCheckResult, PendingOrder, Position, Rate,
    SnapshotFilter, SymbolInfo, TerminalError, TerminalPort, Tick, TradeRequest, TradeResult,
};
use crate::domain::trading::{OrderKind, TRADE_RETCODE_DONE, Timeframe};

#[derive(Debug, Default)]
struct MockState {
    fail_connects_remaining: u32,
    fail_all_connects: bool,
    connect_calls: u32,
    disconnect_calls: u32,
    account: Option<AccountInfo>,
    account_faults: u32,
    symbols: HashMap<String, SymbolInfo>,
    ticks: HashMap<String, Tick>,
    rates: Option<Vec<Rate>>,
    positions: Vec<Position>,
    pending: Vec<PendingOrder>,
    deals: Vec<Deal>,
    history: Vec<HistoryOrder>,
    send_results: VecDeque<Option<TradeResult>>,
    check_results: VecDeque<Option<OrderCheckResult>>,
    margin: Option<f64>,
    profit: Option<f64>,
    sent: Vec<TradeRequest>,
    last_error: (i32, String),
}

/// Scripted terminal for tests.
///
/// Defaults to a healthy session: connects succeed, the account probe
/// answers, and unscripted trade requests come back `DONE`.
#[derive(Debug)]
pub struct MockTerminal {
    state: Mutex<MockState>,
}

impl Default for MockTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTerminal {
    /// A healthy mock session.
    #[must_use]
    pub fn new() -> Self {
        let state = MockState {
            account: Some(Self::default_account()),
            rates: Some(Vec::new()),
            margin: Some(107.25),
            profit: Some(50.0),
            ..MockState::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// The account snapshot a healthy mock reports.
    #[must_use]
    pub fn default_account() -> AccountInfo {
        AccountInfo {
            login: 123_456,
            server: "Demo-Server".to_string(),
            name: "Test Account".to_string(),
            currency: "USD".to_string(),
            leverage: 100,
            balance: 10_000.0,
            equity: 10_000.0,
            margin: 0.0,
            margin_free: 10_000.0,
            margin_level: 0.0,
            profit: 0.0,
        }
    }

    /// A `DONE` trade result.
    #[must_use]
    pub fn done_result(order: u64, deal: u64, price: f64) -> TradeResult {
        TradeResult {
            retcode: TRADE_RETCODE_DONE,
            deal,
            order,
            volume: 0.0,
            price,
            bid: 0.0,
            ask: 0.0,
            comment: "Request executed".to_string(),
        }
    }

    /// Fail the next `n` connect attempts.
    pub fn fail_connects(&self, n: u32) {
        self.state.lock().unwrap().fail_connects_remaining = n;
    }

    /// Fail every connect attempt.
    pub fn fail_all_connects(&self) {
        self.state.lock().unwrap().fail_all_connects = true;
    }

    /// How many connects were attempted.
    #[must_use]
    pub fn connect_calls(&self) -> u32 {
        self.state.lock().unwrap().connect_calls
    }

    /// How many disconnects were requested.
    #[must_use]
    pub fn disconnect_calls(&self) -> u32 {
        self.state.lock().unwrap().disconnect_calls
    }

    /// Replace the account snapshot (`None` = probe answers empty).
    pub fn set_account(&self, account: Option<AccountInfo>) {
        self.state.lock().unwrap().account = account;
    }

    /// Make the next `n` account probes fail at the transport.
    pub fn fail_account_probes(&self, n: u32) {
        self.state.lock().unwrap().account_faults = n;
    }

    /// Register an instrument.
    pub fn add_symbol(&self, info: SymbolInfo) {
        self.state.lock().unwrap().symbols.insert(info.name.clone(), info);
    }

    /// Register a quote.
    pub fn add_tick(&self, symbol: &str, tick: Tick) {
        self.state.lock().unwrap().ticks.insert(symbol.to_string(), tick);
    }

    /// Replace the scripted bar history (`None` = rates unavailable).
    pub fn set_rates(&self, rates: Option<Vec<Rate>>) {
        self.state.lock().unwrap().rates = rates;
    }

    /// Add an open position.
    pub fn push_position(&self, position: Position) {
        self.state.lock().unwrap().positions.push(position);
    }

    /// Add a pending order.
    pub fn push_pending(&self, order: PendingOrder) {
        self.state.lock().unwrap().pending.push(order);
    }

    /// Add a historical deal.
    pub fn push_deal(&self, deal: Deal) {
        self.state.lock().unwrap().deals.push(deal);
    }

    /// Add a historical order.
    pub fn push_history_order(&self, order: HistoryOrder) {
        self.state.lock().unwrap().history.push(order);
    }

    /// Script the next `order_send` response.
    pub fn queue_send_result(&self, result: Option<TradeResult>) {
        self.state.lock().unwrap().send_results.push_back(result);
    }

    /// Script the next `order_check` response.
    pub fn queue_check_result(&self, result: Option<OrderCheckResult>) {
        self.state.lock().unwrap().check_results.push_back(result);
    }

    /// Script the margin calculator (`None` = unavailable).
    pub fn set_margin(&self, margin: Option<f64>) {
        self.state.lock().unwrap().margin = margin;
    }

    /// Script the profit calculator (`None` = unavailable).
    pub fn set_profit(&self, profit: Option<f64>) {
        self.state.lock().unwrap().profit = profit;
    }

    /// Script the terminal's last-error diagnostic.
    pub fn set_last_error(&self, code: i32, message: &str) {
        self.state.lock().unwrap().last_error = (code, message.to_string());
    }

    /// Every trade request submitted so far.
    #[must_use]
    pub fn sent_requests(&self) -> Vec<TradeRequest> {
        self.state.lock().unwrap().sent.clone()
    }
}

fn match_position(filter: &SnapshotFilter, position: &Position) -> bool {
    match filter {
        SnapshotFilter::All => true,
        SnapshotFilter::Ticket(ticket) => position.ticket == *ticket,
        SnapshotFilter::Symbol(symbol) => position.symbol == *symbol,
    }
}

fn match_pending(filter: &SnapshotFilter, order: &PendingOrder) -> bool {
    match filter {
        SnapshotFilter::All => true,
        SnapshotFilter::Ticket(ticket) => order.ticket == *ticket,
        SnapshotFilter::Symbol(symbol) => order.symbol == *symbol,
    }
}

#[async_trait]
impl TerminalPort for MockTerminal {
    async fn connect(&self) -> Result<(), TerminalError> {
        let mut state = self.state.lock().unwrap();
        state.connect_calls += 1;
        if state.fail_all_connects {
            return Err(TerminalError::Transport("connection refused".to_string()));
        }
        if state.fail_connects_remaining > 0 {
            state.fail_connects_remaining -= 1;
            return Err(TerminalError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TerminalError> {
        self.state.lock().unwrap().disconnect_calls += 1;
        Ok(())
    }

    async fn account_info(&self) -> Result<Option<AccountInfo>, TerminalError> {
        let mut state = self.state.lock().unwrap();
        if state.account_faults > 0 {
            state.account_faults -= 1;
            return Err(TerminalError::Transport("probe failed".to_string()));
        }
        Ok(state.account.clone())
    }

    async fn symbol_select(&self, symbol: &str) -> Result<bool, TerminalError> {
        Ok(self.state.lock().unwrap().symbols.contains_key(symbol))
    }

    async fn symbol_info(&self, symbol: &str) -> Result<Option<SymbolInfo>, TerminalError> {
        Ok(self.state.lock().unwrap().symbols.get(symbol).cloned())
    }

    async fn symbol_tick(&self, symbol: &str) -> Result<Option<Tick>, TerminalError> {
        Ok(self.state.lock().unwrap().ticks.get(symbol).cloned())
    }

    async fn symbol_names(&self, _search: &str) -> Result<Vec<String>, TerminalError> {
        let mut names: Vec<String> = self.state.lock().unwrap().symbols.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn rates_from_pos(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
        _start: u32,
        _count: u32,
    ) -> Result<Option<Vec<Rate>>, TerminalError> {
        Ok(self.state.lock().unwrap().rates.clone())
    }

    async fn rates_range(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Option<Vec<Rate>>, TerminalError> {
        Ok(self.state.lock().unwrap().rates.clone())
    }

    async fn order_send(
        &self,
        request: &TradeRequest,
    ) -> Result<Option<TradeResult>, TerminalError> {
        let mut state = self.state.lock().unwrap();
        state.sent.push(request.clone());
        match state.send_results.pop_front() {
            Some(result) => Ok(result),
            None => Ok(Some(Self::done_result(1, 1, request.price.unwrap_or(0.0)))),
        }
    }

    async fn order_check(
        &self,
        request: &TradeRequest,
    ) -> Result<Option<OrderCheckResult>, TerminalError> {
        let mut state = self.state.lock().unwrap();
        state.sent.push(request.clone());
        match state.check_results.pop_front() {
            Some(result) => Ok(result),
            None => Ok(Some(OrderCheckResult {
                retcode: 0,
                balance: 10_000.0,
                equity: 10_000.0,
                profit: 0.0,
                margin: 107.25,
                margin_free: 9_892.75,
                margin_level: 9324.0,
                comment: "Done".to_string(),
            })),
        }
    }

    async fn order_calc_margin(
        &self,
        _kind: OrderKind,
        _symbol: &str,
        _volume: f64,
        _price: f64,
    ) -> Result<Option<f64>, TerminalError> {
        Ok(self.state.lock().unwrap().margin)
    }

    async fn order_calc_profit(
        &self,
        _kind: OrderKind,
        _symbol: &str,
        _volume: f64,
        _price_open: f64,
        _price_close: f64,
    ) -> Result<Option<f64>, TerminalError> {
        Ok(self.state.lock().unwrap().profit)
    }

    async fn positions(&self, filter: &SnapshotFilter) -> Result<Vec<Position>, TerminalError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .positions
            .iter()
            .filter(|p| match_position(filter, p))
            .cloned()
            .collect())
    }

    async fn positions_total(&self) -> Result<u64, TerminalError> {
        Ok(self.state.lock().unwrap().positions.len() as u64)
    }

    async fn pending_orders(
        &self,
        filter: &SnapshotFilter,
    ) -> Result<Vec<PendingOrder>, TerminalError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .pending
            .iter()
            .filter(|o| match_pending(filter, o))
            .cloned()
            .collect())
    }

    async fn deals_for_position(&self, position: u64) -> Result<Vec<Deal>, TerminalError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .deals
            .iter()
            .filter(|d| d.position == position)
            .cloned()
            .collect())
    }

    async fn deals_in_range(
        &self,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
        position: u64,
    ) -> Result<Vec<Deal>, TerminalError> {
        self.deals_for_position(position).await
    }

    async fn history_orders(&self, ticket: u64) -> Result<Vec<HistoryOrder>, TerminalError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .history
            .iter()
            .filter(|o| o.ticket == ticket)
            .cloned()
            .collect())
    }

    async fn last_error(&self) -> (i32, String) {
        self.state.lock().unwrap().last_error.clone()
    }
}
