//! Application ports - boundaries to the world outside the use cases.

pub mod snapshots;
pub mod terminal_port;

pub use snapshots::{
    AccountInfo, Deal, HistoryOrder, PendingOrder, Position, Rate, SnapshotFilter, SymbolInfo,
    Tick,
};
pub use terminal_port::{
    OrderCheckResult, TerminalError, TerminalPort, TradeRequest, TradeResult,
};
