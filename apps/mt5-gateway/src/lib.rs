// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines
    )
)]

//! MT5 Gateway - Rust Core Library
//!
//! HTTP gateway in front of a MetaTrader 5 terminal. The terminal allows a
//! single stateful session per process; the hard parts live in two places:
//! the connection lifecycle manager that keeps that session alive and
//! self-healing, and the order pipeline that validates every instruction
//! before it reaches the venue and classifies every failure unambiguously.
//!
//! # Architecture (Clean Architecture + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: order vocabulary and pure validation rules
//!   - `trading`: order/action/filling enums, symbol constraints,
//!     volume/stops/pending-price validators, retcode classification
//!
//! - **Application**: use cases and orchestration
//!   - `ports`: the `TerminalPort` boundary and typed venue snapshots
//!   - `services`: `ConnectionManager` (state machine + backoff)
//!   - `use_cases`: `SendOrder`, `OrderCalc`, `ClosePositions`,
//!     `PendingOrders`
//!
//! - **Infrastructure**: adapters
//!   - `terminal`: TCP bridge client (and a scripted mock)
//!   - `http`: axum router, DTOs, error envelope, request IDs
//!   - `config`: environment settings

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Domain layer - core trading vocabulary with no external dependencies.
pub mod domain;

/// Application layer - use cases, services, and port definitions.
pub mod application;

/// Infrastructure layer - adapters and external integrations.
pub mod infrastructure;

// Domain re-exports
pub use domain::trading::{
    FaultCodes, FillingMode, OrderKind, OrderSide, SymbolConstraints, TimePolicy, Timeframe,
    TradeAction,
};

// Application re-exports
pub use application::errors::OperationError;
pub use application::ports::{TerminalError, TerminalPort, TradeRequest, TradeResult};
pub use application::services::{ConnectionManager, ConnectionStatus, ReconnectSettings};
pub use application::use_cases::{
    ClosePositionsUseCase, OrderCalcUseCase, OrderIntent, PendingOrdersUseCase, SendOrderUseCase,
};

// Infrastructure re-exports
pub use infrastructure::config::{ConfigError, Settings};
pub use infrastructure::http::{AppState, create_router};
pub use infrastructure::terminal::{BridgeConfig, BridgeTerminal, MockTerminal};
