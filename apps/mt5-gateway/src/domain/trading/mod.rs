//! Trading domain: order vocabulary, symbol constraints, validation rules.

pub mod constraints;
pub mod validation;
pub mod value_objects;

pub use constraints::SymbolConstraints;
pub use validation::{
    OrderRuleError, validate_pending_price, validate_stops, validate_volume,
};
pub use value_objects::{
    FaultCodes, FillingMode, OrderKind, OrderSide, ResultClass, TIMEFRAME_NAMES,
    TRADE_RETCODE_DONE, TimePolicy, Timeframe, TradeAction, classify,
};
