//! Order kind: market deals and the four pending order types.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::order_side::OrderSide;

/// The six order types the terminal accepts.
///
/// `Buy`/`Sell` execute immediately at market; the limit/stop kinds rest as
/// pending orders until the trigger price is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    /// Immediate buy at current ask.
    Buy,
    /// Immediate sell at current bid.
    Sell,
    /// Pending buy below the current ask.
    BuyLimit,
    /// Pending sell above the current bid.
    SellLimit,
    /// Pending buy above the current ask (breakout).
    BuyStop,
    /// Pending sell below the current bid (breakout).
    SellStop,
}

impl OrderKind {
    /// The terminal's numeric order-type code.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Buy => 0,
            Self::Sell => 1,
            Self::BuyLimit => 2,
            Self::SellLimit => 3,
            Self::BuyStop => 4,
            Self::SellStop => 5,
        }
    }

    /// Decode the terminal's numeric order-type code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Buy),
            1 => Some(Self::Sell),
            2 => Some(Self::BuyLimit),
            3 => Some(Self::SellLimit),
            4 => Some(Self::BuyStop),
            5 => Some(Self::SellStop),
            _ => None,
        }
    }

    /// Parse an order-type name, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            "BUY_LIMIT" => Some(Self::BuyLimit),
            "SELL_LIMIT" => Some(Self::SellLimit),
            "BUY_STOP" => Some(Self::BuyStop),
            "SELL_STOP" => Some(Self::SellStop),
            _ => None,
        }
    }

    /// Which side of the market this order trades.
    #[must_use]
    pub const fn side(&self) -> OrderSide {
        match self {
            Self::Buy | Self::BuyLimit | Self::BuyStop => OrderSide::Buy,
            Self::Sell | Self::SellLimit | Self::SellStop => OrderSide::Sell,
        }
    }

    /// True for immediate (market) execution kinds.
    #[must_use]
    pub const fn is_market(&self) -> bool {
        matches!(self, Self::Buy | Self::Sell)
    }

    /// True for resting (pending) kinds.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        !self.is_market()
    }

    /// The market kind that flattens a position on the given side.
    #[must_use]
    pub const fn closing(side: OrderSide) -> Self {
        match side {
            OrderSide::Buy => Self::Sell,
            OrderSide::Sell => Self::Buy,
        }
    }

    /// Canonical name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::BuyLimit => "BUY_LIMIT",
            Self::SellLimit => "SELL_LIMIT",
            Self::BuyStop => "BUY_STOP",
            Self::SellStop => "SELL_STOP",
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
