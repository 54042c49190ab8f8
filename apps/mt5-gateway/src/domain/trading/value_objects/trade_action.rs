//! Trade request action kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a trade request asks the terminal to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    /// Execute a deal at market.
    Deal,
    /// Place a pending order.
    Pending,
    /// Change an open position's stop loss / take profit.
    Sltp,
    /// Change a pending order's price / stops.
    Modify,
    /// Delete a pending order.
    Remove,
}

impl TradeAction {
    /// The terminal's numeric action code.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Deal => 1,
            Self::Pending => 5,
            Self::Sltp => 6,
            Self::Modify => 7,
            Self::Remove => 8,
        }
    }

    /// Canonical name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Deal => "DEAL",
            Self::Pending => "PENDING",
            Self::Sltp => "SLTP",
            Self::Modify => "MODIFY",
            Self::Remove => "REMOVE",
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
