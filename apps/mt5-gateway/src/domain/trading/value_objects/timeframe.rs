//! Chart timeframes for historical bar queries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bar timeframes supported for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    /// 1 minute.
    M1,
    /// 5 minutes.
    M5,
    /// 15 minutes.
    M15,
    /// 30 minutes.
    M30,
    /// 1 hour.
    H1,
    /// 4 hours.
    H4,
    /// 1 day.
    D1,
    /// 1 week.
    W1,
    /// 1 month.
    MN1,
}

/// All timeframe names, for error messages.
pub const TIMEFRAME_NAMES: &[&str] = &["M1", "M5", "M15", "M30", "H1", "H4", "D1", "W1", "MN1"];

impl Timeframe {
    /// The terminal's numeric timeframe code.
    ///
    /// Minute frames are the minute count; hour and larger frames carry the
    /// terminal's unit flag in the high bits.
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::M1 => 1,
            Self::M5 => 5,
            Self::M15 => 15,
            Self::M30 => 30,
            Self::H1 => 0x4001,
            Self::H4 => 0x4004,
            Self::D1 => 0x4018,
            Self::W1 => 0x8001,
            Self::MN1 => 0xC001,
        }
    }

    /// Parse a timeframe name, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "M1" => Some(Self::M1),
            "M5" => Some(Self::M5),
            "M15" => Some(Self::M15),
            "M30" => Some(Self::M30),
            "H1" => Some(Self::H1),
            "H4" => Some(Self::H4),
            "D1" => Some(Self::D1),
            "W1" => Some(Self::W1),
            "MN1" => Some(Self::MN1),
            _ => None,
        }
    }

    /// Canonical name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "M1",
            Self::M5 => "M5",
            Self::M15 => "M15",
            Self::M30 => "M30",
            Self::H1 => "H1",
            Self::H4 => "H4",
            Self::D1 => "D1",
            Self::W1 => "W1",
            Self::MN1 => "MN1",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
