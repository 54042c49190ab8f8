//! Order lifetime policies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How long an order stays working.
///
/// Every request this gateway builds uses GTC; Day exists because the
/// terminal reports it on orders placed by other clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimePolicy {
    /// Good till cancelled.
    #[default]
    Gtc,
    /// Good for the current trading day.
    Day,
}

impl TimePolicy {
    /// The terminal's numeric time-policy code.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Gtc => 0,
            Self::Day => 1,
        }
    }
}

impl fmt::Display for TimePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gtc => write!(f, "GTC"),
            Self::Day => write!(f, "DAY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gtc_is_default() {
        assert_eq!(TimePolicy::default(), TimePolicy::Gtc);
        assert_eq!(TimePolicy::Gtc.code(), 0);
    }
}
