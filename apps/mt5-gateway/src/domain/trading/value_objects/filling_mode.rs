//! Order filling policies and per-symbol capability selection.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a partially fillable order is completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FillingMode {
    /// Fill completely or cancel (all-or-nothing).
    Fok,
    /// Fill what is available immediately, cancel the rest.
    Ioc,
    /// Fill what is available, leave the remainder resting.
    Return,
}

/// Capability bit for fill-or-kill support.
pub const FILLING_CAP_FOK: u32 = 1;
/// Capability bit for immediate-or-cancel support.
pub const FILLING_CAP_IOC: u32 = 2;
/// Capability bit for return-remainder support.
pub const FILLING_CAP_RETURN: u32 = 4;

impl FillingMode {
    /// The terminal's numeric filling-mode code.
    ///
    /// FOK's code is 0, which the terminal also uses as the "no value
    /// provided" sentinel in trade requests.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Fok => 0,
            Self::Ioc => 1,
            Self::Return => 2,
        }
    }

    /// Parse a filling-mode name, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "FOK" => Some(Self::Fok),
            "IOC" => Some(Self::Ioc),
            "RETURN" => Some(Self::Return),
            _ => None,
        }
    }

    /// Pick the best filling mode a symbol supports.
    ///
    /// IOC is preferred, then Return. FOK is checked last because its code
    /// collides with the request sentinel and some servers reject it; Return
    /// is the fallback when the bitmask advertises nothing usable.
    #[must_use]
    pub const fn select(capability: u32) -> Self {
        if capability & FILLING_CAP_IOC != 0 {
            Self::Ioc
        } else if capability & FILLING_CAP_RETURN != 0 {
            Self::Return
        } else if capability & FILLING_CAP_FOK != 0 {
            Self::Fok
        } else {
            Self::Return
        }
    }
}

impl fmt::Display for FillingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fok => write!(f, "FOK"),
            Self::Ioc => write!(f, "IOC"),
            Self::Return => write!(f, "RETURN"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ioc_wins_whenever_advertised() {
        assert_eq!(FillingMode::select(FILLING_CAP_IOC), FillingMode::Ioc);
        assert_eq!(
            FillingMode::select(FILLING_CAP_IOC | FILLING_CAP_FOK),
            FillingMode::Ioc
        );
        assert_eq!(
            FillingMode::select(FILLING_CAP_IOC | FILLING_CAP_RETURN | FILLING_CAP_FOK),
            FillingMode::Ioc
        );
    }

    #[test]
    fn return_beats_fok() {
        assert_eq!(
            FillingMode::select(FILLING_CAP_RETURN | FILLING_CAP_FOK),
            FillingMode::Return
        );
    }

    #[test]
    fn fok_only_when_nothing_else() {
        assert_eq!(FillingMode::select(FILLING_CAP_FOK), FillingMode::Fok);
    }

    #[test]
    fn empty_capability_defaults_to_return() {
        assert_eq!(FillingMode::select(0), FillingMode::Return);
    }

    #[test]
    fn filling_codes() {
        assert_eq!(FillingMode::Fok.code(), 0);
        assert_eq!(FillingMode::Ioc.code(), 1);
        assert_eq!(FillingMode::Return.code(), 2);
    }

    #[test]
    fn filling_parse() {
        assert_eq!(FillingMode::parse("ioc"), Some(FillingMode::Ioc));
        assert_eq!(FillingMode::parse("Return"), Some(FillingMode::Return));
        assert_eq!(FillingMode::parse("GTC"), None);
    }
}
