//! Gateway configuration, loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::application::services::ReconnectSettings;
use crate::domain::trading::FaultCodes;
use crate::infrastructure::terminal::BridgeConfig;

/// Default HTTP port.
const DEFAULT_HTTP_PORT: u16 = 5001;
/// Default bridge port.
const DEFAULT_BRIDGE_PORT: u16 = 18_812;
/// Default per-call bridge timeout, seconds.
const DEFAULT_BRIDGE_TIMEOUT_SECS: f64 = 30.0;
/// Default reconnect attempts.
const DEFAULT_RECONNECT_ATTEMPTS: u32 = 3;
/// Default reconnect base delay, seconds.
const DEFAULT_RECONNECT_BASE_DELAY: f64 = 1.0;

/// Configuration errors.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A variable exists but cannot be parsed or is out of range.
    #[error("invalid value for {var}: {reason}")]
    InvalidValue {
        /// Variable name.
        var: String,
        /// What was wrong.
        reason: String,
    },
}

/// Complete gateway configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// HTTP listen port.
    pub http_port: u16,
    /// Terminal bridge endpoint and login.
    pub bridge: BridgeConfig,
    /// Reconnection policy.
    pub reconnect: ReconnectSettings,
    /// Venue codes classified as connection faults.
    pub fault_codes: FaultCodes,
}

impl Settings {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default; set `MT5_LOGIN` / `MT5_PASSWORD` /
    /// `MT5_SERVER` when the terminal is not already logged in.
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_port = parse_var("MT5_API_PORT", DEFAULT_HTTP_PORT)?;

        let bridge = BridgeConfig {
            host: std::env::var("MT5_BRIDGE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("MT5_BRIDGE_PORT", DEFAULT_BRIDGE_PORT)?,
            login: parse_optional_var("MT5_LOGIN")?,
            password: std::env::var("MT5_PASSWORD").ok(),
            server: std::env::var("MT5_SERVER").ok(),
            timeout: positive_secs(
                "MT5_BRIDGE_TIMEOUT",
                parse_var("MT5_BRIDGE_TIMEOUT", DEFAULT_BRIDGE_TIMEOUT_SECS)?,
            )?,
        };

        let reconnect = reconnect_settings(
            parse_var("MT5_RECONNECT_ATTEMPTS", DEFAULT_RECONNECT_ATTEMPTS)?,
            parse_var("MT5_RECONNECT_BASE_DELAY", DEFAULT_RECONNECT_BASE_DELAY)?,
        )?;

        let fault_codes = FaultCodes {
            terminal_errors: parse_code_list(
                "MT5_CONNECTION_ERROR_CODES",
                std::env::var("MT5_CONNECTION_ERROR_CODES").ok(),
                FaultCodes::default().terminal_errors,
            )?,
            trade_retcodes: parse_code_list(
                "MT5_CONNECTION_FAULT_RETCODES",
                std::env::var("MT5_CONNECTION_FAULT_RETCODES").ok(),
                FaultCodes::default().trade_retcodes,
            )?,
        };

        Ok(Self {
            http_port,
            bridge,
            reconnect,
            fault_codes,
        })
    }
}

/// Validate reconnect policy values.
fn reconnect_settings(max_attempts: u32, base_delay: f64) -> Result<ReconnectSettings, ConfigError> {
    if max_attempts < 1 {
        return Err(ConfigError::InvalidValue {
            var: "MT5_RECONNECT_ATTEMPTS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(ReconnectSettings {
        max_attempts,
        base_delay: positive_secs("MT5_RECONNECT_BASE_DELAY", base_delay)?,
    })
}

fn positive_secs(var: &str, secs: f64) -> Result<Duration, ConfigError> {
    if secs > 0.0 && secs.is_finite() {
        Ok(Duration::from_secs_f64(secs))
    } else {
        Err(ConfigError::InvalidValue {
            var: var.to_string(),
            reason: "must be positive".to_string(),
        })
    }
}

fn parse_var<T: FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: var.to_string(),
            reason: format!("cannot parse {raw:?}"),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_optional_var<T: FromStr>(var: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                var: var.to_string(),
                reason: format!("cannot parse {raw:?}"),
            }),
        Err(_) => Ok(None),
    }
}

/// Parse a comma-separated code list, falling back to the default when the
/// variable is unset.
fn parse_code_list<T: FromStr>(
    var: &str,
    raw: Option<String>,
    default: Vec<T>,
) -> Result<Vec<T>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| ConfigError::InvalidValue {
                var: var.to_string(),
                reason: format!("cannot parse code {s:?}"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_list_defaults_when_unset() {
        let codes =
            parse_code_list("X", None, FaultCodes::default().terminal_errors).unwrap();
        assert_eq!(codes, vec![10004, 10005, 10006]);
    }

    #[test]
    fn code_list_parses_and_trims() {
        let codes: Vec<u32> =
            parse_code_list("X", Some("10018, 10019 ,10031".to_string()), vec![]).unwrap();
        assert_eq!(codes, vec![10018, 10019, 10031]);
    }

    #[test]
    fn code_list_rejects_garbage() {
        let result: Result<Vec<i32>, _> =
            parse_code_list("X", Some("10018,abc".to_string()), vec![]);
        assert!(result.is_err());
    }

    #[test]
    fn reconnect_requires_at_least_one_attempt() {
        assert!(reconnect_settings(0, 1.0).is_err());
        let settings = reconnect_settings(3, 1.0).unwrap();
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn base_delay_must_be_positive() {
        assert!(reconnect_settings(3, 0.0).is_err());
        assert!(reconnect_settings(3, -1.0).is_err());
    }
}
