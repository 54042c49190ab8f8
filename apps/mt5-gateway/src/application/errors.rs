//! Operation error taxonomy.
//!
//! Every operation resolves to exactly one of these. Validation failures are
//! produced before any venue call; venue refusals and session faults are
//! told apart by the configured fault-code sets; anything unexpected becomes
//! an internal error with a sanitized outward message.

use serde_json::Value;
use thiserror::Error;

use crate::domain::trading::{FaultCodes, ResultClass, classify};

use super::ports::{TerminalError, TradeResult};

/// Venue diagnostic echoed alongside rejected / faulted operations.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct VenueErrorInfo {
    /// Trade return code, when a trade result exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retcode: Option<u32>,
    /// Venue comment, when a trade result exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Terminal last-error code.
    pub error_code: i32,
    /// Terminal last-error message.
    pub error_string: String,
}

/// The single failure taxonomy for all gateway operations.
#[derive(Debug, Clone, Error)]
pub enum OperationError {
    /// Caller input is malformed or fails a business rule (HTTP 400).
    #[error("{message}")]
    Validation {
        /// Human-readable reason.
        message: String,
        /// Optional structured detail.
        details: Option<Value>,
    },

    /// A referenced symbol or ticket does not exist (HTTP 404).
    #[error("{resource} not found{}", identifier.as_ref().map(|i| format!(": {i}")).unwrap_or_default())]
    NotFound {
        /// Resource type, e.g. "symbol" or "position".
        resource: String,
        /// Identifier of the missing resource.
        identifier: Option<String>,
    },

    /// The venue session is unusable (HTTP 503, retryable by the caller).
    #[error("{message}")]
    Connection {
        /// Human-readable reason.
        message: String,
        /// Connection manager diagnostic, if one exists.
        detail: Option<String>,
        /// Venue diagnostic, when the fault surfaced through a trade result.
        venue: Option<VenueErrorInfo>,
    },

    /// The venue accepted the session but refused the instruction (HTTP 400).
    #[error("{operation} failed: {comment}")]
    Rejected {
        /// What was being attempted.
        operation: String,
        /// Trade return code.
        retcode: u32,
        /// Venue comment.
        comment: String,
        /// Terminal last-error code.
        error_code: i32,
        /// Terminal last-error message.
        error_string: String,
    },

    /// Unexpected fault (HTTP 500); logged with context, sanitized outward.
    #[error("internal error during {operation}")]
    Internal {
        /// What was being attempted.
        operation: String,
        /// Diagnostic detail.
        detail: String,
    },
}

impl OperationError {
    /// A plain validation failure.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    /// A validation failure with structured detail.
    #[must_use]
    pub fn validation_with(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    /// A missing resource.
    #[must_use]
    pub fn not_found(resource: impl Into<String>, identifier: impl ToString) -> Self {
        Self::NotFound {
            resource: resource.into(),
            identifier: Some(identifier.to_string()),
        }
    }

    /// An unusable session, with the connection manager's diagnostic.
    #[must_use]
    pub fn unavailable(detail: Option<String>) -> Self {
        Self::Connection {
            message: "MT5 unavailable".to_string(),
            detail,
            venue: None,
        }
    }

    /// An internal fault.
    #[must_use]
    pub fn internal(operation: impl Into<String>, detail: impl ToString) -> Self {
        Self::Internal {
            operation: operation.into(),
            detail: detail.to_string(),
        }
    }

    /// Map a terminal boundary failure hit mid-operation.
    ///
    /// A broken transport means the session is unusable and the caller may
    /// retry; an undecodable reply is an unexpected fault and must not be
    /// presented as retryable.
    #[must_use]
    pub fn from_terminal(err: &TerminalError) -> Self {
        match err {
            TerminalError::Protocol(detail) => Self::Internal {
                operation: "terminal call".to_string(),
                detail: detail.clone(),
            },
            other => Self::Connection {
                message: "MT5 unavailable".to_string(),
                detail: Some(other.to_string()),
                venue: None,
            },
        }
    }
}

impl From<TerminalError> for OperationError {
    fn from(err: TerminalError) -> Self {
        Self::from_terminal(&err)
    }
}

impl From<crate::domain::trading::OrderRuleError> for OperationError {
    fn from(err: crate::domain::trading::OrderRuleError) -> Self {
        Self::validation(err.to_string())
    }
}

/// Classify a non-success trade result into the matching error.
///
/// The one place retcodes and terminal error codes are interpreted: the
/// configured fault sets decide between a retryable connection fault and a
/// hard rejection.
#[must_use]
pub fn classify_failure(
    operation: &str,
    result: &TradeResult,
    last_error: (i32, String),
    faults: &FaultCodes,
) -> OperationError {
    let (error_code, error_string) = last_error;

    match classify(result.retcode, error_code, faults) {
        ResultClass::ConnectionFault => OperationError::Connection {
            message: format!("{operation} failed: {}", result.comment),
            detail: None,
            venue: Some(VenueErrorInfo {
                retcode: Some(result.retcode),
                comment: Some(result.comment.clone()),
                error_code,
                error_string,
            }),
        },
        // Success never reaches this function; treat it as a rejection echo.
        ResultClass::Rejected | ResultClass::Success => OperationError::Rejected {
            operation: operation.to_string(),
            retcode: result.retcode,
            comment: result.comment.clone(),
            error_code,
            error_string,
        },
    }
}
