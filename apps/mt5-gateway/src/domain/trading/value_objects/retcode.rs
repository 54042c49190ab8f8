//! Venue return-code classification.
//!
//! The terminal answers every trade request with a numeric return code and
//! keeps a separate last-error diagnostic. A small set of each signals a
//! broken session rather than a refused instruction; that set belongs to the
//! venue and may grow, so it is carried as configuration rather than matched
//! inline at call sites.

/// Return code for a fully successful trade operation.
pub const TRADE_RETCODE_DONE: u32 = 10009;

/// Terminal last-error codes that indicate session faults by default.
pub const DEFAULT_CONNECTION_ERROR_CODES: [i32; 3] = [10004, 10005, 10006];

/// Trade return codes that indicate session faults (requote/timeout class)
/// by default.
pub const DEFAULT_CONNECTION_FAULT_RETCODES: [u32; 3] = [10018, 10019, 10020];

/// Configured sets of venue codes treated as connection faults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultCodes {
    /// Terminal last-error codes classified as connection faults.
    pub terminal_errors: Vec<i32>,
    /// Trade return codes classified as connection faults.
    pub trade_retcodes: Vec<u32>,
}

impl Default for FaultCodes {
    fn default() -> Self {
        Self {
            terminal_errors: DEFAULT_CONNECTION_ERROR_CODES.to_vec(),
            trade_retcodes: DEFAULT_CONNECTION_FAULT_RETCODES.to_vec(),
        }
    }
}

/// Classification of a trade result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultClass {
    /// The venue accepted and executed the instruction.
    Success,
    /// The venue refused the instruction; resubmitting unchanged will not help.
    Rejected,
    /// The session is unusable; the caller may retry once it recovers.
    ConnectionFault,
}

/// Classify a trade return code together with the terminal's last error.
#[must_use]
pub fn classify(retcode: u32, last_error_code: i32, faults: &FaultCodes) -> ResultClass {
    if retcode == TRADE_RETCODE_DONE {
        return ResultClass::Success;
    }
    if faults.terminal_errors.contains(&last_error_code)
        || faults.trade_retcodes.contains(&retcode)
    {
        return ResultClass::ConnectionFault;
    }
    ResultClass::Rejected
}
