//! Engine error kinds
//!
//! Per-command failures are logged and contained; bootstrap failures
//! abort login. `RiskRejection` carries the sub-code a risk rule
//! produced so rejection logs name the exact limit that fired.

use std::fmt;

/// Top-level engine error.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// No gateway registered under the requested API name
    UnknownGateway(String),
    /// Gateway login handshake failed
    LoginFailed(String),
    /// A bootstrap query (account/positions/trades/contracts) failed
    QueryFailed(&'static str),
    /// No contract at the requested ticker index
    UnknownContract(u32),
    /// The pre-trade risk check refused the order
    RiskRejected(RiskRejection),
    /// The gateway refused the order synchronously on send
    SendFailed,
    /// The gateway rejected the order asynchronously
    Rejected(String),
    /// Command with a bad magic number
    MagicMismatch(u32),
    /// Command with an unknown type or undecodable body
    UnknownCmd(u32),
    /// Callback referred to an engine order id not in the registry
    OrderNotFound(u64),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::UnknownGateway(api) => write!(f, "unknown gateway api '{}'", api),
            EngineError::LoginFailed(reason) => write!(f, "gateway login failed: {}", reason),
            EngineError::QueryFailed(what) => write!(f, "bootstrap query failed: {}", what),
            EngineError::UnknownContract(index) => {
                write!(f, "no contract at ticker index {}", index)
            }
            EngineError::RiskRejected(rejection) => write!(f, "risk rejected: {}", rejection),
            EngineError::SendFailed => write!(f, "gateway refused order on send"),
            EngineError::Rejected(reason) => write!(f, "order rejected by gateway: {}", reason),
            EngineError::MagicMismatch(magic) => {
                write!(f, "command magic mismatch: {:#010x}", magic)
            }
            EngineError::UnknownCmd(raw) => write!(f, "unknown command type {}", raw),
            EngineError::OrderNotFound(id) => write!(f, "order not found: engine id {}", id),
        }
    }
}

impl std::error::Error for EngineError {}

/// Sub-code for a pre-trade risk rejection.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskRejection {
    /// Estimated cost exceeds available funds
    FundNotEnough { required: f64, available: f64 },
    /// Close volume exceeds the closable holdings of the position half
    PositionNotEnough { volume: i32, closable: i32 },
    /// Volume outside the contract's lot bounds
    VolumeOutOfRange { volume: i32, min: i32, max: i32 },
    /// Volume is zero or negative
    InvalidVolume { volume: i32 },
    /// Price is zero or negative on a priced order
    InvalidPrice { price: f64 },
    /// Price is not a multiple of the contract's tick
    PriceOffTick { price: f64, tick: f64 },
    /// Submission rate above the configured per-second limit
    Throttled { limit: u32 },
}

impl fmt::Display for RiskRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskRejection::FundNotEnough {
                required,
                available,
            } => {
                write!(f, "fund not enough: need {:.2}, have {:.2}", required, available)
            }
            RiskRejection::PositionNotEnough { volume, closable } => {
                write!(f, "position not enough: close {}, closable {}", volume, closable)
            }
            RiskRejection::VolumeOutOfRange { volume, min, max } => {
                write!(f, "volume {} outside lot bounds [{}, {}]", volume, min, max)
            }
            RiskRejection::InvalidVolume { volume } => write!(f, "invalid volume {}", volume),
            RiskRejection::InvalidPrice { price } => write!(f, "invalid price {}", price),
            RiskRejection::PriceOffTick { price, tick } => {
                write!(f, "price {} not on tick {}", price, tick)
            }
            RiskRejection::Throttled { limit } => {
                write!(f, "throttled: over {} orders/sec", limit)
            }
        }
    }
}

impl From<RiskRejection> for EngineError {
    fn from(rejection: RiskRejection) -> Self {
        EngineError::RiskRejected(rejection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_limit() {
        let err = EngineError::RiskRejected(RiskRejection::FundNotEnough {
            required: 1500.0,
            available: 200.0,
        });
        let msg = format!("{}", err);
        assert!(msg.contains("fund not enough"));
        assert!(msg.contains("1500"));
    }

    #[test]
    fn test_magic_mismatch_is_hex() {
        let msg = format!("{}", EngineError::MagicMismatch(0xdead));
        assert!(msg.contains("0x0000dead"));
    }

    #[test]
    fn test_rejection_into_engine_error() {
        let err: EngineError = RiskRejection::InvalidVolume { volume: -3 }.into();
        assert!(matches!(err, EngineError::RiskRejected(_)));
    }
}
