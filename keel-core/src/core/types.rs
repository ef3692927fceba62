//! Domain types shared across the engine
//!
//! All enums carry wire-stable discriminants: the values strategies put
//! into `TraderCommand` bodies are the same values the gateway sees in
//! an `OrderRequest`. Conversions from raw wire integers go through
//! `TryFrom<u32>` so malformed commands are rejected instead of
//! transmuted.

use std::fmt;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Direction {
    Buy = 1,
    Sell = 2,
}

impl Direction {
    /// The opposite side, used when mapping close orders onto the
    /// position half they reduce.
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }
}

impl TryFrom<u32> for Direction {
    type Error = u32;

    fn try_from(raw: u32) -> Result<Self, u32> {
        match raw {
            1 => Ok(Direction::Buy),
            2 => Ok(Direction::Sell),
            other => Err(other),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

/// Open/close classification of an order relative to a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Offset {
    Open = 1,
    Close = 2,
    CloseToday = 4,
    CloseYesterday = 8,
}

impl Offset {
    /// Whether this offset reduces an existing position.
    #[inline]
    pub fn is_close(self) -> bool {
        !matches!(self, Offset::Open)
    }
}

impl TryFrom<u32> for Offset {
    type Error = u32;

    fn try_from(raw: u32) -> Result<Self, u32> {
        match raw {
            1 => Ok(Offset::Open),
            2 => Ok(Offset::Close),
            4 => Ok(Offset::CloseToday),
            8 => Ok(Offset::CloseYesterday),
            other => Err(other),
        }
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Offset::Open => write!(f, "OPEN"),
            Offset::Close => write!(f, "CLOSE"),
            Offset::CloseToday => write!(f, "CLOSE_TODAY"),
            Offset::CloseYesterday => write!(f, "CLOSE_YESTERDAY"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum OrderType {
    /// Resting limit order at a fixed price
    Limit = 1,
    /// Execute at best available price
    Market = 2,
    /// Fill-and-kill: fill what crosses, cancel the rest
    Fak = 3,
    /// Fill-or-kill: fill completely or cancel
    Fok = 4,
}

impl TryFrom<u32> for OrderType {
    type Error = u32;

    fn try_from(raw: u32) -> Result<Self, u32> {
        match raw {
            1 => Ok(OrderType::Limit),
            2 => Ok(OrderType::Market),
            3 => Ok(OrderType::Fak),
            4 => Ok(OrderType::Fok),
            other => Err(other),
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Limit => write!(f, "LIMIT"),
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Fak => write!(f, "FAK"),
            OrderType::Fok => write!(f, "FOK"),
        }
    }
}

/// Origin of a fill reported by the gateway.
///
/// `SecondaryMarket` is ordinary exchange trading; the remaining
/// variants originate from issuance/subscription events and are
/// dispatched on the primary-market path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TradeType {
    SecondaryMarket = 0,
    PrimaryMarket = 1,
    CashSubstitution = 2,
    AcquiredStock = 3,
    ReleasedStock = 4,
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeType::SecondaryMarket => write!(f, "SECONDARY_MARKET"),
            TradeType::PrimaryMarket => write!(f, "PRIMARY_MARKET"),
            TradeType::CashSubstitution => write!(f, "CASH_SUBSTITUTION"),
            TradeType::AcquiredStock => write!(f, "ACQUIRED_STOCK"),
            TradeType::ReleasedStock => write!(f, "RELEASED_STOCK"),
        }
    }
}

/// Order status as tracked by the engine.
///
/// Single byte enum for minimal size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OrderStatus {
    /// Sent to the gateway, not yet acknowledged by the market
    Submitting = 0,
    /// Accepted by the market
    Submitted = 1,
    /// Partially filled
    PartTraded = 2,
    /// Fully filled
    AllTraded = 3,
    /// Canceled (possibly after partial fills)
    Canceled = 4,
    /// Rejected before reaching the book
    Rejected = 5,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Submitting => write!(f, "SUBMITTING"),
            OrderStatus::Submitted => write!(f, "SUBMITTED"),
            OrderStatus::PartTraded => write!(f, "PART_TRADED"),
            OrderStatus::AllTraded => write!(f, "ALL_TRADED"),
            OrderStatus::Canceled => write!(f, "CANCELED"),
            OrderStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Fixed 16-byte strategy tag carried on every command.
///
/// A value tag copied verbatim across the wire, never interpreted by
/// the engine beyond logging. Shorter names are NUL-padded.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StrategyId(pub [u8; 16]);

impl StrategyId {
    pub const LEN: usize = 16;

    /// Build a tag from a string, truncating to 16 bytes.
    pub fn from_name(name: &str) -> Self {
        let mut tag = [0u8; 16];
        let bytes = name.as_bytes();
        let n = bytes.len().min(16);
        tag[..n].copy_from_slice(&bytes[..n]);
        Self(tag)
    }

    /// The tag as a string, stopping at the first NUL.
    pub fn as_str(&self) -> &str {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(16);
        std::str::from_utf8(&self.0[..end]).unwrap_or("<non-utf8>")
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Debug for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StrategyId({})", self.as_str())
    }
}

impl From<[u8; 16]> for StrategyId {
    fn from(tag: [u8; 16]) -> Self {
        Self(tag)
    }
}
