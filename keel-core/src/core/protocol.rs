//! Strategy -> engine wire protocol
//!
//! Binary command format, little-endian, `#[repr(C, packed)]` with
//! zerocopy so the shared-memory transport copies structs verbatim —
//! no serialization step on either side.
//!
//! ```text
//! TraderCommand (80 bytes)
//!   magic:u32 | type:u32 | strategy_id:[u8;16] | body:[u8;56]
//!
//! body(NEW_ORDER)     = CmdOrderReq        (37 bytes, zero-padded)
//! body(CANCEL_ORDER)  = CmdCancelReq       (8 bytes)
//! body(CANCEL_TICKER) = CmdCancelTickerReq (4 bytes)
//! body(CANCEL_ALL)    = unused
//! ```
//!
//! Any command whose magic is not `TRADER_CMD_MAGIC` is dropped with a
//! warning and produces no side effects.

use zerocopy::{AsBytes, FromBytes, Unaligned};

use super::types::StrategyId;

/// Magic carried on every command.
pub const TRADER_CMD_MAGIC: u32 = 0x0170_9394;

/// Engine protocol version; doubles as the user tag on the command ring
/// so two engines with incompatible layouts can never share a segment.
pub const PROTOCOL_VERSION: u32 = 4;

/// Fixed size of the command body union.
pub const CMD_BODY_LEN: usize = 56;

/// Command discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CmdType {
    NewOrder = 1,
    CancelOrder = 2,
    CancelTicker = 3,
    CancelAll = 4,
}

impl TryFrom<u32> for CmdType {
    type Error = u32;

    fn try_from(raw: u32) -> Result<Self, u32> {
        match raw {
            1 => Ok(CmdType::NewOrder),
            2 => Ok(CmdType::CancelOrder),
            3 => Ok(CmdType::CancelTicker),
            4 => Ok(CmdType::CancelAll),
            other => Err(other),
        }
    }
}

/// NEW_ORDER body.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, AsBytes, Unaligned)]
pub struct CmdOrderReq {
    /// Strategy-side correlation id, echoed back in reports
    pub user_order_id: u32,
    pub ticker_index: u32,
    pub direction: u32,
    pub offset: u32,
    pub order_type: u32,
    pub volume: i32,
    pub price: f64,
    pub flags: u32,
    /// 1 skips the risk gate (emergency path)
    pub without_check: u8,
}

/// CANCEL_ORDER body. `order_id` is the gateway id reported by the
/// accepted event, not the engine order id.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, AsBytes, Unaligned)]
pub struct CmdCancelReq {
    pub order_id: u64,
}

/// CANCEL_TICKER body.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, AsBytes, Unaligned)]
pub struct CmdCancelTickerReq {
    pub ticker_index: u32,
}

/// One strategy command, exactly as it travels over IPC.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, AsBytes, Unaligned)]
pub struct TraderCommand {
    pub magic: u32,
    pub cmd_type: u32,
    pub strategy_id: [u8; 16],
    body: [u8; CMD_BODY_LEN],
}

impl TraderCommand {
    /// Wire size of one command; also the ring element size.
    pub const WIRE_LEN: usize = std::mem::size_of::<TraderCommand>();

    fn with_body(cmd_type: CmdType, strategy_id: StrategyId, payload: &[u8]) -> Self {
        let mut body = [0u8; CMD_BODY_LEN];
        body[..payload.len()].copy_from_slice(payload);
        Self {
            magic: TRADER_CMD_MAGIC,
            cmd_type: cmd_type as u32,
            strategy_id: strategy_id.0,
            body,
        }
    }

    pub fn new_order(strategy_id: StrategyId, req: CmdOrderReq) -> Self {
        Self::with_body(CmdType::NewOrder, strategy_id, req.as_bytes())
    }

    pub fn cancel_order(strategy_id: StrategyId, order_id: u64) -> Self {
        let req = CmdCancelReq { order_id };
        Self::with_body(CmdType::CancelOrder, strategy_id, req.as_bytes())
    }

    pub fn cancel_ticker(strategy_id: StrategyId, ticker_index: u32) -> Self {
        let req = CmdCancelTickerReq { ticker_index };
        Self::with_body(CmdType::CancelTicker, strategy_id, req.as_bytes())
    }

    pub fn cancel_all(strategy_id: StrategyId) -> Self {
        Self::with_body(CmdType::CancelAll, strategy_id, &[])
    }

    /// Decode one command from a raw frame. `None` if the frame is
    /// shorter than `WIRE_LEN`; extra trailing bytes are ignored.
    pub fn read(frame: &[u8]) -> Option<Self> {
        TraderCommand::read_from_prefix(frame)
    }

    /// The body as a NEW_ORDER request. The body union is wider than
    /// every payload, so decoding cannot fail on a well-formed command.
    pub fn order_req(&self) -> CmdOrderReq {
        CmdOrderReq::read_from_prefix(&self.body[..]).unwrap_or_else(CmdOrderReq::new_zeroed)
    }

    pub fn cancel_req(&self) -> CmdCancelReq {
        CmdCancelReq::read_from_prefix(&self.body[..]).unwrap_or_else(CmdCancelReq::new_zeroed)
    }

    pub fn cancel_ticker_req(&self) -> CmdCancelTickerReq {
        CmdCancelTickerReq::read_from_prefix(&self.body[..])
            .unwrap_or_else(CmdCancelTickerReq::new_zeroed)
    }

    pub fn strategy(&self) -> StrategyId {
        StrategyId(self.strategy_id)
    }
}
