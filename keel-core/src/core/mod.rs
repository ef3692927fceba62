//! Core domain types: contracts, orders, errors, and the wire protocol.

pub mod contract;
pub mod errors;
pub mod order;
pub mod protocol;
pub mod types;

pub use contract::{Contract, ContractDirectory};
pub use errors::{EngineError, RiskRejection};
pub use order::{Order, OrderRequest};
pub use protocol::{
    CmdCancelReq, CmdCancelTickerReq, CmdOrderReq, CmdType, TraderCommand, CMD_BODY_LEN,
    PROTOCOL_VERSION, TRADER_CMD_MAGIC,
};
pub use types::{Direction, Offset, OrderStatus, OrderType, StrategyId, TradeType};
