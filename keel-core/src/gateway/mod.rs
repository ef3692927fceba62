//! Gateway contract
//!
//! The broker driver lives behind `Gateway`; the engine lives behind
//! `GatewayEvents`. Every callback identifies the affected order by the
//! `engine_order_id` the engine put on the request — the gateway's own
//! order id only matters for cancels.
//!
//! Threading contract: `query_*` calls MAY deliver their callbacks
//! synchronously on the calling thread (the engine holds no lock during
//! bootstrap queries). Order-lifecycle callbacks MUST arrive on
//! gateway-owned threads, because the engine keeps its lock across
//! `send_order`.

pub mod sim;

pub use sim::SimGateway;

use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;
use crate::core::contract::Contract;
use crate::core::order::OrderRequest;
use crate::core::types::{Direction, Offset, TradeType};
use crate::data::tick::TickData;
use crate::portfolio::{Account, Position};

/// API name of the built-in simulated gateway.
pub const SIM_API: &str = "sim";

/// Order accepted by the market.
#[derive(Debug, Clone)]
pub struct OrderAcceptedRsp {
    pub engine_order_id: u64,
    /// Broker-assigned id used for subsequent cancels
    pub order_id: u64,
}

/// Order rejected before reaching the book.
#[derive(Debug, Clone)]
pub struct OrderRejectedRsp {
    pub engine_order_id: u64,
    pub reason: String,
}

/// One fill. Also the payload of the bootstrap trade replay, which is
/// why it carries the instrument and direction alongside the ids.
#[derive(Debug, Clone)]
pub struct OrderTradedRsp {
    pub engine_order_id: u64,
    pub order_id: u64,
    pub ticker_index: u32,
    pub direction: Direction,
    pub offset: Offset,
    pub trade_type: TradeType,
    pub volume: i32,
    pub price: f64,
}

/// Cancel confirmed; `canceled_volume` is the total volume the market
/// released for this order.
#[derive(Debug, Clone)]
pub struct OrderCanceledRsp {
    pub engine_order_id: u64,
    pub canceled_volume: i32,
}

/// Cancel refused; the order stays live.
#[derive(Debug, Clone)]
pub struct OrderCancelRejectedRsp {
    pub engine_order_id: u64,
    pub reason: String,
}

/// Callbacks the engine exposes to the gateway.
pub trait GatewayEvents: Send + Sync {
    fn on_order_accepted(&self, rsp: OrderAcceptedRsp);
    fn on_order_rejected(&self, rsp: OrderRejectedRsp);
    fn on_order_traded(&self, rsp: OrderTradedRsp);
    fn on_order_canceled(&self, rsp: OrderCanceledRsp);
    fn on_order_cancel_rejected(&self, rsp: OrderCancelRejectedRsp);
    fn on_query_contract(&self, contract: Contract);
    fn on_query_account(&self, account: Account);
    fn on_query_position(&self, position: Position);
    fn on_query_trade(&self, trade: OrderTradedRsp);
    fn on_tick(&self, tick: TickData);
}

/// Wire driver to the broker.
pub trait Gateway: Send + Sync {
    /// Establish the session and remember where callbacks go.
    fn login(&self, events: Arc<dyn GatewayEvents>, config: &Config) -> Result<()>;

    fn logout(&self);

    /// Hand one order to the broker. An `Err` here means the order was
    /// refused synchronously and no callbacks will follow for it.
    fn send_order(&self, req: &OrderRequest) -> Result<()>;

    /// Request a cancel by the broker-assigned order id.
    fn cancel_order(&self, order_id: u64) -> Result<()>;

    fn query_contracts(&self) -> Result<()>;
    fn query_account(&self) -> Result<()>;
    fn query_positions(&self) -> Result<()>;
    fn query_trades(&self) -> Result<()>;
}

/// Resolve a gateway implementation by API name.
pub fn create_gateway(api: &str) -> Option<Arc<dyn Gateway>> {
    match api {
        SIM_API => Some(Arc::new(SimGateway::new())),
        _ => None,
    }
}
