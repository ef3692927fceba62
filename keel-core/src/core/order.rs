//! Order records
//!
//! `OrderRequest` is what the engine hands the gateway; `Order` is the
//! engine-internal record living in the registry while the order is in
//! flight. An order stays registered exactly while
//! `traded_volume + canceled_volume < req.volume` and no terminal
//! rejection has been observed.

use std::sync::Arc;

use super::contract::Contract;
use super::types::{Direction, Offset, OrderStatus, OrderType, StrategyId};

/// Outbound order request, engine to gateway.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    /// Engine-assigned id; the sole key across commands, gateway
    /// requests, and callbacks
    pub engine_order_id: u64,
    pub contract: Arc<Contract>,
    pub order_type: OrderType,
    pub direction: Direction,
    pub offset: Offset,
    pub volume: i32,
    pub price: f64,
    /// Opaque pass-through flags from the strategy
    pub flags: u32,
}

/// Engine-internal order record.
#[derive(Debug, Clone)]
pub struct Order {
    pub req: OrderRequest,
    /// Strategy-chosen correlation id, echoed back in reports
    pub user_order_id: u32,
    pub strategy_id: StrategyId,
    /// Gateway-assigned id, 0 until the order is accepted
    pub order_id: u64,
    pub status: OrderStatus,
    /// Monotonic false -> true; `order_id` is final once true
    pub accepted: bool,
    pub traded_volume: i32,
    pub canceled_volume: i32,
}

impl Order {
    /// Fresh record for a request about to be risk-checked and sent.
    pub fn new(req: OrderRequest, user_order_id: u32, strategy_id: StrategyId) -> Self {
        Self {
            req,
            user_order_id,
            strategy_id,
            order_id: 0,
            status: OrderStatus::Submitting,
            accepted: false,
            traded_volume: 0,
            canceled_volume: 0,
        }
    }

    /// Volume not yet filled or canceled.
    #[inline]
    pub fn remaining_volume(&self) -> i32 {
        self.req.volume - self.traded_volume - self.canceled_volume
    }

    /// True once fills plus cancels account for the whole request.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.traded_volume + self.canceled_volume == self.req.volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_contract() -> Arc<Contract> {
        Arc::new(Contract {
            index: 3,
            ticker: "cu2512".to_string(),
            name: "CU2512".to_string(),
            exchange: "SIM".to_string(),
            size: 5.0,
            price_tick: 10.0,
            min_volume: 1,
            max_volume: 500,
        })
    }

    fn test_order(volume: i32) -> Order {
        let req = OrderRequest {
            engine_order_id: 1,
            contract: test_contract(),
            order_type: OrderType::Limit,
            direction: Direction::Buy,
            offset: Offset::Open,
            volume,
            price: 71_000.0,
            flags: 0,
        };
        Order::new(req, 42, StrategyId::from_name("test"))
    }

    #[test]
    fn test_new_order_state() {
        let order = test_order(10);
        assert_eq!(order.status, OrderStatus::Submitting);
        assert!(!order.accepted);
        assert_eq!(order.order_id, 0);
        assert_eq!(order.remaining_volume(), 10);
        assert!(!order.is_completed());
    }

    #[test]
    fn test_completion_accounting() {
        let mut order = test_order(10);
        order.traded_volume = 7;
        assert_eq!(order.remaining_volume(), 3);
        assert!(!order.is_completed());

        order.canceled_volume = 3;
        assert_eq!(order.remaining_volume(), 0);
        assert!(order.is_completed());
    }
}
