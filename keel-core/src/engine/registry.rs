//! Order registry
//!
//! In-flight orders keyed by engine order id. An order lives here from
//! the moment the gateway accepts the send until a terminal rejection
//! or until fills plus cancels cover the requested volume. Always
//! accessed under the engine lock.

use std::collections::HashMap;

use crate::core::order::Order;

#[derive(Default)]
pub struct OrderRegistry {
    orders: HashMap<u64, Order>,
}

impl OrderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, order: Order) {
        self.orders.insert(order.req.engine_order_id, order);
    }

    pub fn get(&self, engine_order_id: u64) -> Option<&Order> {
        self.orders.get(&engine_order_id)
    }

    pub fn get_mut(&mut self, engine_order_id: u64) -> Option<&mut Order> {
        self.orders.get_mut(&engine_order_id)
    }

    pub fn remove(&mut self, engine_order_id: u64) -> Option<Order> {
        self.orders.remove(&engine_order_id)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    /// Gateway ids of every registered order. Snapshot for cancel-all.
    pub fn gateway_ids(&self) -> Vec<u64> {
        self.orders.values().map(|order| order.order_id).collect()
    }

    /// Gateway ids of orders on one instrument. Snapshot for
    /// cancel-by-ticker.
    pub fn gateway_ids_for_ticker(&self, ticker_index: u32) -> Vec<u64> {
        self.orders
            .values()
            .filter(|order| order.req.contract.index == ticker_index)
            .map(|order| order.order_id)
            .collect()
    }
}
