//! Risk gate
//!
//! `RiskManager` fronts every outbound order and observes every
//! lifecycle callback. It fans each event across an ordered list of
//! rules; the pre-trade check fails on the first rule that rejects.
//! Rules mutate the account and portfolio through `RiskContext`, so all
//! portfolio accounting driven by fills, cancels, and rejects lives
//! here — the engine itself only moves order records.
//!
//! Everything runs under the engine lock; rules need no locking of
//! their own.

pub mod rules;

pub use rules::{FundRule, PositionRule, SanityRule, ThrottleRule};

use tracing::warn;

use crate::config::RiskConfig;
use crate::core::errors::{EngineError, RiskRejection};
use crate::core::order::Order;
use crate::data::snapshot::MdSnapshot;
use crate::gateway::OrderTradedRsp;
use crate::portfolio::{Account, Portfolio};

/// Mutable view the rules operate on.
pub struct RiskContext<'a> {
    pub account: &'a mut Account,
    pub portfolio: &'a mut Portfolio,
    pub snapshot: &'a MdSnapshot,
}

/// One risk policy. Default hook bodies are no-ops so a rule only
/// implements the events it cares about.
pub trait RiskRule: Send {
    fn name(&self) -> &'static str;

    fn check_order_req(
        &mut self,
        _order: &Order,
        _ctx: &mut RiskContext<'_>,
    ) -> Result<(), RiskRejection> {
        Ok(())
    }

    fn on_order_sent(&mut self, _order: &Order, _ctx: &mut RiskContext<'_>) {}

    fn on_order_accepted(&mut self, _order: &Order, _ctx: &mut RiskContext<'_>) {}

    fn on_order_traded(
        &mut self,
        _order: &Order,
        _trade: &OrderTradedRsp,
        _ctx: &mut RiskContext<'_>,
    ) {
    }

    fn on_order_canceled(&mut self, _order: &Order, _canceled: i32, _ctx: &mut RiskContext<'_>) {}

    fn on_order_completed(&mut self, _order: &Order, _ctx: &mut RiskContext<'_>) {}

    fn on_order_rejected(
        &mut self,
        _order: &Order,
        _error: &EngineError,
        _ctx: &mut RiskContext<'_>,
    ) {
    }
}

/// Ordered rule pipeline.
pub struct RiskManager {
    rules: Vec<Box<dyn RiskRule>>,
}

impl RiskManager {
    /// Install the built-in rules per configuration.
    pub fn new(config: &RiskConfig) -> Self {
        let mut manager = Self { rules: Vec::new() };
        manager.add_rule(Box::new(SanityRule::new(config.max_order_volume)));
        if config.orders_per_sec > 0 {
            manager.add_rule(Box::new(ThrottleRule::new(config.orders_per_sec)));
        }
        manager.add_rule(Box::new(FundRule::new()));
        manager.add_rule(Box::new(PositionRule::new()));
        manager
    }

    /// Append a rule; it sees events after all earlier rules.
    pub fn add_rule(&mut self, rule: Box<dyn RiskRule>) {
        self.rules.push(rule);
    }

    /// Pre-trade gate. First rejection wins.
    pub fn check_order_req(
        &mut self,
        order: &Order,
        ctx: &mut RiskContext<'_>,
    ) -> Result<(), RiskRejection> {
        for rule in &mut self.rules {
            if let Err(rejection) = rule.check_order_req(order, ctx) {
                warn!(
                    "risk: rule '{}' rejected order {}: {}",
                    rule.name(),
                    order.req.engine_order_id,
                    rejection
                );
                return Err(rejection);
            }
        }
        Ok(())
    }

    pub fn on_order_sent(&mut self, order: &Order, ctx: &mut RiskContext<'_>) {
        for rule in &mut self.rules {
            rule.on_order_sent(order, ctx);
        }
    }

    pub fn on_order_accepted(&mut self, order: &Order, ctx: &mut RiskContext<'_>) {
        for rule in &mut self.rules {
            rule.on_order_accepted(order, ctx);
        }
    }

    pub fn on_order_traded(
        &mut self,
        order: &Order,
        trade: &OrderTradedRsp,
        ctx: &mut RiskContext<'_>,
    ) {
        for rule in &mut self.rules {
            rule.on_order_traded(order, trade, ctx);
        }
    }

    pub fn on_order_canceled(&mut self, order: &Order, canceled: i32, ctx: &mut RiskContext<'_>) {
        for rule in &mut self.rules {
            rule.on_order_canceled(order, canceled, ctx);
        }
    }

    pub fn on_order_completed(&mut self, order: &Order, ctx: &mut RiskContext<'_>) {
        for rule in &mut self.rules {
            rule.on_order_completed(order, ctx);
        }
    }

    pub fn on_order_rejected(
        &mut self,
        order: &Order,
        error: &EngineError,
        ctx: &mut RiskContext<'_>,
    ) {
        for rule in &mut self.rules {
            rule.on_order_rejected(order, error, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::contract::Contract;
    use crate::core::order::OrderRequest;
    use crate::core::types::{Direction, Offset, OrderType, StrategyId};
    use std::sync::Arc;

    struct AlwaysReject;

    impl RiskRule for AlwaysReject {
        fn name(&self) -> &'static str {
            "always_reject"
        }

        fn check_order_req(
            &mut self,
            order: &Order,
            _ctx: &mut RiskContext<'_>,
        ) -> Result<(), RiskRejection> {
            Err(RiskRejection::InvalidVolume {
                volume: order.req.volume,
            })
        }
    }

    fn test_order() -> Order {
        let contract = Arc::new(Contract {
            index: 0,
            ticker: "cu2512".to_string(),
            name: "CU2512".to_string(),
            exchange: "SIM".to_string(),
            size: 5.0,
            price_tick: 10.0,
            min_volume: 1,
            max_volume: 500,
        });
        Order::new(
            OrderRequest {
                engine_order_id: 1,
                contract,
                order_type: OrderType::Limit,
                direction: Direction::Buy,
                offset: Offset::Open,
                volume: 1,
                price: 71_000.0,
                flags: 0,
            },
            0,
            StrategyId::from_name("t"),
        )
    }

    #[test]
    fn test_first_rejection_wins() {
        let mut manager = RiskManager::new(&RiskConfig::default());
        manager.add_rule(Box::new(AlwaysReject));

        let mut account = Account {
            total_asset: 1e9,
            ..Account::default()
        };
        let mut portfolio = Portfolio::new();
        let snapshot = MdSnapshot::new();
        let mut ctx = RiskContext {
            account: &mut account,
            portfolio: &mut portfolio,
            snapshot: &snapshot,
        };

        // Built-in rules pass, the appended rule rejects
        let rejection = manager.check_order_req(&test_order(), &mut ctx).unwrap_err();
        assert!(matches!(rejection, RiskRejection::InvalidVolume { .. }));
    }
}
