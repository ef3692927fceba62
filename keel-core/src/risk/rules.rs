//! Built-in risk rules
//!
//! Ordering matters: sanity and throttle run before the rules that
//! mutate account or portfolio state, so a rejected order leaves both
//! untouched.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::warn;

use super::{RiskContext, RiskRule};
use crate::core::errors::{EngineError, RiskRejection};
use crate::core::order::Order;
use crate::core::types::{OrderType, TradeType};
use crate::gateway::OrderTradedRsp;

/// Volume and price sanity: lot bounds, tick grid, positive values.
pub struct SanityRule {
    /// Global per-order cap on top of contract bounds, 0 = off
    max_order_volume: i32,
}

impl SanityRule {
    pub fn new(max_order_volume: i32) -> Self {
        Self { max_order_volume }
    }

    fn is_priced(order: &Order) -> bool {
        !matches!(order.req.order_type, OrderType::Market)
    }
}

impl RiskRule for SanityRule {
    fn name(&self) -> &'static str {
        "sanity"
    }

    fn check_order_req(
        &mut self,
        order: &Order,
        _ctx: &mut RiskContext<'_>,
    ) -> Result<(), RiskRejection> {
        let req = &order.req;
        let contract = &req.contract;

        if req.volume <= 0 {
            return Err(RiskRejection::InvalidVolume { volume: req.volume });
        }

        let max = if self.max_order_volume > 0 && contract.max_volume > 0 {
            self.max_order_volume.min(contract.max_volume)
        } else if self.max_order_volume > 0 {
            self.max_order_volume
        } else {
            contract.max_volume
        };
        if req.volume < contract.min_volume || (max > 0 && req.volume > max) {
            return Err(RiskRejection::VolumeOutOfRange {
                volume: req.volume,
                min: contract.min_volume,
                max,
            });
        }

        if Self::is_priced(order) {
            if req.price <= 0.0 {
                return Err(RiskRejection::InvalidPrice { price: req.price });
            }
            if contract.price_tick > 0.0 {
                let ticks = req.price / contract.price_tick;
                if (ticks - ticks.round()).abs() > 1e-6 {
                    return Err(RiskRejection::PriceOffTick {
                        price: req.price,
                        tick: contract.price_tick,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Rolling one-second submission throttle.
pub struct ThrottleRule {
    limit: u32,
    sent: VecDeque<Instant>,
}

impl ThrottleRule {
    const WINDOW: Duration = Duration::from_secs(1);

    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            sent: VecDeque::new(),
        }
    }

    fn trim(&mut self, now: Instant) {
        while let Some(&front) = self.sent.front() {
            if now.duration_since(front) >= Self::WINDOW {
                self.sent.pop_front();
            } else {
                break;
            }
        }
    }
}

impl RiskRule for ThrottleRule {
    fn name(&self) -> &'static str {
        "throttle"
    }

    fn check_order_req(
        &mut self,
        _order: &Order,
        _ctx: &mut RiskContext<'_>,
    ) -> Result<(), RiskRejection> {
        self.trim(Instant::now());
        if self.sent.len() >= self.limit as usize {
            return Err(RiskRejection::Throttled { limit: self.limit });
        }
        Ok(())
    }

    fn on_order_sent(&mut self, _order: &Order, _ctx: &mut RiskContext<'_>) {
        self.sent.push_back(Instant::now());
    }
}

/// Frozen funds held by one pending open order.
struct FrozenFunds {
    /// Cost of one lot at the order's estimated price
    unit_cost: f64,
    /// Funds still frozen for this order
    frozen: f64,
}

/// Cash and margin accounting for open orders.
///
/// Freezes the estimated cost when an order is sent, releases it as
/// fills and cancels retire volume, and converts filled volume into
/// margin. Rejections observed before a send freeze nothing, so only
/// gateway-side rejections release.
pub struct FundRule {
    by_order: HashMap<u64, FrozenFunds>,
}

impl FundRule {
    pub fn new() -> Self {
        Self {
            by_order: HashMap::new(),
        }
    }

    /// Price used to estimate order cost: the limit price, else the
    /// latest mark from the snapshot.
    fn estimate_price(order: &Order, ctx: &RiskContext<'_>) -> f64 {
        if order.req.price > 0.0 {
            order.req.price
        } else {
            ctx.snapshot
                .get(order.req.contract.index)
                .map(|tick| tick.mid_price())
                .unwrap_or(0.0)
        }
    }

    fn release(&mut self, engine_order_id: u64, volume: i32, ctx: &mut RiskContext<'_>) -> f64 {
        let Some(entry) = self.by_order.get_mut(&engine_order_id) else {
            return 0.0;
        };
        let release = (entry.unit_cost * volume as f64).min(entry.frozen);
        entry.frozen -= release;
        ctx.account.frozen = (ctx.account.frozen - release).max(0.0);
        release
    }

    fn release_all(&mut self, engine_order_id: u64, ctx: &mut RiskContext<'_>) {
        if let Some(entry) = self.by_order.remove(&engine_order_id) {
            ctx.account.frozen = (ctx.account.frozen - entry.frozen).max(0.0);
        }
    }
}

impl Default for FundRule {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskRule for FundRule {
    fn name(&self) -> &'static str {
        "fund"
    }

    fn check_order_req(
        &mut self,
        order: &Order,
        ctx: &mut RiskContext<'_>,
    ) -> Result<(), RiskRejection> {
        if order.req.offset.is_close() {
            return Ok(());
        }
        let price = Self::estimate_price(order, ctx);
        let required = price * order.req.volume as f64 * order.req.contract.size;
        let available = ctx.account.available();
        if required > available {
            return Err(RiskRejection::FundNotEnough {
                required,
                available,
            });
        }
        Ok(())
    }

    fn on_order_sent(&mut self, order: &Order, ctx: &mut RiskContext<'_>) {
        if order.req.offset.is_close() {
            return;
        }
        let unit_cost = Self::estimate_price(order, ctx) * order.req.contract.size;
        let frozen = unit_cost * order.req.volume as f64;
        ctx.account.frozen += frozen;
        self.by_order.insert(
            order.req.engine_order_id,
            FrozenFunds { unit_cost, frozen },
        );
    }

    fn on_order_traded(
        &mut self,
        order: &Order,
        trade: &OrderTradedRsp,
        ctx: &mut RiskContext<'_>,
    ) {
        if !matches!(
            trade.trade_type,
            TradeType::SecondaryMarket | TradeType::PrimaryMarket
        ) {
            return;
        }
        if order.req.offset.is_close() {
            // Closing releases the margin those lots were holding
            let released = trade.price * trade.volume as f64 * order.req.contract.size;
            ctx.account.margin = (ctx.account.margin - released).max(0.0);
            return;
        }
        self.release(order.req.engine_order_id, trade.volume, ctx);
        ctx.account.margin += trade.price * trade.volume as f64 * order.req.contract.size;
    }

    fn on_order_canceled(&mut self, order: &Order, canceled: i32, ctx: &mut RiskContext<'_>) {
        self.release(order.req.engine_order_id, canceled, ctx);
    }

    fn on_order_completed(&mut self, order: &Order, ctx: &mut RiskContext<'_>) {
        self.release_all(order.req.engine_order_id, ctx);
    }

    fn on_order_rejected(
        &mut self,
        order: &Order,
        error: &EngineError,
        ctx: &mut RiskContext<'_>,
    ) {
        // Risk and send failures happen before anything was frozen; the
        // map is empty for them and this is a no-op.
        if matches!(error, EngineError::Rejected(_)) {
            self.release_all(order.req.engine_order_id, ctx);
        } else {
            self.by_order.remove(&order.req.engine_order_id);
        }
    }
}

/// Closable-volume accounting for close orders.
///
/// A close order may only claim holdings not already frozen by another
/// pending close. Sending freezes the claimed lots; cancels and
/// gateway rejections release them; fills consume them and move
/// holdings.
pub struct PositionRule;

impl PositionRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PositionRule {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskRule for PositionRule {
    fn name(&self) -> &'static str {
        "position"
    }

    fn check_order_req(
        &mut self,
        order: &Order,
        ctx: &mut RiskContext<'_>,
    ) -> Result<(), RiskRejection> {
        let req = &order.req;
        if !req.offset.is_close() {
            return Ok(());
        }
        let closable = ctx
            .portfolio
            .closable(req.contract.index, req.direction, req.offset);
        if req.volume > closable {
            return Err(RiskRejection::PositionNotEnough {
                volume: req.volume,
                closable,
            });
        }
        Ok(())
    }

    fn on_order_sent(&mut self, order: &Order, ctx: &mut RiskContext<'_>) {
        let req = &order.req;
        ctx.portfolio
            .update_pending(req.contract.index, req.direction, req.offset, req.volume);
    }

    fn on_order_traded(
        &mut self,
        order: &Order,
        trade: &OrderTradedRsp,
        ctx: &mut RiskContext<'_>,
    ) {
        // The issuance-style trade types report events, not position
        // deltas; only real fills move the book.
        if !matches!(
            trade.trade_type,
            TradeType::SecondaryMarket | TradeType::PrimaryMarket
        ) {
            return;
        }
        let req = &order.req;
        ctx.portfolio.update_traded(
            req.contract.index,
            req.direction,
            req.offset,
            trade.volume,
            trade.price,
        );
    }

    fn on_order_canceled(&mut self, order: &Order, canceled: i32, ctx: &mut RiskContext<'_>) {
        let req = &order.req;
        ctx.portfolio
            .update_pending(req.contract.index, req.direction, req.offset, -canceled);
    }

    fn on_order_rejected(
        &mut self,
        order: &Order,
        error: &EngineError,
        ctx: &mut RiskContext<'_>,
    ) {
        if !matches!(error, EngineError::Rejected(_)) {
            // Never sent, nothing was frozen
            return;
        }
        let req = &order.req;
        if req.offset.is_close() {
            warn!(
                "risk: releasing {} frozen lots for rejected order {}",
                req.volume, req.engine_order_id
            );
        }
        ctx.portfolio
            .update_pending(req.contract.index, req.direction, req.offset, -req.volume);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::contract::Contract;
    use crate::core::order::OrderRequest;
    use crate::core::types::{Direction, Offset, StrategyId};
    use crate::data::snapshot::MdSnapshot;
    use crate::portfolio::{Account, Portfolio};
    use std::sync::Arc;

    fn contract() -> Arc<Contract> {
        Arc::new(Contract {
            index: 0,
            ticker: "cu2512".to_string(),
            name: "CU2512".to_string(),
            exchange: "SIM".to_string(),
            size: 5.0,
            price_tick: 10.0,
            min_volume: 1,
            max_volume: 500,
        })
    }

    fn order(direction: Direction, offset: Offset, volume: i32, price: f64) -> Order {
        Order::new(
            OrderRequest {
                engine_order_id: 7,
                contract: contract(),
                order_type: OrderType::Limit,
                direction,
                offset,
                volume,
                price,
                flags: 0,
            },
            0,
            StrategyId::from_name("t"),
        )
    }

    fn trade(order: &Order, volume: i32, price: f64) -> OrderTradedRsp {
        OrderTradedRsp {
            engine_order_id: order.req.engine_order_id,
            order_id: 100,
            ticker_index: order.req.contract.index,
            direction: order.req.direction,
            offset: order.req.offset,
            trade_type: TradeType::SecondaryMarket,
            volume,
            price,
        }
    }

    struct Fixture {
        account: Account,
        portfolio: Portfolio,
        snapshot: MdSnapshot,
    }

    impl Fixture {
        fn new(total_asset: f64) -> Self {
            Self {
                account: Account {
                    account_id: 1,
                    total_asset,
                    cash: total_asset,
                    frozen: 0.0,
                    margin: 0.0,
                },
                portfolio: Portfolio::new(),
                snapshot: MdSnapshot::new(),
            }
        }

        fn ctx(&mut self) -> RiskContext<'_> {
            RiskContext {
                account: &mut self.account,
                portfolio: &mut self.portfolio,
                snapshot: &self.snapshot,
            }
        }
    }

    #[test]
    fn test_sanity_volume_bounds() {
        let mut rule = SanityRule::new(100);
        let mut fx = Fixture::new(1e9);

        assert!(rule
            .check_order_req(&order(Direction::Buy, Offset::Open, -1, 100.0), &mut fx.ctx())
            .is_err());
        assert!(matches!(
            rule.check_order_req(
                &order(Direction::Buy, Offset::Open, 101, 100.0),
                &mut fx.ctx()
            ),
            Err(RiskRejection::VolumeOutOfRange { max: 100, .. })
        ));
        assert!(rule
            .check_order_req(&order(Direction::Buy, Offset::Open, 10, 100.0), &mut fx.ctx())
            .is_ok());
    }

    #[test]
    fn test_sanity_tick_grid() {
        let mut rule = SanityRule::new(0);
        let mut fx = Fixture::new(1e9);

        // price_tick is 10.0
        assert!(rule
            .check_order_req(&order(Direction::Buy, Offset::Open, 1, 71_005.0), &mut fx.ctx())
            .is_err());
        assert!(rule
            .check_order_req(&order(Direction::Buy, Offset::Open, 1, 71_010.0), &mut fx.ctx())
            .is_ok());
    }

    #[test]
    fn test_throttle_rolls_over() {
        let mut rule = ThrottleRule::new(2);
        let mut fx = Fixture::new(1e9);
        let o = order(Direction::Buy, Offset::Open, 1, 100.0);

        assert!(rule.check_order_req(&o, &mut fx.ctx()).is_ok());
        rule.on_order_sent(&o, &mut fx.ctx());
        assert!(rule.check_order_req(&o, &mut fx.ctx()).is_ok());
        rule.on_order_sent(&o, &mut fx.ctx());
        assert!(matches!(
            rule.check_order_req(&o, &mut fx.ctx()),
            Err(RiskRejection::Throttled { limit: 2 })
        ));
    }

    #[test]
    fn test_fund_rule_freeze_and_release() {
        let mut rule = FundRule::new();
        // One lot costs 100 * 5 = 500
        let mut fx = Fixture::new(10_000.0);
        let o = order(Direction::Buy, Offset::Open, 10, 100.0);

        // 10 lots cost 5000, fits
        assert!(rule.check_order_req(&o, &mut fx.ctx()).is_ok());
        rule.on_order_sent(&o, &mut fx.ctx());
        assert_eq!(fx.account.frozen, 5_000.0);

        // A second identical order no longer fits
        assert!(matches!(
            rule.check_order_req(&o, &mut fx.ctx()),
            Err(RiskRejection::FundNotEnough { .. })
        ));

        // 4 lots fill: frozen shrinks, margin grows
        rule.on_order_traded(&o, &trade(&o, 4, 100.0), &mut fx.ctx());
        assert_eq!(fx.account.frozen, 3_000.0);
        assert_eq!(fx.account.margin, 2_000.0);

        // Cancel the remaining 6 lots
        rule.on_order_canceled(&o, 6, &mut fx.ctx());
        assert_eq!(fx.account.frozen, 0.0);
    }

    #[test]
    fn test_fund_rule_risk_reject_releases_nothing() {
        let mut rule = FundRule::new();
        let mut fx = Fixture::new(10_000.0);
        let o = order(Direction::Buy, Offset::Open, 10, 100.0);

        // Rejected before any send: frozen must stay untouched
        rule.on_order_rejected(
            &o,
            &EngineError::RiskRejected(RiskRejection::InvalidVolume { volume: 10 }),
            &mut fx.ctx(),
        );
        assert_eq!(fx.account.frozen, 0.0);
    }

    #[test]
    fn test_fund_rule_gateway_reject_releases() {
        let mut rule = FundRule::new();
        let mut fx = Fixture::new(10_000.0);
        let o = order(Direction::Buy, Offset::Open, 10, 100.0);

        rule.on_order_sent(&o, &mut fx.ctx());
        assert_eq!(fx.account.frozen, 5_000.0);

        rule.on_order_rejected(&o, &EngineError::Rejected("dup".to_string()), &mut fx.ctx());
        assert_eq!(fx.account.frozen, 0.0);
    }

    #[test]
    fn test_position_rule_closable_gate() {
        let mut rule = PositionRule::new();
        let mut fx = Fixture::new(1e9);
        fx.portfolio
            .update_traded(0, Direction::Buy, Offset::Open, 10, 100.0);

        // Sell-close 6 of the 10 long lots
        let o = order(Direction::Sell, Offset::Close, 6, 100.0);
        assert!(rule.check_order_req(&o, &mut fx.ctx()).is_ok());
        rule.on_order_sent(&o, &mut fx.ctx());

        // Only 4 lots remain closable
        let too_many = order(Direction::Sell, Offset::Close, 5, 100.0);
        assert!(matches!(
            rule.check_order_req(&too_many, &mut fx.ctx()),
            Err(RiskRejection::PositionNotEnough { closable: 4, .. })
        ));

        // Cancel releases the claim
        rule.on_order_canceled(&o, 6, &mut fx.ctx());
        assert!(rule.check_order_req(&too_many, &mut fx.ctx()).is_ok());
    }

    #[test]
    fn test_position_rule_ignores_issuance_events() {
        let mut rule = PositionRule::new();
        let mut fx = Fixture::new(1e9);
        let o = order(Direction::Buy, Offset::Open, 10, 100.0);

        let mut event = trade(&o, 10, 100.0);
        event.trade_type = TradeType::AcquiredStock;
        rule.on_order_traded(&o, &event, &mut fx.ctx());

        assert!(fx.portfolio.get(0).is_none());
    }
}
