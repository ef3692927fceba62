//! Trading engine core
//!
//! Demultiplexes strategy commands and gateway callbacks onto the order
//! registry, portfolio, account, and risk gate.
//!
//! ```text
//! strategies ──IPC──▶ intake ──▶ execute_cmd ──▶ risk ──▶ gateway
//!                                                           │
//!      registry/portfolio/account ◀── risk hooks ◀── on_* ◀─┘
//! ```
//!
//! One mutex guards registry + account + portfolio + risk. Every
//! command and every order callback holds it for the whole handler —
//! including across `gateway.send_order`, so that no callback can
//! observe an order the registry does not know yet. The tick path only
//! touches the snapshot and stays off this lock.

pub mod registry;

pub use registry::OrderRegistry;

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::core::contract::ContractDirectory;
use crate::core::errors::EngineError;
use crate::core::order::{Order, OrderRequest};
use crate::core::protocol::{CmdType, TraderCommand, TRADER_CMD_MAGIC};
use crate::core::types::{Direction, Offset, OrderStatus, OrderType, TradeType};
use crate::data::publisher::MdPublisher;
use crate::data::snapshot::MdSnapshot;
use crate::data::tick::TickData;
use crate::gateway::{
    create_gateway, Gateway, GatewayEvents, OrderAcceptedRsp, OrderCanceledRsp,
    OrderCancelRejectedRsp, OrderRejectedRsp, OrderTradedRsp, SIM_API,
};
use crate::ipc::CommandSource;
use crate::portfolio::{Account, Portfolio, Position};
use crate::risk::{RiskContext, RiskManager, RiskRule};

/// Seconds between background account refreshes.
const ACCOUNT_REFRESH_SECS: u64 = 15;

/// Spins before the intake loop backs off to a micro-sleep.
const IDLE_SPINS: u32 = 64;

/// State guarded by the engine lock.
struct EngineCore {
    registry: OrderRegistry,
    account: Account,
    portfolio: Portfolio,
    risk: RiskManager,
}

/// The engine. Construct with [`TradingEngine::new`], then
/// [`login`](TradingEngine::login) and [`run`](TradingEngine::run).
pub struct TradingEngine {
    config: Config,
    contracts: Arc<ContractDirectory>,
    snapshot: MdSnapshot,
    publisher: Arc<dyn MdPublisher>,
    core: Mutex<EngineCore>,
    gateway: RwLock<Option<Arc<dyn Gateway>>>,
    next_engine_order_id: AtomicU64,
    is_logon: AtomicBool,
    stop: Arc<AtomicBool>,
    /// Handle to ourselves, handed to the gateway as the callback sink.
    self_ref: Weak<TradingEngine>,
}

impl TradingEngine {
    pub fn new(config: Config, publisher: Arc<dyn MdPublisher>) -> Arc<Self> {
        let risk = RiskManager::new(&config.risk);
        Arc::new_cyclic(|self_ref| Self {
            config,
            contracts: Arc::new(ContractDirectory::new()),
            snapshot: MdSnapshot::new(),
            publisher,
            core: Mutex::new(EngineCore {
                registry: OrderRegistry::new(),
                account: Account::default(),
                portfolio: Portfolio::new(),
                risk,
            }),
            gateway: RwLock::new(None),
            next_engine_order_id: AtomicU64::new(1),
            is_logon: AtomicBool::new(false),
            stop: Arc::new(AtomicBool::new(false)),
            self_ref: self_ref.clone(),
        })
    }

    /// Establish the session: resolve the gateway by API name, log in,
    /// and replay account, positions, and today's trades. Fatal on any
    /// failure.
    pub fn login(&self) -> Result<()> {
        let api = self.config.engine.api.clone();
        let gateway =
            create_gateway(&api).ok_or_else(|| EngineError::UnknownGateway(api.clone()))?;
        self.login_with(gateway)
    }

    /// Session bootstrap against an externally constructed gateway.
    pub fn login_with(&self, gateway: Arc<dyn Gateway>) -> Result<()> {
        let api = &self.config.engine.api;
        info!(
            "engine login: api '{}', account {}",
            api, self.config.engine.account_id
        );

        let events: Arc<dyn GatewayEvents> = self
            .self_ref
            .upgrade()
            .context("engine handle dropped before login")?;
        gateway
            .login(events, &self.config)
            .map_err(|e| EngineError::LoginFailed(e.to_string()))?;
        *self.gateway.write() = Some(Arc::clone(&gateway));

        gateway
            .query_contracts()
            .map_err(|_| EngineError::QueryFailed("contracts"))?;
        gateway
            .query_account()
            .map_err(|_| EngineError::QueryFailed("account"))?;

        {
            let mut core = self.core.lock();
            let account_id = core.account.account_id;
            core.portfolio.set_account(account_id);
        }

        gateway
            .query_positions()
            .map_err(|_| EngineError::QueryFailed("positions"))?;
        gateway
            .query_trades()
            .map_err(|_| EngineError::QueryFailed("trades"))?;

        if api != SIM_API {
            self.spawn_account_refresh(Arc::clone(&gateway));
        }

        self.is_logon.store(true, Ordering::Release);
        info!("engine login complete ({} contracts)", self.contracts.len());
        Ok(())
    }

    /// Background task refreshing the account record every 15 seconds
    /// until the stop token is raised.
    fn spawn_account_refresh(&self, gateway: Arc<dyn Gateway>) {
        let stop = Arc::clone(&self.stop);
        let spawned = thread::Builder::new()
            .name("keel-account-refresh".to_string())
            .spawn(move || loop {
                for _ in 0..ACCOUNT_REFRESH_SECS {
                    thread::sleep(Duration::from_secs(1));
                    if stop.load(Ordering::Acquire) {
                        return;
                    }
                }
                if let Err(e) = gateway.query_account() {
                    warn!("account refresh failed: {}", e);
                }
            });
        if let Err(e) = spawned {
            warn!("failed to spawn account refresh task: {}", e);
        }
    }

    /// Stop token shared by the intake loop and background tasks.
    pub fn stop_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Raise the stop token and log out of the gateway.
    pub fn close(&self) {
        self.stop.store(true, Ordering::Release);
        self.is_logon.store(false, Ordering::Release);
        if let Some(gateway) = self.gateway.read().clone() {
            gateway.logout();
        }
        info!("engine closed");
    }

    /// Consume commands until the stop token is raised. Blocks the
    /// calling thread; spins with a micro-sleep back-off when idle so
    /// no command is ever dropped.
    pub fn run(&self, source: &mut dyn CommandSource) -> Result<()> {
        info!("command intake started: {}", source.describe());
        let mut idle: u32 = 0;
        while !self.stop.load(Ordering::Acquire) {
            match source.poll() {
                Some(cmd) => {
                    idle = 0;
                    self.execute_cmd(&cmd);
                }
                None => {
                    idle = idle.saturating_add(1);
                    if idle < IDLE_SPINS {
                        std::hint::spin_loop();
                    } else {
                        thread::sleep(Duration::from_micros(100));
                    }
                }
            }
        }
        info!("command intake stopped");
        Ok(())
    }

    /// Dispatch one strategy command. Per-command failures are logged
    /// and never leak into other commands.
    pub fn execute_cmd(&self, cmd: &TraderCommand) {
        let magic = cmd.magic;
        if magic != TRADER_CMD_MAGIC {
            error!("dropped command with bad magic {:#010x}", magic);
            return;
        }

        let raw_type = cmd.cmd_type;
        match CmdType::try_from(raw_type) {
            Ok(CmdType::NewOrder) => {
                debug!("cmd: new order from {}", cmd.strategy());
                if let Err(e) = self.send_order(cmd) {
                    error!("new order from {} failed: {}", cmd.strategy(), e);
                }
            }
            Ok(CmdType::CancelOrder) => {
                let order_id = { cmd.cancel_req().order_id };
                debug!("cmd: cancel order {}", order_id);
                self.cancel_order(order_id);
            }
            Ok(CmdType::CancelTicker) => {
                let ticker_index = { cmd.cancel_ticker_req().ticker_index };
                debug!("cmd: cancel ticker {}", ticker_index);
                self.cancel_for_ticker(ticker_index);
            }
            Ok(CmdType::CancelAll) => {
                debug!("cmd: cancel all");
                self.cancel_all();
            }
            Err(raw) => {
                error!("dropped command with unknown type {}", raw);
            }
        }
    }

    /// Validate, risk-check, and send one order. The registry learns
    /// the order only after the gateway accepts the send, so every
    /// later callback will find it.
    fn send_order(&self, cmd: &TraderCommand) -> Result<(), EngineError> {
        let req = cmd.order_req();

        let ticker_index = { req.ticker_index };
        let Some(contract) = self.contracts.by_index(ticker_index) else {
            error!("send_order: no contract at index {}", ticker_index);
            return Err(EngineError::UnknownContract(ticker_index));
        };

        let direction = match Direction::try_from({ req.direction }) {
            Ok(direction) => direction,
            Err(raw) => {
                error!("send_order: bad direction {}", raw);
                return Err(EngineError::UnknownCmd(raw));
            }
        };
        let offset = match Offset::try_from({ req.offset }) {
            Ok(offset) => offset,
            Err(raw) => {
                error!("send_order: bad offset {}", raw);
                return Err(EngineError::UnknownCmd(raw));
            }
        };
        let order_type = match OrderType::try_from({ req.order_type }) {
            Ok(order_type) => order_type,
            Err(raw) => {
                error!("send_order: bad order type {}", raw);
                return Err(EngineError::UnknownCmd(raw));
            }
        };

        let Some(gateway) = self.gateway.read().clone() else {
            error!("send_order: engine not logged in");
            return Err(EngineError::SendFailed);
        };

        let engine_order_id = self.next_engine_order_id.fetch_add(1, Ordering::Relaxed);
        let order = Order::new(
            OrderRequest {
                engine_order_id,
                contract: Arc::clone(&contract),
                order_type,
                direction,
                offset,
                volume: { req.volume },
                price: { req.price },
                flags: { req.flags },
            },
            { req.user_order_id },
            cmd.strategy(),
        );

        let mut core = self.core.lock();
        let EngineCore {
            registry,
            account,
            portfolio,
            risk,
        } = &mut *core;
        let mut ctx = RiskContext {
            account,
            portfolio,
            snapshot: &self.snapshot,
        };

        if req.without_check == 0 {
            if let Err(rejection) = risk.check_order_req(&order, &mut ctx) {
                let err = EngineError::RiskRejected(rejection);
                risk.on_order_rejected(&order, &err, &mut ctx);
                return Err(err);
            }
        } else {
            warn!("send_order: order {} bypasses risk checks", engine_order_id);
        }

        if gateway.send_order(&order.req).is_err() {
            let err = EngineError::SendFailed;
            error!(
                "send_order failed: {} {}{} {} vol {} px {:.3}",
                contract.ticker, direction, offset, order_type, order.req.volume, order.req.price
            );
            risk.on_order_rejected(&order, &err, &mut ctx);
            return Err(err);
        }

        risk.on_order_sent(&order, &mut ctx);
        debug!(
            "send_order ok: {} {}{} {} engine id {} vol {} px {:.3}",
            contract.ticker,
            direction,
            offset,
            order_type,
            engine_order_id,
            order.req.volume,
            order.req.price
        );
        registry.insert(order);
        Ok(())
    }

    /// Forward a cancel for a single gateway order id.
    fn cancel_order(&self, order_id: u64) {
        let Some(gateway) = self.gateway.read().clone() else {
            error!("cancel_order: engine not logged in");
            return;
        };
        if let Err(e) = gateway.cancel_order(order_id) {
            error!("cancel_order {} failed: {}", order_id, e);
        }
    }

    /// Cancel every registered order on one instrument.
    fn cancel_for_ticker(&self, ticker_index: u32) {
        let Some(gateway) = self.gateway.read().clone() else {
            error!("cancel_for_ticker: engine not logged in");
            return;
        };
        let core = self.core.lock();
        for order_id in core.registry.gateway_ids_for_ticker(ticker_index) {
            if let Err(e) = gateway.cancel_order(order_id) {
                error!("cancel_order {} failed: {}", order_id, e);
            }
        }
    }

    /// Cancel every registered order.
    fn cancel_all(&self) {
        let Some(gateway) = self.gateway.read().clone() else {
            error!("cancel_all: engine not logged in");
            return;
        };
        let core = self.core.lock();
        for order_id in core.registry.gateway_ids() {
            if let Err(e) = gateway.cancel_order(order_id) {
                error!("cancel_order {} failed: {}", order_id, e);
            }
        }
    }

    fn on_secondary_market_traded(&self, rsp: OrderTradedRsp) {
        let mut core = self.core.lock();
        let EngineCore {
            registry,
            account,
            portfolio,
            risk,
        } = &mut *core;
        let Some(order) = registry.get_mut(rsp.engine_order_id) else {
            warn!(
                "trade for unknown order: engine id {}, vol {}, px {:.3}",
                rsp.engine_order_id, rsp.volume, rsp.price
            );
            return;
        };
        let mut ctx = RiskContext {
            account,
            portfolio,
            snapshot: &self.snapshot,
        };

        if !order.accepted {
            // The accepted event lost the race against the first fill
            order.accepted = true;
            order.order_id = rsp.order_id;
            order.status = OrderStatus::Submitted;
            risk.on_order_accepted(order, &mut ctx);
            info!(
                "order accepted (via fill): {} {}{}, gateway id {}",
                order.req.contract.ticker, order.req.direction, order.req.offset, rsp.order_id
            );
        }

        order.order_id = rsp.order_id;
        order.traded_volume += rsp.volume;
        order.status = if order.is_completed() {
            OrderStatus::AllTraded
        } else {
            OrderStatus::PartTraded
        };

        info!(
            "order traded: {} {}{}, fill {} @ {:.3}, total {}/{}",
            order.req.contract.ticker,
            order.req.direction,
            order.req.offset,
            rsp.volume,
            rsp.price,
            order.traded_volume,
            order.req.volume
        );

        risk.on_order_traded(order, &rsp, &mut ctx);

        if order.is_completed() {
            info!(
                "order completed: {} engine id {}, traded {}/{}",
                order.req.contract.ticker,
                rsp.engine_order_id,
                order.traded_volume,
                order.req.volume
            );
            risk.on_order_completed(order, &mut ctx);
            registry.remove(rsp.engine_order_id);
        }
    }

    fn on_primary_market_traded(&self, rsp: OrderTradedRsp) {
        let mut core = self.core.lock();
        let EngineCore {
            registry,
            account,
            portfolio,
            risk,
        } = &mut *core;
        let Some(order) = registry.get_mut(rsp.engine_order_id) else {
            warn!(
                "primary-market trade for unknown order: engine id {}, vol {}, px {:.3}",
                rsp.engine_order_id, rsp.volume, rsp.price
            );
            return;
        };
        let mut ctx = RiskContext {
            account,
            portfolio,
            snapshot: &self.snapshot,
        };

        if !order.accepted {
            order.accepted = true;
            order.order_id = rsp.order_id;
            order.status = OrderStatus::Submitted;
            risk.on_order_accepted(order, &mut ctx);
            info!(
                "order accepted (via {}): {} {}, gateway id {}",
                rsp.trade_type, order.req.contract.ticker, order.req.direction, rsp.order_id
            );
        }

        order.order_id = rsp.order_id;
        match rsp.trade_type {
            TradeType::PrimaryMarket => {
                // Primary-market fills arrive as one final event: the
                // volume is assigned, not accumulated, and the order
                // retires immediately.
                order.traded_volume = rsp.volume;
                order.status = OrderStatus::AllTraded;
                risk.on_order_traded(order, &rsp, &mut ctx);
                info!(
                    "primary-market fill done: {} {}, vol {}",
                    order.req.contract.ticker, order.req.direction, rsp.volume
                );
                registry.remove(rsp.engine_order_id);
            }
            TradeType::AcquiredStock | TradeType::ReleasedStock | TradeType::CashSubstitution => {
                // Event-style trade types: report to risk, keep the
                // order live with its volume untouched.
                risk.on_order_traded(order, &rsp, &mut ctx);
            }
            TradeType::SecondaryMarket => {
                // Unreachable via on_order_traded's dispatch
                warn!(
                    "secondary trade routed to primary handler: engine id {}",
                    rsp.engine_order_id
                );
            }
        }
    }
}

impl GatewayEvents for TradingEngine {
    fn on_order_accepted(&self, rsp: OrderAcceptedRsp) {
        let mut core = self.core.lock();
        let EngineCore {
            registry,
            account,
            portfolio,
            risk,
        } = &mut *core;
        let Some(order) = registry.get_mut(rsp.engine_order_id) else {
            warn!("accepted for unknown order: engine id {}", rsp.engine_order_id);
            return;
        };
        if order.accepted {
            // Duplicate accept, e.g. after an auto-accept on first fill
            return;
        }

        order.order_id = rsp.order_id;
        order.accepted = true;
        order.status = OrderStatus::Submitted;

        let mut ctx = RiskContext {
            account,
            portfolio,
            snapshot: &self.snapshot,
        };
        risk.on_order_accepted(order, &mut ctx);

        info!(
            "order accepted: {} {}{}, vol {}, px {:.2}, gateway id {}",
            order.req.contract.ticker,
            order.req.direction,
            order.req.offset,
            order.req.volume,
            order.req.price,
            rsp.order_id
        );
    }

    fn on_order_rejected(&self, rsp: OrderRejectedRsp) {
        let mut core = self.core.lock();
        let EngineCore {
            registry,
            account,
            portfolio,
            risk,
        } = &mut *core;
        let Some(order) = registry.get_mut(rsp.engine_order_id) else {
            warn!("rejection for unknown order: engine id {}", rsp.engine_order_id);
            return;
        };

        let mut ctx = RiskContext {
            account,
            portfolio,
            snapshot: &self.snapshot,
        };
        let err = EngineError::Rejected(rsp.reason.clone());
        risk.on_order_rejected(order, &err, &mut ctx);

        error!(
            "order rejected: {}. {} {}{}, vol {}, px {:.3}",
            rsp.reason,
            order.req.contract.ticker,
            order.req.direction,
            order.req.offset,
            order.req.volume,
            order.req.price
        );

        registry.remove(rsp.engine_order_id);
    }

    fn on_order_traded(&self, rsp: OrderTradedRsp) {
        match rsp.trade_type {
            TradeType::SecondaryMarket => self.on_secondary_market_traded(rsp),
            _ => self.on_primary_market_traded(rsp),
        }
    }

    fn on_order_canceled(&self, rsp: OrderCanceledRsp) {
        let mut core = self.core.lock();
        let EngineCore {
            registry,
            account,
            portfolio,
            risk,
        } = &mut *core;
        let Some(order) = registry.get_mut(rsp.engine_order_id) else {
            warn!("cancel for unknown order: engine id {}", rsp.engine_order_id);
            return;
        };
        let mut ctx = RiskContext {
            account,
            portfolio,
            snapshot: &self.snapshot,
        };

        order.canceled_volume = rsp.canceled_volume;

        info!(
            "order canceled: {} {}{}, gateway id {}, canceled {}",
            order.req.contract.ticker,
            order.req.direction,
            order.req.offset,
            order.order_id,
            rsp.canceled_volume
        );

        risk.on_order_canceled(order, rsp.canceled_volume, &mut ctx);

        if order.is_completed() {
            order.status = OrderStatus::Canceled;
            info!(
                "order completed: {} engine id {}, traded {}/{}",
                order.req.contract.ticker,
                rsp.engine_order_id,
                order.traded_volume,
                order.req.volume
            );
            risk.on_order_completed(order, &mut ctx);
            registry.remove(rsp.engine_order_id);
        }
    }

    fn on_order_cancel_rejected(&self, rsp: OrderCancelRejectedRsp) {
        // The order stays live; nothing to roll back.
        warn!(
            "cancel rejected: {}. engine id {}",
            rsp.reason, rsp.engine_order_id
        );
    }

    fn on_query_contract(&self, contract: crate::core::contract::Contract) {
        let ticker = contract.ticker.clone();
        let index = self.contracts.insert(contract);
        debug!("contract installed: {} at index {}", ticker, index);
    }

    fn on_query_account(&self, account: Account) {
        {
            let mut core = self.core.lock();
            core.account = account;
        }
        info!(
            "account refreshed: total {:.3}, frozen {:.3}, margin {:.3}",
            account.total_asset, account.frozen, account.margin
        );
    }

    fn on_query_position(&self, position: Position) {
        let lp = &position.long_pos;
        let sp = &position.short_pos;
        info!(
            "position: ticker {}, long {}/{} frozen {}, short {}/{} frozen {}",
            position.ticker_index,
            lp.holdings,
            lp.yd_holdings,
            lp.frozen,
            sp.holdings,
            sp.yd_holdings,
            sp.frozen
        );

        if lp.holdings == 0 && lp.frozen == 0 && sp.holdings == 0 && sp.frozen == 0 {
            return;
        }

        self.core.lock().portfolio.set_position(position);
    }

    fn on_query_trade(&self, trade: OrderTradedRsp) {
        self.core.lock().portfolio.update_on_query_trade(
            trade.ticker_index,
            trade.direction,
            trade.offset,
            trade.volume,
        );
    }

    fn on_tick(&self, tick: TickData) {
        if !self.is_logon.load(Ordering::Acquire) {
            return;
        }
        let Some(contract) = self.contracts.by_index(tick.ticker_index) else {
            warn!("tick for unknown ticker index {}", tick.ticker_index);
            return;
        };
        self.publisher.publish(&contract.ticker, &tick);
        self.snapshot.update(tick);
        trace!(
            "tick {}: bid {:.3} ask {:.3}",
            contract.ticker,
            tick.best_bid(),
            tick.best_ask()
        );
    }
}

// Introspection used by binaries and tests.
impl TradingEngine {
    pub fn is_logon(&self) -> bool {
        self.is_logon.load(Ordering::Acquire)
    }

    pub fn order_count(&self) -> usize {
        self.core.lock().registry.len()
    }

    /// Copy of a registered order, if still in flight.
    pub fn order(&self, engine_order_id: u64) -> Option<Order> {
        self.core.lock().registry.get(engine_order_id).cloned()
    }

    pub fn account(&self) -> Account {
        self.core.lock().account
    }

    pub fn position(&self, ticker_index: u32) -> Option<Position> {
        self.core.lock().portfolio.get(ticker_index).copied()
    }

    pub fn contracts(&self) -> &ContractDirectory {
        &self.contracts
    }

    pub fn snapshot(&self) -> &MdSnapshot {
        &self.snapshot
    }

    /// Append a risk rule behind the built-in ones.
    pub fn add_risk_rule(&self, rule: Box<dyn RiskRule>) {
        self.core.lock().risk.add_rule(rule);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::CmdOrderReq;
    use crate::core::types::StrategyId;
    use crate::data::publisher::NullPublisher;

    fn engine() -> Arc<TradingEngine> {
        TradingEngine::new(Config::default(), Arc::new(NullPublisher))
    }

    #[test]
    fn test_bad_magic_is_inert() {
        let engine = engine();
        let mut cmd = TraderCommand::cancel_all(StrategyId::default());
        cmd.magic = 0;
        engine.execute_cmd(&cmd);
        assert_eq!(engine.order_count(), 0);
    }

    #[test]
    fn test_unknown_type_is_inert() {
        let engine = engine();
        let mut cmd = TraderCommand::cancel_all(StrategyId::default());
        cmd.cmd_type = 99;
        engine.execute_cmd(&cmd);
        assert_eq!(engine.order_count(), 0);
    }

    #[test]
    fn test_new_order_without_login_fails_cleanly() {
        let engine = engine();
        let cmd = TraderCommand::new_order(
            StrategyId::from_name("t"),
            CmdOrderReq {
                user_order_id: 1,
                ticker_index: 0,
                direction: 1,
                offset: 1,
                order_type: 1,
                volume: 1,
                price: 10.0,
                flags: 0,
                without_check: 0,
            },
        );
        // No contracts, no gateway: dropped with a log, no panic
        engine.execute_cmd(&cmd);
        assert_eq!(engine.order_count(), 0);
    }

    #[test]
    fn test_ticks_dropped_before_logon() {
        let engine = engine();
        engine.on_tick(TickData {
            ticker_index: 0,
            last_price: 1.0,
            ..TickData::default()
        });
        assert!(engine.snapshot().is_empty());
    }
}
