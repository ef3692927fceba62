//! Simulated gateway
//!
//! Paper-trading driver for runs without a broker and for integration
//! tests that need the real callback path. Orders are accepted with a
//! locally assigned id; marketable orders fill immediately, the rest sit
//! on a book keyed by gateway order id until a tick crosses them or a
//! cancel claims them.
//!
//! Order callbacks are delivered from a worker thread, never from the
//! caller's stack — `send_order` is invoked with the engine lock held,
//! and a synchronous callback would re-enter it.

use anyhow::Result;
use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

use super::{
    Gateway, GatewayEvents, OrderAcceptedRsp, OrderCanceledRsp, OrderCancelRejectedRsp,
    OrderTradedRsp,
};
use crate::config::Config;
use crate::core::contract::Contract;
use crate::core::order::OrderRequest;
use crate::core::types::{Direction, Offset, OrderType, TradeType};
use crate::data::tick::TickData;
use crate::portfolio::Account;

/// Starting paper balance.
const SIM_TOTAL_ASSET: f64 = 1_000_000.0;

enum SimEvent {
    Accepted(OrderAcceptedRsp),
    Traded(OrderTradedRsp),
    Canceled(OrderCanceledRsp),
    CancelRejected(OrderCancelRejectedRsp),
    Tick(TickData),
}

struct RestingOrder {
    engine_order_id: u64,
    ticker_index: u32,
    direction: Direction,
    offset: Offset,
    volume: i32,
    price: f64,
}

#[derive(Default)]
struct SimState {
    events: Option<Arc<dyn GatewayEvents>>,
    tx: Option<Sender<SimEvent>>,
    next_order_id: u64,
    account: Account,
    contracts: Vec<Contract>,
    /// Latest reference price per ticker index
    marks: HashMap<u32, f64>,
    /// Resting orders keyed by gateway order id
    book: HashMap<u64, RestingOrder>,
}

/// The "sim" gateway.
pub struct SimGateway {
    state: Mutex<SimState>,
}

impl SimGateway {
    pub fn new() -> Self {
        Self::with_contracts(Self::default_contracts())
    }

    /// Build with a custom contract master table.
    pub fn with_contracts(contracts: Vec<Contract>) -> Self {
        Self {
            state: Mutex::new(SimState {
                next_order_id: 1,
                contracts,
                ..SimState::default()
            }),
        }
    }

    /// Built-in master table for paper runs.
    pub fn default_contracts() -> Vec<Contract> {
        vec![
            Contract {
                index: 0,
                ticker: "cu2512".to_string(),
                name: "Copper Dec 2025".to_string(),
                exchange: "SIM".to_string(),
                size: 5.0,
                price_tick: 10.0,
                min_volume: 1,
                max_volume: 500,
            },
            Contract {
                index: 0,
                ticker: "al2512".to_string(),
                name: "Aluminium Dec 2025".to_string(),
                exchange: "SIM".to_string(),
                size: 5.0,
                price_tick: 5.0,
                min_volume: 1,
                max_volume: 500,
            },
        ]
    }

    /// Feed a tick into the simulation: updates the mark, publishes the
    /// tick through the engine, and fills resting orders it crosses.
    pub fn tick(&self, tick: TickData) {
        let mut state = self.state.lock();
        let mark = tick.mid_price();
        state.marks.insert(tick.ticker_index, mark);

        let crossed: Vec<u64> = state
            .book
            .iter()
            .filter(|(_, rest)| rest.ticker_index == tick.ticker_index && crosses(rest, mark))
            .map(|(&order_id, _)| order_id)
            .collect();

        for order_id in crossed {
            if let Some(rest) = state.book.remove(&order_id) {
                debug!(
                    "sim: resting order {} crossed at mark {:.2}",
                    order_id, mark
                );
                send(&state.tx, SimEvent::Traded(traded_rsp(&rest, order_id, mark)));
            }
        }

        send(&state.tx, SimEvent::Tick(tick));
    }

    /// Number of orders resting on the simulated book.
    pub fn open_order_count(&self) -> usize {
        self.state.lock().book.len()
    }
}

impl Default for SimGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn crosses(rest: &RestingOrder, mark: f64) -> bool {
    match rest.direction {
        Direction::Buy => rest.price >= mark,
        Direction::Sell => rest.price <= mark,
    }
}

fn traded_rsp(rest: &RestingOrder, order_id: u64, price: f64) -> OrderTradedRsp {
    OrderTradedRsp {
        engine_order_id: rest.engine_order_id,
        order_id,
        ticker_index: rest.ticker_index,
        direction: rest.direction,
        offset: rest.offset,
        trade_type: TradeType::SecondaryMarket,
        volume: rest.volume,
        price,
    }
}

fn send(tx: &Option<Sender<SimEvent>>, event: SimEvent) {
    if let Some(tx) = tx {
        let _ = tx.send(event);
    }
}

impl Gateway for SimGateway {
    fn login(&self, events: Arc<dyn GatewayEvents>, config: &Config) -> Result<()> {
        let mut state = self.state.lock();
        state.account = Account {
            account_id: config.engine.account_id,
            total_asset: SIM_TOTAL_ASSET,
            cash: SIM_TOTAL_ASSET,
            frozen: 0.0,
            margin: 0.0,
        };

        let (tx, rx) = unbounded::<SimEvent>();
        let worker_events = Arc::clone(&events);
        thread::Builder::new()
            .name("keel-sim-gateway".to_string())
            .spawn(move || {
                while let Ok(event) = rx.recv() {
                    match event {
                        SimEvent::Accepted(rsp) => worker_events.on_order_accepted(rsp),
                        SimEvent::Traded(rsp) => worker_events.on_order_traded(rsp),
                        SimEvent::Canceled(rsp) => worker_events.on_order_canceled(rsp),
                        SimEvent::CancelRejected(rsp) => {
                            worker_events.on_order_cancel_rejected(rsp)
                        }
                        SimEvent::Tick(tick) => worker_events.on_tick(tick),
                    }
                }
            })?;

        state.events = Some(events);
        state.tx = Some(tx);
        info!("sim gateway: logged in as account {}", config.engine.account_id);
        Ok(())
    }

    fn logout(&self) {
        let mut state = self.state.lock();
        // Dropping the sender ends the worker thread
        state.tx = None;
        state.events = None;
        info!("sim gateway: logged out");
    }

    fn send_order(&self, req: &OrderRequest) -> Result<()> {
        let mut state = self.state.lock();
        if state.tx.is_none() {
            anyhow::bail!("sim gateway: not logged in");
        }

        let order_id = state.next_order_id;
        state.next_order_id += 1;

        send(
            &state.tx,
            SimEvent::Accepted(OrderAcceptedRsp {
                engine_order_id: req.engine_order_id,
                order_id,
            }),
        );

        let mark = state.marks.get(&req.contract.index).copied();
        let rest = RestingOrder {
            engine_order_id: req.engine_order_id,
            ticker_index: req.contract.index,
            direction: req.direction,
            offset: req.offset,
            volume: req.volume,
            price: req.price,
        };

        let fill_price = match (req.order_type, mark) {
            // Market orders always trade at the mark (or their own price
            // before the first tick)
            (OrderType::Market, mark) => Some(mark.unwrap_or(req.price)),
            // Priced orders trade when they cross; before the first tick
            // the sim fills instantly at the order price
            (_, Some(mark)) if crosses(&rest, mark) => Some(mark),
            (_, None) => Some(req.price),
            _ => None,
        };

        match fill_price {
            Some(price) => {
                debug!(
                    "sim: order {} fills {} lots at {:.2}",
                    req.engine_order_id, req.volume, price
                );
                send(&state.tx, SimEvent::Traded(traded_rsp(&rest, order_id, price)));
            }
            None => {
                debug!("sim: order {} rests at {:.2}", req.engine_order_id, req.price);
                state.book.insert(order_id, rest);
            }
        }

        Ok(())
    }

    fn cancel_order(&self, order_id: u64) -> Result<()> {
        let mut state = self.state.lock();
        match state.book.remove(&order_id) {
            Some(rest) => {
                send(
                    &state.tx,
                    SimEvent::Canceled(OrderCanceledRsp {
                        engine_order_id: rest.engine_order_id,
                        canceled_volume: rest.volume,
                    }),
                );
            }
            None => {
                warn!("sim: cancel for unknown order id {}", order_id);
                send(
                    &state.tx,
                    SimEvent::CancelRejected(OrderCancelRejectedRsp {
                        engine_order_id: 0,
                        reason: format!("unknown order id {}", order_id),
                    }),
                );
            }
        }
        Ok(())
    }

    fn query_contracts(&self) -> Result<()> {
        let (events, contracts) = {
            let state = self.state.lock();
            (state.events.clone(), state.contracts.clone())
        };
        let events = events.ok_or_else(|| anyhow::anyhow!("sim gateway: not logged in"))?;
        for contract in contracts {
            events.on_query_contract(contract);
        }
        Ok(())
    }

    fn query_account(&self) -> Result<()> {
        let (events, account) = {
            let state = self.state.lock();
            (state.events.clone(), state.account)
        };
        let events = events.ok_or_else(|| anyhow::anyhow!("sim gateway: not logged in"))?;
        events.on_query_account(account);
        Ok(())
    }

    fn query_positions(&self) -> Result<()> {
        // Paper sessions start flat
        Ok(())
    }

    fn query_trades(&self) -> Result<()> {
        // No fills before the session starts
        Ok(())
    }
}
