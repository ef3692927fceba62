//! Shared fixtures: a recording mock gateway and a recording risk rule.

// Each test binary compiles this module separately and uses a subset.
#![allow(dead_code)]

use anyhow::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use keel_core::config::Config;
use keel_core::core::contract::Contract;
use keel_core::core::order::{Order, OrderRequest};
use keel_core::core::protocol::CmdOrderReq;
use keel_core::core::types::StrategyId;
use keel_core::data::NullPublisher;
use keel_core::engine::TradingEngine;
use keel_core::gateway::{Gateway, GatewayEvents, OrderTradedRsp};
use keel_core::portfolio::Account;
use keel_core::risk::{RiskContext, RiskRule};
use keel_core::{EngineError, RiskRejection, TraderCommand};

pub const MOCK_TOTAL_ASSET: f64 = 1_000_000.0;

/// What the mock saw of one send_order call.
#[derive(Debug, Clone)]
pub struct SentOrder {
    pub engine_order_id: u64,
    pub ticker_index: u32,
    pub volume: i32,
    pub price: f64,
}

/// Gateway double that records calls and delivers bootstrap queries
/// synchronously. Lifecycle callbacks are driven by the tests
/// themselves, which keeps every scenario deterministic.
pub struct MockGateway {
    events: Mutex<Option<Arc<dyn GatewayEvents>>>,
    pub sent: Mutex<Vec<SentOrder>>,
    pub cancels: Mutex<Vec<u64>>,
    pub fail_send: AtomicBool,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            cancels: Mutex::new(Vec::new()),
            fail_send: AtomicBool::new(false),
        })
    }

    pub fn sent_ids(&self) -> Vec<u64> {
        self.sent.lock().iter().map(|s| s.engine_order_id).collect()
    }

    pub fn canceled_ids(&self) -> Vec<u64> {
        self.cancels.lock().clone()
    }
}

pub fn test_contracts() -> Vec<Contract> {
    vec![
        Contract {
            index: 0,
            ticker: "tst001".to_string(),
            name: "Test One".to_string(),
            exchange: "MOCK".to_string(),
            size: 1.0,
            price_tick: 0.5,
            min_volume: 1,
            max_volume: 10_000,
        },
        Contract {
            index: 0,
            ticker: "tst002".to_string(),
            name: "Test Two".to_string(),
            exchange: "MOCK".to_string(),
            size: 1.0,
            price_tick: 0.5,
            min_volume: 1,
            max_volume: 10_000,
        },
    ]
}

impl Gateway for MockGateway {
    fn login(&self, events: Arc<dyn GatewayEvents>, _config: &Config) -> Result<()> {
        *self.events.lock() = Some(events);
        Ok(())
    }

    fn logout(&self) {}

    fn send_order(&self, req: &OrderRequest) -> Result<()> {
        if self.fail_send.load(Ordering::Acquire) {
            anyhow::bail!("mock send failure");
        }
        self.sent.lock().push(SentOrder {
            engine_order_id: req.engine_order_id,
            ticker_index: req.contract.index,
            volume: req.volume,
            price: req.price,
        });
        Ok(())
    }

    fn cancel_order(&self, order_id: u64) -> Result<()> {
        self.cancels.lock().push(order_id);
        Ok(())
    }

    fn query_contracts(&self) -> Result<()> {
        let events = self.events.lock().clone().expect("not logged in");
        for contract in test_contracts() {
            events.on_query_contract(contract);
        }
        Ok(())
    }

    fn query_account(&self) -> Result<()> {
        let events = self.events.lock().clone().expect("not logged in");
        events.on_query_account(Account {
            account_id: 1,
            total_asset: MOCK_TOTAL_ASSET,
            cash: MOCK_TOTAL_ASSET,
            frozen: 0.0,
            margin: 0.0,
        });
        Ok(())
    }

    fn query_positions(&self) -> Result<()> {
        Ok(())
    }

    fn query_trades(&self) -> Result<()> {
        Ok(())
    }
}

/// Risk rule that logs every hook it sees.
pub struct RecordingRule {
    pub log: Arc<Mutex<Vec<String>>>,
}

impl RecordingRule {
    pub fn new() -> (Box<Self>, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Box::new(Self {
                log: Arc::clone(&log),
            }),
            log,
        )
    }
}

impl RiskRule for RecordingRule {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn check_order_req(
        &mut self,
        _order: &Order,
        _ctx: &mut RiskContext<'_>,
    ) -> Result<(), RiskRejection> {
        self.log.lock().push("check".to_string());
        Ok(())
    }

    fn on_order_sent(&mut self, _order: &Order, _ctx: &mut RiskContext<'_>) {
        self.log.lock().push("sent".to_string());
    }

    fn on_order_accepted(&mut self, _order: &Order, _ctx: &mut RiskContext<'_>) {
        self.log.lock().push("accepted".to_string());
    }

    fn on_order_traded(
        &mut self,
        _order: &Order,
        _trade: &OrderTradedRsp,
        _ctx: &mut RiskContext<'_>,
    ) {
        self.log.lock().push("traded".to_string());
    }

    fn on_order_canceled(&mut self, _order: &Order, canceled: i32, _ctx: &mut RiskContext<'_>) {
        self.log.lock().push(format!("canceled:{canceled}"));
    }

    fn on_order_completed(&mut self, _order: &Order, _ctx: &mut RiskContext<'_>) {
        self.log.lock().push("completed".to_string());
    }

    fn on_order_rejected(
        &mut self,
        _order: &Order,
        error: &EngineError,
        _ctx: &mut RiskContext<'_>,
    ) {
        let kind = match error {
            EngineError::RiskRejected(_) => "risk",
            EngineError::SendFailed => "send",
            EngineError::Rejected(_) => "gateway",
            _ => "other",
        };
        self.log.lock().push(format!("rejected:{kind}"));
    }
}

/// Engine logged in against a fresh mock gateway.
pub fn setup() -> (Arc<TradingEngine>, Arc<MockGateway>) {
    setup_with_config(Config::default())
}

pub fn setup_with_config(config: Config) -> (Arc<TradingEngine>, Arc<MockGateway>) {
    let engine = TradingEngine::new(config, Arc::new(NullPublisher));
    let gateway = MockGateway::new();
    engine
        .login_with(Arc::clone(&gateway) as Arc<dyn Gateway>)
        .expect("login against mock");
    (engine, gateway)
}

/// A secondary-market fill on tst001 (buy open).
pub fn secondary_fill(
    engine_order_id: u64,
    order_id: u64,
    volume: i32,
    price: f64,
) -> OrderTradedRsp {
    use keel_core::core::types::{Direction, Offset, TradeType};
    OrderTradedRsp {
        engine_order_id,
        order_id,
        ticker_index: 0,
        direction: Direction::Buy,
        offset: Offset::Open,
        trade_type: TradeType::SecondaryMarket,
        volume,
        price,
    }
}

/// A plain limit order command on tst001.
pub fn new_order_cmd(volume: i32, price: f64) -> TraderCommand {
    new_order_cmd_on(0, volume, price)
}

pub fn new_order_cmd_on(ticker_index: u32, volume: i32, price: f64) -> TraderCommand {
    TraderCommand::new_order(
        StrategyId::from_name("itest"),
        CmdOrderReq {
            user_order_id: 1,
            ticker_index,
            direction: 1, // buy
            offset: 1,    // open
            order_type: 1,
            volume,
            price,
            flags: 0,
            without_check: 0,
        },
    )
}
