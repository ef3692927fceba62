//! Risk gate scenarios: rejections never reach the gateway or the
//! registry, and the emergency bypass skips the checks.

mod common;

use common::{new_order_cmd, secondary_fill, setup, setup_with_config, RecordingRule};
use keel_core::config::Config;
use keel_core::core::protocol::CmdOrderReq;
use keel_core::core::types::StrategyId;
use keel_core::gateway::GatewayEvents;
use keel_core::TraderCommand;

fn close_cmd(volume: i32, price: f64) -> TraderCommand {
    TraderCommand::new_order(
        StrategyId::from_name("itest"),
        CmdOrderReq {
            user_order_id: 1,
            ticker_index: 0,
            direction: 2, // sell
            offset: 2,    // close
            order_type: 1,
            volume,
            price,
            flags: 0,
            without_check: 0,
        },
    )
}

#[test]
fn test_volume_limit_rejection_never_reaches_gateway() {
    let (engine, gateway) = setup();
    let (rule, log) = RecordingRule::new();
    engine.add_risk_rule(rule);

    // Contract max_volume is 10_000
    engine.execute_cmd(&new_order_cmd(20_000, 100.0));

    assert!(gateway.sent.lock().is_empty());
    assert_eq!(engine.order_count(), 0);
    // Only the rejection hook fired; the sanity rule rejected before
    // the recording rule's own check ran
    assert_eq!(*log.lock(), vec!["rejected:risk"]);
}

#[test]
fn test_fund_rejection() {
    let (engine, gateway) = setup();

    // 10_000 lots * 200.0 = 2M, over the 1M mock account
    engine.execute_cmd(&new_order_cmd(10_000, 200.0));

    assert!(gateway.sent.lock().is_empty());
    assert_eq!(engine.order_count(), 0);
    assert_eq!(engine.account().frozen, 0.0);
}

#[test]
fn test_position_rejection_on_naked_close() {
    let (engine, gateway) = setup();

    engine.execute_cmd(&close_cmd(5, 100.0));

    assert!(gateway.sent.lock().is_empty());
    assert_eq!(engine.order_count(), 0);
}

#[test]
fn test_close_passes_when_covered() {
    let (engine, gateway) = setup();

    engine.execute_cmd(&new_order_cmd(10, 100.0));
    engine.on_order_traded(secondary_fill(1, 7, 10, 100.0));

    engine.execute_cmd(&close_cmd(5, 100.0));
    assert_eq!(gateway.sent_ids(), vec![1, 2]);
}

#[test]
fn test_off_tick_price_rejected() {
    let (engine, gateway) = setup();

    // tick is 0.5
    engine.execute_cmd(&new_order_cmd(1, 100.3));
    assert!(gateway.sent.lock().is_empty());

    engine.execute_cmd(&new_order_cmd(1, 100.5));
    assert_eq!(gateway.sent_ids(), vec![2]);
}

#[test]
fn test_without_check_bypasses_the_gate() {
    let (engine, gateway) = setup();

    let mut req = CmdOrderReq {
        user_order_id: 1,
        ticker_index: 0,
        direction: 1,
        offset: 1,
        order_type: 1,
        volume: 20_000, // over every limit
        price: 100.0,
        flags: 0,
        without_check: 1,
    };
    engine.execute_cmd(&TraderCommand::new_order(
        StrategyId::from_name("emergency"),
        req,
    ));
    assert_eq!(gateway.sent_ids(), vec![1]);

    // The same order with the check on is refused
    req.without_check = 0;
    engine.execute_cmd(&TraderCommand::new_order(
        StrategyId::from_name("emergency"),
        req,
    ));
    assert_eq!(gateway.sent_ids(), vec![1]);
}

#[test]
fn test_throttle_limits_submission_rate() {
    let mut config = Config::default();
    config.risk.orders_per_sec = 2;
    let (engine, gateway) = setup_with_config(config);

    engine.execute_cmd(&new_order_cmd(1, 100.0));
    engine.execute_cmd(&new_order_cmd(1, 100.0));
    engine.execute_cmd(&new_order_cmd(1, 100.0));

    assert_eq!(gateway.sent_ids(), vec![1, 2]);
}

#[test]
fn test_send_failure_fires_reject_hook_and_keeps_registry_clean() {
    let (engine, gateway) = setup();
    let (rule, log) = RecordingRule::new();
    engine.add_risk_rule(rule);

    gateway
        .fail_send
        .store(true, std::sync::atomic::Ordering::Release);
    engine.execute_cmd(&new_order_cmd(10, 100.0));

    assert_eq!(engine.order_count(), 0);
    assert_eq!(*log.lock(), vec!["check", "rejected:send"]);
    // Nothing was frozen for the failed send
    assert_eq!(engine.account().frozen, 0.0);
}
