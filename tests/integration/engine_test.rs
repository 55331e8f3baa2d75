//! Engine behavior over whole runs, on virtual time

use crate::support::{bought, quote, session, sold, Harness, VenueCall};
use martingale_bot::engine::{EngineEvent, Phase, RunId};
use martingale_bot::market::DEFAULT_MARKETS;
use martingale_bot::strategy::StartOverrides;
use martingale_bot::venue::{VenueEvent, VenueMessage};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

fn harness(markets: &[&str]) -> Harness {
    Harness::new(session(dec!(100), dec!(2), dec!(-50), dec!(1000)), markets)
}

#[tokio::test(start_paused = true)]
async fn test_single_loss_hits_stop_loss() {
    let mut h = harness(&["R_10", "R_25"]);
    h.start_trading(&["R_10"]).await;

    let buys = h.buys();
    assert_eq!(buys.len(), 1);
    assert_eq!(buys[0].1.symbol, "R_10");
    assert_eq!(buys[0].1.amount, dec!(100));

    h.venue_message(bought("1001", "R_10"));
    h.drain_statuses();
    h.venue_message(sold("1001", "R_10", dec!(-60)));

    let statuses = h.drain_statuses();
    assert_eq!(
        statuses,
        vec![
            "🏁 Closed R_10 | P/L: $-60.00 | Net: $-60.00".to_string(),
            "Martingale applied. New stake: $200.00".to_string(),
            "❌ Stop loss reached. Stopping bot.".to_string(),
            "🛑 Bot stopped".to_string(),
        ]
    );
    assert_eq!(h.snapshot().phase, Phase::Idle);
    assert_eq!(h.calls().last().map(|(_, c)| c.clone()), Some(VenueCall::Disconnect));

    // Nothing from the stopped run fires afterwards
    h.run_for(Duration::from_secs(30)).await;
    assert_eq!(h.buys().len(), 1);
    assert!(h.drain_statuses().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_probe_keeps_first_successes_in_order() {
    let mut h = harness(&DEFAULT_MARKETS);
    h.start();
    h.authorize();

    let probed: Vec<String> = h.proposals().into_iter().map(|p| p.symbol).collect();
    assert_eq!(probed, DEFAULT_MARKETS.to_vec());
    assert!(h.proposals().iter().all(|p| p.amount == dec!(100)));

    h.venue_message(quote("R_50", true));
    h.venue_message(quote("R_25", false));
    h.venue_message(quote("R_10", true));
    h.venue_message(quote("R_50", true));
    h.venue_message(quote("R_100_1s", true));
    h.venue_message(quote("NOT_PROBED", true));

    h.run_for(Duration::from_millis(5_010)).await;

    let snapshot = h.snapshot();
    assert_eq!(snapshot.tradable, vec!["R_50", "R_10", "R_100_1s"]);
    assert_eq!(snapshot.cycle, 1);
    assert_eq!(snapshot.phase, Phase::CycleActive);

    let tradable_lines = h
        .drain_statuses()
        .into_iter()
        .filter(|s| s.starts_with("🟢 Market tradable"))
        .count();
    assert_eq!(tradable_lines, 3);
}

#[tokio::test(start_paused = true)]
async fn test_late_quote_after_window_ignored() {
    let mut h = harness(&["R_10", "R_25"]);
    h.start_trading(&["R_10"]).await;

    h.venue_message(quote("R_25", true));
    assert_eq!(h.snapshot().tradable, vec!["R_10"]);
}

#[tokio::test(start_paused = true)]
async fn test_empty_probe_retries_after_delay() {
    let mut h = harness(&["R_10", "R_25"]);
    h.start();
    h.authorize();
    assert_eq!(h.proposals().len(), 2);

    h.run_for(Duration::from_millis(5_500)).await;
    assert!(h
        .drain_statuses()
        .contains(&"⚠️ No tradable markets found, retrying...".to_string()));
    assert_eq!(h.snapshot().phase, Phase::Probing);

    // Retry is due 10s after the window closed, at t=15s
    h.run_for(Duration::from_secs(9)).await;
    assert_eq!(h.proposals().len(), 2);

    h.run_for(Duration::from_secs(1)).await;
    assert_eq!(h.proposals().len(), 4);

    h.venue_message(quote("R_25", true));
    h.run_for(Duration::from_secs(5)).await;
    assert_eq!(h.snapshot().tradable, vec!["R_25"]);
    assert_eq!(h.snapshot().cycle, 1);
}

#[tokio::test(start_paused = true)]
async fn test_buys_are_staggered() {
    let mut h = harness(&["R_10", "R_25", "R_50"]);
    h.start_trading(&["R_10", "R_25", "R_50"]).await;
    h.run_for(Duration::from_secs(1)).await;

    let buys = h.buys();
    let symbols: Vec<&str> = buys.iter().map(|(_, p)| p.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["R_10", "R_25", "R_50"]);

    let first = buys[0].0;
    let second = buys[1].0 - first;
    let third = buys[2].0 - first;
    assert!(second >= Duration::from_millis(200) && second < Duration::from_millis(250));
    assert!(third >= Duration::from_millis(400) && third < Duration::from_millis(450));
}

#[tokio::test(start_paused = true)]
async fn test_martingale_carries_into_next_cycle() {
    let mut h = harness(&["R_10"]);
    h.start_with(StartOverrides {
        stop_loss: Some(serde_json::json!(-1000)),
        ..StartOverrides::default()
    });
    h.authorize();
    h.venue_message(quote("R_10", true));
    h.run_for(Duration::from_millis(5_050)).await;

    h.venue_message(bought("1", "R_10"));
    h.venue_message(sold("1", "R_10", dec!(-100)));
    assert_eq!(h.snapshot().stake, dec!(200));

    h.run_for(Duration::from_millis(10_100)).await;
    assert_eq!(h.snapshot().cycle, 2);
    assert_eq!(h.buys().last().unwrap().1.amount, dec!(200));

    h.venue_message(bought("2", "R_10"));
    h.venue_message(sold("2", "R_10", dec!(190)));
    assert!(h.drain_statuses().contains(&"Stake reset to base.".to_string()));

    h.run_for(Duration::from_millis(10_100)).await;
    assert_eq!(h.snapshot().cycle, 3);
    assert_eq!(h.buys().last().unwrap().1.amount, dec!(100));
    assert_eq!(h.snapshot().net_profit, dec!(90));
}

#[tokio::test(start_paused = true)]
async fn test_one_next_cycle_per_cycle() {
    let mut h = harness(&["R_10", "R_25"]);
    h.start_trading(&["R_10", "R_25"]).await;
    h.run_for(Duration::from_millis(300)).await;

    h.venue_message(bought("a", "R_10"));
    h.venue_message(bought("b", "R_25"));
    h.venue_message(sold("a", "R_10", dec!(10)));
    h.venue_message(sold("b", "R_25", dec!(10)));

    h.run_for(Duration::from_millis(10_500)).await;
    assert_eq!(h.snapshot().cycle, 2);
    assert_eq!(h.buys().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_take_profit_stops_run() {
    let mut h = Harness::new(session(dec!(100), dec!(2), dec!(-1000), dec!(150)), &["R_10"]);
    h.start_trading(&["R_10"]).await;

    h.venue_message(bought("7", "R_10"));
    h.venue_message(sold("7", "R_10", dec!(150)));

    let statuses = h.drain_statuses();
    assert!(statuses.contains(&"🏆 Take profit reached. Stopping bot.".to_string()));
    assert_eq!(statuses.last().map(String::as_str), Some("🛑 Bot stopped"));
    assert!(!h.engine.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let mut h = harness(&["R_10"]);
    h.stop();
    assert!(h.drain_statuses().is_empty());

    h.start();
    h.stop();
    h.stop();

    let stopped = h
        .drain_statuses()
        .into_iter()
        .filter(|s| s == "🛑 Bot stopped")
        .count();
    assert_eq!(stopped, 1);
    assert_eq!(h.count_calls(&VenueCall::Disconnect), 1);
    assert_eq!(h.snapshot().phase, Phase::Idle);
    assert_eq!(h.snapshot().net_profit, Decimal::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_start_while_running_is_ignored() {
    let mut h = harness(&["R_10"]);
    h.start();
    h.start();

    let connects = h
        .calls()
        .iter()
        .filter(|(_, c)| matches!(c, VenueCall::Connect { .. }))
        .count();
    assert_eq!(connects, 1);
    assert_eq!(h.current_run(), RunId::new(1));
}

#[tokio::test(start_paused = true)]
async fn test_watchdog_evicts_and_late_settlement_not_counted() {
    let mut h = harness(&["R_10"]);
    h.start_trading(&["R_10"]).await;
    h.venue_message(bought("1001", "R_10"));
    assert_eq!(h.snapshot().open_contracts, 1);

    // Bought at ~5s; first sweep past 15s of age is the one at 25s
    h.run_for(Duration::from_secs(15)).await;
    assert_eq!(h.snapshot().open_contracts, 1);
    h.run_for(Duration::from_secs(6)).await;
    assert_eq!(h.snapshot().open_contracts, 0);
    assert!(h
        .drain_statuses()
        .contains(&"⏰ Contract 1001 timeout removed".to_string()));

    h.venue_message(sold("1001", "R_10", dec!(-60)));
    assert_eq!(h.snapshot().net_profit, Decimal::ZERO);
    assert!(h.engine.is_running());
    assert!(!h.drain_statuses().iter().any(|s| s.starts_with("🏁")));
}

#[tokio::test(start_paused = true)]
async fn test_authorization_failure_stops_run() {
    let mut h = harness(&["R_10"]);
    h.start();
    h.venue_event(VenueEvent::Connected);
    h.venue_message(VenueMessage::AuthorizeFailed {
        message: "The token is invalid.".to_string(),
    });

    let statuses = h.drain_statuses();
    assert!(statuses.contains(&"ERROR: Authorization failed - The token is invalid.".to_string()));
    assert_eq!(statuses.last().map(String::as_str), Some("🛑 Bot stopped"));
    assert!(h.proposals().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_events_from_previous_run_ignored() {
    let mut h = harness(&["R_10"]);
    h.start();
    h.stop();
    h.start();
    assert_eq!(h.current_run(), RunId::new(2));

    h.engine.handle(EngineEvent::Venue {
        run: RunId::new(1),
        event: VenueEvent::Message(VenueMessage::Authorized {
            balance: dec!(10),
            currency: None,
        }),
    });
    assert!(h.proposals().is_empty());

    h.run_for(Duration::from_secs(30)).await;
    assert!(h.proposals().is_empty());
    assert_eq!(h.snapshot().phase, Phase::Probing);
}

#[tokio::test(start_paused = true)]
async fn test_reauthorize_after_reconnect_keeps_trading() {
    let mut h = harness(&["R_10"]);
    h.start_trading(&["R_10"]).await;
    let proposals = h.proposals().len();
    h.drain_statuses();

    h.venue_event(VenueEvent::Reconnecting {
        attempt: 1,
        delay: Duration::from_secs(5),
    });
    h.authorize();

    assert_eq!(h.proposals().len(), proposals);
    assert_eq!(h.snapshot().cycle, 1);
    let statuses = h.drain_statuses();
    assert_eq!(statuses[0], "🔌 Deriv WS disconnected - reconnecting...");
    assert!(statuses.contains(&"✅ Authorized. Balance: $10000.00".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_and_malformed_do_not_stop() {
    let mut h = harness(&["R_10"]);
    h.start_trading(&["R_10"]).await;
    h.drain_statuses();

    h.venue_event(VenueEvent::TransportError("connection reset".to_string()));
    h.venue_event(VenueEvent::Malformed("expected value".to_string()));

    assert_eq!(
        h.drain_statuses(),
        vec![
            "ERROR: Deriv WS error - connection reset".to_string(),
            "ERROR: Invalid message from Deriv WS".to_string(),
        ]
    );
    assert!(h.engine.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_control_disconnect_stops_run() {
    let mut h = harness(&["R_10"]);
    h.start();
    h.engine.handle(EngineEvent::ControlDisconnected);
    assert!(!h.engine.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_invalid_overrides_keep_previous_values() {
    let mut h = harness(&["R_10"]);
    let overrides: StartOverrides = serde_json::from_value(serde_json::json!({
        "baseStake": "lots",
        "martingaleMultiplier": "3",
        "duration": "",
        "apiToken": "fresh-token",
    }))
    .unwrap();
    h.start_with(overrides);

    let settings = h.engine.settings();
    assert_eq!(settings.base_stake, dec!(100));
    assert_eq!(settings.martingale_multiplier, dec!(3));
    assert_eq!(settings.duration, 2);
    assert_eq!(
        h.calls()[0].1,
        VenueCall::Connect {
            run: RunId::new(1),
            token: "fresh-token".to_string()
        }
    );

    // The next start builds on what this one configured
    h.stop();
    h.start();
    assert_eq!(h.engine.settings().martingale_multiplier, dec!(3));
}

#[tokio::test(start_paused = true)]
async fn test_balance_refresh_after_settlement_window() {
    let mut h = harness(&["R_10"]);
    h.start_trading(&["R_10"]).await;

    h.run_for(Duration::from_secs(10)).await;
    assert_eq!(h.snapshot().phase, Phase::Evaluating);
    assert!(h
        .requests()
        .iter()
        .any(|r| r.kind() == "balance"));

    h.venue_message(VenueMessage::Balance { balance: dec!(9950.5) });
    assert!(h
        .drain_statuses()
        .contains(&"💰 Balance: $9950.50".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_huge_multiplier_saturates_stake() {
    let mut h = harness(&["R_10"]);
    let overrides: StartOverrides = serde_json::from_value(serde_json::json!({
        "martingaleMultiplier": "1e25",
        "stopLoss": -1000,
    }))
    .unwrap();
    h.start_with(overrides);
    h.authorize();
    h.venue_message(quote("R_10", true));
    h.run_for(Duration::from_millis(5_050)).await;

    h.venue_message(bought("a", "R_10"));
    h.venue_message(sold("a", "R_10", dec!(-1)));
    assert_eq!(h.snapshot().stake, dec!(10000));

    h.run_for(Duration::from_millis(10_100)).await;
    h.venue_message(bought("b", "R_10"));
    h.venue_message(sold("b", "R_10", dec!(-1)));

    assert!(h.engine.is_running());
    assert_eq!(h.snapshot().stake, dec!(10000));
    assert_eq!(h.snapshot().net_profit, dec!(-2));
}

#[tokio::test(start_paused = true)]
async fn test_profit_overflow_reported_and_run_continues() {
    let huge = Decimal::from_i128_with_scale(5 * 10i128.pow(28), 0);
    let mut h = Harness::new(session(dec!(100), dec!(2), dec!(-1000), Decimal::MAX), &["R_10", "R_25"]);
    h.start_trading(&["R_10", "R_25"]).await;
    h.run_for(Duration::from_millis(300)).await;

    h.venue_message(bought("a", "R_10"));
    h.venue_message(bought("b", "R_25"));
    h.venue_message(sold("a", "R_10", huge));
    h.drain_statuses();
    h.venue_message(sold("b", "R_25", huge));

    assert_eq!(
        h.drain_statuses(),
        vec!["ERROR: Settlement for contract b ignored - profit out of range".to_string()]
    );
    assert!(h.engine.is_running());
    assert_eq!(h.snapshot().net_profit, huge);
    assert_eq!(h.snapshot().open_contracts, 0);

    h.run_for(Duration::from_millis(10_500)).await;
    assert_eq!(h.snapshot().cycle, 2);
}
