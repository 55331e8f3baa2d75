//! The trading-cycle state machine

use super::{EngineEvent, Phase, RunContext, RunId, Scheduler, Timer, Timings};
use crate::control::{ControlCommand, StatusReporter};
use crate::ledger::ContractLedger;
use crate::market::{MarketProber, ProbeOutcome};
use crate::strategy::{SessionConfig, StartOverrides};
use crate::telemetry::{self, CounterMetric, GaugeMetric};
use crate::venue::{
    ContractParameters, ContractUpdate, VenueEvent, VenueLink, VenueMessage, VenueRequest,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Point-in-time view of the engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub run: Option<RunId>,
    pub phase: Phase,
    pub cycle: u64,
    pub net_profit: Decimal,
    pub stake: Decimal,
    pub tradable: Vec<String>,
    pub open_contracts: usize,
}

/// Drives runs: probing, staggered buys, settlement, martingale, stop checks
pub struct CycleEngine<V: VenueLink> {
    /// Last configured session values; start overrides are merged onto these
    settings: SessionConfig,
    markets: Vec<String>,
    timings: Timings,
    venue: V,
    status: StatusReporter,
    scheduler: Scheduler,
    run: Option<RunContext>,
    runs_started: u64,
}

impl<V: VenueLink> CycleEngine<V> {
    /// `events` must feed the receiver later passed to [`CycleEngine::run`]
    pub fn new(
        settings: SessionConfig,
        markets: Vec<String>,
        timings: Timings,
        venue: V,
        status: StatusReporter,
        events: mpsc::Sender<EngineEvent>,
    ) -> Self {
        Self {
            settings,
            markets,
            timings,
            venue,
            status,
            scheduler: Scheduler::new(events),
            run: None,
            runs_started: 0,
        }
    }

    /// Process events until the queue closes
    pub async fn run(mut self, mut events: mpsc::Receiver<EngineEvent>) {
        tracing::info!(markets = self.markets.len(), "Cycle engine ready");
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        self.stop();
    }

    pub fn handle(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Control(ControlCommand::Start(overrides)) => self.start(&overrides),
            EngineEvent::Control(ControlCommand::Stop) => self.stop(),
            EngineEvent::ControlDisconnected => {
                tracing::info!("Control client disconnected");
                self.stop();
            }
            EngineEvent::Venue { run, event } => {
                if self.is_current(run) {
                    self.on_venue(event);
                } else {
                    tracing::debug!(%run, ?event, "Dropping venue event from a finished run");
                }
            }
            EngineEvent::Timer { run, timer } => {
                if self.is_current(run) {
                    self.on_timer(timer);
                } else {
                    tracing::trace!(%run, ?timer, "Dropping stale timer");
                }
            }
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        match &self.run {
            Some(run) => EngineSnapshot {
                run: Some(run.id),
                phase: run.phase,
                cycle: run.cycle,
                net_profit: run.net_profit,
                stake: run.stake,
                tradable: run.tradable.clone(),
                open_contracts: run.ledger.len(),
            },
            None => EngineSnapshot {
                run: None,
                phase: Phase::Idle,
                cycle: 0,
                net_profit: Decimal::ZERO,
                stake: Decimal::ZERO,
                tradable: Vec::new(),
                open_contracts: 0,
            },
        }
    }

    /// Session values the next start will build on
    pub fn settings(&self) -> &SessionConfig {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    fn is_current(&self, run: RunId) -> bool {
        self.run.as_ref().is_some_and(|r| r.id == run)
    }

    fn start(&mut self, overrides: &StartOverrides) {
        if let Some(run) = &self.run {
            tracing::debug!(run = %run.id, "Start ignored, already running");
            return;
        }

        let config = self.settings.with_overrides(overrides);
        self.settings = config.clone();
        self.runs_started += 1;
        let id = RunId::new(self.runs_started);
        tracing::info!(run = %id, ?config, "Starting run");

        let run = RunContext::new(
            id,
            config,
            MarketProber::new(self.markets.clone()),
            ContractLedger::with_timeout(self.timings.contract_timeout),
        );
        self.venue.connect(id, &run.config.api_token);
        self.scheduler
            .schedule(id, run.token(), self.timings.watchdog_interval, Timer::Watchdog);
        telemetry::set_gauge(GaugeMetric::NetProfit, 0.0);
        telemetry::set_gauge(GaugeMetric::Stake, decimal_f64(run.stake));
        self.run = Some(run);

        self.status.report("🤖 Bot started");
    }

    /// End the current run; a no-op when idle
    pub fn stop(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };
        tracing::info!(
            run = %run.id,
            cycles = run.cycle,
            net_profit = %run.net_profit,
            open_contracts = run.ledger.len(),
            "Stopping run"
        );
        drop(run);
        self.venue.disconnect();
        telemetry::set_gauge(GaugeMetric::OpenContracts, 0.0);

        self.status.report("🛑 Bot stopped");
    }

    fn on_venue(&mut self, event: VenueEvent) {
        match event {
            VenueEvent::Connected => self.status.report("⏳ Authorizing with Deriv API..."),
            VenueEvent::Message(message) => self.on_message(message),
            VenueEvent::Malformed(error) => {
                tracing::warn!(%error, "Malformed venue message");
                self.status.report("ERROR: Invalid message from Deriv WS");
            }
            VenueEvent::TransportError(error) => {
                self.status
                    .report(format!("ERROR: Deriv WS error - {}", error));
            }
            VenueEvent::Reconnecting { attempt, delay } => {
                telemetry::increment(CounterMetric::Reconnects);
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "Venue reconnect scheduled");
                self.status.report("🔌 Deriv WS disconnected - reconnecting...");
            }
            VenueEvent::Ended => tracing::warn!("Venue session ended"),
        }
    }

    fn on_message(&mut self, message: VenueMessage) {
        match message {
            VenueMessage::Authorized { balance, currency } => {
                tracing::info!(%balance, ?currency, "Authorized");
                self.status
                    .report(format!("✅ Authorized. Balance: ${:.2}", balance));

                // Re-authorizing after a reconnect must not restart discovery
                let needs_probe = self.run.as_ref().is_some_and(|r| {
                    r.phase == Phase::Probing && !r.prober.is_open() && !r.probe_retry_pending
                });
                if needs_probe {
                    self.begin_probe();
                }
            }
            VenueMessage::AuthorizeFailed { message } => {
                self.status
                    .report(format!("ERROR: Authorization failed - {}", message));
                self.stop();
            }
            VenueMessage::Proposal { symbol, ok } => {
                let Some(run) = self.run.as_mut() else {
                    return;
                };
                if run.prober.observe(&symbol, ok) {
                    self.status.report(format!("🟢 Market tradable: {}", symbol));
                }
            }
            VenueMessage::Bought {
                contract_id,
                symbol,
            } => {
                let Some(run) = self.run.as_mut() else {
                    return;
                };
                if !run.is_trading() {
                    tracing::debug!(%contract_id, "Buy confirmation outside a cycle ignored");
                    return;
                }
                run.ledger.record(contract_id.clone(), Instant::now());
                telemetry::increment(CounterMetric::ContractsBought);
                telemetry::set_gauge(GaugeMetric::OpenContracts, run.ledger.len() as f64);
                self.status.report(format!(
                    "🎯 Bought contract on {} | ID: {}",
                    symbol, contract_id
                ));
            }
            VenueMessage::BuyFailed { symbol, message } => {
                self.status.report(format!(
                    "ERROR: Buy failed on {} - {}",
                    symbol.as_deref().unwrap_or("unknown"),
                    message
                ));
            }
            VenueMessage::Contract(update) => {
                if update.is_sold {
                    self.on_settlement(update);
                }
            }
            VenueMessage::Balance { balance } => {
                self.status.report(format!("💰 Balance: ${:.2}", balance));
            }
            VenueMessage::Error { msg_type, message } => {
                self.status
                    .report(format!("ERROR: {} failed - {}", msg_type, message));
            }
            VenueMessage::Unknown { msg_type } => {
                tracing::debug!(msg_type, "Ignoring venue message");
            }
        }
    }

    fn on_settlement(&mut self, update: ContractUpdate) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        let settlement = match run.settle(&update) {
            Ok(Some(settlement)) => settlement,
            Ok(None) => {
                tracing::debug!(contract_id = %update.contract_id, "Settlement for untracked contract ignored");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Settlement dropped");
                telemetry::set_gauge(GaugeMetric::OpenContracts, run.ledger.len() as f64);
                self.status.report(format!(
                    "ERROR: Settlement for contract {} ignored - profit out of range",
                    e.contract_id
                ));
                self.schedule_next_cycle();
                return;
            }
        };

        telemetry::increment(CounterMetric::ContractsSettled);
        telemetry::set_gauge(GaugeMetric::NetProfit, decimal_f64(settlement.net_profit));
        telemetry::set_gauge(GaugeMetric::Stake, decimal_f64(settlement.stake));
        telemetry::set_gauge(GaugeMetric::OpenContracts, run.ledger.len() as f64);

        self.status.report(format!(
            "🏁 Closed {} | P/L: ${:.2} | Net: ${:.2}",
            settlement.underlying, settlement.profit, settlement.net_profit
        ));
        if settlement.loss {
            self.status.report(format!(
                "Martingale applied. New stake: ${:.2}",
                settlement.stake
            ));
        } else {
            self.status.report("Stake reset to base.");
        }

        match settlement.halt {
            Some(reason) => {
                tracing::info!(?reason, "Stop condition met");
                self.status.report(reason.status_line());
                self.stop();
            }
            None => self.schedule_next_cycle(),
        }
    }

    fn schedule_next_cycle(&mut self) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        // One next cycle per cycle; later settlements in the same cycle do
        // not stack further timers
        if !run.next_cycle_pending {
            run.next_cycle_pending = true;
            self.scheduler.schedule(
                run.id,
                run.token(),
                self.timings.next_cycle_delay,
                Timer::NextCycle,
            );
        }
    }

    fn on_timer(&mut self, timer: Timer) {
        match timer {
            Timer::ProbeWindowClosed => self.finish_probe(),
            Timer::ProbeRetry => {
                if let Some(run) = self.run.as_mut() {
                    run.probe_retry_pending = false;
                }
                self.begin_probe();
            }
            Timer::PlaceBuy { cycle, symbol } => self.place_buy(cycle, &symbol),
            Timer::SettlementWindow { cycle } => self.close_settlement_window(cycle),
            Timer::NextCycle => {
                if let Some(run) = self.run.as_mut() {
                    run.next_cycle_pending = false;
                }
                self.start_cycle();
            }
            Timer::Watchdog => self.sweep_ledger(),
        }
    }

    fn begin_probe(&mut self) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        if run.phase != Phase::Probing {
            return;
        }

        let requests = run.prober.begin(&run.config, run.stake);
        tracing::info!(
            run = %run.id,
            attempt = run.prober.attempts(),
            markets = requests.len(),
            "Probing markets"
        );
        for request in &requests {
            send_request(&mut self.venue, &self.status, request);
        }
        self.scheduler
            .schedule(run.id, run.token(), self.timings.probe_window, Timer::ProbeWindowClosed);
    }

    fn finish_probe(&mut self) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        if run.phase != Phase::Probing || !run.prober.is_open() {
            return;
        }

        match run.prober.finish() {
            ProbeOutcome::Empty => {
                self.status
                    .report("⚠️ No tradable markets found, retrying...");
                run.probe_retry_pending = true;
                self.scheduler
                    .schedule(run.id, run.token(), self.timings.probe_retry, Timer::ProbeRetry);
            }
            ProbeOutcome::Tradable(markets) => {
                tracing::info!(run = %run.id, ?markets, "Tradable markets found");
                telemetry::set_gauge(GaugeMetric::TradableMarkets, markets.len() as f64);
                run.tradable = markets;
                self.start_cycle();
            }
        }
    }

    fn start_cycle(&mut self) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        if run.tradable.is_empty() {
            return;
        }

        run.cycle += 1;
        run.phase = Phase::CycleActive;
        run.ledger.clear();
        telemetry::increment(CounterMetric::Cycles);
        self.status.report(format!("♻️ Starting cycle {}", run.cycle));

        for (idx, symbol) in run.tradable.iter().enumerate() {
            self.scheduler.schedule(
                run.id,
                run.token(),
                self.timings.buy_stagger * idx as u32,
                Timer::PlaceBuy {
                    cycle: run.cycle,
                    symbol: symbol.clone(),
                },
            );
        }
        self.scheduler.schedule(
            run.id,
            run.token(),
            self.timings.settlement_window,
            Timer::SettlementWindow { cycle: run.cycle },
        );
    }

    fn place_buy(&mut self, cycle: u64, symbol: &str) {
        let Some(run) = self.run.as_ref() else {
            return;
        };
        if run.cycle != cycle || !run.is_trading() {
            tracing::debug!(cycle, symbol, "Buy for a past cycle skipped");
            return;
        }

        // Stake is read at send time, after any settlement since cycle start
        let request = VenueRequest::buy(ContractParameters::for_symbol(&run.config, run.stake, symbol));
        send_request(&mut self.venue, &self.status, &request);
    }

    fn close_settlement_window(&mut self, cycle: u64) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        if run.cycle != cycle || run.phase != Phase::CycleActive {
            return;
        }

        run.phase = Phase::Evaluating;
        tracing::debug!(
            run = %run.id,
            cycle,
            open_contracts = run.ledger.len(),
            "Settlement window closed"
        );
        send_request(&mut self.venue, &self.status, &VenueRequest::balance());
    }

    fn sweep_ledger(&mut self) {
        let Some(run) = self.run.as_mut() else {
            return;
        };

        for id in run.ledger.sweep(Instant::now()) {
            telemetry::increment(CounterMetric::ContractsEvicted);
            self.status
                .report(format!("⏰ Contract {} timeout removed", id));
        }
        self.scheduler
            .schedule(run.id, run.token(), self.timings.watchdog_interval, Timer::Watchdog);
    }
}

fn send_request<V: VenueLink>(venue: &mut V, status: &StatusReporter, request: &VenueRequest) {
    if let Err(e) = venue.send(request) {
        tracing::warn!(kind = request.kind(), error = %e, "Venue request not sent");
        status.report(format!("ERROR: Failed to send {} request - {}", request.kind(), e));
    }
}

fn decimal_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}
