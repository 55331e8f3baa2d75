//! Shared harness: the engine driven on tokio's paused clock against a
//! venue that only records what it is asked to do

use martingale_bot::control::{ControlCommand, StatusReporter};
use martingale_bot::engine::{CycleEngine, EngineEvent, EngineSnapshot, RunId, Timings};
use martingale_bot::strategy::{SessionConfig, StartOverrides};
use martingale_bot::venue::{
    ContractId, ContractParameters, ContractUpdate, VenueError, VenueEvent, VenueLink,
    VenueMessage, VenueRequest,
};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum VenueCall {
    Connect { run: RunId, token: String },
    Send(VenueRequest),
    Disconnect,
}

#[derive(Clone, Default)]
pub struct RecordingVenue {
    calls: Arc<Mutex<Vec<(Instant, VenueCall)>>>,
    connected: bool,
}

impl RecordingVenue {
    fn push(&self, call: VenueCall) {
        self.calls.lock().unwrap().push((Instant::now(), call));
    }
}

impl VenueLink for RecordingVenue {
    fn connect(&mut self, run: RunId, token: &str) {
        self.connected = true;
        self.push(VenueCall::Connect {
            run,
            token: token.to_string(),
        });
    }

    fn send(&mut self, request: &VenueRequest) -> Result<(), VenueError> {
        if !self.connected {
            return Err(VenueError::NotConnected);
        }
        self.push(VenueCall::Send(request.clone()));
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            self.push(VenueCall::Disconnect);
        }
    }
}

pub fn session(base_stake: Decimal, multiplier: Decimal, stop_loss: Decimal, take_profit: Decimal) -> SessionConfig {
    SessionConfig {
        api_token: "test-token".to_string(),
        base_stake,
        martingale_multiplier: multiplier,
        stop_loss,
        take_profit,
        ..SessionConfig::default()
    }
}

pub fn sold(id: &str, symbol: &str, profit: Decimal) -> VenueMessage {
    VenueMessage::Contract(ContractUpdate {
        contract_id: ContractId::new(id),
        underlying: Some(symbol.to_string()),
        is_sold: true,
        profit: Some(profit),
    })
}

pub fn bought(id: &str, symbol: &str) -> VenueMessage {
    VenueMessage::Bought {
        contract_id: ContractId::new(id),
        symbol: symbol.to_string(),
    }
}

pub fn quote(symbol: &str, ok: bool) -> VenueMessage {
    VenueMessage::Proposal {
        symbol: symbol.to_string(),
        ok,
    }
}

pub struct Harness {
    pub engine: CycleEngine<RecordingVenue>,
    events: mpsc::Receiver<EngineEvent>,
    calls: Arc<Mutex<Vec<(Instant, VenueCall)>>>,
    statuses: broadcast::Receiver<String>,
}

impl Harness {
    pub fn new(settings: SessionConfig, markets: &[&str]) -> Self {
        let (tx, events) = mpsc::channel(256);
        let venue = RecordingVenue::default();
        let calls = venue.calls.clone();
        let status = StatusReporter::new(1024);
        let statuses = status.subscribe();

        let engine = CycleEngine::new(
            settings,
            markets.iter().map(|m| m.to_string()).collect(),
            Timings::default(),
            venue,
            status,
            tx,
        );

        Self {
            engine,
            events,
            calls,
            statuses,
        }
    }

    pub fn start(&mut self) {
        self.start_with(StartOverrides::default());
    }

    pub fn start_with(&mut self, overrides: StartOverrides) {
        self.engine
            .handle(EngineEvent::Control(ControlCommand::Start(overrides)));
    }

    pub fn stop(&mut self) {
        self.engine.handle(EngineEvent::Control(ControlCommand::Stop));
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.engine.snapshot()
    }

    pub fn current_run(&self) -> RunId {
        self.snapshot().run.expect("no active run")
    }

    pub fn venue_event(&mut self, event: VenueEvent) {
        let run = self.current_run();
        self.engine.handle(EngineEvent::Venue { run, event });
    }

    pub fn venue_message(&mut self, message: VenueMessage) {
        self.venue_event(VenueEvent::Message(message));
    }

    /// Transport up and authorized; this kicks off probing
    pub fn authorize(&mut self) {
        self.venue_event(VenueEvent::Connected);
        self.venue_message(VenueMessage::Authorized {
            balance: Decimal::new(1000000, 2),
            currency: Some("USD".to_string()),
        });
    }

    /// Authorize, answer the probe with `ok` markets, and let the window close
    pub async fn start_trading(&mut self, ok: &[&str]) {
        self.start();
        self.authorize();
        for symbol in ok {
            self.venue_message(quote(symbol, true));
        }
        self.run_for(Duration::from_millis(5_050)).await;
    }

    /// Feed queued events to the engine while virtual time advances
    pub async fn run_for(&mut self, duration: Duration) {
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                Some(event) = self.events.recv() => self.engine.handle(event),
                _ = &mut deadline => break,
            }
        }
    }

    pub fn calls(&self) -> Vec<(Instant, VenueCall)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<VenueRequest> {
        self.calls()
            .into_iter()
            .filter_map(|(_, call)| match call {
                VenueCall::Send(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn proposals(&self) -> Vec<ContractParameters> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                VenueRequest::Proposal(p) => Some(p.parameters),
                _ => None,
            })
            .collect()
    }

    pub fn buys(&self) -> Vec<(Instant, ContractParameters)> {
        self.calls()
            .into_iter()
            .filter_map(|(at, call)| match call {
                VenueCall::Send(VenueRequest::Buy(b)) => Some((at, b.parameters)),
                _ => None,
            })
            .collect()
    }

    pub fn count_calls(&self, wanted: &VenueCall) -> usize {
        self.calls().iter().filter(|(_, c)| c == wanted).count()
    }

    /// Status lines reported since the last drain
    pub fn drain_statuses(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = self.statuses.try_recv() {
            lines.push(line);
        }
        lines
    }
}
