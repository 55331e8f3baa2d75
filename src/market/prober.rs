//! Trial-quote probing of candidate markets

use crate::strategy::SessionConfig;
use crate::venue::{ContractParameters, VenueRequest};
use rust_decimal::Decimal;
use std::time::Duration;

/// How long proposal replies are collected
pub const PROBE_WINDOW: Duration = Duration::from_secs(5);

/// Delay before probing again when nothing was tradable
pub const PROBE_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Result of a closed probe window
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Markets in order of their first successful quote
    Tradable(Vec<String>),
    Empty,
}

/// Collects the tradable set for one probe window
#[derive(Debug, Clone)]
pub struct MarketProber {
    candidates: Vec<String>,
    tradable: Vec<String>,
    window_open: bool,
    attempts: u32,
}

impl MarketProber {
    pub fn new(candidates: Vec<String>) -> Self {
        Self {
            candidates,
            tradable: Vec::new(),
            window_open: false,
            attempts: 0,
        }
    }

    /// Open a window and build one proposal per candidate
    pub fn begin(&mut self, config: &SessionConfig, stake: Decimal) -> Vec<VenueRequest> {
        self.tradable.clear();
        self.window_open = true;
        self.attempts += 1;

        self.candidates
            .iter()
            .map(|symbol| {
                VenueRequest::proposal(ContractParameters::for_symbol(config, stake, symbol))
            })
            .collect()
    }

    /// Record a proposal reply; true when `symbol` just became tradable
    pub fn observe(&mut self, symbol: &str, ok: bool) -> bool {
        if !self.window_open || !ok {
            return false;
        }
        if !self.candidates.iter().any(|c| c == symbol) {
            tracing::debug!(symbol, "Proposal for a market that was not probed");
            return false;
        }
        if self.tradable.iter().any(|t| t == symbol) {
            return false;
        }
        self.tradable.push(symbol.to_string());
        true
    }

    /// Close the window
    pub fn finish(&mut self) -> ProbeOutcome {
        self.window_open = false;
        if self.tradable.is_empty() {
            ProbeOutcome::Empty
        } else {
            ProbeOutcome::Tradable(std::mem::take(&mut self.tradable))
        }
    }

    pub fn is_open(&self) -> bool {
        self.window_open
    }

    /// Number of windows opened so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
