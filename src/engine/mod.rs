//! Trading-cycle engine
//!
//! A single task owns all run state and reacts to one queue of
//! [`EngineEvent`]s: operator commands, venue events, and its own timers.
//!
//! ```text
//! Idle -> Probing -> CycleActive -> Evaluating -> CycleActive ...
//!            \            \              \
//!             +------------+--------------+--> Idle (stop)
//! ```

mod cycle;
mod run;
mod scheduler;

pub use cycle::{CycleEngine, EngineSnapshot};
pub use run::{ProfitOverflow, RunContext, RunId, Settlement};
pub use scheduler::Scheduler;

use crate::control::ControlCommand;
use crate::ledger::CONTRACT_TIMEOUT;
use crate::market::prober::{PROBE_RETRY_DELAY, PROBE_WINDOW};
use crate::venue::VenueEvent;
use std::time::Duration;

/// Spacing between consecutive buys in one cycle
pub const BUY_STAGGER: Duration = Duration::from_millis(200);
/// Time from cycle start until the balance refresh
pub const SETTLEMENT_WINDOW: Duration = Duration::from_secs(10);
/// Pause between a settlement and the next cycle
pub const NEXT_CYCLE_DELAY: Duration = Duration::from_secs(10);
/// Ledger sweep period
pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(5);

/// Lifecycle phase of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Probing,
    CycleActive,
    Evaluating,
}

/// Timers a run can schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timer {
    ProbeWindowClosed,
    ProbeRetry,
    PlaceBuy { cycle: u64, symbol: String },
    SettlementWindow { cycle: u64 },
    NextCycle,
    Watchdog,
}

/// Everything the engine reacts to
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Control(ControlCommand),
    /// The operator's control connection went away
    ControlDisconnected,
    Venue { run: RunId, event: VenueEvent },
    Timer { run: RunId, timer: Timer },
}

/// Engine delays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub probe_window: Duration,
    pub probe_retry: Duration,
    pub buy_stagger: Duration,
    pub settlement_window: Duration,
    pub next_cycle_delay: Duration,
    pub watchdog_interval: Duration,
    pub contract_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            probe_window: PROBE_WINDOW,
            probe_retry: PROBE_RETRY_DELAY,
            buy_stagger: BUY_STAGGER,
            settlement_window: SETTLEMENT_WINDOW,
            next_cycle_delay: NEXT_CYCLE_DELAY,
            watchdog_interval: WATCHDOG_INTERVAL,
            contract_timeout: CONTRACT_TIMEOUT,
        }
    }
}
