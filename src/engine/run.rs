//! State owned by one bot run

use super::Phase;
use crate::ledger::ContractLedger;
use crate::market::MarketProber;
use crate::risk::{HaltReason, StopLimits};
use crate::strategy::{Martingale, SessionConfig};
use crate::venue::{ContractId, ContractUpdate};
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Identifies one run; events tagged with an older id are stale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(u64);

impl RunId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// What one settled contract did to the run
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub contract_id: ContractId,
    pub underlying: String,
    pub profit: Decimal,
    pub net_profit: Decimal,
    /// Stake for the next purchases
    pub stake: Decimal,
    pub loss: bool,
    pub halt: Option<HaltReason>,
}

/// A settlement whose profit cannot be added to the run's net profit
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("profit {profit} on contract {contract_id} overflows net profit")]
pub struct ProfitOverflow {
    pub contract_id: ContractId,
    pub profit: Decimal,
}

/// Run-scoped state; dropping it cancels every timer the run scheduled
#[derive(Debug)]
pub struct RunContext {
    pub id: RunId,
    pub config: SessionConfig,
    pub phase: Phase,
    pub net_profit: Decimal,
    pub cycle: u64,
    pub stake: Decimal,
    pub tradable: Vec<String>,
    pub prober: MarketProber,
    pub ledger: ContractLedger,
    pub next_cycle_pending: bool,
    pub probe_retry_pending: bool,
    martingale: Martingale,
    limits: StopLimits,
    cancel: CancellationToken,
}

impl RunContext {
    pub fn new(
        id: RunId,
        config: SessionConfig,
        prober: MarketProber,
        ledger: ContractLedger,
    ) -> Self {
        Self {
            id,
            phase: Phase::Probing,
            net_profit: Decimal::ZERO,
            cycle: 0,
            stake: config.base_stake,
            tradable: Vec::new(),
            prober,
            ledger,
            next_cycle_pending: false,
            probe_retry_pending: false,
            martingale: Martingale::from_config(&config),
            limits: StopLimits::from_config(&config),
            cancel: CancellationToken::new(),
            config,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_trading(&self) -> bool {
        matches!(self.phase, Phase::CycleActive | Phase::Evaluating)
    }

    /// Apply a sold contract, if it is still in the ledger
    ///
    /// Contracts not in the ledger (evicted, from an earlier cycle, or
    /// never bought by this run) do not touch profit or stake. A profit
    /// that would overflow the net is dropped with the contract, leaving
    /// profit and stake unchanged.
    pub fn settle(&mut self, update: &ContractUpdate) -> Result<Option<Settlement>, ProfitOverflow> {
        if !update.is_sold || !self.ledger.remove(&update.contract_id) {
            return Ok(None);
        }

        let profit = update.realized_profit();
        self.net_profit = self
            .net_profit
            .checked_add(profit)
            .ok_or_else(|| ProfitOverflow {
                contract_id: update.contract_id.clone(),
                profit,
            })?;
        // Last settlement wins when several markets close in one cycle
        self.stake = self.martingale.next_stake(self.stake, profit);

        Ok(Some(Settlement {
            contract_id: update.contract_id.clone(),
            underlying: update
                .underlying
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            profit,
            net_profit: self.net_profit,
            stake: self.stake,
            loss: profit < Decimal::ZERO,
            halt: self.limits.should_halt(self.net_profit),
        }))
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
