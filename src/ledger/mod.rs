//! In-flight contract tracking
//!
//! Contracts enter on buy confirmation and leave on settlement or when the
//! watchdog decides their settlement is lost.

use crate::venue::ContractId;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// How long a contract may stay open before the watchdog drops it
pub const CONTRACT_TIMEOUT: Duration = Duration::from_secs(15);

/// Open contracts by id
#[derive(Debug)]
pub struct ContractLedger {
    open: HashMap<ContractId, Instant>,
    timeout: Duration,
}

impl ContractLedger {
    pub fn new() -> Self {
        Self::with_timeout(CONTRACT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            open: HashMap::new(),
            timeout,
        }
    }

    /// Track a purchased contract; a repeated id keeps its first open time
    pub fn record(&mut self, id: ContractId, opened_at: Instant) {
        self.open.entry(id).or_insert(opened_at);
    }

    /// Stop tracking `id`; false if it was not open
    pub fn remove(&mut self, id: &ContractId) -> bool {
        self.open.remove(id).is_some()
    }

    pub fn contains(&self, id: &ContractId) -> bool {
        self.open.contains_key(id)
    }

    pub fn clear(&mut self) {
        self.open.clear();
    }

    /// Evict every contract open longer than the timeout, oldest first
    pub fn sweep(&mut self, now: Instant) -> Vec<ContractId> {
        let mut expired: Vec<(ContractId, Instant)> = self
            .open
            .iter()
            .filter(|(_, opened)| now.saturating_duration_since(**opened) > self.timeout)
            .map(|(id, opened)| (id.clone(), *opened))
            .collect();
        expired.sort_by_key(|(_, opened)| *opened);

        for (id, _) in &expired {
            self.open.remove(id);
        }
        expired.into_iter().map(|(id, _)| id).collect()
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

impl Default for ContractLedger {
    fn default() -> Self {
        Self::new()
    }
}
