//! Delayed delivery of engine timers

use super::{EngineEvent, RunId, Timer};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Posts [`EngineEvent::Timer`] back into the engine's own queue
#[derive(Debug, Clone)]
pub struct Scheduler {
    events: mpsc::Sender<EngineEvent>,
}

impl Scheduler {
    pub fn new(events: mpsc::Sender<EngineEvent>) -> Self {
        Self { events }
    }

    /// Fire `timer` for `run` after `delay` unless `cancel` trips first
    pub fn schedule(&self, run: RunId, cancel: &CancellationToken, delay: Duration, timer: Timer) {
        let events = self.events.clone();
        let cancel = cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::trace!(%run, ?timer, "Timer cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    let _ = events.send(EngineEvent::Timer { run, timer }).await;
                }
            }
        });
    }
}
