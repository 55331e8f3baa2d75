//! Outbound status lines

use tokio::sync::broadcast;

/// Fan-out of human-readable status lines to every control client
#[derive(Debug, Clone)]
pub struct StatusReporter {
    tx: broadcast::Sender<String>,
}

impl StatusReporter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Log the line and send it to whoever is listening
    pub fn report(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::info!(status = %line, "Status");
        // No subscribers is fine
        let _ = self.tx.send(line);
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new(256)
    }
}
