//! Run command implementation

use crate::config::Config;
use crate::control::{ControlServer, StatusReporter};
use crate::engine::{CycleEngine, Timings};
use crate::venue::VenueSession;
use clap::Args;
use tokio::sync::mpsc;

const EVENT_QUEUE_CAPACITY: usize = 1024;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Control channel port, overrides config and PORT
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl RunArgs {
    pub async fn execute(&self, mut config: Config) -> anyhow::Result<()> {
        if let Some(port) = self.port {
            config.server.port = port;
        }

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let status = StatusReporter::default();

        let server =
            ControlServer::bind(&config.server.bind_addr(), status.clone(), events_tx.clone())
                .await?;
        tracing::info!(addr = %server.local_addr()?, venue = %config.venue.url, "Bot backend up");

        let venue = VenueSession::new(config.venue.clone(), events_tx.clone());
        let engine = CycleEngine::new(
            config.session.clone(),
            config.market.candidates.clone(),
            Timings::default(),
            venue,
            status,
            events_tx,
        );

        tokio::select! {
            _ = engine.run(events_rx) => {
                tracing::warn!("Engine loop exited");
            }
            result = server.run() => result?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
            }
        }

        Ok(())
    }
}
