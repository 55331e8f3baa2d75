use clap::Parser;
use martingale_bot::cli::{Cli, Commands};
use martingale_bot::config::Config;
use martingale_bot::engine::{NEXT_CYCLE_DELAY, SETTLEMENT_WINDOW, WATCHDOG_INTERVAL};
use martingale_bot::ledger::CONTRACT_TIMEOUT;
use martingale_bot::market::prober::{PROBE_RETRY_DELAY, PROBE_WINDOW};
use martingale_bot::strategy::{mask_token, MAX_STAKE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // .env first so the overrides below see it
    let dotenv_loaded = dotenv::dotenv().is_ok();

    let mut config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::default()
    });
    config.apply_env();

    match cli.command {
        Commands::Run(args) => {
            martingale_bot::telemetry::init_telemetry(&config.telemetry)?;
            tracing::info!(dotenv = dotenv_loaded, config = %cli.config, "Starting bot backend");
            args.execute(config).await?;
        }
        Commands::Config => {
            let session = &config.session;
            println!("Current configuration:");
            println!("  Server: {}", config.server.bind_addr());
            println!("  Venue: {}", config.venue.url);
            println!("  Markets: {}", config.market.candidates.join(", "));
            println!("  Token: {}", mask_token(&session.api_token));
            println!(
                "  Stake: base={} multiplier={} cap={}",
                session.base_stake, session.martingale_multiplier, MAX_STAKE
            );
            println!(
                "  Limits: stop_loss={} take_profit={}",
                session.stop_loss, session.take_profit
            );
            println!(
                "  Contract: {} barrier={} duration={}{}",
                session.contract_type, session.barrier, session.duration, session.duration_unit
            );
            println!(
                "  Logging: level={} format={:?}",
                config.telemetry.log_level, config.telemetry.log_format
            );
        }
        Commands::Status => {
            println!("martingale-bot status");
            println!("  Status: Not running");
            println!("  Probe window: {:?} (retry after {:?})", PROBE_WINDOW, PROBE_RETRY_DELAY);
            println!("  Settlement window: {:?}", SETTLEMENT_WINDOW);
            println!("  Next cycle after: {:?}", NEXT_CYCLE_DELAY);
            println!(
                "  Contract timeout: {:?} (swept every {:?})",
                CONTRACT_TIMEOUT, WATCHDOG_INTERVAL
            );
        }
    }

    Ok(())
}
