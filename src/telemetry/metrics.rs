//! Prometheus metrics

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};

/// Gauge metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeMetric {
    /// Cumulative net profit of the current run
    NetProfit,
    /// Stake for the next purchases
    Stake,
    /// Contracts bought and not yet settled
    OpenContracts,
    /// Markets that passed the last probe
    TradableMarkets,
}

/// Counter metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterMetric {
    Cycles,
    ContractsBought,
    ContractsSettled,
    /// Dropped by the ledger watchdog
    ContractsEvicted,
    Reconnects,
}

impl GaugeMetric {
    pub fn name(self) -> &'static str {
        match self {
            GaugeMetric::NetProfit => "martingale_net_profit_usd",
            GaugeMetric::Stake => "martingale_stake_usd",
            GaugeMetric::OpenContracts => "martingale_open_contracts",
            GaugeMetric::TradableMarkets => "martingale_tradable_markets",
        }
    }
}

impl CounterMetric {
    pub fn name(self) -> &'static str {
        match self {
            CounterMetric::Cycles => "martingale_cycles_total",
            CounterMetric::ContractsBought => "martingale_contracts_bought_total",
            CounterMetric::ContractsSettled => "martingale_contracts_settled_total",
            CounterMetric::ContractsEvicted => "martingale_contracts_evicted_total",
            CounterMetric::Reconnects => "martingale_venue_reconnects_total",
        }
    }
}

/// Serve `/metrics` on `port`; must run inside a tokio runtime
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter on {}: {}", addr, e))?;

    describe_gauge!(GaugeMetric::NetProfit.name(), "Net profit of the current run");
    describe_gauge!(GaugeMetric::Stake.name(), "Stake for the next purchases");
    describe_gauge!(GaugeMetric::OpenContracts.name(), "Unsettled contracts in the ledger");
    describe_gauge!(GaugeMetric::TradableMarkets.name(), "Markets found tradable");
    describe_counter!(CounterMetric::Cycles.name(), "Trading cycles started");
    describe_counter!(CounterMetric::ContractsBought.name(), "Buy confirmations");
    describe_counter!(CounterMetric::ContractsSettled.name(), "Settlements counted");
    describe_counter!(CounterMetric::ContractsEvicted.name(), "Contracts dropped on timeout");
    describe_counter!(CounterMetric::Reconnects.name(), "Venue reconnects scheduled");

    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    gauge!(metric.name()).set(value);
}

/// Bump a counter by one
pub fn increment(metric: CounterMetric) {
    counter!(metric.name()).increment(1);
}
