//! Market discovery
//!
//! Finds which candidate markets currently quote the configured contract

pub mod prober;

pub use prober::{MarketProber, ProbeOutcome};

/// Volatility indices probed when no candidates are configured
pub const DEFAULT_MARKETS: [&str; 10] = [
    "R_10", "R_25", "R_50", "R_75", "R_100", "R_10_1s", "R_25_1s", "R_50_1s", "R_75_1s",
    "R_100_1s",
];
