//! Configuration types for martingale-bot
//!
//! Values come from `config.toml` (every section optional), then from the
//! process environment (optionally seeded from `.env`).

use crate::market::DEFAULT_MARKETS;
use crate::strategy::{lenient, SessionConfig};
use crate::venue::DERIV_WS_URL;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub venue: VenueConfig,
    pub market: MarketConfig,
    pub session: SessionConfig,
    pub telemetry: TelemetryConfig,
}

/// Control channel listener
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Venue connection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VenueConfig {
    pub url: String,
    /// Fixed delay before reconnecting after the transport closes
    pub reconnect_delay_ms: u64,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            url: DERIV_WS_URL.to_string(),
            reconnect_delay_ms: 5_000,
        }
    }
}

impl VenueConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Candidate markets probed at the start of every run
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub candidates: Vec<String>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_MARKETS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,
    /// JSON format for log aggregation
    Json,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    /// Serve Prometheus metrics on this port when set
    pub metrics_port: Option<u16>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `KEY=value` overrides; unusable values keep the current setting
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("PORT").and_then(|p| p.trim().parse::<u16>().ok()) {
            if port != 0 {
                self.server.port = port;
            }
        }
        if let Some(url) = lookup("VENUE_URL").filter(|u| !u.trim().is_empty()) {
            self.venue.url = url;
        }

        let s = &mut self.session;
        if let Some(token) = lookup("API_TOKEN").filter(|t| !t.is_empty()) {
            s.api_token = token;
        }
        s.base_stake = lenient::decimal_str(lookup("BASE_STAKE").as_deref(), s.base_stake);
        s.martingale_multiplier = lenient::decimal_str(
            lookup("MARTINGALE_MULTIPLIER").as_deref(),
            s.martingale_multiplier,
        );
        s.stop_loss = lenient::decimal_str(lookup("STOP_LOSS").as_deref(), s.stop_loss);
        s.take_profit = lenient::decimal_str(lookup("TAKE_PROFIT").as_deref(), s.take_profit);
        if let Some(kind) = lookup("CONTRACT_TYPE").filter(|t| !t.is_empty()) {
            s.contract_type = kind;
        }
        s.barrier = lenient::decimal_str(lookup("BARRIER").as_deref(), s.barrier);
        s.duration = lenient::duration_str(lookup("DURATION").as_deref(), s.duration);
        if let Some(unit) = lookup("DURATION_UNIT").filter(|u| !u.is_empty()) {
            s.duration_unit = unit;
        }
    }
}
