//! martingale-bot: Martingale binary-options bot for the Deriv WebSocket API
//!
//! This library provides the core components for:
//! - Reconnecting venue session over WebSocket
//! - Market discovery by trial pricing requests
//! - Trading-cycle engine with staggered buys and martingale staking
//! - Stop-loss / take-profit limits
//! - Contract ledger with timeout watchdog
//! - Operator control channel with status relay
//! - Logging and metrics

pub mod cli;
pub mod config;
pub mod control;
pub mod engine;
pub mod ledger;
pub mod market;
pub mod risk;
pub mod strategy;
pub mod telemetry;
pub mod venue;
pub mod ws;
