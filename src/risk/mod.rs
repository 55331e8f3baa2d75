//! Risk controls
//!
//! Cumulative stop-loss / take-profit limits for a run

mod limits;

pub use limits::{HaltReason, StopLimits};
