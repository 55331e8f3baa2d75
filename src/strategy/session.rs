//! Session configuration and start-command overrides

use super::lenient;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// Contract and risk settings for one run
///
/// Built once when a run starts and never mutated while it trades.
#[derive(Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub api_token: String,
    /// Stake for the first cycle and the martingale reset value
    pub base_stake: Decimal,
    pub martingale_multiplier: Decimal,
    /// Stop when net profit falls to or below this
    pub stop_loss: Decimal,
    /// Stop when net profit rises to or above this
    pub take_profit: Decimal,
    pub contract_type: String,
    pub barrier: Decimal,
    pub duration: u32,
    pub duration_unit: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            base_stake: dec!(100),
            martingale_multiplier: dec!(1.5),
            stop_loss: dec!(-2000),
            take_profit: dec!(500),
            contract_type: "DIGITOVER".to_string(),
            barrier: dec!(3),
            duration: 2,
            duration_unit: "t".to_string(),
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("api_token", &mask_token(&self.api_token))
            .field("base_stake", &self.base_stake)
            .field("martingale_multiplier", &self.martingale_multiplier)
            .field("stop_loss", &self.stop_loss)
            .field("take_profit", &self.take_profit)
            .field("contract_type", &self.contract_type)
            .field("barrier", &self.barrier)
            .field("duration", &self.duration)
            .field("duration_unit", &self.duration_unit)
            .finish()
    }
}

/// Show only the last four characters of a credential
pub fn mask_token(token: &str) -> String {
    if token.is_empty() {
        return "<unset>".to_string();
    }
    let tail: String = token
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{}", tail)
}

/// Optional fields of a `start` command, kept as raw JSON for lenient coercion
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartOverrides {
    pub api_token: Option<Value>,
    pub base_stake: Option<Value>,
    pub martingale_multiplier: Option<Value>,
    pub stop_loss: Option<Value>,
    pub take_profit: Option<Value>,
    pub contract_type: Option<Value>,
    pub barrier: Option<Value>,
    pub duration: Option<Value>,
    pub duration_unit: Option<Value>,
}

impl SessionConfig {
    /// A new config with every usable override applied on top of `self`
    pub fn with_overrides(&self, o: &StartOverrides) -> SessionConfig {
        SessionConfig {
            api_token: lenient::text(o.api_token.as_ref(), &self.api_token),
            base_stake: lenient::decimal(o.base_stake.as_ref(), self.base_stake),
            martingale_multiplier: lenient::decimal(
                o.martingale_multiplier.as_ref(),
                self.martingale_multiplier,
            ),
            stop_loss: lenient::decimal(o.stop_loss.as_ref(), self.stop_loss),
            take_profit: lenient::decimal(o.take_profit.as_ref(), self.take_profit),
            contract_type: lenient::text(o.contract_type.as_ref(), &self.contract_type),
            barrier: lenient::decimal(o.barrier.as_ref(), self.barrier),
            duration: lenient::duration(o.duration.as_ref(), self.duration),
            duration_unit: lenient::text(o.duration_unit.as_ref(), &self.duration_unit),
        }
    }
}
