//! Stop-loss and take-profit limits on cumulative net profit

use crate::strategy::SessionConfig;
use rust_decimal::Decimal;

/// Net-profit thresholds that end a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopLimits {
    /// Halt when net profit is at or below this (negative)
    pub stop_loss: Decimal,
    /// Halt when net profit is at or above this (positive)
    pub take_profit: Decimal,
}

impl StopLimits {
    pub fn new(stop_loss: Decimal, take_profit: Decimal) -> Self {
        Self {
            stop_loss,
            take_profit,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.stop_loss, config.take_profit)
    }

    /// Check if trading should be halted at `net_profit`
    ///
    /// Both bounds are inclusive; stop-loss wins if they overlap.
    pub fn should_halt(&self, net_profit: Decimal) -> Option<HaltReason> {
        if net_profit <= self.stop_loss {
            return Some(HaltReason::StopLoss(net_profit));
        }
        if net_profit >= self.take_profit {
            return Some(HaltReason::TakeProfit(net_profit));
        }
        None
    }
}

/// Reason for trading halt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HaltReason {
    StopLoss(Decimal),
    TakeProfit(Decimal),
}

impl HaltReason {
    /// Operator-facing status line
    pub fn status_line(&self) -> &'static str {
        match self {
            HaltReason::StopLoss(_) => "❌ Stop loss reached. Stopping bot.",
            HaltReason::TakeProfit(_) => "🏆 Take profit reached. Stopping bot.",
        }
    }
}
