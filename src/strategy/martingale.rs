//! Martingale stake adjustment

use super::SessionConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Largest stake the martingale will ever reach
pub const MAX_STAKE: Decimal = dec!(10000);

/// Grows the stake after a loss, resets it after a win
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Martingale {
    pub base_stake: Decimal,
    pub multiplier: Decimal,
    pub cap: Decimal,
}

impl Martingale {
    pub fn new(base_stake: Decimal, multiplier: Decimal) -> Self {
        Self {
            base_stake,
            multiplier,
            cap: MAX_STAKE,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.base_stake, config.martingale_multiplier)
    }

    /// Stake after a contract closed with `profit`
    ///
    /// Only a strictly negative profit counts as a loss.
    pub fn next_stake(&self, current: Decimal, profit: Decimal) -> Decimal {
        if profit < Decimal::ZERO {
            // Overflow saturates at the cap
            current
                .checked_mul(self.multiplier)
                .map_or(self.cap, |stake| stake.min(self.cap))
        } else {
            self.base_stake
        }
    }
}
