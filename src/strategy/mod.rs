//! Trading strategy
//!
//! Session settings for a run and the martingale stake rule.

pub mod lenient;
mod martingale;
mod session;

pub use martingale::{Martingale, MAX_STAKE};
pub use session::{mask_token, SessionConfig, StartOverrides};
