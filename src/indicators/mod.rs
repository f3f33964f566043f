// Technical indicators module
// Implements ATR, ADX and moving averages for the risk, regime and
// strategy layers. All functions return None (or an empty series) on
// insufficient data.

pub mod adx;
pub mod atr;
pub mod moving_average;

pub use adx::calculate_adx;
pub use atr::{calculate_atr, calculate_atr_series};
pub use moving_average::{calculate_ema, calculate_sma};
