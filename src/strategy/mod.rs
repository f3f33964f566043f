// Trading strategy module
pub mod breakout;
pub mod orchestrator;

pub use breakout::VolatilityBreakoutStrategy;
pub use orchestrator::{SignalDecision, StrategyOrchestrator};

use crate::models::{Candle, Signal};
use crate::Result;

/// Base trait for all trading strategies.
///
/// A strategy only looks at history and produces a raw signal; regime and
/// sentiment gating happen in the orchestrator above it.
pub trait Strategy: Send + Sync {
    /// Generate a trading signal based on market data
    fn generate_signal(&self, candles: &[Candle]) -> Result<Signal>;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum candles required for this strategy
    fn min_candles_required(&self) -> usize;
}
