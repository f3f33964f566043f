pub mod harness;
pub mod metrics;
pub mod synthetic;

pub use harness::BacktestHarness;
pub use metrics::{BacktestReport, TradeRecord};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
