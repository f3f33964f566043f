// Market regime classification module
pub mod classifier;

pub use classifier::{MarketRegime, RegimeClassifier};
