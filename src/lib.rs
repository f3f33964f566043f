// Core modules
pub mod backtest;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod live;
pub mod models;
pub mod persistence;
pub mod regime;
pub mod risk;
pub mod strategy;

// Re-export commonly used types
pub use config::{BotConfig, ExecutionMode};
pub use error::BotError;
pub use models::*;
pub use strategy::Strategy;

// Error handling
pub type Result<T> = std::result::Result<T, BotError>;
