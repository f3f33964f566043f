// Risk management module
pub mod manager;

pub use manager::{BalanceProvider, EntryBlock, FixedBalance, RiskManager};
