use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::BotError;

/// Which execution adapter the router is built with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Paper,
    Live,
}

/// Startup configuration. Loaded once, validated before any trading logic
/// runs; any invalid value is fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Capital assumed when no balance provider is available (paper mode) or
    /// when the provider fails.
    pub initial_capital: f64,
    /// Fraction of capital risked per trade, 0 < x <= 0.10.
    pub risk_per_trade: f64,
    /// Daily realized-loss limit in account currency.
    pub daily_loss_limit: f64,
    pub symbols: Vec<String>,
    pub mode: ExecutionMode,
    /// Minimum tradable quantity increment; sizes are floored to it.
    pub quantity_step: f64,
    /// Raw GoLong is vetoed when sentiment < this.
    pub sentiment_long_veto: f64,
    /// Raw GoShort is vetoed when sentiment > this.
    pub sentiment_short_veto: f64,
    /// Consecutive losses that arm the circuit breaker.
    pub max_consecutive_losses: u32,
    /// How long the breaker stays armed once tripped.
    pub circuit_breaker_cooldown_hours: i64,
    /// Bound on every venue network call.
    pub venue_timeout_secs: u64,
    /// Simulated submission latency of the paper adapter, in milliseconds.
    pub paper_latency_ms: u64,
    /// Position snapshot file, written after every position mutation.
    pub snapshot_path: PathBuf,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            risk_per_trade: 0.01,
            daily_loss_limit: 500.0,
            symbols: vec!["BTCUSDT".to_string()],
            mode: ExecutionMode::Paper,
            quantity_step: 0.001,
            sentiment_long_veto: -0.2,
            sentiment_short_veto: 0.2,
            max_consecutive_losses: 3,
            circuit_breaker_cooldown_hours: 24,
            venue_timeout_secs: 20,
            paper_latency_ms: 50,
            snapshot_path: PathBuf::from("positions.json"),
        }
    }
}

impl BotConfig {
    /// Load from `tradebot.toml` (optional) with `TRADEBOT_*` environment
    /// overrides, then validate.
    pub fn load() -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("tradebot").required(false))
            .add_source(config::Environment::with_prefix("TRADEBOT"))
            .build()
            .map_err(|e| BotError::Config(e.to_string()))?;

        let cfg: BotConfig = settings
            .try_deserialize()
            .map_err(|e| BotError::Config(e.to_string()))?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.risk_per_trade <= 0.0 || self.risk_per_trade > 0.10 {
            return Err(BotError::Config(format!(
                "risk_per_trade must be in (0, 0.10], got {}",
                self.risk_per_trade
            )));
        }
        if self.initial_capital <= 0.0 {
            return Err(BotError::Config(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if self.daily_loss_limit <= 0.0 {
            return Err(BotError::Config(format!(
                "daily_loss_limit must be positive, got {}",
                self.daily_loss_limit
            )));
        }
        if self.symbols.is_empty() {
            return Err(BotError::Config("symbols must not be empty".to_string()));
        }
        if self.quantity_step <= 0.0 {
            return Err(BotError::Config(format!(
                "quantity_step must be positive, got {}",
                self.quantity_step
            )));
        }
        if self.sentiment_long_veto >= self.sentiment_short_veto {
            return Err(BotError::Config(format!(
                "sentiment_long_veto ({}) must be below sentiment_short_veto ({})",
                self.sentiment_long_veto, self.sentiment_short_veto
            )));
        }
        if self.max_consecutive_losses == 0 {
            return Err(BotError::Config(
                "max_consecutive_losses must be at least 1".to_string(),
            ));
        }
        if self.circuit_breaker_cooldown_hours <= 0 {
            return Err(BotError::Config(format!(
                "circuit_breaker_cooldown_hours must be positive, got {}",
                self.circuit_breaker_cooldown_hours
            )));
        }
        if self.venue_timeout_secs == 0 {
            return Err(BotError::Config(
                "venue_timeout_secs must be positive".to_string(),
            ));
        }
        if self.paper_latency_ms > 10_000 {
            return Err(BotError::Config(format!(
                "paper_latency_ms must be at most 10000, got {}",
                self.paper_latency_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(BotConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_excessive_risk_fraction() {
        let cfg = BotConfig {
            risk_per_trade: 0.25,
            ..Default::default()
        };

        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("risk_per_trade"));
    }

    #[test]
    fn test_rejects_zero_risk_fraction() {
        let cfg = BotConfig {
            risk_per_trade: 0.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_symbol_universe() {
        let cfg = BotConfig {
            symbols: vec![],
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_absurd_paper_latency() {
        let cfg = BotConfig {
            paper_latency_ms: 60_000,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_sentiment_thresholds() {
        let cfg = BotConfig {
            sentiment_long_veto: 0.5,
            sentiment_short_veto: -0.5,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
