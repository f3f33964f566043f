use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::config::BotConfig;
use crate::indicators::calculate_atr;
use crate::models::Candle;

/// Candles required before the volatility multiplier deviates from neutral.
const MIN_VOLATILITY_HISTORY: usize = 20;
const ATR_PERIOD: usize = 14;

/// Source of the account balance. The venue adapter provides one in live
/// mode; paper mode and tests use [`FixedBalance`].
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    async fn get_balance(&self) -> anyhow::Result<f64>;
}

/// Constant balance, for simulation and tests.
pub struct FixedBalance(pub f64);

/// Which pre-trade gate blocked an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryBlock {
    CapitalExhausted,
    DailyLossLimit,
    CircuitBreaker,
}

impl EntryBlock {
    /// Stable code for logs and audit trails.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryBlock::CapitalExhausted => "capital_exhausted",
            EntryBlock::DailyLossLimit => "daily_loss_limit",
            EntryBlock::CircuitBreaker => "circuit_breaker_active",
        }
    }
}

#[async_trait]
impl BalanceProvider for FixedBalance {
    async fn get_balance(&self) -> anyhow::Result<f64> {
        Ok(self.0)
    }
}

/// Owns all risk state: capital, the per-trade risk fraction and the
/// consecutive-loss circuit breaker. Exactly one writer mutates it.
///
/// Sizing is pure: invalid inputs yield a size of zero, never an error.
/// Zero is the contract for "do not trade".
pub struct RiskManager {
    capital: f64,
    risk_per_trade: f64,
    quantity_step: f64,
    consecutive_losses: u32,
    max_consecutive_losses: u32,
    cooldown: Duration,
    circuit_breaker_until: Option<DateTime<Utc>>,
    daily_loss_limit: f64,
    daily_loss: f64,
    daily_loss_day: Option<chrono::NaiveDate>,
}

impl RiskManager {
    pub fn new(
        capital: f64,
        risk_per_trade: f64,
        quantity_step: f64,
        max_consecutive_losses: u32,
        cooldown: Duration,
        daily_loss_limit: f64,
    ) -> Self {
        Self {
            capital,
            risk_per_trade,
            quantity_step,
            consecutive_losses: 0,
            max_consecutive_losses,
            cooldown,
            circuit_breaker_until: None,
            daily_loss_limit,
            daily_loss: 0.0,
            daily_loss_day: None,
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(
            config.initial_capital,
            config.risk_per_trade,
            config.quantity_step,
            config.max_consecutive_losses,
            Duration::hours(config.circuit_breaker_cooldown_hours),
            config.daily_loss_limit,
        )
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    /// Refresh capital from the balance provider.
    ///
    /// On provider failure the current (conservative) capital is kept and a
    /// warning logged; this never aborts the run.
    pub async fn load_capital(&mut self, provider: &dyn BalanceProvider) -> f64 {
        match provider.get_balance().await {
            Ok(balance) if balance > 0.0 => {
                tracing::info!(balance, "capital loaded from balance provider");
                self.capital = balance;
            }
            Ok(balance) => {
                tracing::warn!(
                    balance,
                    fallback = self.capital,
                    "provider returned non-positive balance, keeping current capital"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    fallback = self.capital,
                    "balance fetch failed, keeping current capital"
                );
            }
        }
        self.capital
    }

    /// Volatility scaling for the risk amount, derived from the 14-period
    /// ATR as a percentage of the current price.
    ///
    /// Neutral (1.0) with fewer than 20 candles. Otherwise
    /// `clamp(1.0 / max(atr_pct, 0.5), 0.2, 2.0)`: high volatility shrinks
    /// the risk amount, low volatility grows it up to 2x.
    pub fn volatility_multiplier(&self, history: &[Candle]) -> f64 {
        if history.len() < MIN_VOLATILITY_HISTORY {
            return 1.0;
        }

        let close = match history.last() {
            Some(c) if c.close > 0.0 => c.close,
            _ => return 1.0,
        };

        let atr = match calculate_atr(history, ATR_PERIOD) {
            Some(atr) => atr,
            None => return 1.0,
        };

        let atr_pct = atr / close * 100.0;
        (1.0 / atr_pct.max(0.5)).clamp(0.2, 2.0)
    }

    /// Deterministic position sizing.
    ///
    /// `risk_amount = capital * risk_per_trade * volatility_multiplier`,
    /// `size = floor_to_step(risk_amount / |entry - stop|)`.
    ///
    /// Returns 0.0 when entry == stop, capital <= 0, inputs are not finite
    /// or the floored size falls below one quantity step.
    pub fn calculate_position_size(
        &self,
        entry: f64,
        stop: f64,
        is_long: bool,
        history: &[Candle],
    ) -> f64 {
        if !entry.is_finite() || !stop.is_finite() || entry <= 0.0 {
            return 0.0;
        }
        if self.capital <= 0.0 {
            return 0.0;
        }

        let risk_distance = (entry - stop).abs();
        if risk_distance == 0.0 {
            return 0.0;
        }

        let multiplier = self.volatility_multiplier(history);
        let risk_amount = self.capital * self.risk_per_trade * multiplier;
        let raw_size = risk_amount / risk_distance;
        let size = (raw_size / self.quantity_step).floor() * self.quantity_step;

        if size < self.quantity_step {
            tracing::debug!(
                entry,
                stop,
                is_long,
                raw_size,
                "computed size below minimum step, vetoing trade"
            );
            return 0.0;
        }

        size
    }

    /// Gate checked before any new trade. Reports which gate blocks the
    /// entry (exhausted capital, spent daily loss limit, or an armed
    /// circuit breaker), or None when trading may proceed.
    ///
    /// The loss counter resets only here, once the breaker window has fully
    /// elapsed; recording further losses does not restart it early.
    pub fn entry_block(&mut self, now: DateTime<Utc>) -> Option<EntryBlock> {
        if self.capital <= 0.0 {
            return Some(EntryBlock::CapitalExhausted);
        }

        self.roll_daily_window(now);
        if self.daily_loss >= self.daily_loss_limit {
            tracing::warn!(
                daily_loss = self.daily_loss,
                limit = self.daily_loss_limit,
                "daily loss limit reached, no new trades today"
            );
            return Some(EntryBlock::DailyLossLimit);
        }

        if let Some(until) = self.circuit_breaker_until {
            if now <= until {
                return Some(EntryBlock::CircuitBreaker);
            }
            tracing::info!(expired_at = %until, "circuit breaker window elapsed, resuming trading");
            self.circuit_breaker_until = None;
            self.consecutive_losses = 0;
        }

        None
    }

    /// Boolean form of [`RiskManager::entry_block`]: true when trading may
    /// proceed.
    pub fn check_before_trade(&mut self, now: DateTime<Utc>) -> bool {
        self.entry_block(now).is_none()
    }

    fn roll_daily_window(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if self.daily_loss_day != Some(today) {
            self.daily_loss_day = Some(today);
            self.daily_loss = 0.0;
        }
    }

    pub fn circuit_breaker_active(&self, now: DateTime<Utc>) -> bool {
        self.circuit_breaker_until.map_or(false, |until| now <= until)
    }

    /// Record a realized loss. Arming the breaker does not reset the
    /// counter; that happens when the window elapses.
    pub fn record_loss(&mut self, now: DateTime<Utc>) {
        self.consecutive_losses += 1;

        if self.consecutive_losses >= self.max_consecutive_losses
            && self.circuit_breaker_until.is_none()
        {
            let until = now + self.cooldown;
            self.circuit_breaker_until = Some(until);
            tracing::warn!(
                consecutive_losses = self.consecutive_losses,
                until = %until,
                "circuit breaker armed"
            );
        }
    }

    /// Record a realized win. Clears the loss streak unless the breaker is
    /// currently armed.
    pub fn record_win(&mut self) {
        if self.circuit_breaker_until.is_none() {
            self.consecutive_losses = 0;
        }
    }

    /// Fold realized PnL into capital and the daily-loss tally. Capital
    /// never goes negative.
    pub fn apply_realized_pnl(&mut self, pnl: f64, now: DateTime<Utc>) {
        self.capital = (self.capital + pnl).max(0.0);

        self.roll_daily_window(now);
        if pnl < 0.0 {
            self.daily_loss += -pnl;
        }
    }
}
