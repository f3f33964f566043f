use super::Strategy;
use crate::indicators::calculate_adx;
use crate::models::{Candle, Signal};
use crate::Result;

/// Volatility breakout strategy
///
/// Fires when the current candle's body and volume both blow out their
/// lookback averages, in the direction of the candle. An ADX trend filter
/// runs first: in a non-trending market the strategy stands down entirely,
/// since breakouts out of chop are mostly noise.
#[derive(Debug, Clone)]
pub struct VolatilityBreakoutStrategy {
    pub lookback_period: usize,
    pub volume_multiplier: f64,
    pub price_move_multiplier: f64,
    pub adx_period: usize,
    pub adx_trend_threshold: f64,
}

impl Default for VolatilityBreakoutStrategy {
    fn default() -> Self {
        Self {
            lookback_period: 20,
            volume_multiplier: 2.0,
            price_move_multiplier: 1.5,
            adx_period: 14,
            adx_trend_threshold: 20.0,
        }
    }
}

impl Strategy for VolatilityBreakoutStrategy {
    fn generate_signal(&self, candles: &[Candle]) -> Result<Signal> {
        if candles.len() < self.min_candles_required() {
            return Ok(Signal::NoTrade);
        }

        // Independent trend-strength filter; no trend, no breakout trades.
        let trending = match calculate_adx(candles, self.adx_period) {
            Some((adx, _, _)) => adx >= self.adx_trend_threshold,
            None => false,
        };
        if !trending {
            return Ok(Signal::NoTrade);
        }

        let current = &candles[candles.len() - 1];
        // Lookback window excludes the current candle
        let window = &candles[candles.len() - 1 - self.lookback_period..candles.len() - 1];

        let avg_body: f64 =
            window.iter().map(|c| c.body()).sum::<f64>() / window.len() as f64;
        let avg_volume: f64 =
            window.iter().map(|c| c.volume).sum::<f64>() / window.len() as f64;

        let volume_breakout = current.volume > avg_volume * self.volume_multiplier;
        let body_breakout = current.body() > avg_body * self.price_move_multiplier;

        if volume_breakout && body_breakout {
            let signal = if current.close > current.open {
                Signal::GoLong
            } else {
                Signal::GoShort
            };
            tracing::debug!(
                symbol = %current.symbol,
                volume = current.volume,
                avg_volume,
                body = current.body(),
                avg_body,
                ?signal,
                "volatility breakout detected"
            );
            Ok(signal)
        } else {
            Ok(Signal::NoTrade)
        }
    }

    fn name(&self) -> &str {
        "VolatilityBreakoutStrategy"
    }

    fn min_candles_required(&self) -> usize {
        // Lookback window plus the current candle, or enough history to
        // seed the smoothed ADX, whichever is larger
        (self.lookback_period + 1).max(2 * self.adx_period + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    /// Trending base candles with modest bodies and steady volume.
    fn trending_base(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let open = 100.0 + i as f64 * 2.0;
                Candle {
                    symbol: "TEST".to_string(),
                    open_time: Utc::now() + chrono::Duration::hours(i as i64),
                    open,
                    high: open + 2.5,
                    low: open - 0.5,
                    close: open + 2.0,
                    volume: 1000.0,
                }
            })
            .collect()
    }

    fn with_breakout_candle(mut candles: Vec<Candle>, bullish: bool) -> Vec<Candle> {
        let last = candles.last().expect("non-empty").clone();
        let body = 10.0; // ~5x the 2.0 average body
        let (open, close) = if bullish {
            (last.close, last.close + body)
        } else {
            (last.close, last.close - body)
        };
        candles.push(Candle {
            symbol: "TEST".to_string(),
            open_time: last.open_time + chrono::Duration::hours(1),
            open,
            high: open.max(close) + 0.5,
            low: open.min(close) - 0.5,
            close,
            volume: 5000.0, // 5x average volume
        });
        candles
    }

    #[test]
    fn test_insufficient_data_is_no_trade() {
        let strategy = VolatilityBreakoutStrategy::default();
        let candles = trending_base(10);
        assert_eq!(strategy.generate_signal(&candles).unwrap(), Signal::NoTrade);
    }

    #[test]
    fn test_bullish_breakout_goes_long() {
        let strategy = VolatilityBreakoutStrategy::default();
        let candles = with_breakout_candle(trending_base(30), true);
        assert_eq!(strategy.generate_signal(&candles).unwrap(), Signal::GoLong);
    }

    #[test]
    fn test_bearish_breakout_goes_short() {
        let strategy = VolatilityBreakoutStrategy::default();
        let candles = with_breakout_candle(trending_base(30), false);
        assert_eq!(strategy.generate_signal(&candles).unwrap(), Signal::GoShort);
    }

    #[test]
    fn test_no_breakout_without_volume_spike() {
        let strategy = VolatilityBreakoutStrategy::default();
        let mut candles = with_breakout_candle(trending_base(30), true);
        // Big body but ordinary volume: no fire
        candles.last_mut().expect("non-empty").volume = 1000.0;
        assert_eq!(strategy.generate_signal(&candles).unwrap(), Signal::NoTrade);
    }

    #[test]
    fn test_no_breakout_without_body_expansion() {
        let strategy = VolatilityBreakoutStrategy::default();
        let mut candles = with_breakout_candle(trending_base(30), true);
        // Volume spike but ordinary body
        let last = candles.last_mut().expect("non-empty");
        last.close = last.open + 2.0;
        assert_eq!(strategy.generate_signal(&candles).unwrap(), Signal::NoTrade);
    }

    #[test]
    fn test_choppy_market_is_filtered_out() {
        let strategy = VolatilityBreakoutStrategy::default();

        // Alternating candles with no directional movement: ADX stays low
        let mut candles: Vec<Candle> = (0..30)
            .map(|i| {
                let up = i % 2 == 0;
                let (open, close) = if up { (100.0, 101.0) } else { (101.0, 100.0) };
                Candle {
                    symbol: "TEST".to_string(),
                    open_time: Utc::now() + chrono::Duration::hours(i as i64),
                    open,
                    high: 101.5,
                    low: 99.5,
                    close,
                    volume: 1000.0,
                }
            })
            .collect();

        // Even a textbook breakout candle must be suppressed here
        candles = with_breakout_candle(candles, true);
        assert_eq!(strategy.generate_signal(&candles).unwrap(), Signal::NoTrade);
    }
}
