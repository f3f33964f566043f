/// Market regime classifier using a long moving average + normalized ATR
///
/// Recomputed from the rolling candle window on every candle close,
/// independently of whatever strategy is configured:
/// - ATR% > 3.0          => ExtremeVolatility (highest precedence)
/// - price > 200-SMA     => BullTrend
/// - price < 200-SMA     => BearTrend
/// - otherwise           => Sideways
use crate::indicators::{calculate_atr, calculate_sma};
use crate::models::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketRegime {
    BullTrend,
    BearTrend,
    Sideways,
    ExtremeVolatility,
}

pub struct RegimeClassifier {
    ma_period: usize,
    atr_period: usize,
    extreme_atr_pct: f64,
}

impl Default for RegimeClassifier {
    fn default() -> Self {
        Self {
            ma_period: 200,
            atr_period: 14,
            extreme_atr_pct: 3.0,
        }
    }
}

impl RegimeClassifier {
    pub fn new(ma_period: usize, atr_period: usize, extreme_atr_pct: f64) -> Self {
        Self {
            ma_period,
            atr_period,
            extreme_atr_pct,
        }
    }

    pub fn min_candles_required(&self) -> usize {
        self.ma_period
    }

    /// Classify the current regime. Defaults to Sideways when fewer than
    /// `ma_period` candles are available.
    pub fn classify(&self, candles: &[Candle]) -> MarketRegime {
        if candles.len() < self.ma_period {
            return MarketRegime::Sideways;
        }

        let close = match candles.last() {
            Some(c) if c.close > 0.0 => c.close,
            _ => return MarketRegime::Sideways,
        };

        if let Some(atr) = calculate_atr(candles, self.atr_period) {
            let atr_pct = atr / close * 100.0;
            if atr_pct > self.extreme_atr_pct {
                return MarketRegime::ExtremeVolatility;
            }
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let sma = match calculate_sma(&closes, self.ma_period) {
            Some(sma) => sma,
            None => return MarketRegime::Sideways,
        };

        if close > sma {
            MarketRegime::BullTrend
        } else if close < sma {
            MarketRegime::BearTrend
        } else {
            MarketRegime::Sideways
        }
    }
}
