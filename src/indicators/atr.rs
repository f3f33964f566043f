/// Average True Range (ATR) indicator
///
/// Measures market volatility as the Wilder-smoothed average of true ranges.
/// True Range is the greatest of:
/// - Current High - Current Low
/// - Abs(Current High - Previous Close)
/// - Abs(Current Low - Previous Close)
use crate::models::Candle;

fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    let mut ranges = Vec::with_capacity(candles.len().saturating_sub(1));
    for i in 1..candles.len() {
        let high = candles[i].high;
        let low = candles[i].low;
        let prev_close = candles[i - 1].close;

        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());
        ranges.push(tr);
    }
    ranges
}

/// Calculate the current ATR value, or None if insufficient data.
pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    calculate_atr_series(candles, period).last().copied()
}

/// ATR series aligned with candles starting at index `period`.
///
/// The first value is a simple average of the first `period` true ranges;
/// subsequent values use Wilder's smoothing.
pub fn calculate_atr_series(candles: &[Candle], period: usize) -> Vec<f64> {
    if period == 0 || candles.len() < period + 1 {
        return Vec::new();
    }

    let ranges = true_ranges(candles);
    if ranges.len() < period {
        return Vec::new();
    }

    let mut series = Vec::with_capacity(ranges.len() - period + 1);
    let mut atr: f64 = ranges.iter().take(period).sum::<f64>() / period as f64;
    series.push(atr);

    for tr in &ranges[period..] {
        atr = (atr * (period as f64 - 1.0) + tr) / period as f64;
        series.push(atr);
    }

    series
}
