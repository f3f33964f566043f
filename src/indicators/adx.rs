/// Average Directional Index (ADX) - trend strength filter
///
/// ADX ranges 0..100; readings above ~20-25 indicate a trending market,
/// below ~20 a choppy one. +DI/-DI give the direction of the trend.
use crate::models::Candle;

/// Calculate ADX, +DI and -DI.
///
/// Returns (adx, plus_di, minus_di) or None if insufficient data. Needs
/// `2 * period + 1` candles: one period to seed the smoothed DM/TR values
/// and another to seed the ADX average over DX.
pub fn calculate_adx(candles: &[Candle], period: usize) -> Option<(f64, f64, f64)> {
    if period == 0 || candles.len() < 2 * period + 1 {
        return None;
    }

    let mut true_ranges = Vec::with_capacity(candles.len() - 1);
    let mut plus_dms = Vec::with_capacity(candles.len() - 1);
    let mut minus_dms = Vec::with_capacity(candles.len() - 1);

    for i in 1..candles.len() {
        let high = candles[i].high;
        let low = candles[i].low;
        let prev_close = candles[i - 1].close;
        let prev_high = candles[i - 1].high;
        let prev_low = candles[i - 1].low;

        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());
        true_ranges.push(tr);

        let up_move = high - prev_high;
        let down_move = prev_low - low;

        plus_dms.push(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        minus_dms.push(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });
    }

    let smoothed_tr = wilder_series(&true_ranges, period)?;
    let smoothed_plus = wilder_series(&plus_dms, period)?;
    let smoothed_minus = wilder_series(&minus_dms, period)?;

    // DI and DX per smoothed step
    let mut dx_values = Vec::with_capacity(smoothed_tr.len());
    let mut last_plus_di = 0.0;
    let mut last_minus_di = 0.0;

    for ((tr, plus), minus) in smoothed_tr
        .iter()
        .zip(&smoothed_plus)
        .zip(&smoothed_minus)
    {
        let (plus_di, minus_di) = if *tr > 0.0 {
            (plus / tr * 100.0, minus / tr * 100.0)
        } else {
            (0.0, 0.0)
        };

        let di_sum = plus_di + minus_di;
        dx_values.push(if di_sum > 0.0 {
            (plus_di - minus_di).abs() / di_sum * 100.0
        } else {
            0.0
        });

        last_plus_di = plus_di;
        last_minus_di = minus_di;
    }

    // ADX is the Wilder-smoothed DX
    let adx_series = wilder_series(&dx_values, period)?;
    let adx = *adx_series.last()?;

    Some((adx, last_plus_di, last_minus_di))
}

/// Wilder's smoothing as a series: seed with a simple average of the first
/// `period` values, then fold one value at a time.
fn wilder_series(values: &[f64], period: usize) -> Option<Vec<f64>> {
    if values.len() < period {
        return None;
    }

    let mut series = Vec::with_capacity(values.len() - period + 1);
    let mut smoothed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    series.push(smoothed);

    for value in &values[period..] {
        smoothed = (smoothed * (period as f64 - 1.0) + value) / period as f64;
        series.push(smoothed);
    }

    Some(series)
}
