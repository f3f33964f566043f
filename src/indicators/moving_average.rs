/// Calculate Simple Moving Average (SMA) over the most recent `period` values.
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Calculate Exponential Moving Average (EMA), seeded with the SMA of the
/// first `period` values.
pub fn calculate_ema(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema = calculate_sma(&prices[0..period], period)?;

    for price in &prices[period..] {
        ema = (price - ema) * multiplier + ema;
    }

    Some(ema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0];
        assert_eq!(calculate_sma(&prices, 5), Some(104.0));
    }

    #[test]
    fn test_sma_uses_most_recent_window() {
        let prices = vec![50.0, 100.0, 102.0, 104.0];
        assert_eq!(calculate_sma(&prices, 3), Some(102.0));
    }

    #[test]
    fn test_sma_insufficient_data() {
        let prices = vec![100.0, 102.0];
        assert!(calculate_sma(&prices, 5).is_none());
    }

    #[test]
    fn test_ema_follows_trend() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let ema = calculate_ema(&prices, 10).unwrap();
        let sma = calculate_sma(&prices, 10).unwrap();

        // EMA weights the latest prices more heavily than SMA
        assert!(ema > sma - 5.0);
        assert!(ema < *prices.last().unwrap());
    }
}
