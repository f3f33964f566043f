use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Direction;

/// Record of a single simulated trade.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeRecord {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub pnl: f64,
}

/// Aggregate performance of a backtest run. Fully determined by the trade
/// log, so identical inputs serialize to identical reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacktestReport {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub total_pnl: f64,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    /// Gross wins over gross losses. `f64::INFINITY` when there are wins
    /// but no losses; 0.0 when there are no trades at all.
    pub profit_factor: f64,
    /// Largest peak-to-trough fall of the cumulative-PnL equity curve.
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub trades: Vec<TradeRecord>,
}

impl BacktestReport {
    pub fn from_trades(trades: Vec<TradeRecord>, annualization_factor: f64) -> Self {
        let total_trades = trades.len();
        if total_trades == 0 {
            return Self {
                total_trades: 0,
                winning_trades: 0,
                losing_trades: 0,
                total_pnl: 0.0,
                win_rate: 0.0,
                avg_win: 0.0,
                avg_loss: 0.0,
                profit_factor: 0.0,
                max_drawdown: 0.0,
                sharpe_ratio: 0.0,
                trades,
            };
        }

        let wins: Vec<f64> = trades.iter().map(|t| t.pnl).filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = trades.iter().map(|t| t.pnl).filter(|p| *p < 0.0).collect();

        let gross_win: f64 = wins.iter().sum();
        let gross_loss: f64 = losses.iter().map(|p| p.abs()).sum();
        let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();

        let profit_factor = if gross_loss > 0.0 {
            gross_win / gross_loss
        } else if gross_win > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        Self {
            total_trades,
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            total_pnl,
            win_rate: wins.len() as f64 / total_trades as f64,
            avg_win: if wins.is_empty() {
                0.0
            } else {
                gross_win / wins.len() as f64
            },
            avg_loss: if losses.is_empty() {
                0.0
            } else {
                -gross_loss / losses.len() as f64
            },
            profit_factor,
            max_drawdown: max_drawdown(&trades),
            sharpe_ratio: sharpe_ratio(&trades, annualization_factor),
            trades,
        }
    }
}

/// Largest drop from a running peak of the cumulative-PnL curve.
fn max_drawdown(trades: &[TradeRecord]) -> f64 {
    let mut equity = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut drawdown = 0.0_f64;

    for trade in trades {
        equity += trade.pnl;
        if equity > peak {
            peak = equity;
        }
        let current = peak - equity;
        if current > drawdown {
            drawdown = current;
        }
    }

    drawdown
}

/// Sharpe ratio of per-trade returns, scaled by the caller-supplied
/// annualization factor. Zero when returns have no variance.
fn sharpe_ratio(trades: &[TradeRecord], annualization_factor: f64) -> f64 {
    if trades.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = trades
        .iter()
        .map(|t| t.pnl / (t.entry_price * t.quantity))
        .collect();

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
        / (returns.len() - 1) as f64;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        return 0.0;
    }

    (mean / std_dev) * annualization_factor.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn trade(pnl: f64) -> TradeRecord {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        TradeRecord {
            entry_time: t,
            exit_time: t,
            direction: Direction::Long,
            entry_price: 100.0,
            exit_price: 100.0 + pnl,
            quantity: 1.0,
            pnl,
        }
    }

    #[test]
    fn test_empty_report_is_all_zero() {
        let report = BacktestReport::from_trades(Vec::new(), 252.0);
        assert_eq!(report.total_trades, 0);
        assert_eq!(report.profit_factor, 0.0);
        assert_eq!(report.sharpe_ratio, 0.0);
    }

    #[test]
    fn test_basic_aggregates() {
        let report =
            BacktestReport::from_trades(vec![trade(10.0), trade(-5.0), trade(20.0)], 252.0);

        assert_eq!(report.total_trades, 3);
        assert_eq!(report.winning_trades, 2);
        assert_eq!(report.losing_trades, 1);
        assert_eq!(report.total_pnl, 25.0);
        assert!((report.win_rate - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(report.avg_win, 15.0);
        assert_eq!(report.avg_loss, -5.0);
        assert_eq!(report.profit_factor, 6.0);
    }

    #[test]
    fn test_profit_factor_sentinel_with_no_losses() {
        let report = BacktestReport::from_trades(vec![trade(10.0), trade(5.0)], 252.0);
        assert_eq!(report.profit_factor, f64::INFINITY);
    }

    #[test]
    fn test_max_drawdown_from_equity_curve() {
        // Equity: 10 -> 30 -> 5 -> 15. Peak 30, trough 5.
        let report = BacktestReport::from_trades(
            vec![trade(10.0), trade(20.0), trade(-25.0), trade(10.0)],
            252.0,
        );
        assert_eq!(report.max_drawdown, 25.0);
    }

    #[test]
    fn test_sharpe_zero_for_constant_returns() {
        let report = BacktestReport::from_trades(vec![trade(5.0), trade(5.0)], 252.0);
        assert_eq!(report.sharpe_ratio, 0.0);
    }

    #[test]
    fn test_report_serialization_is_stable() {
        let trades = vec![trade(10.0), trade(-4.0)];
        let a = serde_json::to_string(&BacktestReport::from_trades(trades.clone(), 252.0)).unwrap();
        let b = serde_json::to_string(&BacktestReport::from_trades(trades, 252.0)).unwrap();
        assert_eq!(a, b);
    }
}
