use crate::backtest::metrics::{BacktestReport, TradeRecord};
use crate::models::{Candle, Direction, Signal};
use crate::risk::RiskManager;
use crate::strategy::StrategyOrchestrator;

/// Replays a candle series through the full signal + risk pipeline and
/// simulates the resulting trades.
///
/// Exit policy: the stop is checked before the take-profit, so a candle
/// that touches both resolves as a loss. This keeps simulated results
/// conservative relative to live fills.
pub struct BacktestHarness {
    risk: RiskManager,
    orchestrator: StrategyOrchestrator,
    lookback_period: usize,
    annualization_factor: f64,
}

/// Take-profit distance as a multiple of the initial risk (1:2 R:R).
const REWARD_RISK_RATIO: f64 = 2.0;

impl BacktestHarness {
    pub fn new(
        risk: RiskManager,
        orchestrator: StrategyOrchestrator,
        lookback_period: usize,
        annualization_factor: f64,
    ) -> Self {
        Self {
            risk,
            orchestrator,
            lookback_period,
            annualization_factor,
        }
    }

    /// Run over an ordered candle series. `sentiment` aligns by index with
    /// `candles`; absent entries count as neutral (0.0).
    pub fn run(
        &mut self,
        candles: &[Candle],
        sentiment: Option<&[f64]>,
    ) -> crate::Result<BacktestReport> {
        let mut trades: Vec<TradeRecord> = Vec::new();
        let mut i = self.lookback_period;

        while i < candles.len() {
            let history = &candles[..=i];
            let score = sentiment
                .and_then(|s| s.get(i).copied())
                .unwrap_or(0.0);

            let decision = self.orchestrator.get_signal(history, score)?;
            let direction = match decision.signal {
                Signal::GoLong => Direction::Long,
                Signal::GoShort => Direction::Short,
                Signal::ClosePosition | Signal::NoTrade => {
                    i += 1;
                    continue;
                }
            };

            let entry_candle = &candles[i];
            let entry = entry_candle.close;
            let stop = match direction {
                Direction::Long => entry_candle.low,
                Direction::Short => entry_candle.high,
            };
            let risk_distance = (entry - stop).abs();
            if risk_distance == 0.0 {
                i += 1;
                continue;
            }

            if let Some(block) = self.risk.entry_block(entry_candle.open_time) {
                tracing::debug!(index = i, reason = block.as_str(), "entry skipped");
                i += 1;
                continue;
            }

            let quantity = self.risk.calculate_position_size(
                entry,
                stop,
                direction == Direction::Long,
                history,
            );
            if quantity == 0.0 {
                i += 1;
                continue;
            }

            let target = entry + direction.sign() * REWARD_RISK_RATIO * risk_distance;
            let (exit_index, exit_price) =
                walk_to_exit(candles, i + 1, direction, stop, target);

            let exit_candle = &candles[exit_index];
            let pnl = (exit_price - entry) * quantity * direction.sign();

            if pnl < 0.0 {
                self.risk.record_loss(exit_candle.open_time);
            } else {
                self.risk.record_win();
            }
            self.risk.apply_realized_pnl(pnl, exit_candle.open_time);

            trades.push(TradeRecord {
                entry_time: entry_candle.open_time,
                exit_time: exit_candle.open_time,
                direction,
                entry_price: entry,
                exit_price,
                quantity,
                pnl,
            });

            i = exit_index + 1;
        }

        tracing::info!(
            trades = trades.len(),
            final_capital = self.risk.capital(),
            "backtest complete"
        );
        Ok(BacktestReport::from_trades(trades, self.annualization_factor))
    }
}

/// Walk forward from `start` until the stop or target is touched. The stop
/// wins same-candle ties. An open trade at series end closes at the final
/// close.
fn walk_to_exit(
    candles: &[Candle],
    start: usize,
    direction: Direction,
    stop: f64,
    target: f64,
) -> (usize, f64) {
    for (j, candle) in candles.iter().enumerate().skip(start) {
        match direction {
            Direction::Long => {
                if candle.low <= stop {
                    return (j, stop);
                }
                if candle.high >= target {
                    return (j, target);
                }
            }
            Direction::Short => {
                if candle.high >= stop {
                    return (j, stop);
                }
                if candle.low <= target {
                    return (j, target);
                }
            }
        }
    }

    let last = candles.len() - 1;
    (last, candles[last].close)
}
