use super::Strategy;
use crate::models::{Candle, Signal, VetoReason};
use crate::regime::{MarketRegime, RegimeClassifier};
use crate::Result;

/// Outcome of one orchestrated signal pass. When `veto` is set the signal
/// has already been overridden to NoTrade; the reason is machine-readable
/// for audit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalDecision {
    pub signal: Signal,
    pub regime: MarketRegime,
    pub veto: Option<VetoReason>,
}

/// Composes the regime classifier, the configured strategy and the
/// sentiment gate into the single decision path shared by backtest and
/// live execution.
pub struct StrategyOrchestrator {
    classifier: RegimeClassifier,
    strategy: Box<dyn Strategy>,
    /// Raw GoLong is vetoed when sentiment < this (default -0.2).
    long_veto_threshold: f64,
    /// Raw GoShort is vetoed when sentiment > this (default 0.2).
    short_veto_threshold: f64,
}

impl StrategyOrchestrator {
    pub fn new(classifier: RegimeClassifier, strategy: Box<dyn Strategy>) -> Self {
        Self {
            classifier,
            strategy,
            long_veto_threshold: -0.2,
            short_veto_threshold: 0.2,
        }
    }

    pub fn with_sentiment_thresholds(mut self, long_veto: f64, short_veto: f64) -> Self {
        self.long_veto_threshold = long_veto;
        self.short_veto_threshold = short_veto;
        self
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// One full decision pass for a closed candle.
    ///
    /// 1. Classify the regime; ExtremeVolatility returns NoTrade without
    ///    running the strategy at all.
    /// 2. Delegate to the configured strategy.
    /// 3. Apply the sentiment gate to raw entries.
    pub fn get_signal(&self, candles: &[Candle], sentiment_score: f64) -> Result<SignalDecision> {
        let regime = self.classifier.classify(candles);

        if regime == MarketRegime::ExtremeVolatility {
            tracing::info!(
                reason = VetoReason::ExtremeVolatility.as_str(),
                "signal suppressed before strategy ran"
            );
            return Ok(SignalDecision {
                signal: Signal::NoTrade,
                regime,
                veto: Some(VetoReason::ExtremeVolatility),
            });
        }

        let raw = self.strategy.generate_signal(candles)?;

        let veto = match raw {
            Signal::GoLong if sentiment_score < self.long_veto_threshold => {
                Some(VetoReason::SentimentBlocksLong)
            }
            Signal::GoShort if sentiment_score > self.short_veto_threshold => {
                Some(VetoReason::SentimentBlocksShort)
            }
            _ => None,
        };

        if let Some(reason) = veto {
            tracing::info!(
                reason = reason.as_str(),
                sentiment_score,
                strategy = self.strategy.name(),
                ?raw,
                "sentiment gate overrode raw signal"
            );
            return Ok(SignalDecision {
                signal: Signal::NoTrade,
                regime,
                veto: Some(reason),
            });
        }

        Ok(SignalDecision {
            signal: raw,
            regime,
            veto: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    /// Strategy stub that always produces the same raw signal.
    struct FixedStrategy(Signal);

    impl Strategy for FixedStrategy {
        fn generate_signal(&self, _candles: &[Candle]) -> Result<Signal> {
            Ok(self.0)
        }

        fn name(&self) -> &str {
            "FixedStrategy"
        }

        fn min_candles_required(&self) -> usize {
            1
        }
    }

    fn calm_candles(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| Candle {
                symbol: "TEST".to_string(),
                open_time: Utc::now() + chrono::Duration::hours(i as i64),
                open: 100.0,
                high: 100.5,
                low: 99.5,
                close: 100.0 + (i as f64 * 0.01),
                volume: 1000.0,
            })
            .collect()
    }

    fn wild_candles(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| Candle {
                symbol: "TEST".to_string(),
                open_time: Utc::now() + chrono::Duration::hours(i as i64),
                open: 100.0,
                high: 108.0,
                low: 92.0,
                close: 100.0,
                volume: 1000.0,
            })
            .collect()
    }

    fn orchestrator(raw: Signal) -> StrategyOrchestrator {
        StrategyOrchestrator::new(RegimeClassifier::default(), Box::new(FixedStrategy(raw)))
    }

    #[test]
    fn test_extreme_volatility_bypasses_strategy() {
        let orch = orchestrator(Signal::GoLong);
        let decision = orch.get_signal(&wild_candles(250), 0.0).unwrap();

        assert_eq!(decision.signal, Signal::NoTrade);
        assert_eq!(decision.regime, MarketRegime::ExtremeVolatility);
        assert_eq!(decision.veto, Some(VetoReason::ExtremeVolatility));
        assert_eq!(decision.veto.unwrap().as_str(), "extreme_volatility");
    }

    #[test]
    fn test_negative_sentiment_vetoes_long() {
        let orch = orchestrator(Signal::GoLong);
        let decision = orch.get_signal(&calm_candles(250), -0.5).unwrap();

        assert_eq!(decision.signal, Signal::NoTrade);
        assert_eq!(decision.veto, Some(VetoReason::SentimentBlocksLong));
    }

    #[test]
    fn test_positive_sentiment_vetoes_short() {
        let orch = orchestrator(Signal::GoShort);
        let decision = orch.get_signal(&calm_candles(250), 0.5).unwrap();

        assert_eq!(decision.signal, Signal::NoTrade);
        assert_eq!(decision.veto, Some(VetoReason::SentimentBlocksShort));
    }

    #[test]
    fn test_neutral_sentiment_passes_signal_through() {
        let orch = orchestrator(Signal::GoLong);
        let decision = orch.get_signal(&calm_candles(250), 0.0).unwrap();

        assert_eq!(decision.signal, Signal::GoLong);
        assert!(decision.veto.is_none());
    }

    #[test]
    fn test_sentiment_at_threshold_is_not_vetoed() {
        let orch = orchestrator(Signal::GoLong);
        // Gate is strict: only scores strictly below -0.2 veto a long
        let decision = orch.get_signal(&calm_candles(250), -0.2).unwrap();
        assert_eq!(decision.signal, Signal::GoLong);
    }

    #[test]
    fn test_sentiment_gate_does_not_touch_exits() {
        let orch = orchestrator(Signal::ClosePosition);
        let decision = orch.get_signal(&calm_candles(250), -0.9).unwrap();

        assert_eq!(decision.signal, Signal::ClosePosition);
        assert!(decision.veto.is_none());
    }
}
