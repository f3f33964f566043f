use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::execution::{ExecutionRouter, PositionManager};
use crate::models::{
    Candle, Direction, Order, OrderRequest, OrderSide, OrderStatus, OrderType, Signal, VetoReason,
};
use crate::persistence::SnapshotStore;
use crate::risk::RiskManager;
use crate::strategy::StrategyOrchestrator;

/// External sentiment feed. `None` means no reading is available for the
/// symbol, which the loop treats as neutral.
#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn latest_score(&self, symbol: &str) -> anyhow::Result<Option<f64>>;
}

/// Always-neutral source for when no sentiment pipeline is wired up.
pub struct NeutralSentiment;

#[async_trait]
impl SentimentSource for NeutralSentiment {
    async fn latest_score(&self, _symbol: &str) -> anyhow::Result<Option<f64>> {
        Ok(None)
    }
}

/// Candles kept per symbol for indicator history.
const HISTORY_LIMIT: usize = 500;

/// The trading event loop. Single writer: every piece of mutable state
/// (risk counters, positions, order tracking) is touched only here, one
/// candle at a time.
pub struct LiveLoop {
    risk: RiskManager,
    orchestrator: StrategyOrchestrator,
    positions: PositionManager,
    router: ExecutionRouter,
    snapshots: SnapshotStore,
    sentiment: Box<dyn SentimentSource>,
    halt: Arc<AtomicBool>,
    history: HashMap<String, Vec<Candle>>,
}

impl LiveLoop {
    pub fn new(
        risk: RiskManager,
        orchestrator: StrategyOrchestrator,
        router: ExecutionRouter,
        snapshots: SnapshotStore,
        sentiment: Box<dyn SentimentSource>,
        halt: Arc<AtomicBool>,
    ) -> Self {
        Self {
            risk,
            orchestrator,
            positions: PositionManager::new(),
            router,
            snapshots,
            sentiment,
            halt,
            history: HashMap::new(),
        }
    }

    /// Restore persisted positions, then reconcile local order state with
    /// the venue. Returned orphans are for the operator; they are never
    /// adopted or canceled here.
    pub async fn startup(&mut self) -> crate::Result<Vec<Order>> {
        self.positions = PositionManager::restore(self.snapshots.load()?);

        let known = self.router.known_order_ids();
        let orphans = self.router.reconcile_on_startup(&known).await?;

        tracing::info!(
            adapter = self.router.adapter_name(),
            restored_positions = self.positions.position_count(),
            orphan_orders = orphans.len(),
            "startup complete"
        );
        Ok(orphans)
    }

    /// Consume candles until the channel closes or the halt flag is set.
    /// Per-candle failures are logged and skipped so one bad venue call
    /// cannot stall the feed.
    pub async fn run(&mut self, mut candles: mpsc::Receiver<Candle>) -> crate::Result<()> {
        while let Some(candle) = candles.recv().await {
            if self.halt.load(Ordering::SeqCst) {
                tracing::warn!("halt flag set, stopping loop");
                break;
            }
            if let Err(err) = self.on_candle(candle).await {
                tracing::error!(error = %err, "candle processing failed");
            }
        }

        self.snapshots.save(&self.positions.snapshot())?;
        tracing::info!("loop stopped, final snapshot saved");
        Ok(())
    }

    async fn on_candle(&mut self, candle: Candle) -> crate::Result<()> {
        let symbol = candle.symbol.clone();
        let price = candle.close;

        let history = self.history.entry(symbol.clone()).or_default();
        history.push(candle.clone());
        if history.len() > HISTORY_LIMIT {
            let excess = history.len() - HISTORY_LIMIT;
            history.drain(..excess);
        }

        self.router.set_reference_price(&symbol, price);

        // Manage what is already open before looking for new entries
        let tightened = self.positions.update_trailing_stops(&symbol, price);
        let closed = self.positions.check_exits(&symbol, price);
        if !closed.is_empty() {
            self.settle_closed_trades(&closed, candle.open_time)?;
        } else if tightened {
            // A moved trailing stop is a position mutation; a restart must
            // not fall back to the looser persisted stop.
            self.snapshots.save(&self.positions.snapshot())?;
        }

        let score = self.fetch_sentiment(&symbol).await;
        let history = &self.history[&symbol];
        let decision = self.orchestrator.get_signal(history, score)?;

        let direction = match decision.signal {
            Signal::NoTrade => return Ok(()),
            Signal::ClosePosition => {
                let closed = self.positions.close_all_for_symbol(&symbol, price);
                if !closed.is_empty() {
                    self.settle_closed_trades(&closed, candle.open_time)?;
                }
                return Ok(());
            }
            Signal::GoLong => Direction::Long,
            Signal::GoShort => Direction::Short,
        };

        // Halt is re-checked right before any risk mutation or submission
        if self.halt.load(Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(block) = self.risk.entry_block(candle.open_time) {
            tracing::info!(%symbol, reason = block.as_str(), "entry skipped");
            return Ok(());
        }

        let stop = match direction {
            Direction::Long => candle.low,
            Direction::Short => candle.high,
        };
        let quantity = self.risk.calculate_position_size(
            price,
            stop,
            direction == Direction::Long,
            history,
        );
        if quantity == 0.0 {
            tracing::info!(%symbol, reason = VetoReason::SizingVeto.as_str(), "entry skipped");
            return Ok(());
        }

        let request = OrderRequest {
            symbol: symbol.clone(),
            side: match direction {
                Direction::Long => OrderSide::Buy,
                Direction::Short => OrderSide::Sell,
            },
            quantity,
            order_type: OrderType::Market,
        };

        let order = match self.router.submit(request).await {
            Ok(order) => order,
            Err(err) => {
                tracing::warn!(%symbol, error = %err, "order submission failed");
                return Ok(());
            }
        };

        if order.status == OrderStatus::Filled {
            self.positions
                .open_from_fill(&order, stop, candle.open_time)?;
            self.snapshots.save(&self.positions.snapshot())?;
        } else {
            tracing::warn!(
                client_order_id = %order.client_order_id,
                status = ?order.status,
                "order did not fill, no position opened"
            );
        }

        Ok(())
    }

    fn settle_closed_trades(
        &mut self,
        closed: &[crate::execution::ClosedTrade],
        now: chrono::DateTime<chrono::Utc>,
    ) -> crate::Result<()> {
        for trade in closed {
            if trade.pnl < 0.0 {
                self.risk.record_loss(now);
            } else {
                self.risk.record_win();
            }
            self.risk.apply_realized_pnl(trade.pnl, now);
            self.router.apply_realized_pnl(trade.pnl);
        }
        self.snapshots.save(&self.positions.snapshot())
    }

    async fn fetch_sentiment(&self, symbol: &str) -> f64 {
        match self.sentiment.latest_score(symbol).await {
            Ok(Some(score)) => score.clamp(-1.0, 1.0),
            Ok(None) => 0.0,
            Err(err) => {
                tracing::warn!(%symbol, error = %err, "sentiment fetch failed, using neutral");
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BotConfig;
    use crate::execution::PaperAdapter;
    use crate::models::Candle;
    use crate::regime::RegimeClassifier;
    use crate::strategy::Strategy;
    use chrono::{Duration, TimeZone, Utc};

    struct AlwaysLong;

    impl Strategy for AlwaysLong {
        fn generate_signal(&self, _candles: &[Candle]) -> crate::Result<Signal> {
            Ok(Signal::GoLong)
        }

        fn name(&self) -> &str {
            "always-long"
        }

        fn min_candles_required(&self) -> usize {
            1
        }
    }

    fn calm_candle(i: usize, close: f64) -> Candle {
        Candle {
            symbol: "BTCUSDT".to_string(),
            open_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(i as i64 * 5),
            open: close,
            high: close * 1.001,
            low: close * 0.999,
            close,
            volume: 1000.0,
        }
    }

    /// Goes long exactly once, then stands aside.
    struct LongOnce(AtomicBool);

    impl Strategy for LongOnce {
        fn generate_signal(&self, _candles: &[Candle]) -> crate::Result<Signal> {
            if self.0.swap(true, Ordering::SeqCst) {
                Ok(Signal::NoTrade)
            } else {
                Ok(Signal::GoLong)
            }
        }

        fn name(&self) -> &str {
            "long-once"
        }

        fn min_candles_required(&self) -> usize {
            1
        }
    }

    fn test_loop(
        dir: &tempfile::TempDir,
        halt: Arc<AtomicBool>,
        strategy: Box<dyn Strategy>,
    ) -> LiveLoop {
        let config = BotConfig::default();
        let mut adapter = PaperAdapter::new(10_000.0);
        adapter.set_mark_price("BTCUSDT", 100.0);

        LiveLoop::new(
            RiskManager::from_config(&config),
            StrategyOrchestrator::new(RegimeClassifier::default(), strategy),
            ExecutionRouter::new(Box::new(adapter)),
            SnapshotStore::new(dir.path().join("positions.json")),
            Box::new(NeutralSentiment),
            halt,
        )
    }

    #[tokio::test]
    async fn test_candle_opens_position_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let halt = Arc::new(AtomicBool::new(false));
        let mut live = test_loop(&dir, halt, Box::new(AlwaysLong));
        live.startup().await.unwrap();

        let (tx, rx) = mpsc::channel(32);
        for i in 0..25 {
            tx.send(calm_candle(i, 100.0)).await.unwrap();
        }
        drop(tx);

        live.run(rx).await.unwrap();

        let saved = SnapshotStore::new(dir.path().join("positions.json"))
            .load()
            .unwrap();
        assert!(!saved.is_empty());
    }

    #[tokio::test]
    async fn test_tightened_trailing_stop_reaches_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let halt = Arc::new(AtomicBool::new(false));
        let mut live = test_loop(&dir, halt, Box::new(LongOnce(AtomicBool::new(false))));
        live.startup().await.unwrap();

        // Long opens at 100 with the candle low (99.9) as stop
        live.on_candle(calm_candle(0, 100.0)).await.unwrap();
        // 101 is past activation (100.1); the trail moves to ~100.9 with no
        // fill or exit on this candle
        live.on_candle(calm_candle(1, 101.0)).await.unwrap();

        let saved = SnapshotStore::new(dir.path().join("positions.json"))
            .load()
            .unwrap();
        assert_eq!(saved.len(), 1);
        let trail = saved[0].trailing_stop_price.expect("trail not persisted");
        assert!((trail - 100.9).abs() < 1e-6, "got {}", trail);
    }

    #[tokio::test]
    async fn test_halt_flag_stops_processing() {
        let dir = tempfile::tempdir().unwrap();
        let halt = Arc::new(AtomicBool::new(true));
        let mut live = test_loop(&dir, halt, Box::new(AlwaysLong));
        live.startup().await.unwrap();

        let (tx, rx) = mpsc::channel(16);
        tx.send(calm_candle(0, 100.0)).await.unwrap();
        drop(tx);

        live.run(rx).await.unwrap();

        let saved = SnapshotStore::new(dir.path().join("positions.json"))
            .load()
            .unwrap();
        assert!(saved.is_empty());
    }
}
