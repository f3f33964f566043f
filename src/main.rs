use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use tradebot::backtest::{BacktestHarness, MarketScenario, SyntheticDataGenerator};
use tradebot::execution::{ExecutionRouter, PaperAdapter};
use tradebot::live::{LiveLoop, NeutralSentiment};
use tradebot::models::Candle;
use tradebot::persistence::SnapshotStore;
use tradebot::regime::RegimeClassifier;
use tradebot::risk::RiskManager;
use tradebot::strategy::{StrategyOrchestrator, VolatilityBreakoutStrategy};
use tradebot::{BotConfig, BotError, ExecutionMode};

/// Trades resolved per year at one trade a day, used to scale Sharpe.
const ANNUALIZATION_FACTOR: f64 = 252.0;

#[derive(Parser)]
#[command(name = "tradebot", about = "Regime-aware trading engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a candle series through the full pipeline
    Backtest {
        /// JSON file containing an ordered array of candles
        #[arg(long, conflicts_with_all = ["seed", "scenario"])]
        candles: Option<PathBuf>,
        /// Seed for synthetic data when no candle file is given
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Synthetic market scenario: uptrend, downtrend, sideways, volatile, drawdown
        #[arg(long, default_value = "uptrend")]
        scenario: String,
        /// Number of synthetic candles to generate
        #[arg(long, default_value_t = 1000)]
        num_candles: usize,
    },
    /// Run the trading loop against the configured execution mode
    Live,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradebot=info".into()),
        )
        .init();

    if let Err(err) = run(Cli::parse()).await {
        tracing::error!(error = %err, "fatal");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> tradebot::Result<()> {
    let config = BotConfig::load()?;

    match cli.command {
        Commands::Backtest {
            candles,
            seed,
            scenario,
            num_candles,
        } => run_backtest(&config, candles, seed, &scenario, num_candles),
        Commands::Live => run_live(&config).await,
    }
}

fn build_orchestrator(config: &BotConfig) -> StrategyOrchestrator {
    StrategyOrchestrator::new(
        RegimeClassifier::default(),
        Box::new(VolatilityBreakoutStrategy::default()),
    )
    .with_sentiment_thresholds(config.sentiment_long_veto, config.sentiment_short_veto)
}

fn run_backtest(
    config: &BotConfig,
    candle_file: Option<PathBuf>,
    seed: u64,
    scenario: &str,
    num_candles: usize,
) -> tradebot::Result<()> {
    let candles: Vec<Candle> = match candle_file {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        }
        None => {
            let scenario: MarketScenario = scenario.parse().map_err(BotError::Config)?;
            let symbol = config
                .symbols
                .first()
                .map(String::as_str)
                .unwrap_or("BTCUSDT");
            tracing::info!(?scenario, seed, num_candles, "generating synthetic series");
            SyntheticDataGenerator::new(symbol, seed).generate(scenario, num_candles, 5)
        }
    };

    let classifier = RegimeClassifier::default();
    let lookback = classifier.min_candles_required();
    let mut harness = BacktestHarness::new(
        RiskManager::from_config(config),
        build_orchestrator(config),
        lookback,
        ANNUALIZATION_FACTOR,
    );

    let report = harness.run(&candles, None)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_live(config: &BotConfig) -> tradebot::Result<()> {
    let adapter = match config.mode {
        ExecutionMode::Paper => PaperAdapter::new(config.initial_capital)
            .with_latency(std::time::Duration::from_millis(config.paper_latency_ms)),
        ExecutionMode::Live => {
            // Wiring a venue client is deployment-specific; the binary only
            // ships the paper simulator.
            return Err(BotError::Config(
                "live mode requires a venue client, none is configured".to_string(),
            ));
        }
    };

    let halt = Arc::new(AtomicBool::new(false));
    let mut live = LiveLoop::new(
        RiskManager::from_config(config),
        build_orchestrator(config),
        ExecutionRouter::new(Box::new(adapter)),
        SnapshotStore::new(&config.snapshot_path),
        Box::new(NeutralSentiment),
        halt.clone(),
    );

    let orphans = live.startup().await?;
    for orphan in &orphans {
        tracing::warn!(
            client_order_id = %orphan.client_order_id,
            "orphan order needs operator attention"
        );
    }

    let (tx, rx) = mpsc::channel(64);
    let symbol = config
        .symbols
        .first()
        .cloned()
        .unwrap_or_else(|| "BTCUSDT".to_string());
    tokio::spawn(feed_demo_candles(tx, symbol));

    let halt_on_signal = halt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, halting");
            halt_on_signal.store(true, Ordering::SeqCst);
        }
    });

    live.run(rx).await
}

/// Synthetic candle feed for paper sessions. A real deployment replaces
/// this with a market-data subscriber pushing into the same channel.
async fn feed_demo_candles(tx: mpsc::Sender<Candle>, symbol: String) {
    let mut gen = SyntheticDataGenerator::new(&symbol, rand::random());
    let candles = gen.generate(MarketScenario::Sideways, 10_000, 5);

    for candle in candles {
        if tx.send(candle).await.is_err() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
}
