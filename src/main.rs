//! Pullback Trader - Main Entry Point
//!
//! Replays recorded one-minute bars through the engine against the paper
//! broker, with the order sweep running on its own timer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::Parser;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use pullback_trader::broker::{PaperBroker, PaperBrokerConfig};
use pullback_trader::common::channels::{create_event_channel_with_size, create_notification_channel};
use pullback_trader::config::load_config;
use pullback_trader::feed::ReplayFeed;
use pullback_trader::screening::{Candidate, UniverseScreener};
use pullback_trader::{BarFeed, EngineEvent, Trader};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); defaults to the config value
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// JSON-lines file of recorded bars to replay
    #[arg(long)]
    replay: PathBuf,

    /// Comma-separated symbols to trade, overriding the configured universe
    #[arg(long)]
    universe: Option<String>,

    /// JSON file of screening candidates; the screened list becomes the universe
    #[arg(long)]
    candidates: Option<PathBuf>,

    /// Starting cash of the paper account
    #[arg(long, default_value = "1000000")]
    initial_cash: Decimal,

    /// Milliseconds between replayed bars
    #[arg(long, default_value_t = 0)]
    pace_ms: u64,
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Event loop state: the engine plus the paper venue it trades against
struct Runner {
    trader: Trader,
    broker: Arc<PaperBroker>,
    /// Latest bar time, the clock the sweep task runs on during replay
    market_clock: Arc<RwLock<Option<NaiveDateTime>>>,
    last_day: Option<NaiveDate>,
}

impl Runner {
    fn dispatch(&mut self, event: EngineEvent) {
        if let EngineEvent::Bar(bar) = &event {
            let day = bar.trading_day();
            if self.last_day.is_some_and(|last| last != day) {
                self.broker.start_new_day();
            }
            self.last_day = Some(day);
            self.broker.observe_bar(bar);
            *self.market_clock.write() = Some(bar.timestamp);
        }
        self.trader.handle(event);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();
    let mut config = load_config(Some(&args.config)).context("loading configuration")?;

    // Initialize logging
    let level = parse_level(args.log_level.as_deref().unwrap_or(&config.settings.log_level));
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);
    if args.log_json {
        tracing::subscriber::set_global_default(builder.json().with_current_span(true).finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    info!("Starting pullback trader");
    info!("Configuration file: {}", args.config);

    if let Some(universe) = &args.universe {
        config.strategy.universe = universe
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }

    let (tx, mut rx) = create_event_channel_with_size(config.settings.event_channel_size);
    let (notify_tx, mut notify_rx) = create_notification_channel();

    let broker = Arc::new(
        PaperBroker::new(PaperBrokerConfig {
            initial_cash: args.initial_cash,
            lot_size: config.strategy.lot_size,
            ..PaperBrokerConfig::default()
        })
        .with_notifier(notify_tx),
    );

    let mut trader = Trader::new(config.clone(), broker.clone(), broker.clone());

    if let Some(path) = &args.candidates {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading candidates from {}", path.display()))?;
        let candidates: Vec<Candidate> = serde_json::from_str(&raw).context("parsing candidates")?;
        let selected = UniverseScreener::new(config.screening.clone()).screen(&candidates);
        trader.reset_universe(selected);
    }
    info!("Trading universe: {} symbols", trader.universe().len());

    let market_clock = Arc::new(RwLock::new(None));

    // Periodic sweep, independent of bar delivery
    let sweep_orders = trader.orders();
    let sweep_broker = trader.broker();
    let sweep_clock = Arc::clone(&market_clock);
    let sweep_every = Duration::from_secs(config.orders.sweep_interval_seconds);
    let sweep_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_every);
        loop {
            ticker.tick().await;
            let now = *sweep_clock.read();
            if let Some(now) = now {
                let outcome = sweep_orders.sweep(now, sweep_broker.as_ref());
                if !outcome.is_empty() {
                    info!(
                        "Timer sweep: {} cancelled, {} failed",
                        outcome.cancelled.len(),
                        outcome.failed.len()
                    );
                }
            }
        }
    });

    let mut feed = ReplayFeed::new(&args.replay);
    if args.pace_ms > 0 {
        feed = feed.with_pace(Duration::from_millis(args.pace_ms));
    }
    info!("Replaying from {}", feed.source_name());
    let mut feed_task = tokio::spawn(async move { feed.start(tx).await });

    let mut runner = Runner {
        trader,
        broker,
        market_clock,
        last_day: None,
    };

    loop {
        tokio::select! {
            biased;
            Some(event) = notify_rx.recv() => runner.dispatch(event),
            Some(event) = rx.recv() => runner.dispatch(event),
            result = &mut feed_task => {
                match result {
                    Ok(Ok(())) => info!("Replay complete"),
                    Ok(Err(e)) => error!("Replay failed: {}", e),
                    Err(e) => error!("Replay task panicked: {}", e),
                }
                while let Ok(event) = rx.try_recv() {
                    runner.dispatch(event);
                    while let Ok(notice) = notify_rx.try_recv() {
                        runner.dispatch(notice);
                    }
                }
                while let Ok(notice) = notify_rx.try_recv() {
                    runner.dispatch(notice);
                }
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal, cleaning up...");
                break;
            }
        }
    }

    sweep_task.abort();
    info!(
        "Finished with {} orders outstanding, cash {}",
        runner.trader.orders().len(),
        runner.broker.cash()
    );

    Ok(())
}
