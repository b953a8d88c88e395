use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use hostwatch::alert::{AlertMetric, HttpAlertSink, ThresholdEngine, ThresholdStore};
use hostwatch::connection::{
    ConnectionManager, ConnectionState, Credentials, FeedEvent, WsTransport,
};
use hostwatch::data::SeriesStore;

#[derive(Parser, Debug)]
#[command(name = "hostwatch")]
#[command(about = "Headless monitor for live host resource feeds")]
struct Args {
    /// WebSocket feed endpoint
    #[arg(long, default_value = "ws://localhost:8000/feed")]
    url: String,

    /// Identity of the monitoring user
    #[arg(long)]
    user_id: String,

    /// Bearer token for the session-scoped stream and the alert gateway
    #[arg(long, default_value = "")]
    token: String,

    /// Alert gateway base URL
    #[arg(long, default_value = "http://localhost:8000")]
    api_url: String,

    /// Path to the durable threshold file
    #[arg(long, default_value = "thresholds.json")]
    thresholds_file: PathBuf,

    /// Points kept per metric series
    #[arg(long, default_value = "30")]
    window: usize,

    /// CPU usage limit override, percent
    #[arg(long)]
    cpu_threshold: Option<f64>,

    /// Memory usage limit override, GB
    #[arg(long)]
    memory_threshold_gb: Option<f64>,

    /// Keep chart history across reconnects instead of clearing it
    #[arg(long)]
    keep_history_on_reconnect: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    run(args).await
}

async fn run(args: Args) -> Result<()> {
    let transport = Arc::new(WsTransport::new(args.url.as_str()));
    let manager = ConnectionManager::new(
        transport,
        Credentials::new(args.user_id.as_str(), args.token.as_str()),
    );

    let store = Arc::new(ThresholdStore::open(&args.thresholds_file)?);
    let sink = Arc::new(HttpAlertSink::new(args.api_url.as_str(), args.token.as_str()));
    let engine = ThresholdEngine::new(store, sink, args.user_id.as_str());
    if let Some(limit) = args.cpu_threshold {
        engine.set_limit(AlertMetric::Cpu, limit);
    }
    if let Some(limit) = args.memory_threshold_gb {
        engine.set_limit(AlertMetric::MemoryGb, limit);
    }

    let mut series = SeriesStore::with_policy(args.window, !args.keep_history_on_reconnect);

    let (_subscription, mut events) = manager.subscribe();
    info!(url = %args.url, "Connecting to feed");
    manager.connect().await?;

    let mut recovering = false;
    while let Some(event) = events.recv().await {
        match event {
            FeedEvent::Sample(sample) => {
                series.record(&sample);
                engine.evaluate_sample(&sample);
                debug!(
                    cpu = sample.cpu,
                    memory_pct = sample.memory.percentage,
                    disk_gb = sample.disk,
                    "Sample recorded"
                );
            }
            FeedEvent::State(state) => {
                info!(state = state.label(), "Connection state changed");
                match state {
                    ConnectionState::Reconnecting => recovering = true,
                    ConnectionState::Connected if recovering => {
                        recovering = false;
                        series.on_reconnect();
                    }
                    ConnectionState::Failed(reason) => {
                        error!(reason = %reason, "Feed failed, giving up");
                        anyhow::bail!("feed failed: {reason}");
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(())
}
