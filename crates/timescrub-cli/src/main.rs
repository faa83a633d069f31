//! timescrub: replay a recorded capture through the block cache and player.
//!
//! Usage:
//!   # Historical playback through the block cache
//!   timescrub --recording capture.jsonl
//!
//!   # Only some subjects, starting at t=5000, for ten seconds
//!   timescrub --recording capture.jsonl --subject status/position --from 5000 --duration 10000
//!
//!   # Live passthrough (latest record per request, no caching)
//!   timescrub --recording capture.jsonl --live
//!
//! Logging goes to stderr and honours `RUST_LOG`; frames go to stdout.

mod config;
mod hooks;
mod source;

use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::{EnvFilter, fmt};

use timescrub_cache::{BatchSink, BlockCacheProvider, DataProvider, LiveProvider, pump};
use timescrub_player::{Loader, PlaybackDataLoader, Player};
use timescrub_types::{Request, Timestamp};

use crate::config::AppConfig;
use crate::hooks::PrintHooks;
use crate::source::{Recording, SimulatedSource, SourceMode};

/// How often the driver checks for the end of playback.
const WATCH_PERIOD: Duration = Duration::from_millis(50);

/// Replay a JSON-lines recording through the timescrub cache and player.
#[derive(Parser, Debug)]
#[command(name = "timescrub")]
#[command(about = "Frame-paced playback of a recorded capture")]
struct Args {
    /// JSON-lines recording: one {"subject", "timestamp", ...} object per line
    #[arg(short, long)]
    recording: PathBuf,

    /// Subject to show (repeatable; default: every subject in the recording)
    #[arg(short, long = "subject")]
    subjects: Vec<String>,

    /// Config file (default: $XDG_CONFIG_HOME/timescrub/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the live provider instead of the block cache
    #[arg(long)]
    live: bool,

    /// Start timestamp (default: start of the recording)
    #[arg(long)]
    from: Option<Timestamp>,

    /// Stop after this much wall-clock time, in ms
    #[arg(long)]
    duration: Option<u64>,

    /// Playback step in ms (overrides config)
    #[arg(long)]
    interval: Option<i64>,

    /// Simulated remote latency in ms (overrides config)
    #[arg(long)]
    latency: Option<u64>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(interval) = args.interval {
        config.player.interval_ms = interval;
    }
    if let Some(latency) = args.latency {
        config.source.latency_ms = latency;
    }
    config.player.validate()?;

    let recording = Recording::load(&args.recording)?;
    if recording.is_empty() {
        bail!("recording {} has no records", args.recording.display());
    }

    // The cache and player are !Send
    let local_set = tokio::task::LocalSet::new();
    local_set.run_until(run(args, config, recording)).await
}

async fn run(args: Args, config: AppConfig, recording: Recording) -> Result<()> {
    let subjects = if args.subjects.is_empty() {
        recording.subjects()
    } else {
        args.subjects.clone()
    };
    let start = args.from.unwrap_or_else(|| recording.start_time());
    let end = recording.end_time();
    tracing::info!(
        records = recording.len(),
        subjects = subjects.len(),
        start,
        end,
        live = args.live,
        "starting playback"
    );

    let (request_tx, request_rx) = mpsc::unbounded_channel::<Request>();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel::<Value>();
    let mode = if args.live { SourceMode::Live } else { SourceMode::Ranged };
    let source = SimulatedSource::new(
        Rc::new(recording),
        mode,
        Duration::from_millis(config.source.latency_ms),
    );
    let source_task = source.spawn(request_rx, reply_tx);

    let (loader, pump_task) = if args.live {
        wire(LiveProvider::new(request_tx), reply_rx, start)
    } else {
        let cache = BlockCacheProvider::with_config(request_tx, config.cache.clone())?;
        wire(cache, reply_rx, start)
    };
    loader.seek(start);

    let hooks = PrintHooks::new(subjects, config.source.window_ms);
    let player = Player::with_config(loader, hooks, config.player.clone())?;
    player.play().await?;

    let outcome = watch(&player, &pump_task, end, args.duration).await;

    let stopped = player.stop().await;
    source_task.abort();
    pump_task.abort();
    tracing::info!(frames = player.hooks().frames(), "playback finished");

    outcome?;
    stopped?;
    Ok(())
}

/// Put `provider` behind a loader and start pumping replies into it.
fn wire<P>(
    provider: P,
    replies: mpsc::UnboundedReceiver<Value>,
    start: Timestamp,
) -> (Rc<dyn Loader>, JoinHandle<timescrub_cache::Result<()>>)
where
    P: DataProvider + BatchSink + Clone + 'static,
{
    let sink = provider.clone();
    let pump_task = tokio::task::spawn_local(async move { pump(&sink, replies).await });
    let loader = PlaybackDataLoader::new(provider).with_start_time(start);
    (Rc::new(loader), pump_task)
}

/// Wait until playback passes `end`, the duration runs out, or something fails.
async fn watch(
    player: &Player<PrintHooks>,
    pump_task: &JoinHandle<timescrub_cache::Result<()>>,
    end: Timestamp,
    duration: Option<u64>,
) -> Result<()> {
    let deadline = duration.map(|ms| tokio::time::Instant::now() + Duration::from_millis(ms));
    let mut ticks = tokio::time::interval(WATCH_PERIOD);

    loop {
        ticks.tick().await;

        if let Some(e) = player.take_loop_error() {
            bail!("playback halted: {e}");
        }
        if pump_task.is_finished() {
            bail!("inbound pump stopped");
        }
        if !player.is_playing() {
            tracing::info!("player stopped itself");
            return Ok(());
        }
        if player.current_time() >= end {
            tracing::info!(at = player.current_time(), "reached end of recording");
            return Ok(());
        }
        if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
            tracing::info!(at = player.current_time(), "duration elapsed");
            return Ok(());
        }
    }
}
