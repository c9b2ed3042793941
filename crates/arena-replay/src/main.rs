mod input;
mod replay;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use debate_engine::SessionContext;
use tracing::info;

use replay::ReplayOptions;

/// Replay a recorded debate stream through the debate engine and print the
/// final session state as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Recorded events, NDJSON or SSE frames
    events: PathBuf,

    /// Debate setup JSON (debaters, topic, rounds)
    #[arg(short, long)]
    setup: PathBuf,

    /// Engine config JSON; ARENA_* environment variables otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How long each argument is spoken before it completes
    #[arg(long, default_value_t = 1500)]
    speech_ms: u64,

    /// Spacing between recorded events
    #[arg(long, default_value_t = 250)]
    feed_interval_ms: u64,

    /// Hold on the conclusion and the winner before moving on
    #[arg(long, default_value_t = 1000)]
    hold_ms: u64,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 600)]
    max_secs: u64,

    /// User the session is attributed to in logs
    #[arg(long)]
    user_id: Option<String>,

    /// Pretty-print the summary
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let debate = input::load_setup(&args.setup)?;
    let config = input::load_config(args.config.as_deref())?;
    let events = input::load_events(&args.events)?;
    let session = SessionContext::new(args.user_id.clone());

    info!(
        session_id = %session.session_id,
        topic = %debate.topic,
        events = events.len(),
        "Loaded recording"
    );

    let opts = ReplayOptions {
        speech: Duration::from_millis(args.speech_ms),
        feed_interval: Duration::from_millis(args.feed_interval_ms),
        hold: Duration::from_millis(args.hold_ms),
        max_duration: Duration::from_secs(args.max_secs),
    };
    let summary = replay::replay(debate, config, session, events, opts).await;

    let json = if args.pretty {
        serde_json::to_string_pretty(&summary)?
    } else {
        serde_json::to_string(&summary)?
    };
    println!("{json}");

    Ok(())
}
