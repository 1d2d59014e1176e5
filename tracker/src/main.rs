//! InsightX Tracker - session analytics pipeline driver.
//!
//! This binary drives the tracking pipeline outside a browser: it replays
//! recorded browser signals, listens for live signals on stdin, and emits
//! one-off events against the InsightX ingestion API.
//!
//! # Commands
//!
//! - `insightx-tracker replay <FILE>`: Replay a JSONL signal script
//! - `insightx-tracker listen`: Read JSONL signals from stdin until EOF or Ctrl+C
//! - `insightx-tracker emit <EVENT_TYPE>`: Emit a single event
//! - `insightx-tracker channel <CHANNEL>`: Report an acquisition channel
//! - `insightx-tracker session`: Print the persisted session id
//!
//! # Environment Variables
//!
//! See the [`config`] module for available configuration options.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use insightx_tracker::clock::{Clock, ManualClock, SystemClock};
use insightx_tracker::config::Config;
use insightx_tracker::emitter::Emitter;
use insightx_tracker::replay::{load_script, replay};
use insightx_tracker::session::{FileStorage, SessionIdentity};
use insightx_tracker::shell::NavigationShell;
use insightx_tracker::signals::BrowserSignal;
use insightx_tracker::transport::HttpTransport;
use insightx_tracker::types::{EventFields, EventType};

/// Bounded wait for in-flight deliveries at exit.
const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Capacity of the stdin signal channel.
const SIGNAL_BUFFER: usize = 256;

/// InsightX Tracker - session analytics pipeline driver.
///
/// Reports page views, durations, scroll depth, session duration and
/// acquisition channels to the InsightX ingestion API.
#[derive(Parser, Debug)]
#[command(name = "insightx-tracker")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    INSIGHTX_API_BASE_URL          API root (default: http://127.0.0.1:8000/api/insightx)
    INSIGHTX_USER_ID               User identifier (default: 1)
    INSIGHTX_STATE_DIR             Session state directory (default: ~/.insightx)
    INSIGHTX_LANDING_ROUTE         Chat and channel capture route (default: /)
    INSIGHTX_REQUEST_TIMEOUT_SECS  HTTP request timeout (default: 30)

EXAMPLES:
    # Replay a recorded browsing session
    insightx-tracker replay session.jsonl

    # Report a job view
    insightx-tracker emit job_view --job-id 42 --page /jobs

    # Show the session id shared by all events
    insightx-tracker session
")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a JSONL script of timed browser signals.
    ///
    /// Time is driven by the script offsets, not the wall clock.
    Replay {
        /// Path to the script.
        file: PathBuf,
    },

    /// Read JSONL browser signals from stdin.
    ///
    /// Uses the wall clock. Stops on EOF or Ctrl+C and tears the shell down.
    Listen,

    /// Emit a single event.
    Emit {
        /// Event type (e.g. job_view, page_view, or any custom type).
        event_type: String,

        /// Page to attribute the event to.
        #[arg(long, default_value = "/")]
        page: String,

        /// Meta mapping as a JSON object.
        #[arg(long)]
        meta: Option<String>,

        /// Job the event refers to.
        #[arg(long)]
        job_id: Option<i64>,

        /// Post to the legacy /track/ endpoint instead.
        #[arg(long)]
        legacy: bool,
    },

    /// Report the acquisition channel of a visit.
    Channel {
        /// Channel name (e.g. Instagram).
        channel: String,
    },

    /// Print the persisted session id, creating it if absent.
    Session,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let config = Config::from_env().context("Failed to load configuration")?;

    debug!(
        api_base_url = %config.api_base_url,
        user_id = %config.user_id,
        state_dir = %config.state_dir.display(),
        "Configuration loaded"
    );

    match cli.command {
        Command::Session => run_session(&config),
        command => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to create tokio runtime")?;

            runtime.block_on(run_async(command, config))
        }
    }
}

/// Runs the commands that emit events.
async fn run_async(command: Command, config: Config) -> Result<()> {
    let emitter = build_emitter(&config)?;

    match command {
        Command::Replay { file } => run_replay(&file, &emitter, &config)?,
        Command::Listen => run_listen(&emitter, &config).await,
        Command::Emit {
            event_type,
            page,
            meta,
            job_id,
            legacy,
        } => run_emit(&emitter, event_type, page, meta, job_id, legacy)?,
        Command::Channel { channel } => {
            if channel.trim().is_empty() {
                bail!("Channel must not be blank");
            }
            emitter.capture_channel(&channel);
        }
        Command::Session => {}
    }

    shutdown(&emitter).await;
    Ok(())
}

/// Prints the session id.
fn run_session(config: &Config) -> Result<()> {
    let session = SessionIdentity::new(Arc::new(FileStorage::new(&config.state_dir)));
    println!("{}", session.get_or_create_session_id());
    Ok(())
}

/// Replays a script through a shell driven by a manual clock.
fn run_replay(file: &Path, emitter: &Emitter, config: &Config) -> Result<()> {
    let script = load_script(file)
        .with_context(|| format!("Failed to load replay script {}", file.display()))?;

    let clock = Arc::new(ManualClock::new(SystemClock.now()));
    let mut shell = NavigationShell::builder(emitter.clone(), clock.clone())
        .landing_route(config.landing_route.clone())
        .build();

    info!(file = %file.display(), signals = script.len(), "Replaying script");
    let summary = replay(&mut shell, &clock, &script);
    shell.teardown();

    println!(
        "Replayed {} signals over {}ms",
        summary.signals, summary.elapsed_ms
    );
    Ok(())
}

/// Feeds stdin signals to a live shell until EOF or a shutdown signal.
async fn run_listen(emitter: &Emitter, config: &Config) {
    let shell = NavigationShell::builder(emitter.clone(), Arc::new(SystemClock))
        .landing_route(config.landing_route.clone())
        .build();

    let (signal_tx, signal_rx) = mpsc::channel::<BrowserSignal>(SIGNAL_BUFFER);
    let shell_task = tokio::spawn(shell.run(signal_rx));

    info!("Listening for signals on stdin. Press Ctrl+C to stop.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = wait_for_shutdown() => {
                info!("Shutdown signal received");
                break;
            }

            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<BrowserSignal>(line) {
                        Ok(signal) => {
                            if signal_tx.send(signal).await.is_err() {
                                warn!("Shell stopped accepting signals");
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "Skipping malformed signal"),
                    }
                }
                Ok(None) => {
                    debug!("Reached end of input");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    break;
                }
            }
        }
    }

    drop(signal_tx);
    if let Err(e) = shell_task.await {
        error!(error = %e, "Shell task failed");
    }
}

/// Emits a single event.
fn run_emit(
    emitter: &Emitter,
    event_type: String,
    page: String,
    meta: Option<String>,
    job_id: Option<i64>,
    legacy: bool,
) -> Result<()> {
    if event_type.trim().is_empty() {
        bail!("Event type must not be blank");
    }

    let meta: Map<String, Value> = match meta {
        Some(raw) => serde_json::from_str(&raw).context("--meta must be a JSON object")?,
        None => Map::new(),
    };

    if legacy {
        let mut extra = meta;
        extra.insert("page".to_string(), Value::from(page));
        if let Some(job_id) = job_id {
            extra.insert("job_id".to_string(), Value::from(job_id));
        }
        emitter.emit_legacy(EventType::from(event_type), extra);
        return Ok(());
    }

    let mut fields = EventFields::new().page(page).meta(meta);
    if let Some(job_id) = job_id {
        fields = fields.job_id(job_id);
    }
    emitter.emit(EventType::from(event_type), fields);
    Ok(())
}

/// Builds the emitter from configuration.
fn build_emitter(config: &Config) -> Result<Emitter> {
    let transport = HttpTransport::new(&config.api_base_url, config.request_timeout)
        .context("Failed to create HTTP transport")?;
    let session = SessionIdentity::new(Arc::new(FileStorage::new(&config.state_dir)));

    Ok(Emitter::new(
        config.user_id.clone(),
        Arc::new(transport),
        session,
    ))
}

/// Waits a bounded time for in-flight deliveries.
async fn shutdown(emitter: &Emitter) {
    let pending = emitter
        .drain(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS))
        .await;

    if pending > 0 {
        error!(pending_events = pending, "Some events could not be delivered");
    }
}

/// Initializes the logging subsystem.
///
/// Logs go to stderr so command output on stdout stays clean.
fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
