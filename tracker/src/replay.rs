//! Headless replay of recorded browser signals.
//!
//! A script is a JSONL file with one timed signal per line:
//!
//! ```text
//! {"at_ms": 0, "signal": "navigate", "location": "/?channel=Instagram"}
//! {"at_ms": 1200, "signal": "scroll", "scroll_top": 400, "document_height": 1800, "viewport_height": 800}
//! {"at_ms": 5000, "signal": "navigate", "location": "/jobs"}
//! {"at_ms": 9000, "signal": "unload"}
//! ```
//!
//! `at_ms` is relative to the start of the replay and must not go backwards.
//! Blank lines and lines starting with `#` are skipped. Replays drive a
//! [`ManualClock`], so durations come out of the script rather than the wall
//! clock.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::clock::{Clock, ManualClock};
use crate::shell::NavigationShell;
use crate::signals::BrowserSignal;

/// Errors that can occur while loading a replay script.
#[derive(Error, Debug)]
pub enum ReplayError {
    /// Script could not be read.
    #[error("failed to read replay script: {0}")]
    Io(#[from] std::io::Error),

    /// A line is not a valid timed signal.
    #[error("invalid signal on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A line is timed before the one preceding it.
    #[error("line {line} goes back in time ({at_ms}ms after {previous_ms}ms)")]
    OutOfOrder {
        line: usize,
        at_ms: u64,
        previous_ms: u64,
    },
}

/// One timed signal from a replay script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptLine {
    /// Offset from the start of the replay, in milliseconds.
    #[serde(default)]
    pub at_ms: u64,
    #[serde(flatten)]
    pub signal: BrowserSignal,
}

/// Outcome of a replay run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaySummary {
    /// Signals handed to the shell.
    pub signals: usize,
    /// Offset of the last signal, in milliseconds.
    pub elapsed_ms: u64,
}

/// Parses a script from a reader.
///
/// # Errors
///
/// Returns an error for unreadable input, malformed lines, or lines timed
/// before their predecessor. Line numbers are 1-based.
pub fn parse_script<R: BufRead>(reader: R) -> Result<Vec<ScriptLine>, ReplayError> {
    let mut lines = Vec::new();
    let mut previous_ms = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let number = index + 1;
        let parsed: ScriptLine = serde_json::from_str(trimmed).map_err(|source| ReplayError::Json {
            line: number,
            source,
        })?;

        if parsed.at_ms < previous_ms {
            return Err(ReplayError::OutOfOrder {
                line: number,
                at_ms: parsed.at_ms,
                previous_ms,
            });
        }
        previous_ms = parsed.at_ms;
        lines.push(parsed);
    }

    Ok(lines)
}

/// Loads a script from a file.
///
/// # Errors
///
/// See [`parse_script`].
pub fn load_script(path: &Path) -> Result<Vec<ScriptLine>, ReplayError> {
    let file = File::open(path)?;
    parse_script(BufReader::new(file))
}

/// Feeds `script` to `shell`, moving `clock` to each line's offset first.
///
/// Offsets are measured from the clock's reading when the replay starts.
pub fn replay(shell: &mut NavigationShell, clock: &ManualClock, script: &[ScriptLine]) -> ReplaySummary {
    let start = clock.now();
    let mut summary = ReplaySummary::default();

    for line in script {
        clock.set(
            start
                .checked_add_signed(offset(line.at_ms))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        );
        debug!(at_ms = line.at_ms, signal = ?line.signal, "Replaying signal");
        shell.handle(line.signal.clone());

        summary.signals += 1;
        summary.elapsed_ms = line.at_ms;
    }

    info!(
        signals = summary.signals,
        elapsed_ms = summary.elapsed_ms,
        "Replay finished"
    );
    summary
}

fn offset(at_ms: u64) -> Duration {
    Duration::milliseconds(i64::try_from(at_ms).unwrap_or(i64::MAX))
}
