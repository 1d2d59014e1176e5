//! InsightX Tracker - session analytics and event tracking pipeline.
//!
//! This crate reports page views, page durations, scroll depth, session
//! duration and acquisition channels to the InsightX ingestion API.
//!
//! # Overview
//!
//! A [`shell::NavigationShell`] is mounted once per application lifetime. It
//! receives [`signals::BrowserSignal`]s (navigation, scroll, unload) and fans
//! them out to independent [`signals::Tracker`]s. Trackers build payloads and
//! hand them to the [`emitter::Emitter`], which attaches the persisted session
//! id and POSTs them fire-and-forget. Delivery failures are logged and never
//! reach the caller.
//!
//! # Modules
//!
//! - [`clock`]: Time source port with system and manual clocks
//! - [`config`]: Configuration from environment variables
//! - [`emitter`]: Fire-and-forget event emission
//! - [`error`]: Error types for tracker operations
//! - [`replay`]: Headless replay of JSONL signal scripts
//! - [`session`]: Persisted session identity
//! - [`shell`]: Navigation shell composing the trackers
//! - [`signals`]: Browser signal types and the tracker observer trait
//! - [`trackers`]: Page view, scroll depth, session duration and channel trackers
//! - [`transport`]: HTTP and in-memory transports
//! - [`types`]: Event records and wire bodies

pub mod clock;
pub mod config;
pub mod emitter;
pub mod error;
pub mod replay;
pub mod session;
pub mod shell;
pub mod signals;
pub mod trackers;
pub mod transport;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use emitter::{Emitter, Location};
pub use error::{Result, TrackerError};
pub use replay::{load_script, parse_script, replay, ReplayError, ReplaySummary, ScriptLine};
pub use session::{FileStorage, KeyValueStorage, MemoryStorage, SessionIdentity, StorageError};
pub use shell::{ChatAffordance, ChatState, NavigationShell, ShellBuilder};
pub use signals::{BrowserSignal, ScrollSample, Tracker, Visit};
pub use transport::{Endpoint, HttpTransport, RecordingTransport, Transport, TransportError};
pub use types::{EventFields, EventRecord, EventType, Meta, UserId};
