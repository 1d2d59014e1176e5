//! Session duration tracking.
//!
//! The start instant is taken once, when the tracker is mounted. Every unload
//! signal emits `session_duration` with `meta.duration_seconds` measured from
//! that start. Nothing is emitted on teardown, so a session that ends without
//! an unload goes unreported. A second unload signal emits a second event.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::{elapsed_seconds, Clock};
use crate::emitter::Emitter;
use crate::signals::Tracker;
use crate::types::{EventFields, EventType};

/// Emits the elapsed session time on tab unload.
pub struct SessionDurationTracker {
    emitter: Emitter,
    clock: Arc<dyn Clock>,
    started_at: DateTime<Utc>,
}

impl SessionDurationTracker {
    /// Mounts the tracker, starting the session clock now.
    #[must_use]
    pub fn new(emitter: Emitter, clock: Arc<dyn Clock>) -> Self {
        let started_at = clock.now();
        Self {
            emitter,
            clock,
            started_at,
        }
    }

    /// When the session started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

impl Tracker for SessionDurationTracker {
    fn name(&self) -> &'static str {
        "session_duration"
    }

    fn on_unload(&mut self) {
        let duration_seconds = elapsed_seconds(self.started_at, self.clock.now());
        self.emitter.emit(
            EventType::SessionDuration,
            EventFields::new().meta_entry("duration_seconds", duration_seconds),
        );
    }
}
