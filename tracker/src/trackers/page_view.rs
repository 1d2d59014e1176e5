//! Page view and page duration tracking.
//!
//! Each path activation goes through two transitions:
//!
//! - **entered**: emits `page_view` for the new path with empty meta.
//! - **exited**: emits `page_duration` with
//!   `meta.duration_seconds = floor((now - entered_at) / 1000)`.
//!
//! Re-entering a path starts a fresh cycle. A zero duration is still emitted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::clock::{elapsed_seconds, Clock};
use crate::emitter::Emitter;
use crate::signals::{Tracker, Visit};
use crate::types::{EventFields, EventType};

/// Open page window for the active visit.
#[derive(Debug, Clone)]
struct PageWindow {
    path: String,
    activation: u64,
    entered_at: DateTime<Utc>,
}

/// Emits `page_view` on entry and `page_duration` on exit.
pub struct PageViewTracker {
    emitter: Emitter,
    clock: Arc<dyn Clock>,
    window: Option<PageWindow>,
}

impl PageViewTracker {
    /// Creates a tracker with no open window.
    #[must_use]
    pub fn new(emitter: Emitter, clock: Arc<dyn Clock>) -> Self {
        Self {
            emitter,
            clock,
            window: None,
        }
    }
}

impl Tracker for PageViewTracker {
    fn name(&self) -> &'static str {
        "page_view"
    }

    fn on_enter(&mut self, visit: &Visit) {
        self.window = Some(PageWindow {
            path: visit.path.clone(),
            activation: visit.activation,
            entered_at: self.clock.now(),
        });

        self.emitter
            .emit(EventType::PageView, EventFields::new().page(visit.path.as_str()));
    }

    fn on_exit(&mut self, visit: &Visit) {
        let Some(window) = self.window.take() else {
            return;
        };

        if window.activation != visit.activation {
            debug!(
                expected = window.activation,
                got = visit.activation,
                "Exit for a visit this tracker never entered"
            );
            return;
        }

        let duration_seconds = elapsed_seconds(window.entered_at, self.clock.now());
        self.emitter.emit(
            EventType::PageDuration,
            EventFields::new()
                .page(window.path)
                .meta_entry("duration_seconds", duration_seconds),
        );
    }
}
