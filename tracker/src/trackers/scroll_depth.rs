//! Scroll depth tracking.
//!
//! Keeps the deepest scroll percentage reached during the active visit and
//! reports it as `scroll_depth` with `meta.scroll_percent` when the visit is
//! exited or the tab unloads. The maximum never goes down within a visit and
//! is reset to 0 when a new visit begins.
//!
//! Samples taken while the content fits the viewport do not update the
//! maximum, but the visit still reports on exit (with 0 if nothing else).
//!
//! Unload and exit are independent triggers; when both fire for the same
//! visit, two events are emitted.

use tracing::trace;

use crate::emitter::Emitter;
use crate::signals::{ScrollSample, Tracker, Visit};
use crate::types::{EventFields, EventType};

/// Scroll state for the active visit.
#[derive(Debug, Clone)]
struct ScrollWindow {
    path: String,
    activation: u64,
    max_scroll_percent: u32,
}

/// Emits the maximum scroll depth of each visit.
pub struct ScrollDepthTracker {
    emitter: Emitter,
    window: Option<ScrollWindow>,
}

impl ScrollDepthTracker {
    /// Creates a tracker with no active visit.
    #[must_use]
    pub fn new(emitter: Emitter) -> Self {
        Self {
            emitter,
            window: None,
        }
    }

    /// Deepest percentage reached in the active visit, if any.
    #[must_use]
    pub fn max_scroll_percent(&self) -> Option<u32> {
        self.window.as_ref().map(|w| w.max_scroll_percent)
    }

    fn report(&self, window: &ScrollWindow) {
        self.emitter.emit(
            EventType::ScrollDepth,
            EventFields::new()
                .page(window.path.as_str())
                .meta_entry("scroll_percent", window.max_scroll_percent),
        );
    }
}

impl Tracker for ScrollDepthTracker {
    fn name(&self) -> &'static str {
        "scroll_depth"
    }

    fn on_enter(&mut self, visit: &Visit) {
        self.window = Some(ScrollWindow {
            path: visit.path.clone(),
            activation: visit.activation,
            max_scroll_percent: 0,
        });
    }

    fn on_scroll(&mut self, sample: ScrollSample) {
        let Some(window) = self.window.as_mut() else {
            return;
        };

        match sample.percent() {
            Some(percent) if percent > window.max_scroll_percent => {
                window.max_scroll_percent = percent;
            }
            Some(_) => {}
            None => trace!(path = %window.path, "Content fits viewport, scroll sample skipped"),
        }
    }

    fn on_unload(&mut self) {
        if let Some(window) = &self.window {
            self.report(window);
        }
    }

    fn on_exit(&mut self, visit: &Visit) {
        match self.window.take() {
            Some(window) if window.activation == visit.activation => self.report(&window),
            Some(_) | None => {}
        }
    }
}
