//! Acquisition channel capture.
//!
//! When the landing route is entered with a `channel` query parameter
//! (e.g. `/?channel=Instagram`), the channel is reported once for that
//! visit to `/capture-source-channel/`.

use tracing::debug;

use crate::emitter::Emitter;
use crate::signals::{Tracker, Visit};

/// Query parameter carrying the acquisition channel.
pub const CHANNEL_PARAM: &str = "channel";

/// Reports first-touch acquisition channels on the landing route.
pub struct ChannelTracker {
    emitter: Emitter,
    landing_route: String,
}

impl ChannelTracker {
    /// Creates a tracker watching `landing_route`.
    #[must_use]
    pub fn new(emitter: Emitter, landing_route: impl Into<String>) -> Self {
        Self {
            emitter,
            landing_route: landing_route.into(),
        }
    }
}

impl Tracker for ChannelTracker {
    fn name(&self) -> &'static str {
        "channel"
    }

    fn on_enter(&mut self, visit: &Visit) {
        if visit.path != self.landing_route {
            return;
        }

        if let Some(channel) = visit.query_value(CHANNEL_PARAM) {
            debug!(channel = %channel, "Capturing acquisition channel");
            self.emitter.capture_channel(channel);
        }
    }
}
