//! Navigation shell.
//!
//! The shell is mounted once per application lifetime. It owns the active
//! [`Visit`], keeps the shared location current, and fans every browser
//! signal out to its trackers. Trackers are independent: any of them can be
//! left out at build time without affecting the others.
//!
//! The shell also hosts the chat affordance, which is only offered on the
//! landing route and toggles between [`ChatState::Closed`] and
//! [`ChatState::Open`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use insightx_tracker::clock::SystemClock;
//! use insightx_tracker::emitter::Emitter;
//! use insightx_tracker::session::{MemoryStorage, SessionIdentity};
//! use insightx_tracker::shell::NavigationShell;
//! use insightx_tracker::transport::RecordingTransport;
//! use insightx_tracker::types::UserId;
//!
//! #[tokio::main]
//! async fn main() {
//!     let emitter = Emitter::new(
//!         UserId::Numeric(1),
//!         Arc::new(RecordingTransport::new()),
//!         SessionIdentity::new(Arc::new(MemoryStorage::new())),
//!     );
//!     let mut shell = NavigationShell::builder(emitter, Arc::new(SystemClock)).build();
//!
//!     shell.navigate("/?channel=Instagram");
//!     shell.navigate("/jobs");
//!     shell.unload();
//! }
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::DEFAULT_LANDING_ROUTE;
use crate::emitter::Emitter;
use crate::signals::{split_location, BrowserSignal, ScrollSample, Tracker, Visit};
use crate::trackers::{ChannelTracker, PageViewTracker, ScrollDepthTracker, SessionDurationTracker};
use crate::types::{EventFields, EventType, Meta};

/// Open/closed state of the chat panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatState {
    #[default]
    Closed,
    Open,
}

/// What the chat affordance currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAffordance {
    /// Not on the landing route.
    Hidden,
    /// Landing route, panel closed: the launcher button is shown.
    Launcher,
    /// Landing route, panel open.
    Panel,
}

/// Builder selecting which trackers the shell mounts.
pub struct ShellBuilder {
    emitter: Emitter,
    clock: Arc<dyn Clock>,
    landing_route: String,
    page_views: bool,
    scroll_depth: bool,
    session_duration: bool,
    channel_capture: bool,
    extra: Vec<Box<dyn Tracker>>,
}

impl ShellBuilder {
    /// Sets the route hosting the chat affordance and channel capture.
    #[must_use]
    pub fn landing_route(mut self, route: impl Into<String>) -> Self {
        self.landing_route = route.into();
        self
    }

    /// Enables or disables page view/duration tracking.
    #[must_use]
    pub fn page_views(mut self, enabled: bool) -> Self {
        self.page_views = enabled;
        self
    }

    /// Enables or disables scroll depth tracking.
    #[must_use]
    pub fn scroll_depth(mut self, enabled: bool) -> Self {
        self.scroll_depth = enabled;
        self
    }

    /// Enables or disables session duration tracking.
    #[must_use]
    pub fn session_duration(mut self, enabled: bool) -> Self {
        self.session_duration = enabled;
        self
    }

    /// Enables or disables acquisition channel capture.
    #[must_use]
    pub fn channel_capture(mut self, enabled: bool) -> Self {
        self.channel_capture = enabled;
        self
    }

    /// Mounts an additional tracker after the built-in ones.
    #[must_use]
    pub fn tracker(mut self, tracker: Box<dyn Tracker>) -> Self {
        self.extra.push(tracker);
        self
    }

    /// Mounts the shell. The session clock starts now.
    #[must_use]
    pub fn build(self) -> NavigationShell {
        let mut trackers: Vec<Box<dyn Tracker>> = Vec::new();

        if self.page_views {
            trackers.push(Box::new(PageViewTracker::new(
                self.emitter.clone(),
                self.clock.clone(),
            )));
        }
        if self.scroll_depth {
            trackers.push(Box::new(ScrollDepthTracker::new(self.emitter.clone())));
        }
        if self.session_duration {
            trackers.push(Box::new(SessionDurationTracker::new(
                self.emitter.clone(),
                self.clock.clone(),
            )));
        }
        if self.channel_capture {
            trackers.push(Box::new(ChannelTracker::new(
                self.emitter.clone(),
                self.landing_route.clone(),
            )));
        }
        trackers.extend(self.extra);

        info!(
            trackers = ?trackers.iter().map(|t| t.name()).collect::<Vec<_>>(),
            landing_route = %self.landing_route,
            "Navigation shell mounted"
        );

        NavigationShell {
            emitter: self.emitter,
            trackers,
            current: None,
            next_activation: 1,
            landing_route: self.landing_route,
            chat: ChatState::default(),
        }
    }
}

/// Composes the trackers and routes browser signals to them.
pub struct NavigationShell {
    emitter: Emitter,
    trackers: Vec<Box<dyn Tracker>>,
    current: Option<Visit>,
    next_activation: u64,
    landing_route: String,
    chat: ChatState,
}

impl NavigationShell {
    /// Starts building a shell with every built-in tracker enabled.
    #[must_use]
    pub fn builder(emitter: Emitter, clock: Arc<dyn Clock>) -> ShellBuilder {
        ShellBuilder {
            emitter,
            clock,
            landing_route: DEFAULT_LANDING_ROUTE.to_string(),
            page_views: true,
            scroll_depth: true,
            session_duration: true,
            channel_capture: true,
            extra: Vec::new(),
        }
    }

    /// Returns the emitter shared with the trackers.
    #[must_use]
    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    /// Returns the active visit, if any.
    #[must_use]
    pub fn current_visit(&self) -> Option<&Visit> {
        self.current.as_ref()
    }

    /// Names of the mounted trackers, in dispatch order.
    #[must_use]
    pub fn tracker_names(&self) -> Vec<&'static str> {
        self.trackers.iter().map(|t| t.name()).collect()
    }

    /// Handles a route change.
    ///
    /// Moving to a different path exits the active visit and enters a new one.
    /// A change that keeps the path (query or fragment only) does neither.
    pub fn navigate(&mut self, location: &str) {
        let (path, _) = split_location(location);

        if self.current.as_ref().is_some_and(|visit| visit.path == path) {
            debug!(path = %path, "Location changed within the active path");
            return;
        }

        let visit = Visit::from_location(location, self.next_activation);
        self.next_activation += 1;
        self.emitter.location().set(visit.path.clone());

        if let Some(previous) = self.current.take() {
            debug!(path = %previous.path, activation = previous.activation, "Exiting path");
            for tracker in &mut self.trackers {
                tracker.on_exit(&previous);
            }
        }

        debug!(path = %visit.path, activation = visit.activation, "Entering path");
        for tracker in &mut self.trackers {
            tracker.on_enter(&visit);
        }
        self.current = Some(visit);
    }

    /// Forwards a scroll sample for the active visit.
    pub fn scroll(&mut self, sample: ScrollSample) {
        if self.current.is_none() {
            return;
        }
        for tracker in &mut self.trackers {
            tracker.on_scroll(sample);
        }
    }

    /// Forwards a tab-close notification.
    pub fn unload(&mut self) {
        debug!("Unload signal");
        for tracker in &mut self.trackers {
            tracker.on_unload();
        }
    }

    /// Tears the shell down, exiting the active visit.
    pub fn teardown(&mut self) {
        if let Some(previous) = self.current.take() {
            debug!(path = %previous.path, "Tearing down active visit");
            for tracker in &mut self.trackers {
                tracker.on_exit(&previous);
            }
        }
    }

    /// Reports a domain event from a collaborator page.
    pub fn report(&self, event_type: EventType, fields: EventFields) {
        self.emitter.emit(event_type, fields);
    }

    /// Current chat panel state.
    #[must_use]
    pub fn chat_state(&self) -> ChatState {
        self.chat
    }

    /// What the chat affordance shows on the current route.
    #[must_use]
    pub fn chat_affordance(&self) -> ChatAffordance {
        if !self.on_landing_route() {
            return ChatAffordance::Hidden;
        }
        match self.chat {
            ChatState::Closed => ChatAffordance::Launcher,
            ChatState::Open => ChatAffordance::Panel,
        }
    }

    /// Opens the chat panel. Ignored off the landing route.
    pub fn open_chat(&mut self) {
        if self.on_landing_route() {
            self.chat = ChatState::Open;
        } else {
            debug!("Chat affordance not available on this route");
        }
    }

    /// Closes the chat panel. Ignored off the landing route.
    pub fn close_chat(&mut self) {
        if self.on_landing_route() {
            self.chat = ChatState::Closed;
        } else {
            debug!("Chat affordance not available on this route");
        }
    }

    /// Dispatches one browser signal.
    pub fn handle(&mut self, signal: BrowserSignal) {
        match signal {
            BrowserSignal::Navigate { location } => self.navigate(&location),
            BrowserSignal::Scroll(sample) => self.scroll(sample),
            BrowserSignal::Unload => self.unload(),
            BrowserSignal::Teardown => self.teardown(),
            BrowserSignal::Event {
                event_type,
                page,
                meta,
                job_id,
            } => self.report(event_type, domain_fields(page, meta, job_id)),
            BrowserSignal::OpenChat => self.open_chat(),
            BrowserSignal::CloseChat => self.close_chat(),
        }
    }

    /// Consumes signals until the channel closes, then tears down.
    ///
    /// Returns the shell so callers can inspect its final state.
    pub async fn run(mut self, mut signals: mpsc::Receiver<BrowserSignal>) -> Self {
        while let Some(signal) = signals.recv().await {
            self.handle(signal);
        }

        info!("Signal channel closed, tearing down shell");
        self.teardown();
        self
    }

    fn on_landing_route(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|visit| visit.path == self.landing_route)
    }
}

fn domain_fields(page: Option<String>, meta: Option<Meta>, job_id: Option<i64>) -> EventFields {
    let mut fields = EventFields::new();
    if let Some(page) = page {
        fields = fields.page(page);
    }
    if let Some(meta) = meta {
        fields = fields.meta(meta);
    }
    if let Some(job_id) = job_id {
        fields = fields.job_id(job_id);
    }
    fields
}
