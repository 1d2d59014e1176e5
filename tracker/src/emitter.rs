//! Fire-and-forget event emitter.
//!
//! The emitter turns an event type plus caller fields into an
//! [`EventRecord`], resolves the session id, and hands the body to the
//! [`Transport`] on a detached tokio task. Callers never wait for delivery
//! and never see an error: transport failures are logged at `warn` and
//! dropped. There is no retry, no batching and no durable queue.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use insightx_tracker::emitter::Emitter;
//! use insightx_tracker::session::{MemoryStorage, SessionIdentity};
//! use insightx_tracker::transport::HttpTransport;
//! use insightx_tracker::types::{EventFields, EventType, UserId};
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = HttpTransport::new(
//!         "http://127.0.0.1:8000/api/insightx",
//!         Duration::from_secs(30),
//!     )
//!     .unwrap();
//!     let session = SessionIdentity::new(Arc::new(MemoryStorage::new()));
//!     let emitter = Emitter::new(UserId::Numeric(1), Arc::new(transport), session);
//!
//!     emitter.emit(EventType::JobView, EventFields::new().job_id(10));
//!     emitter.drain(Duration::from_secs(5)).await;
//! }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::session::SessionIdentity;
use crate::transport::{Endpoint, Transport};
use crate::types::{ChannelCapture, EventFields, EventRecord, EventType, LegacyTrackBody, UserId};

/// Shared handle to the current navigation path.
///
/// The navigation shell writes it; the emitter reads it to fill `page` when
/// the caller does not override it.
#[derive(Debug, Clone)]
pub struct Location {
    current: Arc<RwLock<String>>,
}

impl Location {
    /// Creates a location pointing at `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            current: Arc::new(RwLock::new(path.into())),
        }
    }

    /// Returns the current path.
    #[must_use]
    pub fn path(&self) -> String {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replaces the current path.
    pub fn set(&self, path: impl Into<String>) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = path.into();
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::new("/")
    }
}

struct EmitterInner {
    user_id: UserId,
    transport: Arc<dyn Transport>,
    session: SessionIdentity,
    location: Location,
    in_flight: Arc<InFlight>,
}

/// Cloneable fire-and-forget emitter. Clones share transport, session and location.
#[derive(Clone)]
pub struct Emitter {
    inner: Arc<EmitterInner>,
}

impl Emitter {
    /// Creates an emitter with its location at `/`.
    #[must_use]
    pub fn new(user_id: UserId, transport: Arc<dyn Transport>, session: SessionIdentity) -> Self {
        Self::with_location(user_id, transport, session, Location::default())
    }

    /// Creates an emitter reading the current page from `location`.
    #[must_use]
    pub fn with_location(
        user_id: UserId,
        transport: Arc<dyn Transport>,
        session: SessionIdentity,
        location: Location,
    ) -> Self {
        Self {
            inner: Arc::new(EmitterInner {
                user_id,
                transport,
                session,
                location,
                in_flight: Arc::new(InFlight::default()),
            }),
        }
    }

    /// Returns the shared location handle.
    #[must_use]
    pub fn location(&self) -> &Location {
        &self.inner.location
    }

    /// Returns the user id attached to every event.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.inner.user_id
    }

    /// Returns the current session id, creating it if needed.
    #[must_use]
    pub fn session_id(&self) -> String {
        self.inner.session.get_or_create_session_id()
    }

    /// Emits an event to `/track-event/`.
    ///
    /// Returns immediately. An empty event type is logged and dropped.
    pub fn emit(&self, event_type: impl Into<EventType>, fields: EventFields) {
        let event_type = event_type.into();
        if event_type.as_str().trim().is_empty() {
            warn!("Dropping event with empty event type");
            return;
        }

        let record = EventRecord::build(
            self.inner.user_id.clone(),
            event_type,
            &self.inner.location.path(),
            self.session_id(),
            fields,
        );

        let label = record.event_type.to_string();
        self.dispatch(Endpoint::TrackEvent, &record, &label);
    }

    /// Emits an event to the legacy `/track/` endpoint.
    pub fn emit_legacy(&self, event_type: impl Into<EventType>, extra: Map<String, Value>) {
        let event_type = event_type.into();
        if event_type.as_str().trim().is_empty() {
            warn!("Dropping legacy event with empty event type");
            return;
        }

        let label = event_type.to_string();
        let body = LegacyTrackBody::new(event_type, self.inner.user_id.clone(), extra);
        self.dispatch(Endpoint::LegacyTrack, &body, &label);
    }

    /// Reports the acquisition channel a visit arrived through.
    ///
    /// Blank channels are ignored.
    pub fn capture_channel(&self, channel: &str) {
        let channel = channel.trim();
        if channel.is_empty() {
            return;
        }

        let body = ChannelCapture {
            user_id: self.inner.user_id.clone(),
            channel: channel.to_string(),
        };
        self.dispatch(Endpoint::CaptureSourceChannel, &body, "channel_capture");
    }

    /// Returns the number of deliveries that have not finished yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.count()
    }

    /// Waits up to `timeout` for in-flight deliveries to finish.
    ///
    /// Only meant for process exit; components never call this.
    ///
    /// # Returns
    ///
    /// The number of deliveries still pending when the wait ended.
    pub async fn drain(&self, timeout: Duration) -> usize {
        let in_flight = &self.inner.in_flight;
        let wait = async {
            loop {
                let idle = in_flight.idle.notified();
                tokio::pin!(idle);
                idle.as_mut().enable();

                if in_flight.count() == 0 {
                    break;
                }
                idle.await;
            }
        };

        if tokio::time::timeout(timeout, wait).await.is_err() {
            warn!(
                pending = self.in_flight(),
                "Timed out waiting for tracking deliveries"
            );
        }

        self.in_flight()
    }

    fn dispatch<B: Serialize>(&self, endpoint: Endpoint, body: &B, label: &str) {
        let body = match serde_json::to_value(body) {
            Ok(body) => body,
            Err(e) => {
                warn!(event_type = label, error = %e, "Failed to serialize tracking body");
                return;
            }
        };

        let Ok(handle) = Handle::try_current() else {
            warn!(
                event_type = label,
                "No async runtime available, tracking event dropped"
            );
            return;
        };

        let delivery = self.inner.transport.send(endpoint, body);
        let guard = InFlightGuard::new(self.inner.in_flight.clone());
        let label = label.to_string();

        handle.spawn(async move {
            let _guard = guard;
            match delivery.await {
                Ok(()) => debug!(event_type = %label, endpoint = endpoint.path(), "Tracking event delivered"),
                Err(e) => warn!(
                    event_type = %label,
                    endpoint = endpoint.path(),
                    error = %e,
                    "Tracking event failed, dropping"
                ),
            }
        });
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("user_id", &self.inner.user_id)
            .field("location", &self.inner.location.path())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

/// Count of pending deliveries, with a wake-up for when it reaches zero.
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// Keeps the in-flight count accurate even if a delivery task is dropped.
struct InFlightGuard {
    in_flight: Arc<InFlight>,
}

impl InFlightGuard {
    fn new(in_flight: Arc<InFlight>) -> Self {
        in_flight.count.fetch_add(1, Ordering::SeqCst);
        Self { in_flight }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.in_flight.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.in_flight.idle.notify_waiters();
        }
    }
}
