//! Outbound transport to the ingestion endpoints.
//!
//! The [`Transport`] trait is the seam between the emitter and the network.
//! [`HttpTransport`] posts JSON with reqwest; [`RecordingTransport`] keeps
//! bodies in memory and can be told to fail, so tracker behavior can be
//! exercised without a server.
//!
//! A transport builds the request synchronously in [`Transport::send`] and
//! returns a future that performs the I/O. The emitter spawns that future
//! and never awaits it from the calling component, so dispatch order follows
//! call order while arrival order at the server is not guaranteed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Number of idle connections kept per host.
const POOL_MAX_IDLE_PER_HOST: usize = 4;

/// Errors that can occur while delivering a body.
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP request failed (unreachable host, timeout, broken connection).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-2xx status.
    #[error("server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Transport refused the request without touching the network.
    #[error("transport rejected request: {0}")]
    Rejected(String),
}

/// Ingestion endpoints, relative to the configured API root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Generic and page-lifecycle events.
    TrackEvent,
    /// Legacy generic tracker kept for older backends.
    LegacyTrack,
    /// First-touch acquisition channel.
    CaptureSourceChannel,
}

impl Endpoint {
    /// Returns the endpoint path, with leading and trailing slash.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::TrackEvent => "/track-event/",
            Self::LegacyTrack => "/track/",
            Self::CaptureSourceChannel => "/capture-source-channel/",
        }
    }
}

/// Delivers JSON bodies to an ingestion endpoint.
pub trait Transport: Send + Sync {
    /// Prepares a POST of `body` to `endpoint` and returns the pending delivery.
    ///
    /// Request construction happens before this method returns; the returned
    /// future only performs I/O.
    fn send(&self, endpoint: Endpoint, body: Value) -> BoxFuture<'static, Result<(), TransportError>>;
}

/// JSON-over-HTTP transport backed by a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Creates a transport rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Http` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the configured API root.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }
}

impl Transport for HttpTransport {
    fn send(&self, endpoint: Endpoint, body: Value) -> BoxFuture<'static, Result<(), TransportError>> {
        let url = self.url_for(endpoint);
        let request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(&body);

        async move {
            debug!(url = %url, "Posting tracking body");
            let response = request.send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(());
            }

            let message = response.text().await.unwrap_or_default();
            Err(TransportError::ServerError {
                status: status.as_u16(),
                message,
            })
        }
        .boxed()
    }
}

/// A body captured by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentBody {
    pub endpoint: Endpoint,
    pub body: Value,
}

/// In-memory transport that records every body it is handed.
///
/// Clones share the same record, so a test can keep one handle while the
/// emitter owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<SentBody>>>,
    fail: bool,
}

impl RecordingTransport {
    /// Creates a transport that records and reports success.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that records and reports a network rejection.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            sent: Arc::default(),
            fail: true,
        }
    }

    /// Returns every body handed to the transport, in dispatch order.
    #[must_use]
    pub fn sent(&self) -> Vec<SentBody> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Returns bodies sent to `/track-event/` with the given `event_type`.
    #[must_use]
    pub fn events_of_type(&self, event_type: &str) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter(|s| s.endpoint == Endpoint::TrackEvent && s.body["event_type"] == event_type)
            .map(|s| s.body)
            .collect()
    }

    /// Returns the `event_type` of each `/track-event/` body, in dispatch order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|s| s.endpoint == Endpoint::TrackEvent)
            .filter_map(|s| s.body["event_type"].as_str().map(str::to_string))
            .collect()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Transport for RecordingTransport {
    fn send(&self, endpoint: Endpoint, body: Value) -> BoxFuture<'static, Result<(), TransportError>> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentBody { endpoint, body });

        let outcome = if self.fail {
            Err(TransportError::Rejected("simulated network failure".to_string()))
        } else {
            Ok(())
        };
        future::ready(outcome).boxed()
    }
}
