//! Event types for InsightX session analytics.
//!
//! This module defines the wire schema shared with the ingestion endpoints.
//! All bodies serialize to snake_case JSON, matching what the backend's
//! `track-event` view reads.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event-specific payload, e.g. `{"duration_seconds": 5}`.
///
/// Always present on the wire, possibly empty.
pub type Meta = Map<String, Value>;

/// Top-level record fields that caller extras may not overwrite.
const RESERVED_FIELDS: [&str; 5] = ["user_id", "event_type", "page", "session_id", "meta"];

/// Fields of the legacy body that caller extras may not overwrite.
const LEGACY_RESERVED_FIELDS: [&str; 2] = ["user_id", "event_type"];

/// Type classification for events.
///
/// The set is open: collaborator pages may report event types this crate
/// does not know about, which round-trip through [`EventType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    PageView,
    PageDuration,
    ScrollDepth,
    SessionDuration,
    JobView,
    JobApply,
    Other(String),
}

impl EventType {
    /// Returns the wire name of this event type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::PageView => "page_view",
            Self::PageDuration => "page_duration",
            Self::ScrollDepth => "scroll_depth",
            Self::SessionDuration => "session_duration",
            Self::JobView => "job_view",
            Self::JobApply => "job_apply",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        match name {
            "page_view" => Self::PageView,
            "page_duration" => Self::PageDuration,
            "scroll_depth" => Self::ScrollDepth,
            "session_duration" => Self::SessionDuration,
            "job_view" => Self::JobView,
            "job_apply" => Self::JobApply,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        match event_type {
            EventType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque user identifier supplied by the hosting page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Numeric(i64),
    Text(String),
}

impl UserId {
    /// Parses an identifier, preferring the numeric form.
    ///
    /// Only canonical integers become numeric; `007` or `+5` stay text so the
    /// identifier is sent exactly as given.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(id) if id.to_string() == raw => Self::Numeric(id),
            _ => Self::Text(raw.to_string()),
        }
    }

    /// Returns true for an empty textual identifier.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(s) if s.trim().is_empty())
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self::Numeric(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

/// Caller-supplied fields merged over the base record at emission time.
///
/// `page` and `meta` replace the base values when set. Extras land at the
/// top level of the body (e.g. `job_id`), except for reserved field names,
/// which are dropped.
///
/// # Example
///
/// ```
/// use insightx_tracker::types::EventFields;
///
/// let fields = EventFields::new()
///     .page("/jobs")
///     .meta_entry("duration_seconds", 5)
///     .job_id(10);
///
/// assert_eq!(fields.page_override(), Some("/jobs"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFields {
    page: Option<String>,
    meta: Option<Meta>,
    extra: Map<String, Value>,
}

impl EventFields {
    /// Creates an empty set of fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the page the event is attributed to.
    #[must_use]
    pub fn page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    /// Replaces the whole meta mapping.
    #[must_use]
    pub fn meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Adds a single meta entry.
    #[must_use]
    pub fn meta_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta
            .get_or_insert_with(Meta::new)
            .insert(key.into(), value.into());
        self
    }

    /// Adds a top-level extra field.
    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Attaches the job a domain event refers to.
    #[must_use]
    pub fn job_id(self, job_id: i64) -> Self {
        self.extra("job_id", job_id)
    }

    /// Returns the page override, if any.
    #[must_use]
    pub fn page_override(&self) -> Option<&str> {
        self.page.as_deref()
    }
}

/// One fact reported to the `/track-event/` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub user_id: UserId,
    pub event_type: EventType,
    pub page: String,
    pub session_id: String,
    pub meta: Meta,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventRecord {
    /// Builds a record from the base context and the caller's fields.
    ///
    /// # Arguments
    ///
    /// * `user_id` - Identifier supplied by the hosting page
    /// * `event_type` - Classification of this event
    /// * `current_page` - Current path, used unless `fields` overrides it
    /// * `session_id` - Correlation id from the session store
    /// * `fields` - Caller overrides and extras
    #[must_use]
    pub fn build(
        user_id: UserId,
        event_type: EventType,
        current_page: &str,
        session_id: String,
        fields: EventFields,
    ) -> Self {
        let EventFields { page, meta, extra } = fields;

        Self {
            user_id,
            event_type,
            page: page.unwrap_or_else(|| current_page.to_string()),
            session_id,
            meta: meta.unwrap_or_default(),
            extra: strip_fields(extra, &RESERVED_FIELDS),
        }
    }
}

/// Body accepted by the legacy `/track/` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyTrackBody {
    pub event_type: EventType,
    pub user_id: UserId,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LegacyTrackBody {
    /// Builds a legacy body; `event_type` and `user_id` in `extra` are dropped.
    #[must_use]
    pub fn new(event_type: EventType, user_id: UserId, extra: Map<String, Value>) -> Self {
        Self {
            event_type,
            user_id,
            extra: strip_fields(extra, &LEGACY_RESERVED_FIELDS),
        }
    }
}

/// Body posted to `/capture-source-channel/` on a first-touch visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCapture {
    pub user_id: UserId,
    pub channel: String,
}

fn strip_fields(mut extra: Map<String, Value>, reserved: &[&str]) -> Map<String, Value> {
    for key in reserved {
        extra.remove(*key);
    }
    extra
}
