//! Browser signal ports.
//!
//! The trackers never read ambient browser state. Navigation changes, scroll
//! samples and tab-close notifications arrive as [`BrowserSignal`] values and
//! are fanned out by the navigation shell to every [`Tracker`].

use serde::{Deserialize, Serialize};
use url::{form_urlencoded, Url};

use crate::types::{EventType, Meta};

/// One externally observed browser notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum BrowserSignal {
    /// The router moved to `location` (path plus optional query string).
    Navigate { location: String },
    /// The document was scrolled.
    Scroll(ScrollSample),
    /// The tab or window is about to unload.
    Unload,
    /// The shell is being torn down without a tab close.
    Teardown,
    /// A collaborator page reported a domain event.
    Event {
        event_type: EventType,
        #[serde(default)]
        page: Option<String>,
        #[serde(default)]
        meta: Option<Meta>,
        #[serde(default)]
        job_id: Option<i64>,
    },
    /// The chat launcher was clicked.
    OpenChat,
    /// The chat panel close button was clicked.
    CloseChat,
}

/// Scroll geometry at the moment of a scroll notification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollSample {
    /// Pixels scrolled from the top of the document.
    pub scroll_top: f64,
    /// Full height of the document.
    pub document_height: f64,
    /// Height of the visible viewport.
    pub viewport_height: f64,
}

impl ScrollSample {
    /// Creates a sample.
    #[must_use]
    pub fn new(scroll_top: f64, document_height: f64, viewport_height: f64) -> Self {
        Self {
            scroll_top,
            document_height,
            viewport_height,
        }
    }

    /// Scroll depth as a rounded percentage of the scrollable height.
    ///
    /// Returns `None` when the content does not overflow the viewport.
    #[must_use]
    pub fn percent(&self) -> Option<u32> {
        let scrollable = self.document_height - self.viewport_height;
        if !scrollable.is_finite() || scrollable <= 0.0 {
            return None;
        }

        let percent = (self.scroll_top / scrollable * 100.0).round();
        if !percent.is_finite() {
            return None;
        }

        // Negative offsets (overscroll bounce) count as the top.
        Some(percent.clamp(0.0, f64::from(u32::MAX)) as u32)
    }
}

/// One activation of a path: created on entry, consumed on exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    /// Path being visited, without query string.
    pub path: String,
    /// Decoded query parameters of the entering location.
    pub query: Vec<(String, String)>,
    /// Monotonic activation number, unique within a shell.
    pub activation: u64,
}

impl Visit {
    /// Creates a visit from a raw location such as `/jobs?channel=Instagram`.
    #[must_use]
    pub fn from_location(location: &str, activation: u64) -> Self {
        let (path, query) = split_location(location);
        Self {
            path,
            query,
            activation,
        }
    }

    /// Returns the first value of query parameter `name`.
    #[must_use]
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Splits a location into its path and decoded query pairs.
///
/// Relative locations keep their path verbatim, including a leading `//`.
/// Absolute URLs are parsed and reduced to their path.
#[must_use]
pub fn split_location(location: &str) -> (String, Vec<(String, String)>) {
    let location = location.trim();

    if !location.starts_with('/') {
        if let Ok(url) = Url::parse(location) {
            return (url.path().to_string(), decode_query(url.query().unwrap_or("")));
        }
    }

    let without_fragment = location.split_once('#').map_or(location, |(head, _)| head);
    match without_fragment.split_once('?') {
        Some((path, query)) => (path.to_string(), decode_query(query)),
        None => (without_fragment.to_string(), Vec::new()),
    }
}

fn decode_query(query: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Observer of the browser lifecycle, one per tracked concern.
///
/// Every hook defaults to a no-op so trackers only implement what they use.
/// Hooks cannot fail: trackers log and move on.
pub trait Tracker: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// A path became active.
    fn on_enter(&mut self, _visit: &Visit) {}

    /// The active path is being left (navigation or teardown).
    fn on_exit(&mut self, _visit: &Visit) {}

    /// The document was scrolled during the active visit.
    fn on_scroll(&mut self, _sample: ScrollSample) {}

    /// The tab is about to unload.
    fn on_unload(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn percent_rounds_against_scrollable_height() {
        let sample = ScrollSample::new(450.0, 1800.0, 800.0);
        assert_eq!(sample.percent(), Some(45));

        let sample = ScrollSample::new(333.0, 1800.0, 800.0);
        assert_eq!(sample.percent(), Some(33));
    }

    #[test]
    fn percent_is_none_when_content_fits() {
        assert_eq!(ScrollSample::new(0.0, 600.0, 800.0).percent(), None);
        assert_eq!(ScrollSample::new(0.0, 800.0, 800.0).percent(), None);
    }

    #[test]
    fn percent_clamps_overscroll_to_zero() {
        assert_eq!(ScrollSample::new(-40.0, 1800.0, 800.0).percent(), Some(0));
    }

    #[test]
    fn percent_rejects_non_finite_geometry() {
        assert_eq!(ScrollSample::new(10.0, f64::NAN, 800.0).percent(), None);
        assert_eq!(ScrollSample::new(f64::NAN, 1800.0, 800.0).percent(), None);
    }

    #[test]
    fn split_location_separates_path_and_query() {
        let (path, query) = split_location("/?channel=Instagram&ref=a%20b");
        assert_eq!(path, "/");
        assert_eq!(
            query,
            vec![
                ("channel".to_string(), "Instagram".to_string()),
                ("ref".to_string(), "a b".to_string()),
            ]
        );
    }

    #[test]
    fn split_location_accepts_absolute_urls() {
        let (path, query) = split_location("https://app.insightx.io/jobs#top");
        assert_eq!(path, "/jobs");
        assert!(query.is_empty());
    }

    #[test]
    fn split_location_keeps_double_slash_paths() {
        let (path, query) = split_location("//jobs?channel=Email#apply");
        assert_eq!(path, "//jobs");
        assert_eq!(query, vec![("channel".to_string(), "Email".to_string())]);

        assert_eq!(split_location("//jobs").0, "//jobs");
    }

    #[test]
    fn split_location_drops_fragment_query() {
        let (path, query) = split_location("/insights#top?channel=x");
        assert_eq!(path, "/insights");
        assert!(query.is_empty());
    }

    #[test]
    fn visit_query_value() {
        let visit = Visit::from_location("/?channel=Facebook", 3);
        assert_eq!(visit.path, "/");
        assert_eq!(visit.activation, 3);
        assert_eq!(visit.query_value("channel"), Some("Facebook"));
        assert_eq!(visit.query_value("missing"), None);
    }

    #[test]
    fn signals_deserialize_from_tagged_json() {
        let navigate: BrowserSignal =
            serde_json::from_value(json!({ "signal": "navigate", "location": "/jobs" })).unwrap();
        assert_eq!(
            navigate,
            BrowserSignal::Navigate {
                location: "/jobs".to_string()
            }
        );

        let scroll: BrowserSignal = serde_json::from_value(json!({
            "signal": "scroll",
            "scroll_top": 10.0,
            "document_height": 2000.0,
            "viewport_height": 1000.0
        }))
        .unwrap();
        assert_eq!(
            scroll,
            BrowserSignal::Scroll(ScrollSample::new(10.0, 2000.0, 1000.0))
        );

        let event: BrowserSignal =
            serde_json::from_value(json!({ "signal": "event", "event_type": "job_view", "job_id": 7 }))
                .unwrap();
        assert_eq!(
            event,
            BrowserSignal::Event {
                event_type: EventType::JobView,
                page: None,
                meta: None,
                job_id: Some(7),
            }
        );

        let unload: BrowserSignal = serde_json::from_value(json!({ "signal": "unload" })).unwrap();
        assert_eq!(unload, BrowserSignal::Unload);
    }
}
