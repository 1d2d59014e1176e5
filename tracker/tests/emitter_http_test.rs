//! Integration tests for event delivery over HTTP.
//!
//! These tests verify the wire format posted to each ingestion endpoint and
//! that delivery failures never reach the caller.

use std::sync::Arc;
use std::time::Duration;

use insightx_tracker::emitter::Emitter;
use insightx_tracker::session::{MemoryStorage, SessionIdentity};
use insightx_tracker::transport::HttpTransport;
use insightx_tracker::types::{EventFields, EventType, UserId};
use serde_json::{json, Map, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Test Helpers
// =============================================================================

const API_PREFIX: &str = "/api/insightx";
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Creates an emitter posting to the mock server.
fn create_test_emitter(server_uri: &str) -> Emitter {
    let transport =
        HttpTransport::new(&format!("{server_uri}{API_PREFIX}/"), Duration::from_secs(5)).unwrap();
    Emitter::new(
        UserId::Numeric(1),
        Arc::new(transport),
        SessionIdentity::new(Arc::new(MemoryStorage::new())),
    )
}

/// Returns the JSON bodies received by the mock server.
async fn received_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

// =============================================================================
// Wire Format
// =============================================================================

#[tokio::test]
async fn test_track_event_wire_format() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/insightx/track-event/"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let emitter = create_test_emitter(&server.uri());
    emitter.location().set("/jobs");
    emitter.emit(
        EventType::PageDuration,
        EventFields::new().meta_entry("duration_seconds", 5),
    );

    assert_eq!(emitter.drain(DRAIN_TIMEOUT).await, 0);

    let bodies = received_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(
        bodies[0],
        json!({
            "user_id": 1,
            "event_type": "page_duration",
            "page": "/jobs",
            "session_id": emitter.session_id(),
            "meta": { "duration_seconds": 5 }
        })
    );
}

#[tokio::test]
async fn test_job_event_carries_job_id_at_top_level() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/insightx/track-event/"))
        .and(body_partial_json(json!({ "event_type": "job_apply", "job_id": 42 })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let emitter = create_test_emitter(&server.uri());
    emitter.emit(EventType::JobApply, EventFields::new().page("/jobs").job_id(42));

    assert_eq!(emitter.drain(DRAIN_TIMEOUT).await, 0);
}

#[tokio::test]
async fn test_legacy_track_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/insightx/track/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let emitter = create_test_emitter(&server.uri());
    let mut extra = Map::new();
    extra.insert("page".to_string(), json!("/insights"));
    extra.insert("user_id".to_string(), json!(999));
    emitter.emit_legacy("page_view", extra);

    assert_eq!(emitter.drain(DRAIN_TIMEOUT).await, 0);

    let bodies = received_bodies(&server).await;
    assert_eq!(
        bodies[0],
        json!({ "event_type": "page_view", "user_id": 1, "page": "/insights" })
    );
}

#[tokio::test]
async fn test_channel_capture_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/insightx/capture-source-channel/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let emitter = create_test_emitter(&server.uri());
    emitter.capture_channel("  ");
    emitter.capture_channel(" Instagram ");

    assert_eq!(emitter.drain(DRAIN_TIMEOUT).await, 0);

    let bodies = received_bodies(&server).await;
    assert_eq!(bodies, vec![json!({ "user_id": 1, "channel": "Instagram" })]);
}

#[tokio::test]
async fn test_events_share_one_session_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let emitter = create_test_emitter(&server.uri());
    emitter.emit(EventType::PageView, EventFields::new());
    emitter.emit(EventType::JobView, EventFields::new().job_id(3));
    emitter.emit("custom_click", EventFields::new());
    emitter.drain(DRAIN_TIMEOUT).await;

    let bodies = received_bodies(&server).await;
    assert_eq!(bodies.len(), 3);
    let first = bodies[0]["session_id"].as_str().unwrap().to_string();
    assert!(!first.is_empty());
    assert!(bodies.iter().all(|b| b["session_id"] == first.as_str()));
}

// =============================================================================
// Failure Isolation
// =============================================================================

/// Server errors are logged and dropped; later emissions are still attempted.
#[tokio::test]
async fn test_server_error_does_not_stop_later_events() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(2)
        .mount(&server)
        .await;

    let emitter = create_test_emitter(&server.uri());
    emitter.emit(EventType::PageView, EventFields::new());
    emitter.emit(EventType::ScrollDepth, EventFields::new().meta_entry("scroll_percent", 40));

    assert_eq!(emitter.drain(DRAIN_TIMEOUT).await, 0);
}

/// An unreachable backend must not block or panic the caller.
#[tokio::test]
async fn test_unreachable_backend_is_silent() {
    let transport =
        HttpTransport::new("http://127.0.0.1:9/api/insightx", Duration::from_secs(2)).unwrap();
    let emitter = Emitter::new(
        UserId::Numeric(1),
        Arc::new(transport),
        SessionIdentity::new(Arc::new(MemoryStorage::new())),
    );

    let started = std::time::Instant::now();
    emitter.emit(EventType::SessionDuration, EventFields::new());
    assert!(started.elapsed() < Duration::from_millis(500));

    assert_eq!(emitter.drain(DRAIN_TIMEOUT).await, 0);
}

/// Drain reports deliveries that outlive the timeout.
#[tokio::test]
async fn test_drain_reports_pending_deliveries() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let emitter = create_test_emitter(&server.uri());
    emitter.emit(EventType::PageView, EventFields::new());

    assert_eq!(emitter.drain(Duration::from_millis(50)).await, 1);
    assert_eq!(emitter.drain(DRAIN_TIMEOUT).await, 0);
}
