//! Position feed lifecycle and telemetry forwarding.

mod fixtures;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use safenav::error::CollaboratorError;
use safenav::feed::{
    FeedConfig, FeedStatus, FeedUpdate, LocationError, LocationEvent, PositionFeed, PositionSample, RawFix,
    TelemetryConfig, TelemetryForwarder,
};
use safenav::sources::ManualSource;
use safenav::traits::TelemetrySink;

use fixtures::LANDMARKS;

// ============================================================================
// Test Infrastructure
// ============================================================================

#[derive(Default)]
struct RecordingSink {
    posted: Mutex<Vec<(String, PositionSample)>>,
}

impl TelemetrySink for RecordingSink {
    fn post_position(&self, session_id: &str, sample: &PositionSample) -> Result<(), CollaboratorError> {
        self.posted.lock().push((session_id.to_string(), sample.clone()));
        Ok(())
    }
}

#[derive(Default)]
struct FailingSink {
    attempts: AtomicU32,
}

impl TelemetrySink for FailingSink {
    fn post_position(&self, _session_id: &str, _sample: &PositionSample) -> Result<(), CollaboratorError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(CollaboratorError::Unavailable("backend down".to_string()))
    }
}

fn short_timeout() -> FeedConfig {
    FeedConfig {
        request_timeout: Duration::from_millis(50),
    }
}

fn telemetry(window_ms: u64) -> TelemetryConfig {
    TelemetryConfig {
        window: Duration::from_millis(window_ms),
        max_retries: 2,
        retry_backoff: Duration::from_millis(5),
    }
}

fn started_feed(source: &ManualSource) -> PositionFeed<ManualSource> {
    let mut feed = PositionFeed::new(source.clone(), short_timeout());
    feed.start().unwrap();
    feed
}

fn push_landmark(source: &ManualSource, idx: usize) {
    let loc = &LANDMARKS[idx];
    assert!(source.push_fix(loc.lat, loc.lng));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_fix_makes_feed_live() {
    let source = ManualSource::new();
    let mut feed = started_feed(&source);
    assert_eq!(feed.status(), &FeedStatus::Waiting);

    push_landmark(&source, 1);
    let update = feed.next_update().unwrap();

    assert!(matches!(update, FeedUpdate::Position(_)));
    assert_eq!(feed.status(), &FeedStatus::Live);
    assert_eq!(feed.last_known().unwrap().coordinate, LANDMARKS[1].coordinate());
    assert!(feed.last_fix_age().is_some());
}

#[test]
fn test_timeout_keeps_subscription() {
    let source = ManualSource::new();
    let mut feed = started_feed(&source);

    let update = feed.next_update().unwrap();
    assert_eq!(update, FeedUpdate::Unavailable(LocationError::Timeout));
    assert!(feed.is_running());
    assert!(feed.last_known().is_none());

    // A later fix revives the feed.
    push_landmark(&source, 2);
    assert!(matches!(feed.next_update(), Some(FeedUpdate::Position(_))));
    assert_eq!(feed.status(), &FeedStatus::Live);
}

#[test]
fn test_permission_denied_is_terminal() {
    let source = ManualSource::new();
    let mut feed = started_feed(&source);
    push_landmark(&source, 0);
    feed.next_update();

    source.push(LocationEvent::Error(LocationError::PermissionDenied));
    let update = feed.next_update().unwrap();

    assert_eq!(update, FeedUpdate::Unavailable(LocationError::PermissionDenied));
    assert!(!feed.is_running());
    assert!(!source.is_subscribed());
    assert!(feed.last_known().is_none());
    assert!(feed.next_update().is_none());
}

#[test]
fn test_closed_source_is_terminal() {
    let source = ManualSource::new();
    let mut feed = started_feed(&source);
    source.close();

    let update = feed.next_update().unwrap();
    assert!(matches!(update, FeedUpdate::Unavailable(LocationError::PositionUnavailable(_))));
    assert!(!feed.is_running());
}

#[test]
fn test_denied_subscription() {
    let source = ManualSource::new();
    source.deny_with(LocationError::PermissionDenied);
    let mut feed = PositionFeed::new(source.clone(), short_timeout());

    assert_eq!(feed.start(), Err(LocationError::PermissionDenied));
    assert_eq!(feed.status(), &FeedStatus::Unavailable(LocationError::PermissionDenied));
    assert!(!feed.is_running());
}

#[test]
fn test_non_finite_fix_rejected() {
    let source = ManualSource::new();
    let mut feed = started_feed(&source);

    source.push(LocationEvent::Fix(RawFix::new(f64::NAN, 91.7)));
    assert!(matches!(feed.next_update(), Some(FeedUpdate::Rejected(_))));
    assert_eq!(feed.status(), &FeedStatus::Waiting);
    assert!(feed.last_known().is_none());
}

#[test]
fn test_restart_discards_queued_fixes() {
    let source = ManualSource::new();
    let mut feed = started_feed(&source);

    // Queued on the first subscription, never read.
    push_landmark(&source, 0);

    feed.start().unwrap();
    push_landmark(&source, 3);

    match feed.next_update() {
        Some(FeedUpdate::Position(sample)) => assert_eq!(sample.coordinate, LANDMARKS[3].coordinate()),
        other => panic!("expected fresh position, got {:?}", other),
    }
    assert!(feed.try_next_update().is_none());
}

#[test]
fn test_stop_clears_last_known() {
    let source = ManualSource::new();
    let mut feed = started_feed(&source);
    push_landmark(&source, 1);
    feed.next_update();

    feed.stop();
    assert_eq!(feed.status(), &FeedStatus::Stopped);
    assert!(feed.last_known().is_none());
    assert!(!source.is_subscribed());
}

#[test]
fn test_listener_sees_updates() {
    let source = ManualSource::new();
    let mut feed = started_feed(&source);
    let (tx, rx) = mpsc::channel();
    feed.add_listener(tx);

    push_landmark(&source, 4);
    feed.next_update();

    assert!(matches!(rx.try_recv(), Ok(FeedUpdate::Position(_))));
}

// ============================================================================
// Telemetry
// ============================================================================

#[test]
fn test_telemetry_coalesces_burst() {
    let sink = Arc::new(RecordingSink::default());
    let source = ManualSource::new();
    let forwarder = TelemetryForwarder::spawn(Arc::clone(&sink), "tourist-42", telemetry(100));
    let mut feed = PositionFeed::new(source.clone(), short_timeout()).with_telemetry(forwarder);
    feed.start().unwrap();

    for idx in 0..3 {
        push_landmark(&source, idx);
        feed.next_update();
    }
    thread::sleep(Duration::from_millis(400));

    let posted = sink.posted.lock();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].0, "tourist-42");
    assert_eq!(posted[0].1.coordinate, LANDMARKS[2].coordinate());
}

#[test]
fn test_telemetry_retries_are_bounded() {
    let sink = Arc::new(FailingSink::default());
    let source = ManualSource::new();
    let forwarder = TelemetryForwarder::spawn(Arc::clone(&sink), "tourist-42", telemetry(10));
    let mut feed = PositionFeed::new(source.clone(), short_timeout()).with_telemetry(forwarder);
    feed.start().unwrap();

    push_landmark(&source, 0);
    feed.next_update();
    thread::sleep(Duration::from_millis(300));

    // One attempt plus two retries, then the sample is dropped.
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 3);

    // The feed itself never noticed.
    assert_eq!(feed.status(), &FeedStatus::Live);
}

#[test]
fn test_stop_cancels_pending_telemetry() {
    let sink = Arc::new(RecordingSink::default());
    let source = ManualSource::new();
    let forwarder = TelemetryForwarder::spawn(Arc::clone(&sink), "tourist-42", telemetry(150));
    let mut feed = PositionFeed::new(source.clone(), short_timeout()).with_telemetry(forwarder);
    feed.start().unwrap();

    push_landmark(&source, 0);
    feed.next_update();
    feed.stop();
    thread::sleep(Duration::from_millis(400));

    assert!(sink.posted.lock().is_empty());

    // Samples from the next run still go through.
    feed.start().unwrap();
    push_landmark(&source, 1);
    feed.next_update();
    thread::sleep(Duration::from_millis(400));

    let posted = sink.posted.lock();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].1.coordinate, LANDMARKS[1].coordinate());
}
