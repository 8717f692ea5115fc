//! Position feed: validates raw location events, keeps the last known fix and
//! forwards a coalesced trickle of samples to telemetry.
//!
//! The feed is driven by its caller ([`PositionFeed::next_update`]). Telemetry
//! runs on its own worker thread so a slow or failing backend never holds up
//! the next sample.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::GeoError;
use crate::geo::Coordinate;
use crate::traits::{LocationSource, TelemetrySink};

/// A location reading as the device reports it, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: Option<f64>,
    pub heading_deg: Option<f64>,
    pub speed_mps: Option<f64>,
    pub timestamp: SystemTime,
}

impl RawFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m: None,
            heading_deg: None,
            speed_mps: None,
            timestamp: SystemTime::now(),
        }
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    pub fn with_heading(mut self, heading_deg: f64) -> Self {
        self.heading_deg = Some(heading_deg);
        self
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }
}

/// A validated position fix.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSample {
    pub coordinate: Coordinate,
    pub accuracy_m: Option<f64>,
    pub heading_deg: Option<f64>,
    pub speed_mps: Option<f64>,
    pub timestamp: SystemTime,
}

impl PositionSample {
    pub fn at(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            accuracy_m: None,
            heading_deg: None,
            speed_mps: None,
            timestamp: SystemTime::now(),
        }
    }
}

impl TryFrom<RawFix> for PositionSample {
    type Error = GeoError;

    /// Rejects non-finite coordinates; non-finite optional readings are dropped.
    fn try_from(raw: RawFix) -> Result<Self, Self::Error> {
        let finite = |value: Option<f64>| value.filter(|v| v.is_finite());
        Ok(Self {
            coordinate: Coordinate::new(raw.latitude, raw.longitude)?,
            accuracy_m: finite(raw.accuracy_m),
            heading_deg: finite(raw.heading_deg),
            speed_mps: finite(raw.speed_mps),
            timestamp: raw.timestamp,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location request timed out")]
    Timeout,

    #[error("position unavailable: {0}")]
    PositionUnavailable(String),
}

impl LocationError {
    /// Whether the subscription is dead. A timeout leaves it open.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LocationError::Timeout)
    }
}

/// One item from a location stream.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    Fix(RawFix),
    Error(LocationError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    /// Not subscribed.
    Stopped,
    /// Subscribed, no fix yet.
    Waiting,
    Live,
    /// The source failed; there is no current position.
    Unavailable(LocationError),
}

/// What one processed event did to the feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedUpdate {
    Position(PositionSample),
    Rejected(GeoError),
    Unavailable(LocationError),
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// How long to wait for the next event before reporting a timeout.
    pub request_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
        }
    }
}

pub struct PositionFeed<S: LocationSource> {
    source: S,
    config: FeedConfig,
    receiver: Option<Receiver<LocationEvent>>,
    status: FeedStatus,
    last_known: Option<PositionSample>,
    last_fix_at: Option<Instant>,
    generation: u64,
    telemetry: Option<TelemetryForwarder>,
    listeners: Vec<Sender<FeedUpdate>>,
}

impl<S: LocationSource> PositionFeed<S> {
    pub fn new(source: S, config: FeedConfig) -> Self {
        Self {
            source,
            config,
            receiver: None,
            status: FeedStatus::Stopped,
            last_known: None,
            last_fix_at: None,
            generation: 0,
            telemetry: None,
            listeners: Vec::new(),
        }
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryForwarder) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Every processed update is also sent to `listener`. Dropped receivers
    /// are pruned.
    pub fn add_listener(&mut self, listener: Sender<FeedUpdate>) {
        self.listeners.push(listener);
    }

    pub fn status(&self) -> &FeedStatus {
        &self.status
    }

    pub fn last_known(&self) -> Option<&PositionSample> {
        self.last_known.as_ref()
    }

    /// Time since the last accepted fix, while one is held.
    pub fn last_fix_age(&self) -> Option<Duration> {
        self.last_known.as_ref()?;
        self.last_fix_at.map(|at| at.elapsed())
    }

    pub fn is_running(&self) -> bool {
        self.receiver.is_some()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Opens a fresh subscription, closing any previous one first.
    pub fn start(&mut self) -> Result<(), LocationError> {
        if self.receiver.is_some() {
            self.stop();
        }
        self.generation += 1;

        match self.source.subscribe() {
            Ok(receiver) => {
                info!(generation = self.generation, "location tracking started");
                self.receiver = Some(receiver);
                self.status = FeedStatus::Waiting;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "location subscription failed");
                self.status = FeedStatus::Unavailable(err.clone());
                Err(err)
            }
        }
    }

    /// Releases the subscription and cancels any pending telemetry forward.
    pub fn stop(&mut self) {
        if self.receiver.take().is_some() {
            self.source.unsubscribe();
            info!(generation = self.generation, "location tracking stopped");
        }
        if let Some(telemetry) = &self.telemetry {
            telemetry.cancel(self.generation);
        }
        self.last_known = None;
        self.last_fix_at = None;
        self.status = FeedStatus::Stopped;
    }

    /// Waits up to the request timeout for the next event.
    ///
    /// Returns `None` only when not subscribed.
    pub fn next_update(&mut self) -> Option<FeedUpdate> {
        let received = self.receiver.as_ref()?.recv_timeout(self.config.request_timeout);
        let update = match received {
            Ok(event) => self.ingest(event),
            Err(RecvTimeoutError::Timeout) => self.fail(LocationError::Timeout),
            Err(RecvTimeoutError::Disconnected) => {
                self.fail(LocationError::PositionUnavailable("location source closed".to_string()))
            }
        };
        self.notify(&update);
        Some(update)
    }

    /// Processes an already queued event without waiting.
    pub fn try_next_update(&mut self) -> Option<FeedUpdate> {
        let received = self.receiver.as_ref()?.try_recv();
        let update = match received {
            Ok(event) => self.ingest(event),
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                self.fail(LocationError::PositionUnavailable("location source closed".to_string()))
            }
        };
        self.notify(&update);
        Some(update)
    }

    fn ingest(&mut self, event: LocationEvent) -> FeedUpdate {
        match event {
            LocationEvent::Fix(raw) => match PositionSample::try_from(raw) {
                Ok(sample) => {
                    if let Some(telemetry) = &self.telemetry {
                        telemetry.forward(self.generation, sample.clone());
                    }
                    self.last_known = Some(sample.clone());
                    self.last_fix_at = Some(Instant::now());
                    self.status = FeedStatus::Live;
                    FeedUpdate::Position(sample)
                }
                Err(err) => {
                    warn!(error = %err, "rejected location sample");
                    FeedUpdate::Rejected(err)
                }
            },
            LocationEvent::Error(err) => self.fail(err),
        }
    }

    fn fail(&mut self, err: LocationError) -> FeedUpdate {
        warn!(error = %err, "location source unavailable");
        self.last_known = None;
        self.last_fix_at = None;
        self.status = FeedStatus::Unavailable(err.clone());
        if err.is_terminal() && self.receiver.take().is_some() {
            self.source.unsubscribe();
        }
        FeedUpdate::Unavailable(err)
    }

    fn notify(&mut self, update: &FeedUpdate) {
        self.listeners.retain(|listener| listener.send(update.clone()).is_ok());
    }
}

impl<S: LocationSource> Drop for PositionFeed<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Samples arriving within this window of the first are coalesced into
    /// the latest one.
    pub window: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(2),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

enum TelemetryMsg {
    Sample { generation: u64, sample: PositionSample },
    Cancel { generation: u64 },
    Shutdown,
}

/// Background worker that posts coalesced samples to a [`TelemetrySink`].
pub struct TelemetryForwarder {
    tx: Sender<TelemetryMsg>,
    worker: Option<JoinHandle<()>>,
}

impl TelemetryForwarder {
    pub fn spawn<T>(sink: T, session_id: impl Into<String>, config: TelemetryConfig) -> Self
    where
        T: TelemetrySink + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let session_id = session_id.into();
        let worker = thread::spawn(move || run_forwarder(sink, session_id, config, rx));

        Self {
            tx,
            worker: Some(worker),
        }
    }

    fn forward(&self, generation: u64, sample: PositionSample) {
        // A dead worker only means telemetry is gone, which is acceptable.
        let _ = self.tx.send(TelemetryMsg::Sample { generation, sample });
    }

    /// Drops the pending sample and anything still queued from `generation`
    /// or earlier.
    fn cancel(&self, generation: u64) {
        let _ = self.tx.send(TelemetryMsg::Cancel { generation });
    }
}

impl Drop for TelemetryForwarder {
    fn drop(&mut self) {
        let _ = self.tx.send(TelemetryMsg::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_forwarder<T: TelemetrySink>(sink: T, session_id: String, config: TelemetryConfig, rx: Receiver<TelemetryMsg>) {
    let mut floor = 0u64;
    let mut pending: Option<(PositionSample, Instant)> = None;

    loop {
        let msg = match &pending {
            Some((_, deadline)) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match msg {
            Ok(TelemetryMsg::Sample { generation, sample }) => {
                if generation < floor {
                    continue;
                }
                let deadline = match pending.take() {
                    Some((_, deadline)) => deadline,
                    None => Instant::now() + config.window,
                };
                pending = Some((sample, deadline));
            }
            Ok(TelemetryMsg::Cancel { generation }) => {
                floor = floor.max(generation + 1);
                if pending.take().is_some() {
                    debug!("pending telemetry sample cancelled");
                }
            }
            Ok(TelemetryMsg::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if let Some((sample, _)) = pending.take() {
                    deliver(&sink, &session_id, &sample, &config);
                }
            }
        }
    }
}

fn deliver<T: TelemetrySink>(sink: &T, session_id: &str, sample: &PositionSample, config: &TelemetryConfig) {
    for attempt in 0..=config.max_retries {
        match sink.post_position(session_id, sample) {
            Ok(()) => return,
            Err(err) => {
                debug!(attempt, error = %err, "telemetry post failed");
                if attempt < config.max_retries {
                    thread::sleep(config.retry_backoff);
                }
            }
        }
    }
    warn!(attempts = config.max_retries + 1, "dropping telemetry sample");
}
