//! Location sources that do not need a device.
//!
//! [`ManualSource`] is pushed to by hand (tests, bridges from a platform
//! callback). [`SimulatedWalk`] replays a path on a timer thread.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::feed::{LocationError, LocationEvent, RawFix};
use crate::geo::{bearing_degrees, distance_meters, Coordinate};
use crate::traits::LocationSource;

#[derive(Debug, Default)]
struct ManualInner {
    sender: Option<Sender<LocationEvent>>,
    deny: Option<LocationError>,
}

/// A source fed by explicit [`push`](ManualSource::push) calls.
///
/// Clones share the same subscription, so one clone can be handed to a feed
/// while another keeps pushing.
#[derive(Debug, Clone, Default)]
pub struct ManualSource {
    inner: Arc<Mutex<ManualInner>>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends `event` to the current subscriber. False when nobody listens.
    pub fn push(&self, event: LocationEvent) -> bool {
        match &self.inner.lock().sender {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    pub fn push_fix(&self, latitude: f64, longitude: f64) -> bool {
        self.push(LocationEvent::Fix(RawFix::new(latitude, longitude)))
    }

    /// Makes subsequent subscriptions fail with `err`.
    pub fn deny_with(&self, err: LocationError) {
        self.inner.lock().deny = Some(err);
    }

    /// Ends the current stream as if the device went away.
    pub fn close(&self) {
        self.inner.lock().sender = None;
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.lock().sender.is_some()
    }
}

impl LocationSource for ManualSource {
    fn subscribe(&mut self) -> Result<Receiver<LocationEvent>, LocationError> {
        let mut inner = self.inner.lock();
        if let Some(err) = inner.deny.clone() {
            return Err(err);
        }
        let (tx, rx) = mpsc::channel();
        inner.sender = Some(tx);
        Ok(rx)
    }

    fn unsubscribe(&mut self) {
        self.inner.lock().sender = None;
    }
}

/// Walks a fixed path, emitting one fix per vertex every `interval`.
///
/// The stream closes after the last vertex.
pub struct SimulatedWalk {
    path: Vec<Coordinate>,
    interval: Duration,
    accuracy_m: f64,
    worker: Option<(Sender<()>, JoinHandle<()>)>,
}

impl SimulatedWalk {
    pub fn new(path: Vec<Coordinate>, interval: Duration) -> Self {
        Self {
            path,
            interval,
            accuracy_m: 10.0,
            worker: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = accuracy_m;
        self
    }

    fn halt(&mut self) {
        if let Some((stop, handle)) = self.worker.take() {
            drop(stop);
            let _ = handle.join();
        }
    }
}

impl LocationSource for SimulatedWalk {
    fn subscribe(&mut self) -> Result<Receiver<LocationEvent>, LocationError> {
        self.halt();
        if self.path.is_empty() {
            return Err(LocationError::PositionUnavailable("simulated path is empty".to_string()));
        }

        let (tx, rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let path = self.path.clone();
        let interval = self.interval;
        let accuracy_m = self.accuracy_m;

        let handle = thread::spawn(move || {
            let speed_mps = |from: Coordinate, to: Coordinate| {
                let secs = interval.as_secs_f64();
                if secs > 0.0 {
                    Some(distance_meters(from, to) / secs)
                } else {
                    None
                }
            };

            for (idx, &point) in path.iter().enumerate() {
                let mut fix = RawFix::new(point.lat(), point.lng()).with_accuracy(accuracy_m);
                if let Some(&next) = path.get(idx + 1) {
                    fix = fix.with_heading(bearing_degrees(point, next));
                }
                if let Some(speed) = idx.checked_sub(1).and_then(|prev| speed_mps(path[prev], point)) {
                    fix = fix.with_speed(speed);
                }

                if tx.send(LocationEvent::Fix(fix)).is_err() {
                    return;
                }
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    _ => {
                        debug!("simulated walk stopped");
                        return;
                    }
                }
            }
            debug!("simulated walk finished");
        });

        self.worker = Some((stop_tx, handle));
        Ok(rx)
    }

    fn unsubscribe(&mut self) {
        self.halt();
    }
}

impl Drop for SimulatedWalk {
    fn drop(&mut self) {
        self.halt();
    }
}
