//! Periodic zone/asset refresh on a background thread.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info};

use crate::traits::{AssetSource, ZoneSource};
use crate::zones::ZoneIndex;

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    pub interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
        }
    }
}

/// Refreshes a [`ZoneIndex`] immediately and then every interval until
/// dropped.
pub struct ZoneRefresher {
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl ZoneRefresher {
    pub fn spawn<Z, A>(index: ZoneIndex, zone_source: Z, asset_source: A, config: RefreshConfig) -> Self
    where
        Z: ZoneSource + Send + 'static,
        A: AssetSource + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let worker = thread::spawn(move || {
            info!(interval_secs = config.interval.as_secs(), "zone refresher started");
            loop {
                let outcome = index.refresh(&zone_source, &asset_source);
                debug!(?outcome, "zone refresh tick");

                match stop_rx.recv_timeout(config.interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    _ => break,
                }
            }
            info!("zone refresher stopped");
        });

        Self {
            stop: Some(stop_tx),
            worker: Some(worker),
        }
    }
}

impl Drop for ZoneRefresher {
    fn drop(&mut self) {
        self.stop.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
