//! Background membership refresh

use crate::discovery::{DiscoveryFetcher, NodeListTransport};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Counters for refresh rounds since the refresher was created
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RefreshStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct StatsRecorder {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl StatsRecorder {
    fn snapshot(&self) -> RefreshStats {
        RefreshStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            last_error: self.last_error.lock().clone(),
        }
    }
}

struct RunningTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Re-runs discovery on a fixed interval until stopped.
///
/// At most one refresh task exists per refresher. Failed rounds are counted
/// and logged, never propagated; the loop keeps going until [`stop`](Self::stop).
pub struct Refresher {
    task: Mutex<Option<RunningTask>>,
    stats: Arc<StatsRecorder>,
}

impl Refresher {
    pub fn new() -> Self {
        Self {
            task: Mutex::new(None),
            stats: Arc::new(StatsRecorder::default()),
        }
    }

    /// Spawn the refresh task. Returns false if one is already running or
    /// `interval` is zero.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<T: NodeListTransport>(
        &self,
        fetcher: Arc<DiscoveryFetcher<T>>,
        interval: Duration,
    ) -> bool {
        if interval.is_zero() {
            tracing::warn!("Refusing to start membership refresher with a zero interval");
            return false;
        }

        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run(fetcher, interval, stop_rx, self.stats.clone()));
        *task = Some(RunningTask {
            stop: stop_tx,
            handle,
        });

        tracing::info!(interval_ms = interval.as_millis() as u64, "Started membership refresher");
        true
    }

    /// Signal the task and wait for it to exit. Returns false if nothing was running.
    ///
    /// A discovery round already in flight is allowed to finish first.
    pub async fn stop(&self) -> bool {
        let task = self.task.lock().take();
        let Some(task) = task else {
            return false;
        };

        let _ = task.stop.send(true);
        if let Err(e) = task.handle.await {
            tracing::warn!(error = %e, "Membership refresher ended abnormally");
        }
        true
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    pub fn stats(&self) -> RefreshStats {
        self.stats.snapshot()
    }
}

impl Default for Refresher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Refresher {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.handle.abort();
        }
    }
}

async fn run<T: NodeListTransport>(
    fetcher: Arc<DiscoveryFetcher<T>>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
    stats: Arc<StatsRecorder>,
) {
    loop {
        stats.attempts.fetch_add(1, Ordering::Relaxed);
        match fetcher.fetch().await {
            Ok(nodes) => {
                stats.successes.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(nodes = nodes.len(), "Refreshed membership");
            }
            Err(e) => {
                stats.failures.fetch_add(1, Ordering::Relaxed);
                *stats.last_error.lock() = Some(e.to_string());
                tracing::warn!(error = %e, "Membership refresh failed, keeping current list");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
        if *stop.borrow() {
            break;
        }
    }

    tracing::info!("Membership refresher stopped");
}
