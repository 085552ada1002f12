//! Timer handles for autosave and dashboard refresh
//!
//! Two small scheduling primitives on top of tokio:
//!
//! - [`Debouncer`] coalesces bursts of calls: each `schedule` cancels the
//!   pending timer and starts a new one, so the action runs once after the
//!   calls stop for a full window.
//! - [`RefreshPoller`] runs a refresh on a fixed interval while visible.
//!   Hiding pauses it; showing it again refreshes once immediately and
//!   restarts the interval.
//!
//! Both must be used from inside a tokio runtime.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use crate::error::{AppraiseError, Result};

/// Default quiet period before an autosave fires
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Default dashboard refresh interval
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Cancellable, restartable one-shot timer
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Run `action` once `window` passes without another call
    pub fn schedule<F>(&mut self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let window = self.window;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            action();
        }));
    }

    /// Drop the pending action; returns whether one was still waiting
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) => {
                let waiting = !handle.is_finished();
                handle.abort();
                waiting
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

type RefreshFn = Arc<dyn Fn() + Send + Sync>;

/// Fixed-interval refresh that pauses while hidden
pub struct RefreshPoller {
    period: Duration,
    refresh: RefreshFn,
    visible: bool,

    /// Shutdown signal for the running loop
    shutdown_tx: Option<broadcast::Sender<()>>,

    task_handle: Option<JoinHandle<()>>,
}

impl RefreshPoller {
    /// Create a poller; nothing runs until [`start`](Self::start)
    pub fn new<F>(period: Duration, refresh: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            period,
            refresh: Arc::new(refresh),
            visible: true,
            shutdown_tx: None,
            task_handle: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start the interval if it is not already running
    ///
    /// The first refresh happens one full period after starting.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let refresh = Arc::clone(&self.refresh);
        let period = self.period;

        self.task_handle = Some(tokio::spawn(run_refresh_loop(refresh, period, shutdown_rx)));
        self.shutdown_tx = Some(shutdown_tx);
    }

    /// Signal the loop to stop without waiting for it
    pub fn pause(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.task_handle = None;
    }

    /// Stop the loop and wait for it to exit
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| AppraiseError::Other(format!("Failed to stop refresh task: {}", e)))?;
        }

        tracing::debug!("Refresh poller stopped");
        Ok(())
    }

    /// Visibility change: hide pauses, show refreshes now and resumes
    pub fn set_visible(&mut self, visible: bool) {
        if visible == self.visible {
            return;
        }
        self.visible = visible;

        if visible {
            tracing::debug!("View visible again, refreshing immediately");
            self.refresh_now();
            self.start();
        } else {
            tracing::debug!("View hidden, pausing refresh");
            self.pause();
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Run the refresh synchronously on the calling task
    pub fn refresh_now(&self) {
        (self.refresh)();
    }

    pub fn is_running(&self) -> bool {
        self.task_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for RefreshPoller {
    fn drop(&mut self) {
        self.pause();
    }
}

async fn run_refresh_loop(
    refresh: RefreshFn,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!("Starting refresh loop with {:?} interval", period);

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => {
                break;
            }

            _ = timer.tick() => {
                refresh();
            }
        }
    }
}
