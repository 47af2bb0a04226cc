//! Keep-alive ticking while a consumer waits without a deadline
//!
//! When some phase of a stream has no deadline, nothing would be scheduled on
//! the runtime while the consumer waits for the source. The keep-alive task
//! re-arms a no-op sleep at a fixed interval for as long as its probe says
//! the wait is still legitimate. It has no buffering or timing authority.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// A recurring no-op task with graceful shutdown
#[derive(Debug)]
pub struct KeepAlive {
    /// Interval between ticks
    interval: Duration,

    /// Task handle for the background tick loop
    task_handle: JoinHandle<()>,

    /// Shutdown signal, checked before every re-arm
    shutdown_signal: Arc<AtomicBool>,

    /// Number of ticks that re-armed the task
    ticks: Arc<AtomicU64>,
}

impl KeepAlive {
    /// Spawn the tick loop on `runtime`
    ///
    /// After every tick `should_rearm` is consulted; the loop ends as soon as
    /// it returns `false` or [`shutdown`](KeepAlive::shutdown) was called.
    pub fn start<F>(runtime: &Handle, interval: Duration, should_rearm: F) -> Self
    where
        F: Fn() -> bool + Send + 'static,
    {
        let shutdown_signal = Arc::new(AtomicBool::new(false));
        let ticks = Arc::new(AtomicU64::new(0));

        let task_shutdown_signal = Arc::clone(&shutdown_signal);
        let task_ticks = Arc::clone(&ticks);

        let task_handle = runtime.spawn(async move {
            Self::tick_loop(interval, should_rearm, task_shutdown_signal, task_ticks).await;
        });

        tracing::debug!("Keep-alive started (interval: {:?})", interval);

        Self {
            interval,
            task_handle,
            shutdown_signal,
            ticks,
        }
    }

    async fn tick_loop<F>(
        interval: Duration,
        should_rearm: F,
        shutdown_signal: Arc<AtomicBool>,
        ticks: Arc<AtomicU64>,
    ) where
        F: Fn() -> bool,
    {
        loop {
            tokio::time::sleep(interval).await;

            if shutdown_signal.load(Ordering::SeqCst) || !should_rearm() {
                tracing::debug!(
                    "Keep-alive stopped after {} tick(s)",
                    ticks.load(Ordering::Relaxed)
                );
                break;
            }

            let count = ticks.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::trace!("Keep-alive tick {}", count);
        }
    }

    /// Stop re-arming; the task exits at its next wake-up
    pub fn shutdown(&self) {
        self.shutdown_signal.store(true, Ordering::SeqCst);
    }

    /// Whether the tick loop has exited
    pub fn is_finished(&self) -> bool {
        self.task_handle.is_finished()
    }

    /// Ticks that re-armed the task so far
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// The configured interval
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.shutdown();
        self.task_handle.abort();
    }
}
