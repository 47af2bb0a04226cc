//! Re-armable deadline timers
//!
//! A `DeadlineTimer` pairs a duration with the instant of the last recorded
//! progress. Its deadline is always `last_progress + duration`, so recording
//! progress moves the deadline forward without creating a new timer.

use std::time::Duration;

use tokio::time::Instant;

/// Result of waiting on a deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Progress was recorded before the deadline
    Progress,
    /// The deadline passed without progress
    TimedOut,
}

/// A countdown re-anchored on every recorded progress
#[derive(Debug, Clone)]
pub struct DeadlineTimer {
    duration: Duration,
    last_progress: Instant,
}

impl DeadlineTimer {
    /// Start a timer anchored at the current instant
    pub fn start(duration: Duration) -> Self {
        Self::anchored_at(duration, Instant::now())
    }

    /// Start a timer anchored at a given instant
    pub fn anchored_at(duration: Duration, last_progress: Instant) -> Self {
        Self {
            duration,
            last_progress,
        }
    }

    /// Record progress, moving the deadline to `now + duration`
    pub fn update_deadline(&mut self) {
        self.last_progress = Instant::now();
    }

    /// The configured duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// The instant at which the timer expires
    pub fn deadline(&self) -> Instant {
        self.last_progress + self.duration
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Duration {
        self.deadline().saturating_duration_since(Instant::now())
    }

    /// Wait until the deadline
    ///
    /// On waking, `progressed` is consulted first: progress recorded before
    /// the wake-up always wins over expiry. Otherwise the deadline is checked
    /// again and the wait resumes if it has moved.
    pub async fn wait<F>(&self, progressed: F) -> Wake
    where
        F: Fn() -> bool,
    {
        loop {
            tokio::time::sleep(self.remaining()).await;

            if progressed() {
                return Wake::Progress;
            }

            if Instant::now() >= self.deadline() {
                tracing::trace!("Deadline of {:?} expired", self.duration);
                return Wake::TimedOut;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_times_out_without_progress() {
        let timer = DeadlineTimer::start(Duration::from_millis(100));
        let started = Instant::now();

        let wake = timer.wait(|| false).await;

        assert_eq!(wake, Wake::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(timer.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_wins_at_wake_up() {
        let timer = DeadlineTimer::start(Duration::from_millis(100));
        let progressed = AtomicBool::new(true);

        let wake = timer.wait(|| progressed.load(Ordering::SeqCst)).await;
        assert_eq!(wake, Wake::Progress);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_deadline_moves_anchor() {
        let mut timer = DeadlineTimer::start(Duration::from_millis(100));
        let first_deadline = timer.deadline();

        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(timer.remaining(), Duration::from_millis(40));

        timer.update_deadline();
        assert_eq!(timer.deadline(), first_deadline + Duration::from_millis(60));
        assert_eq!(timer.remaining(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_anchored_in_the_past_expires_immediately() {
        let anchor = Instant::now();
        tokio::time::advance(Duration::from_millis(500)).await;

        let timer = DeadlineTimer::anchored_at(Duration::from_millis(100), anchor);
        assert_eq!(timer.remaining(), Duration::ZERO);

        assert_eq!(timer.wait(|| false).await, Wake::TimedOut);
    }
}
