//! Race selection between the bridge signal and the active deadline
//!
//! Whenever the buffer is empty and the source is still active, the driver
//! races "the bridge reported something" against at most one deadline timer.
//! Which timer participates is a two-phase state machine:
//!
//! ```text
//!                  first item consumed (one-way)
//!  AwaitingFirstItem ───────────────────────────▶ Streaming
//!  timer: first-item timeout                      timer: between-items timeout
//!  (if set)                                       (if set, re-anchored on every
//!                                                  consumed item)
//! ```

use std::time::Duration;

use tokio::sync::futures::Notified;
use tokio::time::Instant;

use crate::deadline::{DeadlineTimer, Wake};
use crate::error::TimeoutPhase;

/// Phase of the race state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No item has been consumed yet
    AwaitingFirstItem,
    /// At least one item has been consumed
    Streaming,
}

/// Winner of a race
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceOutcome {
    /// The bridge has something for the driver (item, error or end)
    Progress,
    /// The active deadline expired first
    TimedOut {
        phase: TimeoutPhase,
        timeout: Duration,
    },
}

/// Chooses which deadline, if any, races the bridge signal
#[derive(Debug)]
pub struct RaceSelector {
    between_items_timeout: Option<Duration>,
    phase: Phase,
    timer: Option<DeadlineTimer>,
}

impl RaceSelector {
    /// Create a selector whose first-item deadline is anchored at `started_at`
    pub fn new(
        first_item_timeout: Option<Duration>,
        between_items_timeout: Option<Duration>,
        started_at: Instant,
    ) -> Self {
        Self {
            between_items_timeout,
            phase: Phase::AwaitingFirstItem,
            timer: first_item_timeout
                .map(|timeout| DeadlineTimer::anchored_at(timeout, started_at)),
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The timer racing the bridge signal, `None` for an untimed wait
    pub fn next_race(&self) -> Option<&DeadlineTimer> {
        self.timer.as_ref()
    }

    /// Whether the current phase has a deadline
    pub fn is_timed(&self) -> bool {
        self.timer.is_some()
    }

    /// Record one consumed item
    ///
    /// The first call switches to the streaming phase, replacing the
    /// first-item timer with a fresh between-items timer (or none). Later
    /// calls re-anchor the between-items timer.
    pub fn record_progress(&mut self) {
        match self.phase {
            Phase::AwaitingFirstItem => {
                self.phase = Phase::Streaming;
                self.timer = self.between_items_timeout.map(DeadlineTimer::start);
                tracing::debug!(
                    "First item consumed, between-items deadline: {:?}",
                    self.between_items_timeout
                );
            }
            Phase::Streaming => {
                if let Some(timer) = self.timer.as_mut() {
                    timer.update_deadline();
                }
            }
        }
    }

    /// Race `signal` against the current deadline
    ///
    /// `progressed` reports whether the bridge holds something for the
    /// driver; it settles a wake-up that coincides with an arrival in favour
    /// of the arrival. The signal is polled first on equal readiness.
    pub async fn race<F>(&self, signal: Notified<'_>, progressed: F) -> RaceOutcome
    where
        F: Fn() -> bool,
    {
        let Some(timer) = self.next_race() else {
            signal.await;
            return RaceOutcome::Progress;
        };

        tokio::select! {
            biased;
            _ = signal => RaceOutcome::Progress,
            wake = timer.wait(progressed) => match wake {
                Wake::Progress => RaceOutcome::Progress,
                Wake::TimedOut => RaceOutcome::TimedOut {
                    phase: self.timeout_phase(),
                    timeout: timer.duration(),
                },
            },
        }
    }

    fn timeout_phase(&self) -> TimeoutPhase {
        match self.phase {
            Phase::AwaitingFirstItem => TimeoutPhase::FirstItem,
            Phase::Streaming => TimeoutPhase::BetweenItems,
        }
    }
}
