// Wall-clock sources for recurrence evaluation

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Source of the current UTC instant used to compute next fire times
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a starting instant that advances with tokio's monotonic clock.
///
/// Under a paused tokio runtime this moves exactly as far as the runtime's timers
/// do, so timers can be driven through whole days of occurrences instantly.
#[derive(Debug, Clone)]
pub struct AnchoredClock {
    anchor: DateTime<Utc>,
    started: Instant,
}

impl AnchoredClock {
    pub fn new(anchor: DateTime<Utc>) -> Self {
        Self {
            anchor,
            started: Instant::now(),
        }
    }
}

impl Clock for AnchoredClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now().saturating_duration_since(self.started);
        self.anchor + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }
}
