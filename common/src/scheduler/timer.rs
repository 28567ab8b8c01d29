// Recurring timer driven by a recurrence expression

use crate::errors::SchedulingError;
use crate::recurrence::RecurrenceExpression;
use crate::scheduler::clock::Clock;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Callback producing the unit of work to run at each occurrence.
///
/// The returned future is spawned as its own task, so a slow callback never
/// holds up the timer that produced it.
pub type FireCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct TimerState {
    running: AtomicBool,
    fire_count: AtomicU64,
    next_fire_at: Mutex<Option<DateTime<Utc>>>,
}

impl TimerState {
    fn set_next_fire(&self, next: Option<DateTime<Utc>>) {
        if let Ok(mut guard) = self.next_fire_at.lock() {
            *guard = next;
        }
    }
}

/// A live timer invoking a callback at every occurrence of an expression until stopped
pub struct RecurringTimer {
    name: String,
    state: Arc<TimerState>,
    task: JoinHandle<()>,
}

impl RecurringTimer {
    /// Start a timer on the current tokio runtime.
    ///
    /// Fails if the expression has no occurrence after the clock's current time.
    pub fn start(
        name: impl Into<String>,
        expression: RecurrenceExpression,
        timezone: Tz,
        clock: Arc<dyn Clock>,
        on_fire: FireCallback,
    ) -> Result<Self, SchedulingError> {
        let name = name.into();
        let first = expression
            .next_after(clock.now(), timezone)
            .ok_or_else(|| SchedulingError::NoNextOccurrence(expression.as_str().to_string()))?;

        let state = Arc::new(TimerState {
            running: AtomicBool::new(true),
            fire_count: AtomicU64::new(0),
            next_fire_at: Mutex::new(Some(first)),
        });

        let task = tokio::spawn(run_timer(
            name.clone(),
            state.clone(),
            expression,
            timezone,
            clock,
            on_fire,
            first,
        ));

        debug!(timer = %name, next_fire_at = %first, "Timer started");

        Ok(Self { name, state, task })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    pub fn fire_count(&self) -> u64 {
        self.state.fire_count.load(Ordering::Relaxed)
    }

    pub fn next_fire_at(&self) -> Option<DateTime<Utc>> {
        self.state.next_fire_at.lock().ok().and_then(|guard| *guard)
    }

    /// Cancel all further invocations, including one that is already due.
    /// Callbacks spawned before this call run to completion.
    pub fn stop(&self) {
        if self.state.running.swap(false, Ordering::SeqCst) {
            debug!(timer = %self.name, "Timer stopped");
        }
        self.task.abort();
        self.state.set_next_fire(None);
    }
}

impl Drop for RecurringTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_timer(
    name: String,
    state: Arc<TimerState>,
    expression: RecurrenceExpression,
    timezone: Tz,
    clock: Arc<dyn Clock>,
    on_fire: FireCallback,
    mut next: DateTime<Utc>,
) {
    loop {
        state.set_next_fire(Some(next));

        loop {
            let now = clock.now();
            if now >= next {
                break;
            }
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;
        }

        if !state.running.load(Ordering::SeqCst) {
            break;
        }

        let count = state.fire_count.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(timer = %name, scheduled_for = %next, fire_count = count, "Timer fired");
        tokio::spawn(on_fire());

        // Missed occurrences are skipped, never replayed
        let reference = clock.now().max(next);
        match expression.next_after(reference, timezone) {
            Some(following) => next = following,
            None => {
                warn!(
                    timer = %name,
                    expression = %expression,
                    "Recurrence has no further occurrences, timer finished"
                );
                state.running.store(false, Ordering::SeqCst);
                state.set_next_fire(None);
                break;
            }
        }
    }
}
