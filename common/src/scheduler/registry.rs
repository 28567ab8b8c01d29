// Job registry: the single owner of reminder id → live timer handles

use crate::errors::SchedulingError;
use crate::models::ScheduledJob;
use crate::recurrence::parse_recurrence;
use crate::scheduler::clock::{Clock, SystemClock};
use crate::scheduler::timer::{FireCallback, RecurringTimer};
use crate::telemetry;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// In-memory handle for a scheduled reminder. Never persisted.
pub struct JobHandle {
    pub reminder_id: Uuid,
    pub recurrence: String,
    pub timezone: Tz,
    timer: RecurringTimer,
}

impl JobHandle {
    pub fn is_running(&self) -> bool {
        self.timer.is_running()
    }

    pub fn next_fire_at(&self) -> Option<DateTime<Utc>> {
        self.timer.next_fire_at()
    }

    fn stop(&self) {
        self.timer.stop();
    }

    fn to_scheduled_job(&self) -> ScheduledJob {
        ScheduledJob {
            reminder_id: self.reminder_id,
            recurrence: self.recurrence.clone(),
            timezone: self.timezone.to_string(),
            running: self.is_running(),
            next_fire_at: self.next_fire_at(),
        }
    }
}

/// Outcome of a schedule request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled { next_fire_at: DateTime<Utc> },
    AlreadyScheduled,
}

/// Registry of live reminder timers.
///
/// All map access happens under one lock, so the existence check and the insert
/// in `schedule` are atomic and at most one handle exists per reminder id.
pub struct JobRegistry {
    jobs: Mutex<HashMap<Uuid, JobHandle>>,
    timezone: Tz,
    clock: Arc<dyn Clock>,
}

impl JobRegistry {
    pub fn new(timezone: Tz) -> Self {
        Self::with_clock(timezone, Arc::new(SystemClock))
    }

    pub fn with_clock(timezone: Tz, clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            timezone,
            clock,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Start a timer for the reminder unless one already exists
    #[instrument(skip(self, on_fire))]
    pub async fn schedule(
        &self,
        reminder_id: Uuid,
        recurrence: &str,
        on_fire: FireCallback,
    ) -> Result<ScheduleOutcome, SchedulingError> {
        let mut jobs = self.jobs.lock().await;

        if jobs.contains_key(&reminder_id) {
            warn!(
                reminder_id = %reminder_id,
                "Job already exists for reminder, skipping creation"
            );
            return Ok(ScheduleOutcome::AlreadyScheduled);
        }

        let expression = parse_recurrence(recurrence)?;
        let timer = RecurringTimer::start(
            format!("reminder-{}", reminder_id),
            expression,
            self.timezone,
            self.clock.clone(),
            on_fire,
        )?;

        let next_fire_at = timer
            .next_fire_at()
            .ok_or_else(|| SchedulingError::Internal("timer started without a fire time".to_string()))?;

        jobs.insert(
            reminder_id,
            JobHandle {
                reminder_id,
                recurrence: recurrence.to_string(),
                timezone: self.timezone,
                timer,
            },
        );
        telemetry::update_scheduled_jobs(jobs.len());

        info!(
            reminder_id = %reminder_id,
            recurrence = recurrence,
            next_fire_at = %next_fire_at,
            total_scheduled = jobs.len(),
            "Reminder scheduled"
        );

        Ok(ScheduleOutcome::Scheduled { next_fire_at })
    }

    /// Stop and remove the reminder's timer. Returns whether a handle existed.
    #[instrument(skip(self))]
    pub async fn unschedule(&self, reminder_id: Uuid) -> bool {
        let mut jobs = self.jobs.lock().await;
        match jobs.remove(&reminder_id) {
            Some(handle) => {
                handle.stop();
                telemetry::update_scheduled_jobs(jobs.len());
                info!(reminder_id = %reminder_id, "Stopped and deleted job");
                true
            }
            None => false,
        }
    }

    pub async fn exists(&self, reminder_id: Uuid) -> bool {
        self.jobs.lock().await.contains_key(&reminder_id)
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    pub async fn next_fire_at(&self, reminder_id: Uuid) -> Option<DateTime<Utc>> {
        self.jobs
            .lock()
            .await
            .get(&reminder_id)
            .and_then(JobHandle::next_fire_at)
    }

    /// Snapshot of every live timer, ordered by next fire time
    pub async fn snapshot(&self) -> Vec<ScheduledJob> {
        let jobs = self.jobs.lock().await;
        let mut snapshot: Vec<ScheduledJob> =
            jobs.values().map(JobHandle::to_scheduled_job).collect();
        snapshot.sort_by_key(|job| (job.next_fire_at, job.reminder_id));
        snapshot
    }

    /// Stop every timer and clear the registry
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> usize {
        let mut jobs = self.jobs.lock().await;
        let stopped = jobs.len();
        for handle in jobs.values() {
            handle.stop();
        }
        jobs.clear();
        telemetry::update_scheduled_jobs(0);
        info!(stopped, "All reminder timers stopped");
        stopped
    }
}
