// Reminder lifecycle manager
//
// Keeps the job registry consistent with the persisted `active` flags:
// reconcile at startup, schedule on create/activate, unschedule on deactivate.

use crate::db::ReminderStore;
use crate::dispatch::NotificationDispatcher;
use crate::errors::PersistenceError;
use crate::models::{NewReminder, ReconcileReport, ReminderDefinition, ReminderNotification, ScheduledJob};
use crate::scheduler::{FireCallback, JobRegistry, ScheduleOutcome};
use crate::telemetry;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};
use uuid::Uuid;

pub struct ReminderLifecycleManager {
    store: Arc<dyn ReminderStore>,
    registry: Arc<JobRegistry>,
    dispatcher: NotificationDispatcher,
    // Held across the store write and the registry update so the two cannot
    // interleave with another transition
    transitions: Mutex<()>,
}

impl ReminderLifecycleManager {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        registry: Arc<JobRegistry>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            store,
            registry,
            dispatcher,
            transitions: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Schedule every active reminder.
    ///
    /// Runs sequentially. A reminder that cannot be scheduled is logged and
    /// skipped; only a failure to load the active set is returned.
    #[instrument(skip(self))]
    pub async fn reconcile_on_startup(&self) -> Result<ReconcileReport, PersistenceError> {
        let started = Instant::now();
        info!("Loading active reminders");

        let reminders = self.store.find_active_reminders().await?;
        let mut report = ReconcileReport {
            total: reminders.len(),
            ..Default::default()
        };

        for reminder in &reminders {
            if self.schedule_reminder(reminder).await {
                report.scheduled += 1;
            } else {
                report.skipped += 1;
                report.skipped_ids.push(reminder.id);
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            total = report.total,
            scheduled = report.scheduled,
            skipped = report.skipped,
            duration_ms = report.duration_ms,
            "Scheduled active reminders"
        );

        Ok(report)
    }

    /// Persist a new reminder and schedule it when active
    #[instrument(skip(self, reminder), fields(owner_id = %reminder.owner_id))]
    pub async fn create(&self, reminder: NewReminder) -> Result<ReminderDefinition, PersistenceError> {
        let _guard = self.transitions.lock().await;
        let created = self.store.create_reminder(&reminder).await?;

        if created.active {
            self.schedule_reminder(&created).await;
        }

        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn activate(&self, id: Uuid) -> Result<ReminderDefinition, PersistenceError> {
        let _guard = self.transitions.lock().await;
        let reminder = self.store.set_active(id, true).await?;
        self.schedule_reminder(&reminder).await;
        Ok(reminder)
    }

    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: Uuid) -> Result<ReminderDefinition, PersistenceError> {
        let _guard = self.transitions.lock().await;
        let reminder = self.store.set_active(id, false).await?;
        if !self.registry.unschedule(id).await {
            info!(reminder_id = %id, "No live job for deactivated reminder");
        }
        Ok(reminder)
    }

    pub async fn scheduled_jobs(&self) -> Vec<ScheduledJob> {
        self.registry.snapshot().await
    }

    /// Stop every live timer. Dispatches already in flight run to completion.
    pub async fn shutdown(&self) -> usize {
        self.registry.shutdown().await
    }

    /// Register a timer that dispatches this reminder's notification.
    /// Returns false when the registry refused it; the error is logged here.
    async fn schedule_reminder(&self, reminder: &ReminderDefinition) -> bool {
        let notification = ReminderNotification::from(reminder);
        let dispatcher = self.dispatcher.clone();
        let on_fire: FireCallback = Arc::new(move || {
            let dispatcher = dispatcher.clone();
            let notification = notification.clone();
            async move { dispatcher.dispatch(&notification).await }.boxed()
        });

        match self
            .registry
            .schedule(reminder.id, &reminder.recurrence, on_fire)
            .await
        {
            Ok(ScheduleOutcome::Scheduled { .. }) | Ok(ScheduleOutcome::AlreadyScheduled) => true,
            Err(e) => {
                telemetry::record_schedule_failure(&reminder.id);
                error!(
                    reminder_id = %reminder.id,
                    recurrence = %reminder.recurrence,
                    error = %e,
                    "Failed to schedule reminder"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryReminderStore;
    use crate::errors::DispatchError;
    use crate::gateway::MockNotificationGateway;
    use crate::recurrence::default_timezone;
    use crate::scheduler::AnchoredClock;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Pauses every `set_active(true)` after the write until released
    struct GatedStore {
        inner: Arc<InMemoryReminderStore>,
        reached: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ReminderStore for GatedStore {
        async fn find_active_reminders(&self) -> Result<Vec<ReminderDefinition>, PersistenceError> {
            self.inner.find_active_reminders().await
        }

        async fn create_reminder(
            &self,
            reminder: &NewReminder,
        ) -> Result<ReminderDefinition, PersistenceError> {
            self.inner.create_reminder(reminder).await
        }

        async fn set_active(
            &self,
            id: Uuid,
            active: bool,
        ) -> Result<ReminderDefinition, PersistenceError> {
            let updated = self.inner.set_active(id, active).await?;
            if active {
                self.reached.notify_one();
                self.release.notified().await;
            }
            Ok(updated)
        }
    }

    struct Fixture {
        store: Arc<InMemoryReminderStore>,
        manager: ReminderLifecycleManager,
        owner_id: Uuid,
    }

    fn fixture_at(h: u32, m: u32, s: u32, gateway: MockNotificationGateway) -> Fixture {
        let anchor = Utc.with_ymd_and_hms(2026, 10, 18, h, m, s).unwrap();
        let store = Arc::new(InMemoryReminderStore::new());
        let owner = store.add_user("5511999999999@c.us", Some("Ana")).unwrap();
        let registry = Arc::new(JobRegistry::with_clock(
            default_timezone(),
            Arc::new(AnchoredClock::new(anchor)),
        ));
        let manager = ReminderLifecycleManager::new(
            store.clone(),
            registry,
            NotificationDispatcher::new(Arc::new(gateway)),
        );
        Fixture {
            store,
            manager,
            owner_id: owner.id,
        }
    }

    fn counting_gateway(sent: Arc<AtomicU64>) -> MockNotificationGateway {
        let mut gateway = MockNotificationGateway::new();
        gateway.expect_send().returning(move |_, _| {
            sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        gateway
    }

    fn new_reminder(owner_id: Uuid, recurrence: &str, active: Option<bool>) -> NewReminder {
        NewReminder {
            title: "Paracetamol - 500mg".to_string(),
            message: "Hora de tomar seu medicamento!".to_string(),
            recurrence: recurrence.to_string(),
            owner_id,
            active,
        }
    }

    fn raw_definition(owner_id: Uuid, recurrence: &str) -> ReminderDefinition {
        let now = Utc::now();
        ReminderDefinition {
            id: Uuid::new_v4(),
            title: "Vitamin D".to_string(),
            message: "One capsule".to_string(),
            recurrence: recurrence.to_string(),
            active: true,
            owner_id,
            destination_address: "5511999999999@c.us".to_string(),
            owner_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_schedules_every_active_reminder() {
        let f = fixture_at(12, 0, 0, counting_gateway(Arc::new(AtomicU64::new(0))));
        for recurrence in ["0 8 * * *", "0 8,20 * * *", "30 7 * * 1-5", "*/10 * * * *"] {
            f.store.insert_raw(raw_definition(f.owner_id, recurrence)).unwrap();
        }
        let mut inactive = raw_definition(f.owner_id, "0 9 * * *");
        inactive.active = false;
        f.store.insert_raw(inactive).unwrap();

        let report = f.manager.reconcile_on_startup().await.unwrap();

        assert_eq!(report.total, 4);
        assert_eq!(report.scheduled, 4);
        assert_eq!(report.skipped, 0);
        assert_eq!(f.manager.registry().len().await, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_skips_malformed_reminder() {
        let f = fixture_at(12, 0, 0, counting_gateway(Arc::new(AtomicU64::new(0))));
        f.store.insert_raw(raw_definition(f.owner_id, "0 8 * * *")).unwrap();
        f.store.insert_raw(raw_definition(f.owner_id, "0 20 * * *")).unwrap();
        let broken = raw_definition(f.owner_id, "not a schedule");
        let broken_id = broken.id;
        f.store.insert_raw(broken).unwrap();

        let report = f.manager.reconcile_on_startup().await.unwrap();

        assert_eq!(report.scheduled, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.skipped_ids, vec![broken_id]);
        assert!(!f.manager.registry().exists(broken_id).await);
        // Stays active in the store
        assert!(f.store.get(broken_id).unwrap().active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_twice_keeps_one_handle_each() {
        let f = fixture_at(12, 0, 0, counting_gateway(Arc::new(AtomicU64::new(0))));
        f.store.insert_raw(raw_definition(f.owner_id, "0 8 * * *")).unwrap();

        f.manager.reconcile_on_startup().await.unwrap();
        let second = f.manager.reconcile_on_startup().await.unwrap();

        assert_eq!(second.scheduled, 1);
        assert_eq!(f.manager.registry().len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_load_failure_is_returned() {
        let f = fixture_at(12, 0, 0, counting_gateway(Arc::new(AtomicU64::new(0))));
        f.store.set_unavailable(true);

        let err = f.manager.reconcile_on_startup().await.unwrap_err();
        assert!(matches!(err, PersistenceError::ConnectionFailed(_)));
        assert!(f.manager.registry().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_active_schedules_and_inactive_does_not() {
        let f = fixture_at(12, 0, 0, counting_gateway(Arc::new(AtomicU64::new(0))));

        let active = f
            .manager
            .create(new_reminder(f.owner_id, "0 9 * * *", None))
            .await
            .unwrap();
        let inactive = f
            .manager
            .create(new_reminder(f.owner_id, "0 9 * * *", Some(false)))
            .await
            .unwrap();

        assert!(active.active);
        assert_eq!(active.destination_address, "5511999999999@c.us");
        assert!(f.manager.registry().exists(active.id).await);
        assert!(!f.manager.registry().exists(inactive.id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_unknown_owner_persists_nothing() {
        let f = fixture_at(12, 0, 0, counting_gateway(Arc::new(AtomicU64::new(0))));

        let err = f
            .manager
            .create(new_reminder(Uuid::new_v4(), "0 9 * * *", None))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(f.store.reminder_count(), 0);
        assert!(f.manager.registry().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivate_activate_round_trip() {
        // 10:00 in Sao Paulo, past the 09:00 slot
        let f = fixture_at(13, 0, 0, counting_gateway(Arc::new(AtomicU64::new(0))));
        let created = f
            .manager
            .create(new_reminder(f.owner_id, "0 9 * * *", None))
            .await
            .unwrap();
        let expected = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        assert_eq!(f.manager.registry().next_fire_at(created.id).await, Some(expected));

        let deactivated = f.manager.deactivate(created.id).await.unwrap();
        assert!(!deactivated.active);
        assert!(!f.manager.registry().exists(created.id).await);

        let activated = f.manager.activate(created.id).await.unwrap();
        assert!(activated.active);
        assert!(f.manager.registry().exists(created.id).await);
        assert_eq!(f.manager.registry().next_fire_at(created.id).await, Some(expected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_twice_keeps_single_handle() {
        let f = fixture_at(12, 0, 0, counting_gateway(Arc::new(AtomicU64::new(0))));
        let created = f
            .manager
            .create(new_reminder(f.owner_id, "0 9 * * *", None))
            .await
            .unwrap();

        f.manager.activate(created.id).await.unwrap();
        f.manager.activate(created.id).await.unwrap();
        assert_eq!(f.manager.registry().len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_id_is_not_found() {
        let f = fixture_at(12, 0, 0, counting_gateway(Arc::new(AtomicU64::new(0))));

        let err = f.manager.activate(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, PersistenceError::NotFound(_)));
        let err = f.manager.deactivate(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, PersistenceError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivation_stops_future_fires() {
        let sent = Arc::new(AtomicU64::new(0));
        let f = fixture_at(12, 0, 30, counting_gateway(sent.clone()));
        let created = f
            .manager
            .create(new_reminder(f.owner_id, "* * * * *", None))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(40)).await;
        assert_eq!(sent.load(Ordering::SeqCst), 1);

        f.manager.deactivate(created.id).await.unwrap();
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_failure_keeps_firing() {
        let attempts = Arc::new(AtomicU64::new(0));
        let counter = attempts.clone();
        let mut gateway = MockNotificationGateway::new();
        gateway.expect_send().returning(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DispatchError::Transport("connection refused".to_string()))
        });
        let f = fixture_at(12, 0, 30, gateway);
        let created = f
            .manager
            .create(new_reminder(f.owner_id, "* * * * *", None))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(160)).await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(f.manager.registry().exists(created.id).await);
        assert!(f.store.get(created.id).unwrap().active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_all_jobs() {
        let f = fixture_at(12, 0, 0, counting_gateway(Arc::new(AtomicU64::new(0))));
        for _ in 0..3 {
            f.manager
                .create(new_reminder(f.owner_id, "0 9 * * *", None))
                .await
                .unwrap();
        }

        assert_eq!(f.manager.scheduled_jobs().await.len(), 3);
        assert_eq!(f.manager.shutdown().await, 3);
        assert!(f.manager.scheduled_jobs().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_activate_and_deactivate_leave_store_and_registry_in_step() {
        let anchor = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let inner = Arc::new(InMemoryReminderStore::new());
        let owner = inner.add_user("5511999999999@c.us", Some("Ana")).unwrap();
        let mut stored = raw_definition(owner.id, "0 9 * * *");
        stored.active = false;
        let id = stored.id;
        inner.insert_raw(stored).unwrap();

        let store = Arc::new(GatedStore {
            inner: inner.clone(),
            reached: Notify::new(),
            release: Notify::new(),
        });
        let registry = Arc::new(JobRegistry::with_clock(
            default_timezone(),
            Arc::new(AnchoredClock::new(anchor)),
        ));
        let manager = Arc::new(ReminderLifecycleManager::new(
            store.clone(),
            registry.clone(),
            NotificationDispatcher::new(Arc::new(counting_gateway(Arc::new(AtomicU64::new(0))))),
        ));

        let activating = tokio::spawn({
            let manager = manager.clone();
            async move { manager.activate(id).await }
        });
        store.reached.notified().await;

        let deactivating = tokio::spawn({
            let manager = manager.clone();
            async move { manager.deactivate(id).await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        store.release.notify_one();

        activating.await.unwrap().unwrap();
        deactivating.await.unwrap().unwrap();

        // Deactivate waited for activate to finish, so it wins on both sides
        assert!(!inner.get(id).unwrap().active);
        assert!(!registry.exists(id).await);
    }
}
