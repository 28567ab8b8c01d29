// Reminder repository implementation

use crate::db::store::ReminderStore;
use crate::db::DbPool;
use crate::errors::PersistenceError;
use crate::models::{NewReminder, ReminderDefinition};
use async_trait::async_trait;
use tracing::instrument;
use uuid::Uuid;

/// Columns of a reminder joined with its owner
const REMINDER_WITH_OWNER: &str = r#"
    SELECT
        r.id, r.title, r.message, r.recurrence, r.active,
        r.user_id AS owner_id,
        u.chat_id AS destination_address,
        u.name AS owner_name,
        r.created_at, r.updated_at
    FROM medication_reminders r
    JOIN users u ON u.id = r.user_id
"#;

/// Repository for reminder-related database operations
#[derive(Clone)]
pub struct ReminderRepository {
    pool: DbPool,
}

impl ReminderRepository {
    /// Create a new ReminderRepository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReminderStore for ReminderRepository {
    #[instrument(skip(self))]
    async fn find_active_reminders(&self) -> Result<Vec<ReminderDefinition>, PersistenceError> {
        let query = format!(
            "{} WHERE r.active = true ORDER BY r.created_at",
            REMINDER_WITH_OWNER
        );
        let reminders = sqlx::query_as::<_, ReminderDefinition>(&query)
            .fetch_all(self.pool.pool())
            .await?;

        tracing::debug!(count = reminders.len(), "Loaded active reminders");
        Ok(reminders)
    }

    #[instrument(skip(self, reminder), fields(owner_id = %reminder.owner_id))]
    async fn create_reminder(
        &self,
        reminder: &NewReminder,
    ) -> Result<ReminderDefinition, PersistenceError> {
        let query = format!(
            r#"
            WITH inserted AS (
                INSERT INTO medication_reminders (
                    id, title, message, recurrence, active, user_id, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
                RETURNING *
            )
            {}
            "#,
            REMINDER_WITH_OWNER.replace("medication_reminders r", "inserted r")
        );

        let created = sqlx::query_as::<_, ReminderDefinition>(&query)
            .bind(Uuid::new_v4())
            .bind(&reminder.title)
            .bind(&reminder.message)
            .bind(&reminder.recurrence)
            .bind(reminder.is_active())
            .bind(reminder.owner_id)
            .fetch_optional(self.pool.pool())
            .await?
            .ok_or_else(|| PersistenceError::NotFound(format!("user {}", reminder.owner_id)))?;

        tracing::info!(reminder_id = %created.id, title = %created.title, "Reminder created");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn set_active(
        &self,
        id: Uuid,
        active: bool,
    ) -> Result<ReminderDefinition, PersistenceError> {
        let query = format!(
            r#"
            WITH updated AS (
                UPDATE medication_reminders
                SET active = $2, updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            {}
            "#,
            REMINDER_WITH_OWNER.replace("medication_reminders r", "updated r")
        );

        let reminder = sqlx::query_as::<_, ReminderDefinition>(&query)
            .bind(id)
            .bind(active)
            .fetch_optional(self.pool.pool())
            .await?
            .ok_or_else(|| PersistenceError::reminder_not_found(id))?;

        tracing::info!(reminder_id = %id, active, "Reminder active flag updated");
        Ok(reminder)
    }
}
