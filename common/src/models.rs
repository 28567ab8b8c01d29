use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Reminder Models
// ============================================================================

/// A persisted recurring reminder with its owner's destination resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ReminderDefinition {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    /// 5-field cron-style expression (minute hour day-of-month month day-of-week)
    pub recurrence: String,
    pub active: bool,
    pub owner_id: Uuid,
    /// Chat address of the owner, denormalized from the users table
    pub destination_address: String,
    pub owner_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to persist a new reminder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReminder {
    pub title: String,
    pub message: String,
    pub recurrence: String,
    pub owner_id: Uuid,
    /// Defaults to `true` when the caller leaves it unspecified
    #[serde(default)]
    pub active: Option<bool>,
}

impl NewReminder {
    pub fn is_active(&self) -> bool {
        self.active.unwrap_or(true)
    }
}

/// Message body handed to the notification gateway on each fire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderNotification {
    pub reminder_id: Uuid,
    pub title: String,
    pub message: String,
    pub destination_address: String,
}

impl From<&ReminderDefinition> for ReminderNotification {
    fn from(reminder: &ReminderDefinition) -> Self {
        Self {
            reminder_id: reminder.id,
            title: reminder.title.clone(),
            message: reminder.message.clone(),
            destination_address: reminder.destination_address.clone(),
        }
    }
}

// ============================================================================
// User Models
// ============================================================================

/// Owner of reminders, addressed by chat id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub chat_id: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Scheduler Models
// ============================================================================

/// Read-only view of a live timer in the job registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledJob {
    pub reminder_id: Uuid,
    pub recurrence: String,
    pub timezone: String,
    pub running: bool,
    pub next_fire_at: Option<DateTime<Utc>>,
}

/// Result of a startup reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub total: usize,
    pub scheduled: usize,
    pub skipped: usize,
    pub skipped_ids: Vec<Uuid>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_reminder_defaults_to_active() {
        let new = NewReminder {
            title: "Paracetamol - 500mg".to_string(),
            message: "Time to take your medication".to_string(),
            recurrence: "0 9 * * *".to_string(),
            owner_id: Uuid::new_v4(),
            active: None,
        };
        assert!(new.is_active());
    }

    #[test]
    fn test_new_reminder_explicit_inactive() {
        let new: NewReminder = serde_json::from_value(serde_json::json!({
            "title": "Insulin",
            "message": "Injection time",
            "recurrence": "0 8,20 * * *",
            "owner_id": Uuid::new_v4(),
            "active": false
        }))
        .unwrap();
        assert!(!new.is_active());
    }

    #[test]
    fn test_notification_from_definition() {
        let now = Utc::now();
        let reminder = ReminderDefinition {
            id: Uuid::new_v4(),
            title: "Insulin".to_string(),
            message: "Injection time".to_string(),
            recurrence: "0 8 * * *".to_string(),
            active: true,
            owner_id: Uuid::new_v4(),
            destination_address: "5511999999999@c.us".to_string(),
            owner_name: None,
            created_at: now,
            updated_at: now,
        };
        let notification = ReminderNotification::from(&reminder);
        assert_eq!(notification.reminder_id, reminder.id);
        assert_eq!(notification.destination_address, "5511999999999@c.us");
    }
}
