// In-memory reminder store for tests and database-less local runs

use crate::db::store::{ReminderStore, UserStore};
use crate::errors::PersistenceError;
use crate::models::{NewReminder, ReminderDefinition, User};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    reminders: HashMap<Uuid, ReminderDefinition>,
}

/// `ReminderStore` backed by hash maps, with the same owner resolution and
/// not-found behavior as the Postgres repository
#[derive(Default)]
pub struct InMemoryReminderStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl InMemoryReminderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an owner
    pub fn add_user(&self, chat_id: &str, name: Option<&str>) -> Result<User, PersistenceError> {
        let user = User {
            id: Uuid::new_v4(),
            chat_id: chat_id.to_string(),
            name: name.map(str::to_string),
            created_at: Utc::now(),
        };
        self.lock()?.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// Insert a definition as-is, bypassing any checks on its fields
    pub fn insert_raw(&self, reminder: ReminderDefinition) -> Result<(), PersistenceError> {
        self.lock()?.reminders.insert(reminder.id, reminder);
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<ReminderDefinition> {
        self.lock().ok()?.reminders.get(&id).cloned()
    }

    pub fn reminder_count(&self) -> usize {
        self.lock().map(|t| t.reminders.len()).unwrap_or(0)
    }

    /// Make every subsequent call fail as if the database were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Tables>, PersistenceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PersistenceError::ConnectionFailed(
                "store unavailable".to_string(),
            ));
        }
        self.tables
            .lock()
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))
    }
}

#[async_trait]
impl ReminderStore for InMemoryReminderStore {
    async fn find_active_reminders(&self) -> Result<Vec<ReminderDefinition>, PersistenceError> {
        let tables = self.lock()?;
        let mut active: Vec<ReminderDefinition> = tables
            .reminders
            .values()
            .filter(|r| r.active)
            .cloned()
            .collect();
        active.sort_by_key(|r| r.created_at);
        Ok(active)
    }

    async fn create_reminder(
        &self,
        reminder: &NewReminder,
    ) -> Result<ReminderDefinition, PersistenceError> {
        let mut tables = self.lock()?;
        let owner = tables.users.get(&reminder.owner_id).cloned().ok_or_else(|| {
            PersistenceError::ForeignKeyViolation(format!("user {}", reminder.owner_id))
        })?;

        let now = Utc::now();
        let created = ReminderDefinition {
            id: Uuid::new_v4(),
            title: reminder.title.clone(),
            message: reminder.message.clone(),
            recurrence: reminder.recurrence.clone(),
            active: reminder.is_active(),
            owner_id: owner.id,
            destination_address: owner.chat_id,
            owner_name: owner.name,
            created_at: now,
            updated_at: now,
        };
        tables.reminders.insert(created.id, created.clone());
        Ok(created)
    }

    async fn set_active(
        &self,
        id: Uuid,
        active: bool,
    ) -> Result<ReminderDefinition, PersistenceError> {
        let mut tables = self.lock()?;
        let reminder = tables
            .reminders
            .get_mut(&id)
            .ok_or_else(|| PersistenceError::reminder_not_found(id))?;
        reminder.active = active;
        reminder.updated_at = Utc::now();
        Ok(reminder.clone())
    }
}

#[async_trait]
impl UserStore for InMemoryReminderStore {
    async fn find_by_chat_id(&self, chat_id: &str) -> Result<Option<User>, PersistenceError> {
        let tables = self.lock()?;
        Ok(tables.users.values().find(|u| u.chat_id == chat_id).cloned())
    }

    async fn find_or_create_by_chat_id(
        &self,
        chat_id: &str,
        name: Option<&str>,
    ) -> Result<User, PersistenceError> {
        let mut tables = self.lock()?;
        if let Some(user) = tables.users.values().find(|u| u.chat_id == chat_id) {
            return Ok(user.clone());
        }

        let user = User {
            id: Uuid::new_v4(),
            chat_id: chat_id.to_string(),
            name: name.map(str::to_string),
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }
}
