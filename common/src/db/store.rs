// Persistence contract consumed by the reminder lifecycle manager

use crate::errors::PersistenceError;
use crate::models::{NewReminder, ReminderDefinition, User};
use async_trait::async_trait;
use uuid::Uuid;

/// Source of truth for reminder definitions.
///
/// Every returned definition carries its owner's resolved destination address.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// All reminders with `active = true`
    async fn find_active_reminders(&self) -> Result<Vec<ReminderDefinition>, PersistenceError>;

    /// Persist a new reminder; `active` defaults to `true` when unspecified
    async fn create_reminder(
        &self,
        reminder: &NewReminder,
    ) -> Result<ReminderDefinition, PersistenceError>;

    /// Flip the `active` flag and return the updated definition
    async fn set_active(&self, id: Uuid, active: bool)
        -> Result<ReminderDefinition, PersistenceError>;
}

/// Owners of reminders, keyed by chat address
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_chat_id(&self, chat_id: &str) -> Result<Option<User>, PersistenceError>;

    /// Return the user for a chat address, registering it on first contact.
    /// An existing user keeps its stored name.
    async fn find_or_create_by_chat_id(
        &self,
        chat_id: &str,
        name: Option<&str>,
    ) -> Result<User, PersistenceError>;
}
