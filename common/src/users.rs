// Owner registration
//
// A chat address becomes a user on first contact. The display name comes from
// the messaging network when it can be looked up.

use crate::db::UserStore;
use crate::errors::PersistenceError;
use crate::gateway::NotificationGateway;
use crate::models::User;
use std::sync::Arc;
use tracing::{instrument, warn};

pub struct OwnerRegistry {
    users: Arc<dyn UserStore>,
    gateway: Arc<dyn NotificationGateway>,
}

impl OwnerRegistry {
    pub fn new(users: Arc<dyn UserStore>, gateway: Arc<dyn NotificationGateway>) -> Self {
        Self { users, gateway }
    }

    /// Return the owner for `chat_id`, creating it when unknown.
    ///
    /// An explicit `name` skips the contact lookup. A failed lookup registers
    /// the owner without a name.
    #[instrument(skip(self, name))]
    pub async fn register(&self, chat_id: &str, name: Option<&str>) -> Result<User, PersistenceError> {
        if let Some(user) = self.users.find_by_chat_id(chat_id).await? {
            return Ok(user);
        }

        let name = match name {
            Some(name) => Some(name.to_string()),
            None => match self.gateway.lookup_contact_name(chat_id).await {
                Ok(name) => name,
                Err(e) => {
                    warn!(error = %e, "Contact name lookup failed, registering without a name");
                    None
                }
            },
        };

        self.users
            .find_or_create_by_chat_id(chat_id, name.as_deref())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryReminderStore;
    use crate::errors::DispatchError;
    use crate::gateway::MockNotificationGateway;

    const CHAT_ID: &str = "5511999999999@c.us";

    fn registry_with(gateway: MockNotificationGateway) -> (Arc<InMemoryReminderStore>, OwnerRegistry) {
        let store = Arc::new(InMemoryReminderStore::new());
        let registry = OwnerRegistry::new(store.clone(), Arc::new(gateway));
        (store, registry)
    }

    #[tokio::test]
    async fn test_new_owner_takes_contact_name() {
        let mut gateway = MockNotificationGateway::new();
        gateway
            .expect_lookup_contact_name()
            .times(1)
            .returning(|_| Ok(Some("Ana Souza".to_string())));
        let (store, registry) = registry_with(gateway);

        let user = registry.register(CHAT_ID, None).await.unwrap();

        assert_eq!(user.chat_id, CHAT_ID);
        assert_eq!(user.name.as_deref(), Some("Ana Souza"));
        assert_eq!(store.find_by_chat_id(CHAT_ID).await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn test_existing_owner_skips_lookup() {
        let mut gateway = MockNotificationGateway::new();
        gateway.expect_lookup_contact_name().times(0);
        let (store, registry) = registry_with(gateway);
        let existing = store.add_user(CHAT_ID, Some("Ana")).unwrap();

        let user = registry.register(CHAT_ID, Some("Other")).await.unwrap();
        assert_eq!(user, existing);
    }

    #[tokio::test]
    async fn test_explicit_name_skips_lookup() {
        let mut gateway = MockNotificationGateway::new();
        gateway.expect_lookup_contact_name().times(0);
        let (_, registry) = registry_with(gateway);

        let user = registry.register(CHAT_ID, Some("Bia")).await.unwrap();
        assert_eq!(user.name.as_deref(), Some("Bia"));
    }

    #[tokio::test]
    async fn test_failed_lookup_registers_without_name() {
        let mut gateway = MockNotificationGateway::new();
        gateway
            .expect_lookup_contact_name()
            .returning(|_| Err(DispatchError::Transport("connection refused".to_string())));
        let (_, registry) = registry_with(gateway);

        let user = registry.register(CHAT_ID, None).await.unwrap();
        assert!(user.name.is_none());
    }

    #[tokio::test]
    async fn test_store_failure_is_returned() {
        let (store, registry) = registry_with(MockNotificationGateway::new());
        store.set_unavailable(true);

        let err = registry.register(CHAT_ID, None).await.unwrap_err();
        assert!(matches!(err, PersistenceError::ConnectionFailed(_)));
    }
}
