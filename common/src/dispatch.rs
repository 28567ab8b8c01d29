// Notification dispatch adapter
//
// Fire-and-log: a failed delivery is recorded and dropped. The timer keeps
// running, nothing is retried and the reminder stays active.

use crate::errors::DispatchError;
use crate::gateway::NotificationGateway;
use crate::models::ReminderNotification;
use crate::telemetry;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Body sent to the owner on every fire
pub fn format_notification(title: &str, message: &str) -> String {
    format!("💊 {}\n\n{}", title, message)
}

/// Wraps the gateway so delivery failures never reach the timer
#[derive(Clone)]
pub struct NotificationDispatcher {
    gateway: Arc<dyn NotificationGateway>,
}

impl NotificationDispatcher {
    pub fn new(gateway: Arc<dyn NotificationGateway>) -> Self {
        Self { gateway }
    }

    /// Deliver a notification, logging and swallowing any failure
    #[instrument(skip(self, notification), fields(reminder_id = %notification.reminder_id))]
    pub async fn dispatch(&self, notification: &ReminderNotification) {
        telemetry::record_reminder_fired(&notification.reminder_id);

        match self.try_dispatch(notification).await {
            Ok(()) => {
                telemetry::record_dispatch_success(&notification.reminder_id);
                info!(
                    destination = %notification.destination_address,
                    title = %notification.title,
                    "Sent reminder message"
                );
            }
            Err(e) => {
                telemetry::record_dispatch_failure(&notification.reminder_id, &e);
                error!(
                    destination = %notification.destination_address,
                    error = %e,
                    "Failed to send reminder message"
                );
            }
        }
    }

    /// Single delivery attempt with the error surfaced
    pub async fn try_dispatch(
        &self,
        notification: &ReminderNotification,
    ) -> Result<(), DispatchError> {
        let text = format_notification(&notification.title, &notification.message);
        self.gateway
            .send(&notification.destination_address, &text)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockNotificationGateway;
    use mockall::predicate::eq;
    use uuid::Uuid;

    fn notification() -> ReminderNotification {
        ReminderNotification {
            reminder_id: Uuid::new_v4(),
            title: "Paracetamol - 500mg".to_string(),
            message: "Time to take your medication!".to_string(),
            destination_address: "5511999999999@c.us".to_string(),
        }
    }

    #[test]
    fn test_format_notification() {
        assert_eq!(
            format_notification("Insulin", "Injection time"),
            "💊 Insulin\n\nInjection time"
        );
    }

    #[tokio::test]
    async fn test_dispatch_sends_formatted_text() {
        let mut gateway = MockNotificationGateway::new();
        gateway
            .expect_send()
            .with(
                eq("5511999999999@c.us"),
                eq("💊 Paracetamol - 500mg\n\nTime to take your medication!"),
            )
            .times(1)
            .returning(|_, _| Ok(()));

        let dispatcher = NotificationDispatcher::new(Arc::new(gateway));
        assert!(dispatcher.try_dispatch(&notification()).await.is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_swallows_gateway_failure() {
        let mut gateway = MockNotificationGateway::new();
        gateway.expect_send().times(1).returning(|_, _| {
            Err(DispatchError::Rejected {
                status: 503,
                body: "unavailable".to_string(),
            })
        });

        let dispatcher = NotificationDispatcher::new(Arc::new(gateway));
        // Completes without panicking or propagating
        dispatcher.dispatch(&notification()).await;
    }
}
