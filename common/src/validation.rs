// Request validation boundary
//
// Everything that reaches the lifecycle manager has already passed here; the
// manager itself validates nothing.

use crate::errors::ValidationError;
use crate::models::NewReminder;
use crate::recurrence::parse_recurrence;
use serde::Deserialize;
use uuid::Uuid;

pub const TITLE_MAX_CHARS: usize = 255;
pub const MESSAGE_MAX_CHARS: usize = 2000;
pub const NAME_MAX_CHARS: usize = 255;

/// Raw reminder creation request as received from a caller
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateReminderRequest {
    pub title: Option<String>,
    pub message: Option<String>,
    pub recurrence: Option<String>,
    pub user_id: Option<String>,
    pub active: Option<bool>,
}

impl CreateReminderRequest {
    /// Check every field and produce the definition to persist
    pub fn validate(&self) -> Result<NewReminder, ValidationError> {
        let title = required("title", &self.title)?;
        check_length("title", title, TITLE_MAX_CHARS)?;

        let message = required("message", &self.message)?;
        check_length("message", message, MESSAGE_MAX_CHARS)?;

        let recurrence = required("recurrence", &self.recurrence)?;
        validate_recurrence(recurrence)?;

        let user_id = required("user_id", &self.user_id)?;
        let owner_id = Uuid::parse_str(user_id).map_err(|e| ValidationError::InvalidFieldValue {
            field: "user_id".to_string(),
            reason: format!("must be a UUID: {}", e),
        })?;

        Ok(NewReminder {
            title: title.to_string(),
            message: message.to_string(),
            recurrence: recurrence.trim().to_string(),
            owner_id,
            active: self.active,
        })
    }
}

/// Reject anything that is not a well-formed 5-field recurrence expression
pub fn validate_recurrence(recurrence: &str) -> Result<(), ValidationError> {
    parse_recurrence(recurrence)
        .map(|_| ())
        .map_err(|e| ValidationError::InvalidFieldValue {
            field: "recurrence".to_string(),
            reason: e.to_string(),
        })
}

/// Raw owner registration request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterUserRequest {
    pub chat_id: Option<String>,
    pub name: Option<String>,
}

/// Owner registration input after validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOwner {
    pub chat_id: String,
    pub name: Option<String>,
}

impl RegisterUserRequest {
    pub fn validate(&self) -> Result<NewOwner, ValidationError> {
        let chat_id = required("chat_id", &self.chat_id)?.trim();
        match chat_id.split_once('@') {
            Some((number, server)) if !number.is_empty() && !server.is_empty() => {}
            _ => {
                return Err(ValidationError::InvalidFieldValue {
                    field: "chat_id".to_string(),
                    reason: "must be a chat address such as 5511999999999@c.us".to_string(),
                })
            }
        }

        let name = match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                check_length("name", name, NAME_MAX_CHARS)?;
                Some(name.to_string())
            }
            _ => None,
        };

        Ok(NewOwner {
            chat_id: chat_id.to_string(),
            name,
        })
    }
}

fn required<'a>(field: &str, value: &'a Option<String>) -> Result<&'a str, ValidationError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(field.to_string())),
    }
}

fn check_length(field: &str, value: &str, max_chars: usize) -> Result<(), ValidationError> {
    let chars = value.chars().count();
    if chars > max_chars {
        return Err(ValidationError::InvalidFieldValue {
            field: field.to_string(),
            reason: format!("must be at most {} characters, got {}", max_chars, chars),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateReminderRequest {
        CreateReminderRequest {
            title: Some("Paracetamol - 500mg".to_string()),
            message: Some("Hora de tomar seu medicamento!".to_string()),
            recurrence: Some("0 9 * * *".to_string()),
            user_id: Some("550e8400-e29b-41d4-a716-446655440000".to_string()),
            active: None,
        }
    }

    #[test]
    fn test_valid_request_produces_active_reminder() {
        let reminder = valid_request().validate().unwrap();
        assert_eq!(reminder.recurrence, "0 9 * * *");
        assert!(reminder.is_active());
    }

    #[test]
    fn test_invalid_minute_is_rejected() {
        let mut request = valid_request();
        request.recurrence = Some("99 * * * *".to_string());
        let err = request.validate().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidFieldValue { ref field, .. } if field == "recurrence"
        ));
    }

    #[test]
    fn test_empty_message_is_missing() {
        let mut request = valid_request();
        request.message = Some(String::new());
        assert_eq!(
            request.validate().unwrap_err(),
            ValidationError::MissingField("message".to_string())
        );
    }

    #[test]
    fn test_title_length_counts_characters() {
        let mut request = valid_request();
        request.title = Some("é".repeat(TITLE_MAX_CHARS));
        assert!(request.validate().is_ok());

        request.title = Some("é".repeat(TITLE_MAX_CHARS + 1));
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_message_too_long() {
        let mut request = valid_request();
        request.message = Some("x".repeat(MESSAGE_MAX_CHARS + 1));
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_user_id_must_be_uuid() {
        let mut request = valid_request();
        request.user_id = Some("5511999999999@c.us".to_string());
        let err = request.validate().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidFieldValue { ref field, .. } if field == "user_id"
        ));
    }

    #[test]
    fn test_chat_id_needs_an_address() {
        let request = RegisterUserRequest {
            chat_id: Some("5511999999999".to_string()),
            name: None,
        };
        assert!(matches!(
            request.validate().unwrap_err(),
            ValidationError::InvalidFieldValue { ref field, .. } if field == "chat_id"
        ));

        let request = RegisterUserRequest::default();
        assert_eq!(
            request.validate().unwrap_err(),
            ValidationError::MissingField("chat_id".to_string())
        );
    }

    #[test]
    fn test_blank_name_is_dropped() {
        let request = RegisterUserRequest {
            chat_id: Some(" 5511999999999@c.us ".to_string()),
            name: Some("   ".to_string()),
        };
        assert_eq!(
            request.validate().unwrap(),
            NewOwner {
                chat_id: "5511999999999@c.us".to_string(),
                name: None,
            }
        );
    }

    #[test]
    fn test_explicit_inactive_is_kept() {
        let mut request = valid_request();
        request.active = Some(false);
        assert!(!request.validate().unwrap().is_active());
    }
}
