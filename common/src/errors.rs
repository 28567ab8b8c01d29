// Error handling framework
// Persistence failures surface to callers, scheduling failures are caught at the
// registry boundary, dispatch failures are only ever logged.

use thiserror::Error;
use uuid::Uuid;

/// Store read/write errors, surfaced to the caller of every lifecycle operation
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Duplicate key violation: {0}")]
    DuplicateKey(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

impl PersistenceError {
    pub fn reminder_not_found(id: Uuid) -> Self {
        PersistenceError::NotFound(format!("reminder {}", id))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PersistenceError::NotFound(_) | PersistenceError::ForeignKeyViolation(_)
        )
    }
}

/// Recurrence and timer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    #[error("Invalid recurrence expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("Recurrence expression '{0}' has no future occurrence")]
    NoNextOccurrence(String),

    #[error("Scheduler failure: {0}")]
    Internal(String),
}

/// Notification gateway errors
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Failed to build gateway client: {0}")]
    ClientBuild(String),

    #[error("Gateway request failed: {0}")]
    Transport(String),

    #[error("Gateway rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Request validation errors raised by the inbound layer
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },
}

/// API response error type for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        let code = if err.is_not_found() {
            "not_found"
        } else {
            "persistence_error"
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let field = match &err {
            ValidationError::MissingField(field) => field.clone(),
            ValidationError::InvalidFieldValue { field, .. } => field.clone(),
        };
        ApiError::new("validation_error", err.to_string())
            .with_details(serde_json::json!({ "field": field }))
    }
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => PersistenceError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                PersistenceError::ConnectionFailed(err.to_string())
            }
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("23505") => PersistenceError::DuplicateKey(db_err.message().to_string()),
                Some("23503") => {
                    PersistenceError::ForeignKeyViolation(db_err.message().to_string())
                }
                _ => PersistenceError::QueryFailed(db_err.message().to_string()),
            },
            _ => PersistenceError::QueryFailed(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for PersistenceError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        PersistenceError::MigrationFailed(err.to_string())
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        DispatchError::Transport(err.to_string())
    }
}
