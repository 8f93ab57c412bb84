use std::collections::BTreeMap;

use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::remediation;

/// Per-field validation messages, keyed by the request field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `Ok(())` when no field failed, otherwise the collected errors.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String, project_id: String },

    #[error("Account {email} is not provisioned")]
    NotProvisioned { email: String },

    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(FieldErrors),

    #[error("Precondition failed: {message}")]
    FailedPrecondition {
        message: String,
        remediation: Option<String>,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password is too weak")]
    WeakPassword,

    #[error("Not signed in")]
    Unauthenticated,

    #[error("Forbidden for the current role")]
    Forbidden,
}

/// Coarse classification used by callers to pick a remediation screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    PermissionDenied,
    NotProvisioned,
    Validation,
    Precondition,
    Generic,
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        AppError::Validation(errors)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            AppError::NotProvisioned { .. } => ErrorKind::NotProvisioned,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::FailedPrecondition { .. } => ErrorKind::Precondition,
            _ => ErrorKind::Generic,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        self.kind() == ErrorKind::PermissionDenied
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, error_message, details) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string(), None),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            AppError::Validation(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation failed".to_string(),
                serde_json::to_value(&fields).ok(),
            ),
            AppError::PermissionDenied { message, project_id } => {
                error!("store denied access on {}: {}", project_id, message);
                (
                    StatusCode::FORBIDDEN,
                    "The record store rejected the request".to_string(),
                    Some(serde_json::json!({
                        "rules": remediation::ACCESS_RULES,
                        "console": remediation::rules_console_url(&project_id),
                    })),
                )
            }
            AppError::NotProvisioned { email } => (
                StatusCode::FORBIDDEN,
                format!("Account {} is not registered in the system", email),
                None,
            ),
            AppError::FailedPrecondition { message, remediation } => (
                StatusCode::PRECONDITION_FAILED,
                message,
                remediation.map(|link| serde_json::json!({ "link": link })),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid email or password".to_string(),
                None,
            ),
            AppError::WeakPassword => (
                StatusCode::BAD_REQUEST,
                "Password is too weak".to_string(),
                None,
            ),
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Not signed in".to_string(), None),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string(), None),
            AppError::Unavailable(msg) => {
                error!("store unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "The record store is unavailable, try again".to_string(),
                    None,
                )
            }
            AppError::Database(e) => {
                error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            kind,
            message: error_message,
            details,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            AppError::PermissionDenied { message: "x".into(), project_id: "p".into() }.kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            AppError::NotProvisioned { email: "a@b.c".into() }.kind(),
            ErrorKind::NotProvisioned
        );
        assert_eq!(AppError::validation("name", "required").kind(), ErrorKind::Validation);
        assert_eq!(
            AppError::FailedPrecondition { message: "index".into(), remediation: None }.kind(),
            ErrorKind::Precondition
        );
        assert_eq!(AppError::Unavailable("down".into()).kind(), ErrorKind::Generic);
    }

    #[test]
    fn test_field_errors_keep_first_message() {
        let mut errors = FieldErrors::new();
        errors.add("age", "required");
        errors.add("age", "must be positive");
        assert_eq!(errors.get("age"), Some("required"));
        assert!(errors.into_result().is_err());
        assert!(FieldErrors::new().into_result().is_ok());
    }
}
