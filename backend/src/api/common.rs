//! Error handling utilities for API responses.
//!
//! Provides structured error responses and conversion between service-layer
//! errors and HTTP responses. Includes:
//! - Standard error response format
//! - ServiceError to HTTP status code mapping
//! - Validation error formatting helpers
//!
//! # Response Format
//! All errors return consistent JSON responses containing:
//! - `error`: Human-readable message
//! - `error_type`: Machine-readable error category
//! - `details`: Optional field-specific validation errors
//!
//! Suspension errors additionally carry `suspended_until` and
//! `suspension_reason` so the UI can display the remaining lockout time.

use crate::errors::ServiceError;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Standard API response wrapper for all endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Indicates if the request was successful
    pub success: bool,
    /// Response data (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Human-readable message
    pub message: String,
    /// Error details (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
    /// Request timestamp
    pub timestamp: String,
}

/// Error details for failed requests
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Machine-readable error type identifier
    pub error_type: String,
    /// Field-specific validation errors when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
    /// End of the lockout window, present on account_suspended errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended_until: Option<DateTime<Utc>>,
    /// Why the account was suspended, present on account_suspended errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspension_reason: Option<String>,
}

/// Field-specific validation error details
#[derive(Debug, Serialize, Deserialize)]
pub struct FieldError {
    /// Name of the field with validation error
    pub field: String,
    /// Description of the validation failure
    pub message: String,
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.into(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Create an error response
    pub fn error(
        message: impl Into<String>,
        error_type: impl Into<String>,
        details: Option<Vec<FieldError>>,
    ) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            message: message.into(),
            error: Some(ErrorDetails {
                error_type: error_type.into(),
                details,
                suspended_until: None,
                suspension_reason: None,
            }),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Converts ServiceError to appropriate HTTP response with standard format
pub fn service_error_to_http(error: ServiceError) -> (StatusCode, String) {
    let (status, error_type, message) = match &error {
        ServiceError::Unauthenticated { message } => {
            (StatusCode::UNAUTHORIZED, "unauthenticated", message.clone())
        }
        ServiceError::Forbidden { message } => {
            (StatusCode::FORBIDDEN, "permission_denied", message.clone())
        }
        ServiceError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "Invalid credentials".to_string(),
        ),
        ServiceError::AccountSuspended {
            suspended_until,
            reason,
        } => {
            let mut response = ApiResponse::<()>::error(
                "Account suspended",
                "account_suspended",
                None,
            );
            if let Some(details) = response.error.as_mut() {
                details.suspended_until = Some(*suspended_until);
                details.suspension_reason = Some(reason.clone());
            }
            return (
                StatusCode::FORBIDDEN,
                serde_json::to_string(&response).unwrap_or_default(),
            );
        }
        ServiceError::AlreadyExists { entity, identifier } => (
            StatusCode::CONFLICT,
            "already_exists",
            format!("{} '{}' already exists", entity, identifier),
        ),
        ServiceError::NotFound { entity, identifier } => (
            StatusCode::NOT_FOUND,
            "not_found",
            format!("{} '{}' not found", entity, identifier),
        ),
        ServiceError::InvalidInheritance { message } => {
            (StatusCode::BAD_REQUEST, "invalid_inheritance", message.clone())
        }
        ServiceError::NoActiveInheritance => (
            StatusCode::BAD_REQUEST,
            "no_active_inheritance",
            "No active role inheritance".to_string(),
        ),
        ServiceError::NotImpersonating => (
            StatusCode::BAD_REQUEST,
            "not_impersonating",
            "Not currently impersonating".to_string(),
        ),
        ServiceError::ForbiddenTarget { role } => (
            StatusCode::FORBIDDEN,
            "forbidden_target",
            format!("Cannot impersonate {} accounts", role),
        ),
        ServiceError::NotSuspended => (
            StatusCode::BAD_REQUEST,
            "not_suspended",
            "Account is not suspended".to_string(),
        ),
        ServiceError::Validation { message } => {
            (StatusCode::BAD_REQUEST, "validation_error", message.clone())
        }
        ServiceError::Database { source } => {
            tracing::error!("Database error: {}", source);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "database_error",
                "Internal server error".to_string(),
            )
        }
        ServiceError::InternalError { message } => {
            tracing::error!("Internal error: {}", message);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            )
        }
    };

    let error_response = ApiResponse::<()>::error(message, error_type, None);
    (
        status,
        serde_json::to_string(&error_response).unwrap_or_default(),
    )
}

/// Formats validator::ValidationErrors into field-specific error details
pub fn validation_errors_to_field_errors(errors: validator::ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| FieldError {
                field: field.to_string(),
                message: error
                    .message
                    .as_ref()
                    .unwrap_or(&"Invalid value".into())
                    .to_string(),
            })
        })
        .collect()
}

/// Flattens validator errors into a single human-readable message for
/// `ServiceError::Validation`.
pub fn validation_errors_to_message(errors: validator::ValidationErrors) -> String {
    validation_errors_to_field_errors(errors)
        .into_iter()
        .map(|field_error| format!("{}: {}", field_error.field, field_error.message))
        .collect::<Vec<String>>()
        .join(", ")
}
