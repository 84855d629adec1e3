//! Global application error types and handlers.
//!
//! This module defines the error taxonomy used across the backend. Every
//! request either succeeds or terminates with exactly one of these variants;
//! nothing here is retried.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Generic service error used across all auth operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No, invalid, or expired bearer credential.
    #[error("Unauthenticated: {message}")]
    Unauthenticated { message: String },

    /// Authenticated but lacking the privilege for the operation.
    #[error("Permission denied: {message}")]
    Forbidden { message: String },

    /// Bad username or password. Deliberately does not reveal which field
    /// was wrong, or whether the username exists at all.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Account lockout is active. Carries the remaining-lockout metadata
    /// so the caller can display it.
    #[error("Account suspended until {suspended_until}: {reason}")]
    AccountSuspended {
        suspended_until: DateTime<Utc>,
        reason: String,
    },

    #[error("{entity} already exists: {identifier}")]
    AlreadyExists { entity: String, identifier: String },

    #[error("{entity} not found: {identifier}")]
    NotFound { entity: String, identifier: String },

    /// Role-switch target is not strictly lower privilege than the
    /// user's stored role.
    #[error("Invalid role inheritance: {message}")]
    InvalidInheritance { message: String },

    /// Return-role called with no active inheritance record.
    #[error("No active role inheritance")]
    NoActiveInheritance,

    /// Stop-impersonation called on a token without impersonation claims.
    #[error("Not currently impersonating")]
    NotImpersonating,

    /// Attempted impersonation of an admin-tier account.
    #[error("Cannot impersonate {role} accounts")]
    ForbiddenTarget { role: String },

    /// Unlock requested for an account that is not suspended.
    #[error("Account is not suspended")]
    NotSuspended,

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {source}")]
    Database {
        #[from]
        source: anyhow::Error,
    },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    // Helper constructors for common patterns

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn already_exists(entity: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity: entity.into(),
            identifier: identifier.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            identifier: identifier.into(),
        }
    }

    pub fn invalid_inheritance(message: impl Into<String>) -> Self {
        Self::InvalidInheritance {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Maps a storage error from an insert, turning a unique-constraint
    /// violation into `AlreadyExists` for the given entity. Backstop for
    /// check-then-insert races: two concurrent inserts can both pass the
    /// existence check, and the loser hits the constraint instead.
    pub fn conflict_or_database(
        err: anyhow::Error,
        entity: impl Into<String>,
        identifier: impl Into<String>,
    ) -> Self {
        let unique_violation = err
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .is_some_and(|db_err| db_err.is_unique_violation());

        if unique_violation {
            Self::already_exists(entity, identifier)
        } else {
            Self::Database { source: err }
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Database {
            source: anyhow::Error::new(err),
        }
    }
}
