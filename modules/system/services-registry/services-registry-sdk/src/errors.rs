//! Error types for the services registry SDK.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServicesRegistryError {
    #[error("Service not found: {key}")]
    NotFound { key: String },

    /// Only surfaced when the registry is configured to report integrity
    /// failures separately from absence.
    #[error("Service {id} failed integrity verification")]
    Corrupted { id: i64 },

    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    #[error("Service {name} is held by another transaction")]
    Unavailable { name: String },

    #[error("Cascade step '{step}' failed: {message}")]
    DependencyFailure { step: String, message: String },

    #[error("Internal error")]
    Internal,
}

impl ServicesRegistryError {
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    #[must_use]
    pub fn unavailable(name: impl Into<String>) -> Self {
        Self::Unavailable { name: name.into() }
    }

    #[must_use]
    pub fn constraint_violation(message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal() -> Self {
        Self::Internal
    }
}
