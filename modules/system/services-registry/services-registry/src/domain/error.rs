use services_registry_sdk::ServicesRegistryError;

/// Steps of the cascading delete, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeStep {
    ListWorkers,
    DeleteWorker,
    LoadIdentity,
    RevokeIdentity,
}

impl CascadeStep {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListWorkers => "list_workers",
            Self::DeleteWorker => "delete_worker",
            Self::LoadIdentity => "load_identity",
            Self::RevokeIdentity => "revoke_identity",
        }
    }
}

impl std::fmt::Display for CascadeStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain-level errors for the services registry
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Service not found: {key}")]
    NotFound { key: String },

    #[error("Service {id} data corrupted")]
    Corrupted { id: i64 },

    #[error("Constraint violation during {operation} ({target}): {message}")]
    ConstraintViolation {
        operation: &'static str,
        target: String,
        message: String,
    },

    #[error("Service {name} is held by another transaction")]
    Unavailable { name: String },

    #[error("Cascade step {step} failed for {target}: {source}")]
    DependencyFailure {
        step: CascadeStep,
        target: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Signing configuration error: {0}")]
    Signing(#[from] super::signature::SigningKeyError),

    #[error("Database error during {operation} ({target}): {message}")]
    Database {
        operation: &'static str,
        target: String,
        message: String,
    },
}

impl DomainError {
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    #[must_use]
    pub fn database(
        operation: &'static str,
        target: impl Into<String>,
        e: impl std::fmt::Display,
    ) -> Self {
        Self::Database {
            operation,
            target: target.into(),
            message: e.to_string(),
        }
    }

    #[must_use]
    pub fn dependency(step: CascadeStep, target: impl Into<String>, source: anyhow::Error) -> Self {
        Self::DependencyFailure {
            step,
            target: target.into(),
            source: source.into(),
        }
    }
}

impl From<DomainError> for ServicesRegistryError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound { key } => Self::not_found(key),
            DomainError::Corrupted { id } => Self::Corrupted { id },
            DomainError::ConstraintViolation { message, .. } => Self::constraint_violation(message),
            DomainError::Unavailable { name } => Self::unavailable(name),
            DomainError::DependencyFailure { step, source, .. } => Self::DependencyFailure {
                step: step.to_string(),
                message: source.to_string(),
            },
            DomainError::Signing(_) | DomainError::Database { .. } => Self::internal(),
        }
    }
}
