//! Collaborators the registry drives during a cascading delete.
//!
//! Every method receives the runner the registry is working on, so an
//! implementation backed by the same database takes part in the cascade's
//! transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::ConnectionTrait;
use services_registry_sdk::ConsumerId;

/// A worker spawned and owned by a hatchery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRecord {
    pub id: String,
    pub name: String,
    pub hatchery_id: i64,
    pub status: String,
    pub last_beat: DateTime<Utc>,
}

/// An external credential/identity coupled to a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: ConsumerId,
    pub name: String,
    pub created: DateTime<Utc>,
}

/// # Errors
/// Failures are returned as-is; the registry wraps them with the cascade
/// step that was running.
#[async_trait]
pub trait WorkerDirectory: Send + Sync {
    /// Workers owned by the hatchery with the given service id.
    async fn list_by_owner<C: ConnectionTrait>(
        &self,
        runner: &C,
        owner_id: i64,
    ) -> anyhow::Result<Vec<WorkerRecord>>;

    /// Delete a single worker, releasing whatever it holds.
    async fn delete<C: ConnectionTrait>(&self, runner: &C, worker_id: &str) -> anyhow::Result<()>;
}

/// # Errors
/// Same contract as [`WorkerDirectory`].
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn get<C: ConnectionTrait>(
        &self,
        runner: &C,
        id: &ConsumerId,
    ) -> anyhow::Result<Option<Identity>>;

    /// Delete the identity, revoking its credentials.
    async fn delete<C: ConnectionTrait>(&self, runner: &C, id: &ConsumerId) -> anyhow::Result<()>;
}
