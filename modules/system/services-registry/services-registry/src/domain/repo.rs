use async_trait::async_trait;
use sea_orm::ConnectionTrait;

use crate::domain::error::DomainError;
use crate::domain::model::{RowLock, ServiceFilter, StoredService};

/// Repository trait for service row persistence.
///
/// Rows come back unverified; checking signatures is the service's job.
///
/// # Errors
///
/// Every method fails with `DomainError::Database` when storage rejects the
/// call; writes that break name uniqueness fail with
/// `DomainError::ConstraintViolation`.
#[async_trait]
pub trait ServicesRepository: Send + Sync {
    /// All rows matching the filter, ordered by id.
    async fn find_all<C: ConnectionTrait>(
        &self,
        runner: &C,
        filter: &ServiceFilter,
    ) -> Result<Vec<StoredService>, DomainError>;

    /// First row matching the filter, read under the requested lock.
    async fn find_one<C: ConnectionTrait>(
        &self,
        runner: &C,
        filter: &ServiceFilter,
        lock: RowLock,
    ) -> Result<Option<StoredService>, DomainError>;

    /// Insert a row and return the id assigned by storage. The `id` field of
    /// the argument is ignored.
    async fn insert<C: ConnectionTrait>(
        &self,
        runner: &C,
        service: &StoredService,
    ) -> Result<i64, DomainError>;

    /// Overwrite every column of an existing row. Returns `false` when no
    /// row has that id.
    async fn update<C: ConnectionTrait>(
        &self,
        runner: &C,
        service: &StoredService,
    ) -> Result<bool, DomainError>;

    /// Delete a row by id. Returns `false` when no row has that id.
    async fn delete<C: ConnectionTrait>(&self, runner: &C, id: i64) -> Result<bool, DomainError>;
}
