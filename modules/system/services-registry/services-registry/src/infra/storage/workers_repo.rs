use anyhow::Context;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder,
};

use super::entity::worker::{self, Entity as WorkerEntity};
use crate::domain::ports::{WorkerDirectory, WorkerRecord};

/// Worker directory backed by the `workers` table of the registry database.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrmWorkerDirectory;

impl OrmWorkerDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Record a worker spawned by a hatchery.
    ///
    /// # Errors
    /// Returns an error if the row cannot be written.
    pub async fn register<C: ConnectionTrait>(
        &self,
        runner: &C,
        worker: &WorkerRecord,
    ) -> anyhow::Result<()> {
        worker::ActiveModel {
            id: ActiveValue::Set(worker.id.clone()),
            name: ActiveValue::Set(worker.name.clone()),
            hatchery_id: ActiveValue::Set(worker.hatchery_id),
            status: ActiveValue::Set(worker.status.clone()),
            last_beat: ActiveValue::Set(worker.last_beat),
        }
        .insert(runner)
        .await
        .with_context(|| format!("failed to register worker {}", worker.id))?;
        Ok(())
    }
}

impl From<worker::Model> for WorkerRecord {
    fn from(m: worker::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            hatchery_id: m.hatchery_id,
            status: m.status,
            last_beat: m.last_beat,
        }
    }
}

#[async_trait]
impl WorkerDirectory for OrmWorkerDirectory {
    async fn list_by_owner<C: ConnectionTrait>(
        &self,
        runner: &C,
        owner_id: i64,
    ) -> anyhow::Result<Vec<WorkerRecord>> {
        let models = WorkerEntity::find()
            .filter(worker::Column::HatcheryId.eq(owner_id))
            .order_by_asc(worker::Column::Id)
            .all(runner)
            .await
            .with_context(|| format!("failed to list workers of hatchery {owner_id}"))?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn delete<C: ConnectionTrait>(&self, runner: &C, worker_id: &str) -> anyhow::Result<()> {
        WorkerEntity::delete_by_id(worker_id.to_owned())
            .exec(runner)
            .await
            .with_context(|| format!("failed to delete worker {worker_id}"))?;
        Ok(())
    }
}
