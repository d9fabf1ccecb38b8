use async_trait::async_trait;
use sea_orm::sea_query::{LockBehavior, LockType};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseBackend, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

use super::db::db_err;
use super::entity::{Column, Entity as ServiceEntity};
use super::mapper::to_active_model;
use crate::domain::error::DomainError;
use crate::domain::model::{RowLock, ServiceFilter, StoredService};
use crate::domain::repo::ServicesRepository;

/// `SeaORM` implementation of [`ServicesRepository`] over the `services` table.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrmServicesRepository;

impl OrmServicesRepository {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn condition(filter: &ServiceFilter) -> Condition {
    match filter {
        ServiceFilter::All => Condition::all(),
        ServiceFilter::Id(id) => Condition::all().add(Column::Id.eq(*id)),
        ServiceFilter::Name(name) => Condition::all().add(Column::Name.eq(name.as_str())),
        ServiceFilter::NameAndType { name, service_type } => Condition::all()
            .add(Column::Name.eq(name.as_str()))
            .add(Column::ServiceType.eq(service_type.as_str())),
        ServiceFilter::ConsumerId(id) => {
            Condition::all().add(Column::AuthConsumerId.eq(id.as_str()))
        }
        ServiceFilter::Type(t) => Condition::all().add(Column::ServiceType.eq(t.as_str())),
        ServiceFilter::HeartbeatBefore(at) => Condition::all().add(Column::LastHeartbeat.lt(*at)),
    }
}

#[async_trait]
impl ServicesRepository for OrmServicesRepository {
    async fn find_all<C: ConnectionTrait>(
        &self,
        runner: &C,
        filter: &ServiceFilter,
    ) -> Result<Vec<StoredService>, DomainError> {
        let models = ServiceEntity::find()
            .filter(condition(filter))
            .order_by_asc(Column::Id)
            .all(runner)
            .await
            .map_err(db_err("find_all", &filter.target()))?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn find_one<C: ConnectionTrait>(
        &self,
        runner: &C,
        filter: &ServiceFilter,
        lock: RowLock,
    ) -> Result<Option<StoredService>, DomainError> {
        let mut query = ServiceEntity::find()
            .filter(condition(filter))
            .order_by_asc(Column::Id);

        // SQLite has no row locks; its writers are serialized anyway.
        if lock == RowLock::ExclusiveSkipLocked
            && runner.get_database_backend() != DatabaseBackend::Sqlite
        {
            query = query.lock_with_behavior(LockType::Update, LockBehavior::SkipLocked);
        }

        let model = query
            .one(runner)
            .await
            .map_err(db_err("find_one", &filter.target()))?;

        Ok(model.map(Into::into))
    }

    async fn insert<C: ConnectionTrait>(
        &self,
        runner: &C,
        service: &StoredService,
    ) -> Result<i64, DomainError> {
        let target = format!("name={}", service.name);
        let result = ServiceEntity::insert(to_active_model(service))
            .exec(runner)
            .await
            .map_err(db_err("insert", &target))?;

        Ok(result.last_insert_id)
    }

    async fn update<C: ConnectionTrait>(
        &self,
        runner: &C,
        service: &StoredService,
    ) -> Result<bool, DomainError> {
        let target = format!("id={}", service.id);
        let result = ServiceEntity::update_many()
            .set(to_active_model(service))
            .filter(Column::Id.eq(service.id))
            .exec(runner)
            .await
            .map_err(db_err("update", &target))?;

        Ok(result.rows_affected > 0)
    }

    async fn delete<C: ConnectionTrait>(&self, runner: &C, id: i64) -> Result<bool, DomainError> {
        let target = format!("id={id}");
        let result = ServiceEntity::delete_by_id(id)
            .exec(runner)
            .await
            .map_err(db_err("delete", &target))?;

        Ok(result.rows_affected > 0)
    }
}
