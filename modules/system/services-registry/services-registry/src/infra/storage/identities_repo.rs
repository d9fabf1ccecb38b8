use anyhow::Context;
use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ActiveValue, ConnectionTrait, EntityTrait};
use services_registry_sdk::ConsumerId;

use super::entity::auth_consumer::{self, Entity as ConsumerEntity};
use crate::domain::ports::{Identity, IdentityStore};

/// Identity store backed by the `auth_consumers` table of the registry
/// database.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrmIdentityStore;

impl OrmIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// # Errors
    /// Returns an error if the row cannot be written.
    pub async fn create<C: ConnectionTrait>(
        &self,
        runner: &C,
        identity: &Identity,
    ) -> anyhow::Result<()> {
        auth_consumer::ActiveModel {
            id: ActiveValue::Set(identity.id.as_str().to_owned()),
            name: ActiveValue::Set(identity.name.clone()),
            created: ActiveValue::Set(identity.created),
        }
        .insert(runner)
        .await
        .with_context(|| format!("failed to create consumer {}", identity.id))?;
        Ok(())
    }
}

impl From<auth_consumer::Model> for Identity {
    fn from(m: auth_consumer::Model) -> Self {
        Self {
            id: ConsumerId::new(m.id),
            name: m.name,
            created: m.created,
        }
    }
}

#[async_trait]
impl IdentityStore for OrmIdentityStore {
    async fn get<C: ConnectionTrait>(
        &self,
        runner: &C,
        id: &ConsumerId,
    ) -> anyhow::Result<Option<Identity>> {
        let model = ConsumerEntity::find_by_id(id.as_str().to_owned())
            .one(runner)
            .await
            .with_context(|| format!("failed to load consumer {id}"))?;
        Ok(model.map(Into::into))
    }

    async fn delete<C: ConnectionTrait>(&self, runner: &C, id: &ConsumerId) -> anyhow::Result<()> {
        ConsumerEntity::delete_by_id(id.as_str().to_owned())
            .exec(runner)
            .await
            .with_context(|| format!("failed to delete consumer {id}"))?;
        Ok(())
    }
}
