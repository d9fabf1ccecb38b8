use sea_orm::ActiveValue;
use services_registry_sdk::ConsumerId;

use super::entity;
use crate::domain::model::StoredService;

impl From<entity::Model> for StoredService {
    fn from(m: entity::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            service_type: m.service_type,
            consumer_id: m.auth_consumer_id.map(ConsumerId::new),
            last_heartbeat: m.last_heartbeat,
            payload: m.config,
            signature: m.sig,
        }
    }
}

/// Active model with every column set except the id.
pub(crate) fn to_active_model(s: &StoredService) -> entity::ActiveModel {
    entity::ActiveModel {
        id: ActiveValue::NotSet,
        name: ActiveValue::Set(s.name.clone()),
        service_type: ActiveValue::Set(s.service_type.clone()),
        auth_consumer_id: ActiveValue::Set(s.consumer_id.as_ref().map(|c| c.as_str().to_owned())),
        last_heartbeat: ActiveValue::Set(s.last_heartbeat),
        config: ActiveValue::Set(s.payload.clone()),
        sig: ActiveValue::Set(s.signature.clone()),
    }
}
