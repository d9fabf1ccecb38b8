use chrono::{DateTime, Utc};
use services_registry_sdk::{ConsumerId, ServiceRecord};

/// A service row exactly as it came out of storage.
///
/// Nothing about a `StoredService` is trusted until the signature verifier
/// has turned it into a [`ServiceRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredService {
    pub id: i64,
    pub name: String,
    pub service_type: String,
    pub consumer_id: Option<ConsumerId>,
    pub last_heartbeat: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub signature: Vec<u8>,
}

impl From<ServiceRecord> for StoredService {
    fn from(r: ServiceRecord) -> Self {
        Self {
            id: r.id,
            name: r.name,
            service_type: r.service_type,
            consumer_id: r.consumer_id,
            last_heartbeat: r.last_heartbeat,
            payload: r.payload,
            signature: r.signature,
        }
    }
}

/// Storage filter for every read shape the registry supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceFilter {
    All,
    Id(i64),
    Name(String),
    NameAndType { name: String, service_type: String },
    ConsumerId(ConsumerId),
    Type(String),
    HeartbeatBefore(DateTime<Utc>),
}

impl ServiceFilter {
    /// Short description used in logs and error context.
    #[must_use]
    pub fn target(&self) -> String {
        match self {
            Self::All => "all".to_owned(),
            Self::Id(id) => format!("id={id}"),
            Self::Name(name) => format!("name={name}"),
            Self::NameAndType { name, service_type } => {
                format!("name={name},type={service_type}")
            }
            Self::ConsumerId(id) => format!("consumer={id}"),
            Self::Type(t) => format!("type={t}"),
            Self::HeartbeatBefore(at) => format!("heartbeat<{}", at.to_rfc3339()),
        }
    }
}

/// Row locking applied to a single-row read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLock {
    None,
    /// Exclusive lock held until the transaction ends; rows already locked by
    /// another transaction are skipped instead of waited for.
    ExclusiveSkipLocked,
}
