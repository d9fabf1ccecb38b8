//! Public models for the services registry.
//!
//! These are transport-agnostic data structures that define the contract
//! between the registry and its consumers. Every `ServiceRecord` handed out
//! by the registry has passed signature verification.

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Well-known service type tags.
pub mod service_types {
    pub const HATCHERY: &str = "hatchery";
    pub const WORKER: &str = "worker";
    pub const API: &str = "api";
}

/// Reference to an external credential/identity entity owned by a service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsumerId(String);

impl ConsumerId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConsumerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A registered, trusted service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub consumer_id: Option<ConsumerId>,
    pub last_heartbeat: DateTime<Utc>,
    pub payload: serde_json::Value,
    #[serde(with = "signature_hex")]
    pub signature: Vec<u8>,
}

impl ServiceRecord {
    #[must_use]
    pub fn is_type(&self, service_type: &str) -> bool {
        self.service_type == service_type
    }
}

/// Data for registering a new service. The id and signature are assigned by
/// the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewServiceRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub consumer_id: Option<ConsumerId>,
    pub last_heartbeat: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl NewServiceRecord {
    /// New record with an empty payload, no consumer and a fresh heartbeat.
    #[must_use]
    pub fn new(name: impl Into<String>, service_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_type: service_type.into(),
            consumer_id: None,
            last_heartbeat: heartbeat_now(),
            payload: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    #[must_use]
    pub fn with_consumer(mut self, consumer_id: ConsumerId) -> Self {
        self.consumer_id = Some(consumer_id);
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub fn with_heartbeat(mut self, at: DateTime<Utc>) -> Self {
        self.last_heartbeat = at;
        self
    }
}

/// Result of a non-blocking claim attempt on a named record.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// The row is now exclusively locked by the caller's transaction.
    Claimed(ServiceRecord),
    /// The row exists but another in-flight transaction holds its lock.
    HeldByOther,
    /// No trusted record with that name exists.
    Absent,
}

impl ClaimOutcome {
    #[must_use]
    pub fn is_claimed(&self) -> bool {
        matches!(self, Self::Claimed(_))
    }

    /// Collapse the outcome into the registry's error kinds.
    ///
    /// # Errors
    /// `Unavailable` when another transaction holds the row, `NotFound` when
    /// there is nothing to claim.
    pub fn into_result(
        self,
        name: &str,
    ) -> Result<ServiceRecord, crate::errors::ServicesRegistryError> {
        match self {
            Self::Claimed(record) => Ok(record),
            Self::HeldByOther => Err(crate::errors::ServicesRegistryError::unavailable(name)),
            Self::Absent => Err(crate::errors::ServicesRegistryError::not_found(name)),
        }
    }
}

/// Current time at the precision every supported backend stores.
#[must_use]
pub fn heartbeat_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

mod signature_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_outcome_maps_to_error_kinds() {
        let err = ClaimOutcome::HeldByOther.into_result("slot-1").unwrap_err();
        assert!(matches!(
            err,
            crate::errors::ServicesRegistryError::Unavailable { .. }
        ));

        let err = ClaimOutcome::Absent.into_result("slot-1").unwrap_err();
        assert!(matches!(
            err,
            crate::errors::ServicesRegistryError::NotFound { .. }
        ));
    }

    #[test]
    fn record_serializes_type_and_hex_signature() {
        let record = ServiceRecord {
            id: 7,
            name: "hatchery-1".to_owned(),
            service_type: service_types::HATCHERY.to_owned(),
            consumer_id: Some(ConsumerId::new("c-1")),
            last_heartbeat: heartbeat_now(),
            payload: serde_json::json!({"url": "http://localhost:8086"}),
            signature: vec![0x01, 0xab],
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "hatchery");
        assert_eq!(json["signature"], "01ab");
        assert_eq!(json["consumer_id"], "c-1");

        let back: ServiceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn heartbeat_now_has_microsecond_precision() {
        let now = heartbeat_now();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000, 0);
    }
}
