//! Type-keyed read cache in front of the by-type listing.
//!
//! The cache is best effort. It only ever holds records that already passed
//! signature verification, it may serve data up to one TTL old, and claim
//! operations never consult it.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use services_registry_sdk::ServiceRecord;

/// Cache contract used by the registry service.
///
/// `lookup` returning `Some` is a hit; `None` is a miss and the caller falls
/// through to storage.
pub trait TypeCache: Send + Sync {
    fn lookup(&self, service_type: &str) -> Option<Vec<ServiceRecord>>;

    fn store(&self, service_type: &str, records: Vec<ServiceRecord>);

    fn invalidate(&self, service_type: &str);

    fn clear(&self);
}

#[derive(Debug, Clone)]
struct CachedEntry {
    records: Vec<ServiceRecord>,
    stored_at: Instant,
}

/// In-memory cache whose entries expire after a fixed TTL.
#[derive(Debug)]
pub struct TtlTypeCache {
    entries: DashMap<String, CachedEntry>,
    ttl: Duration,
}

impl TtlTypeCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, e| e.stored_at.elapsed() < ttl);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TypeCache for TtlTypeCache {
    fn lookup(&self, service_type: &str) -> Option<Vec<ServiceRecord>> {
        let entry = self.entries.get(service_type)?;
        if entry.stored_at.elapsed() >= self.ttl {
            drop(entry);
            self.entries
                .remove_if(service_type, |_, e| e.stored_at.elapsed() >= self.ttl);
            return None;
        }
        Some(entry.records.clone())
    }

    fn store(&self, service_type: &str, records: Vec<ServiceRecord>) {
        self.entries.insert(
            service_type.to_owned(),
            CachedEntry {
                records,
                stored_at: Instant::now(),
            },
        );
    }

    fn invalidate(&self, service_type: &str) {
        self.entries.remove(service_type);
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

/// Cache that never hits.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledTypeCache;

impl TypeCache for DisabledTypeCache {
    fn lookup(&self, _service_type: &str) -> Option<Vec<ServiceRecord>> {
        None
    }

    fn store(&self, _service_type: &str, _records: Vec<ServiceRecord>) {}

    fn invalidate(&self, _service_type: &str) {}

    fn clear(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use services_registry_sdk::heartbeat_now;

    fn record(id: i64, service_type: &str) -> ServiceRecord {
        ServiceRecord {
            id,
            name: format!("svc-{id}"),
            service_type: service_type.to_owned(),
            consumer_id: None,
            last_heartbeat: heartbeat_now(),
            payload: serde_json::Value::Null,
            signature: vec![1],
        }
    }

    #[test]
    fn miss_then_hit() {
        let cache = TtlTypeCache::new(Duration::from_secs(60));
        assert!(cache.lookup("hatchery").is_none());

        cache.store("hatchery", vec![record(1, "hatchery")]);
        let hit = cache.lookup("hatchery").unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].id, 1);
        assert!(cache.lookup("api").is_none());
    }

    #[test]
    fn empty_result_is_still_a_hit() {
        let cache = TtlTypeCache::new(Duration::from_secs(60));
        cache.store("worker", Vec::new());
        assert_eq!(cache.lookup("worker"), Some(Vec::new()));
    }

    #[test]
    fn zero_ttl_always_misses() {
        let cache = TtlTypeCache::new(Duration::ZERO);
        cache.store("api", vec![record(1, "api")]);
        assert!(cache.lookup("api").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_and_clear() {
        let cache = TtlTypeCache::new(Duration::from_secs(60));
        cache.store("api", vec![record(1, "api")]);
        cache.store("hatchery", vec![record(2, "hatchery")]);

        cache.invalidate("api");
        assert!(cache.lookup("api").is_none());
        assert!(cache.lookup("hatchery").is_some());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn purge_drops_expired_entries() {
        let cache = TtlTypeCache::new(Duration::from_millis(1));
        cache.store("api", vec![record(1, "api")]);
        std::thread::sleep(Duration::from_millis(5));
        cache.purge_expired();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn disabled_cache_never_hits() {
        let cache = DisabledTypeCache;
        cache.store("api", vec![record(1, "api")]);
        assert!(cache.lookup("api").is_none());
    }
}
