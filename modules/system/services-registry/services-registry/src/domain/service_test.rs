#[cfg(test)]
mod tests {
    use super::super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, SubsecRound, Utc};
    use sea_orm::{ConnectionTrait, Database, DatabaseConnection};
    use serde_json::json;
    use services_registry_sdk::{
        ClaimOutcome, ConsumerId, NewServiceRecord, ServiceRecord, service_types,
    };
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tracing_test::traced_test;

    use cache::{DisabledTypeCache, TtlTypeCache, TypeCache};
    use error::{CascadeStep, DomainError};
    use model::{RowLock, ServiceFilter, StoredService};
    use ports::{Identity, IdentityStore, WorkerDirectory, WorkerRecord};
    use service::{Service, ServiceConfig, heartbeat_cutoff};
    use signature::RecordSigner;

    // In-memory repository. Names in `locked` behave as rows held by another
    // transaction.
    #[derive(Default)]
    struct MockRepository {
        rows: Mutex<Vec<StoredService>>,
        locked: Mutex<HashSet<String>>,
        reads: Mutex<usize>,
    }

    impl MockRepository {
        fn with_rows(rows: Vec<StoredService>) -> Self {
            Self {
                rows: Mutex::new(rows),
                ..Self::default()
            }
        }

        fn lock(&self, name: &str) {
            self.locked.lock().unwrap().insert(name.to_owned());
        }

        fn reads(&self) -> usize {
            *self.reads.lock().unwrap()
        }

        fn row(&self, id: i64) -> Option<StoredService> {
            self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned()
        }
    }

    fn matches(row: &StoredService, filter: &ServiceFilter) -> bool {
        match filter {
            ServiceFilter::All => true,
            ServiceFilter::Id(id) => row.id == *id,
            ServiceFilter::Name(name) => &row.name == name,
            ServiceFilter::NameAndType { name, service_type } => {
                &row.name == name && &row.service_type == service_type
            }
            ServiceFilter::ConsumerId(id) => row.consumer_id.as_ref() == Some(id),
            ServiceFilter::Type(t) => &row.service_type == t,
            ServiceFilter::HeartbeatBefore(at) => row.last_heartbeat < *at,
        }
    }

    #[async_trait]
    impl repo::ServicesRepository for MockRepository {
        async fn find_all<C: ConnectionTrait>(
            &self,
            _runner: &C,
            filter: &ServiceFilter,
        ) -> Result<Vec<StoredService>, DomainError> {
            *self.reads.lock().unwrap() += 1;
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| matches(r, filter))
                .cloned()
                .collect())
        }

        async fn find_one<C: ConnectionTrait>(
            &self,
            _runner: &C,
            filter: &ServiceFilter,
            lock: RowLock,
        ) -> Result<Option<StoredService>, DomainError> {
            *self.reads.lock().unwrap() += 1;
            let locked = self.locked.lock().unwrap();
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| matches(r, filter))
                .find(|r| lock == RowLock::None || !locked.contains(&r.name))
                .cloned())
        }

        async fn insert<C: ConnectionTrait>(
            &self,
            _runner: &C,
            service: &StoredService,
        ) -> Result<i64, DomainError> {
            let mut rows = self.rows.lock().unwrap();
            if rows.iter().any(|r| r.name == service.name) {
                return Err(DomainError::ConstraintViolation {
                    operation: "insert",
                    target: format!("name={}", service.name),
                    message: "duplicate name".to_owned(),
                });
            }
            let id = rows.iter().map(|r| r.id).max().unwrap_or(0) + 1;
            let mut row = service.clone();
            row.id = id;
            rows.push(row);
            Ok(id)
        }

        async fn update<C: ConnectionTrait>(
            &self,
            _runner: &C,
            service: &StoredService,
        ) -> Result<bool, DomainError> {
            let mut rows = self.rows.lock().unwrap();
            match rows.iter_mut().find(|r| r.id == service.id) {
                Some(row) => {
                    *row = service.clone();
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn delete<C: ConnectionTrait>(
            &self,
            _runner: &C,
            id: i64,
        ) -> Result<bool, DomainError> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|r| r.id != id);
            Ok(rows.len() != before)
        }
    }

    #[derive(Default)]
    struct MockWorkers {
        workers: Mutex<Vec<WorkerRecord>>,
        fail_delete: Option<String>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl WorkerDirectory for MockWorkers {
        async fn list_by_owner<C: ConnectionTrait>(
            &self,
            _runner: &C,
            owner_id: i64,
        ) -> anyhow::Result<Vec<WorkerRecord>> {
            Ok(self
                .workers
                .lock()
                .unwrap()
                .iter()
                .filter(|w| w.hatchery_id == owner_id)
                .cloned()
                .collect())
        }

        async fn delete<C: ConnectionTrait>(
            &self,
            _runner: &C,
            worker_id: &str,
        ) -> anyhow::Result<()> {
            if self.fail_delete.as_deref() == Some(worker_id) {
                anyhow::bail!("worker {worker_id} is busy");
            }
            self.calls.lock().unwrap().push(format!("worker:{worker_id}"));
            self.workers.lock().unwrap().retain(|w| w.id != worker_id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockIdentities {
        identities: Mutex<Vec<Identity>>,
        fail_get: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl IdentityStore for MockIdentities {
        async fn get<C: ConnectionTrait>(
            &self,
            _runner: &C,
            id: &ConsumerId,
        ) -> anyhow::Result<Option<Identity>> {
            if self.fail_get {
                anyhow::bail!("identity store offline");
            }
            Ok(self
                .identities
                .lock()
                .unwrap()
                .iter()
                .find(|i| &i.id == id)
                .cloned())
        }

        async fn delete<C: ConnectionTrait>(
            &self,
            _runner: &C,
            id: &ConsumerId,
        ) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(format!("identity:{id}"));
            self.identities.lock().unwrap().retain(|i| &i.id != id);
            Ok(())
        }
    }

    type TestService = Service<MockRepository, MockWorkers, MockIdentities>;

    struct Fixture {
        service: TestService,
        repo: Arc<MockRepository>,
        workers: Arc<MockWorkers>,
        identities: Arc<MockIdentities>,
        signer: Arc<RecordSigner>,
    }

    fn signer() -> Arc<RecordSigner> {
        Arc::new(RecordSigner::new(&[7u8; 32], &[]).unwrap())
    }

    async fn fixture_with(
        repo: MockRepository,
        workers: MockWorkers,
        identities: MockIdentities,
        cache: Arc<dyn TypeCache>,
        config: ServiceConfig,
    ) -> Fixture {
        let db: DatabaseConnection = Database::connect("sqlite::memory:").await.unwrap();
        let repo = Arc::new(repo);
        let workers = Arc::new(workers);
        let identities = Arc::new(identities);
        let signer = signer();
        let service = Service::new(
            db,
            Arc::clone(&repo),
            Arc::clone(&workers),
            Arc::clone(&identities),
            Arc::clone(&signer),
            cache,
            config,
        );
        Fixture {
            service,
            repo,
            workers,
            identities,
            signer,
        }
    }

    async fn fixture(rows: Vec<StoredService>) -> Fixture {
        fixture_with(
            MockRepository::with_rows(rows),
            MockWorkers::default(),
            MockIdentities::default(),
            Arc::new(DisabledTypeCache),
            ServiceConfig::default(),
        )
        .await
    }

    fn row(id: i64, name: &str, service_type: &str) -> StoredService {
        let stored = StoredService {
            id,
            name: name.to_owned(),
            service_type: service_type.to_owned(),
            consumer_id: None,
            last_heartbeat: Utc::now().trunc_subsecs(6),
            payload: json!({ "region": "eu" }),
            signature: Vec::new(),
        };
        StoredService::from(signer().seal(stored))
    }

    fn tampered(mut stored: StoredService) -> StoredService {
        stored.payload = json!({ "region": "us" });
        stored
    }

    #[tokio::test]
    #[traced_test]
    async fn test_list_all_drops_corrupted_rows() {
        let f = fixture(vec![
            row(1, "api-1", service_types::API),
            tampered(row(2, "api-2", service_types::API)),
            row(3, "hatch-1", service_types::HATCHERY),
        ])
        .await;

        let listed = f.service.list_all().await.unwrap();

        let ids: Vec<i64> = listed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(logs_contain("data corrupted"));
        assert!(logs_contain("service_id=2"));
    }

    #[tokio::test]
    async fn test_single_read_hides_corruption_as_not_found_by_default() {
        let f = fixture(vec![tampered(row(1, "api-1", service_types::API))]).await;

        let err = f.service.get_by_name("api-1").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));

        let err = f.service.get_by_id(1).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_single_read_can_report_corruption_distinctly() {
        let f = fixture_with(
            MockRepository::with_rows(vec![tampered(row(4, "api-1", service_types::API))]),
            MockWorkers::default(),
            MockIdentities::default(),
            Arc::new(DisabledTypeCache),
            ServiceConfig {
                report_corruption_as_not_found: false,
                ..ServiceConfig::default()
            },
        )
        .await;

        let err = f.service.get_by_name("api-1").await.unwrap_err();
        assert!(matches!(err, DomainError::Corrupted { id: 4 }));
    }

    #[tokio::test]
    async fn test_get_by_name_and_type_requires_both_to_match() {
        let f = fixture(vec![row(1, "api-1", service_types::API)]).await;

        let found = f
            .service
            .get_by_name_and_type("api-1", service_types::API)
            .await
            .unwrap();
        assert_eq!(found.id, 1);

        let err = f
            .service
            .get_by_name_and_type("api-1", service_types::HATCHERY)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_by_consumer_id() {
        let mut owned = row(1, "api-1", service_types::API);
        owned.consumer_id = Some(ConsumerId::new("c-1"));
        let owned = StoredService::from(signer().seal(owned));
        let f = fixture(vec![owned, row(2, "api-2", service_types::API)]).await;

        let found = f
            .service
            .get_by_consumer_id(&ConsumerId::new("c-1"))
            .await
            .unwrap();
        assert_eq!(found.name, "api-1");

        let err = f
            .service
            .get_by_consumer_id(&ConsumerId::new("c-2"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_claim_free_row() {
        let f = fixture(vec![row(1, "hatch-1", service_types::HATCHERY)]).await;

        let outcome = f
            .service
            .claim_by_name(f.service.db(), "hatch-1")
            .await
            .unwrap();

        match outcome {
            ClaimOutcome::Claimed(record) => assert_eq!(record.id, 1),
            other => panic!("expected claim, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_claim_reports_row_held_by_other() {
        let f = fixture(vec![row(1, "hatch-1", service_types::HATCHERY)]).await;
        f.repo.lock("hatch-1");

        let outcome = f
            .service
            .claim_by_name(f.service.db(), "hatch-1")
            .await
            .unwrap();

        assert_eq!(outcome, ClaimOutcome::HeldByOther);
    }

    #[tokio::test]
    async fn test_claim_missing_row_is_absent() {
        let f = fixture(vec![]).await;

        let outcome = f
            .service
            .claim_by_name(f.service.db(), "nope")
            .await
            .unwrap();

        assert_eq!(outcome, ClaimOutcome::Absent);
    }

    #[tokio::test]
    async fn test_claim_corrupted_row_is_absent() {
        let f = fixture(vec![tampered(row(1, "hatch-1", service_types::HATCHERY))]).await;

        let outcome = f
            .service
            .claim_by_name(f.service.db(), "hatch-1")
            .await
            .unwrap();

        assert_eq!(outcome, ClaimOutcome::Absent);
    }

    #[tokio::test]
    async fn test_claim_bypasses_cache() {
        let cache = Arc::new(TtlTypeCache::new(Duration::from_secs(60)));
        let f = fixture_with(
            MockRepository::with_rows(vec![row(1, "hatch-1", service_types::HATCHERY)]),
            MockWorkers::default(),
            MockIdentities::default(),
            cache.clone(),
            ServiceConfig::default(),
        )
        .await;
        cache.store(service_types::HATCHERY, vec![]);

        let outcome = f
            .service
            .claim_by_name(f.service.db(), "hatch-1")
            .await
            .unwrap();

        assert!(outcome.is_claimed());
        assert_eq!(f.repo.reads(), 1);
    }

    #[tokio::test]
    async fn test_list_by_type_serves_cache_hits_without_storage() {
        let cache = Arc::new(TtlTypeCache::new(Duration::from_secs(60)));
        let f = fixture_with(
            MockRepository::with_rows(vec![row(1, "hatch-1", service_types::HATCHERY)]),
            MockWorkers::default(),
            MockIdentities::default(),
            cache.clone(),
            ServiceConfig::default(),
        )
        .await;
        let cached = f.signer.verify(row(9, "hatch-9", service_types::HATCHERY)).unwrap();
        cache.store(service_types::HATCHERY, vec![cached]);

        let listed = f.service.list_by_type(service_types::HATCHERY).await.unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "hatch-9");
        assert_eq!(f.repo.reads(), 0);
    }

    #[tokio::test]
    async fn test_list_by_type_populates_cache_on_miss_when_enabled() {
        let cache = Arc::new(TtlTypeCache::new(Duration::from_secs(60)));
        let f = fixture_with(
            MockRepository::with_rows(vec![
                row(1, "hatch-1", service_types::HATCHERY),
                row(2, "api-1", service_types::API),
            ]),
            MockWorkers::default(),
            MockIdentities::default(),
            cache.clone(),
            ServiceConfig {
                populate_cache_on_miss: true,
                ..ServiceConfig::default()
            },
        )
        .await;

        let first = f.service.list_by_type(service_types::HATCHERY).await.unwrap();
        let second = f.service.list_by_type(service_types::HATCHERY).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(f.repo.reads(), 1);
    }

    #[tokio::test]
    async fn test_refresh_type_cache_stores_only_trusted_rows() {
        let cache = Arc::new(TtlTypeCache::new(Duration::from_secs(60)));
        let f = fixture_with(
            MockRepository::with_rows(vec![
                row(1, "hatch-1", service_types::HATCHERY),
                tampered(row(2, "hatch-2", service_types::HATCHERY)),
            ]),
            MockWorkers::default(),
            MockIdentities::default(),
            cache.clone(),
            ServiceConfig::default(),
        )
        .await;

        let count = f
            .service
            .refresh_type_cache(service_types::HATCHERY)
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(cache.lookup(service_types::HATCHERY).unwrap()[0].id, 1);
    }

    #[tokio::test]
    async fn test_insert_signs_and_invalidates_cache() {
        let cache = Arc::new(TtlTypeCache::new(Duration::from_secs(60)));
        let f = fixture_with(
            MockRepository::default(),
            MockWorkers::default(),
            MockIdentities::default(),
            cache.clone(),
            ServiceConfig::default(),
        )
        .await;
        cache.store(service_types::API, vec![]);

        let record = f
            .service
            .insert(
                NewServiceRecord::new("api-1", service_types::API).with_payload(json!({"v": 1})),
            )
            .await
            .unwrap();

        assert_eq!(record.id, 1);
        assert!(!record.signature.is_empty());
        assert!(cache.lookup(service_types::API).is_none());

        let stored = f.repo.row(1).unwrap();
        assert_eq!(stored.signature, record.signature);
        assert_eq!(f.signer.verify(stored).unwrap(), record);
    }

    #[tokio::test]
    async fn test_insert_duplicate_name_is_constraint_violation() {
        let f = fixture(vec![row(1, "api-1", service_types::API)]).await;

        let err = f
            .service
            .insert(NewServiceRecord::new("api-1", service_types::API))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::ConstraintViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_resigns_record() {
        let f = fixture(vec![row(1, "api-1", service_types::API)]).await;
        let mut record = f.service.get_by_id(1).await.unwrap();
        let old_signature = record.signature.clone();
        record.payload = json!({ "region": "ap" });

        let updated = f.service.update(record).await.unwrap();

        assert_ne!(updated.signature, old_signature);
        let reread = f.service.get_by_id(1).await.unwrap();
        assert_eq!(reread.payload, json!({ "region": "ap" }));
    }

    #[tokio::test]
    async fn test_update_changing_type_drops_both_cached_types() {
        let cache = Arc::new(TtlTypeCache::new(Duration::from_secs(60)));
        let f = fixture_with(
            MockRepository::with_rows(vec![row(1, "x", service_types::API)]),
            MockWorkers::default(),
            MockIdentities::default(),
            cache.clone(),
            ServiceConfig {
                populate_cache_on_miss: true,
                ..ServiceConfig::default()
            },
        )
        .await;
        assert_eq!(f.service.list_by_type(service_types::API).await.unwrap().len(), 1);
        cache.store(service_types::WORKER, vec![]);

        let mut record = f.service.get_by_id(1).await.unwrap();
        record.service_type = service_types::WORKER.to_owned();
        f.service.update(record).await.unwrap();

        assert!(cache.lookup(service_types::API).is_none());
        assert!(cache.lookup(service_types::WORKER).is_none());
        assert!(f.service.list_by_type(service_types::API).await.unwrap().is_empty());
        assert_eq!(f.service.list_by_type(service_types::WORKER).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let f = fixture(vec![]).await;
        let record = f.signer.seal(row(5, "ghost", service_types::API));

        let err = f.service.update(record).await.unwrap_err();

        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_heartbeat_moves_timestamp_forward() {
        let mut stale = row(1, "api-1", service_types::API);
        stale.last_heartbeat -= ChronoDuration::hours(1);
        let stale = StoredService::from(signer().seal(stale));
        let before = stale.last_heartbeat;
        let f = fixture(vec![stale]).await;

        let record = f.service.heartbeat(1).await.unwrap();

        assert!(record.last_heartbeat > before);
        assert!(f.service.get_by_id(1).await.is_ok());
    }

    #[tokio::test]
    async fn test_find_dead_uses_strict_cutoff() {
        let mut old = row(1, "old", service_types::HATCHERY);
        old.last_heartbeat -= ChronoDuration::minutes(10);
        let old = StoredService::from(signer().seal(old));
        let f = fixture(vec![old, row(2, "fresh", service_types::HATCHERY)]).await;

        let dead = f.service.find_dead(Duration::from_secs(300)).await.unwrap();

        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].name, "old");
    }

    #[tokio::test]
    async fn test_delete_if_dead_leaves_claimed_row_alone() {
        let mut old = row(1, "old", service_types::HATCHERY);
        old.last_heartbeat -= ChronoDuration::minutes(10);
        let old = StoredService::from(signer().seal(old));
        let f = fixture(vec![old]).await;
        let threshold = Duration::from_secs(300);

        let dead = f.service.find_dead(threshold).await.unwrap();
        f.repo.lock("old");

        assert!(!f.service.delete_if_dead(&dead[0], threshold).await.unwrap());
        assert!(f.repo.row(1).is_some());
        assert!(f.workers.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_heartbeat_cutoff_saturates() {
        let now = Utc::now();
        assert_eq!(
            heartbeat_cutoff(now, Duration::from_secs(60)),
            now - ChronoDuration::seconds(60)
        );
        assert_eq!(
            heartbeat_cutoff(now, Duration::MAX),
            chrono::DateTime::<Utc>::MIN_UTC
        );
    }

    fn worker(id: &str, hatchery_id: i64) -> WorkerRecord {
        WorkerRecord {
            id: id.to_owned(),
            name: format!("worker-{id}"),
            hatchery_id,
            status: "Building".to_owned(),
            last_beat: Utc::now(),
        }
    }

    fn identity(id: &str) -> Identity {
        Identity {
            id: ConsumerId::new(id),
            name: format!("consumer-{id}"),
            created: Utc::now(),
        }
    }

    fn hatchery_with_consumer(id: i64, consumer: &str) -> StoredService {
        let mut stored = row(id, &format!("hatch-{id}"), service_types::HATCHERY);
        stored.consumer_id = Some(ConsumerId::new(consumer));
        StoredService::from(signer().seal(stored))
    }

    #[tokio::test]
    async fn test_delete_hatchery_cascades_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let f = fixture_with(
            MockRepository::with_rows(vec![hatchery_with_consumer(1, "c-1")]),
            MockWorkers {
                workers: Mutex::new(vec![worker("w1", 1), worker("w2", 1), worker("w3", 2)]),
                fail_delete: None,
                calls: calls.clone(),
            },
            MockIdentities {
                identities: Mutex::new(vec![identity("c-1")]),
                fail_get: false,
                calls: calls.clone(),
            },
            Arc::new(DisabledTypeCache),
            ServiceConfig::default(),
        )
        .await;
        let record = f.service.get_by_id(1).await.unwrap();

        f.service.delete(&record).await.unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["worker:w1", "worker:w2", "identity:c-1"]
        );
        assert!(f.repo.row(1).is_none());
        assert_eq!(f.workers.workers.lock().unwrap().len(), 1);
        assert!(f.identities.identities.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_non_hatchery_skips_workers() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let f = fixture_with(
            MockRepository::with_rows(vec![row(7, "api-1", service_types::API)]),
            MockWorkers {
                workers: Mutex::new(vec![worker("w1", 7)]),
                fail_delete: None,
                calls: calls.clone(),
            },
            MockIdentities::default(),
            Arc::new(DisabledTypeCache),
            ServiceConfig::default(),
        )
        .await;
        let record = f.service.get_by_id(7).await.unwrap();

        f.service.delete(&record).await.unwrap();

        assert!(calls.lock().unwrap().is_empty());
        assert!(f.repo.row(7).is_none());
    }

    #[tokio::test]
    async fn test_delete_with_missing_identity_still_removes_row() {
        let f = fixture(vec![hatchery_with_consumer(1, "gone")]).await;
        let record = f.service.get_by_id(1).await.unwrap();

        f.service.delete(&record).await.unwrap();

        assert!(f.repo.row(1).is_none());
    }

    #[tokio::test]
    async fn test_delete_stops_at_failing_worker() {
        let f = fixture_with(
            MockRepository::with_rows(vec![hatchery_with_consumer(1, "c-1")]),
            MockWorkers {
                workers: Mutex::new(vec![worker("w1", 1), worker("w2", 1)]),
                fail_delete: Some("w2".to_owned()),
                calls: Arc::default(),
            },
            MockIdentities {
                identities: Mutex::new(vec![identity("c-1")]),
                fail_get: false,
                calls: Arc::default(),
            },
            Arc::new(DisabledTypeCache),
            ServiceConfig::default(),
        )
        .await;
        let record = f.service.get_by_id(1).await.unwrap();

        let err = f.service.delete(&record).await.unwrap_err();

        assert!(matches!(
            err,
            DomainError::DependencyFailure {
                step: CascadeStep::DeleteWorker,
                ..
            }
        ));
        assert!(f.repo.row(1).is_some());
        assert_eq!(f.identities.identities.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_surfaces_identity_lookup_failure() {
        let f = fixture_with(
            MockRepository::with_rows(vec![hatchery_with_consumer(1, "c-1")]),
            MockWorkers::default(),
            MockIdentities {
                identities: Mutex::new(vec![identity("c-1")]),
                fail_get: true,
                calls: Arc::default(),
            },
            Arc::new(DisabledTypeCache),
            ServiceConfig::default(),
        )
        .await;
        let record = f.service.get_by_id(1).await.unwrap();

        let err = f.service.delete(&record).await.unwrap_err();

        assert!(matches!(
            err,
            DomainError::DependencyFailure {
                step: CascadeStep::LoadIdentity,
                ..
            }
        ));
        assert!(f.repo.row(1).is_some());
    }

    #[tokio::test]
    async fn test_records_survive_service_clone() {
        let f = fixture(vec![row(1, "api-1", service_types::API)]).await;
        let cloned = f.service.clone();

        let a: ServiceRecord = f.service.get_by_id(1).await.unwrap();
        let b: ServiceRecord = cloned.get_by_id(1).await.unwrap();

        assert_eq!(a, b);
    }
}
