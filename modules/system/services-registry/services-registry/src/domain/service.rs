use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use services_registry_sdk::{
    ClaimOutcome, ConsumerId, NewServiceRecord, ServiceRecord, heartbeat_now, service_types,
};
use tracing::{debug, error, info, instrument, warn};

use crate::domain::cache::TypeCache;
use crate::domain::error::{CascadeStep, DomainError};
use crate::domain::model::{RowLock, ServiceFilter, StoredService};
use crate::domain::ports::{IdentityStore, WorkerDirectory};
use crate::domain::repo::ServicesRepository;
use crate::domain::signature::{Corruption, RecordSigner};

/// Configuration for the domain service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Single-record reads report a record that fails verification as
    /// `NotFound` rather than `Corrupted`.
    pub report_corruption_as_not_found: bool,
    /// Store by-type results in the cache after a miss.
    pub populate_cache_on_miss: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            report_corruption_as_not_found: true,
            populate_cache_on_miss: false,
        }
    }
}

/// Signature health of the stored rows.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SignatureAudit {
    pub total: usize,
    pub trusted: usize,
    /// Trusted rows still signed with a previous key.
    pub stale_key: usize,
}

/// Registry service: signed reads, non-blocking claims, signed writes and
/// cascading deletes over a [`ServicesRepository`].
pub struct Service<R, W, I> {
    db: DatabaseConnection,
    repo: Arc<R>,
    workers: Arc<W>,
    identities: Arc<I>,
    signer: Arc<RecordSigner>,
    cache: Arc<dyn TypeCache>,
    config: ServiceConfig,
}

impl<R, W, I> Clone for Service<R, W, I> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            repo: Arc::clone(&self.repo),
            workers: Arc::clone(&self.workers),
            identities: Arc::clone(&self.identities),
            signer: Arc::clone(&self.signer),
            cache: Arc::clone(&self.cache),
            config: self.config.clone(),
        }
    }
}

impl<R, W, I> Service<R, W, I>
where
    R: ServicesRepository,
    W: WorkerDirectory,
    I: IdentityStore,
{
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        repo: Arc<R>,
        workers: Arc<W>,
        identities: Arc<I>,
        signer: Arc<RecordSigner>,
        cache: Arc<dyn TypeCache>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            db,
            repo,
            workers,
            identities,
            signer,
            cache,
            config,
        }
    }

    #[must_use]
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    #[must_use]
    pub fn signer(&self) -> &RecordSigner {
        &self.signer
    }

    // ----- reads -----

    /// List every trusted service.
    ///
    /// # Errors
    /// Returns an error if storage cannot be read.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<ServiceRecord>, DomainError> {
        self.load_all(&self.db, &ServiceFilter::All).await
    }

    /// List trusted services of a type, served from the cache when it hits.
    ///
    /// # Errors
    /// Returns an error if storage cannot be read.
    #[instrument(skip(self), fields(service_type = %service_type))]
    pub async fn list_by_type(
        &self,
        service_type: &str,
    ) -> Result<Vec<ServiceRecord>, DomainError> {
        if let Some(records) = self.cache.lookup(service_type) {
            debug!(count = records.len(), "Type cache hit");
            return Ok(records);
        }

        let records = self
            .load_all(&self.db, &ServiceFilter::Type(service_type.to_owned()))
            .await?;
        if self.config.populate_cache_on_miss {
            self.cache.store(service_type, records.clone());
        }
        Ok(records)
    }

    /// Reload one type from storage into the cache.
    ///
    /// # Errors
    /// Returns an error if storage cannot be read.
    #[instrument(skip(self), fields(service_type = %service_type))]
    pub async fn refresh_type_cache(&self, service_type: &str) -> Result<usize, DomainError> {
        let records = self
            .load_all(&self.db, &ServiceFilter::Type(service_type.to_owned()))
            .await?;
        let count = records.len();
        self.cache.store(service_type, records);
        debug!(count, "Type cache refreshed");
        Ok(count)
    }

    /// # Errors
    /// `NotFound` when no trusted record has this id.
    #[instrument(skip(self), fields(service_id = id))]
    pub async fn get_by_id(&self, id: i64) -> Result<ServiceRecord, DomainError> {
        self.load_one(&self.db, &ServiceFilter::Id(id)).await
    }

    /// # Errors
    /// `NotFound` when no trusted record has this name.
    #[instrument(skip(self), fields(name = %name))]
    pub async fn get_by_name(&self, name: &str) -> Result<ServiceRecord, DomainError> {
        self.load_one(&self.db, &ServiceFilter::Name(name.to_owned()))
            .await
    }

    /// # Errors
    /// `NotFound` when no trusted record matches both.
    #[instrument(skip(self), fields(name = %name, service_type = %service_type))]
    pub async fn get_by_name_and_type(
        &self,
        name: &str,
        service_type: &str,
    ) -> Result<ServiceRecord, DomainError> {
        self.load_one(
            &self.db,
            &ServiceFilter::NameAndType {
                name: name.to_owned(),
                service_type: service_type.to_owned(),
            },
        )
        .await
    }

    /// # Errors
    /// `NotFound` when no trusted record is owned by this consumer.
    #[instrument(skip(self), fields(consumer_id = %consumer_id))]
    pub async fn get_by_consumer_id(
        &self,
        consumer_id: &ConsumerId,
    ) -> Result<ServiceRecord, DomainError> {
        self.load_one(&self.db, &ServiceFilter::ConsumerId(consumer_id.clone()))
            .await
    }

    /// Trusted services whose heartbeat is older than `now - threshold`.
    ///
    /// # Errors
    /// Returns an error if storage cannot be read.
    #[instrument(skip(self), fields(threshold_secs = threshold.as_secs()))]
    pub async fn find_dead(&self, threshold: Duration) -> Result<Vec<ServiceRecord>, DomainError> {
        let cutoff = heartbeat_cutoff(Utc::now(), threshold);
        let dead = self
            .load_all(&self.db, &ServiceFilter::HeartbeatBefore(cutoff))
            .await?;
        debug!(count = dead.len(), cutoff = %cutoff, "Dead services scanned");
        Ok(dead)
    }

    // ----- claim -----

    /// Try to take the exclusive row lock on a named service without
    /// waiting.
    ///
    /// `runner` must be the caller's open transaction; the lock is released
    /// when that transaction commits or rolls back. The type cache is never
    /// consulted here.
    ///
    /// # Errors
    /// Returns an error if storage cannot be read, or `Corrupted` for a
    /// claimed row that fails verification when corruption is reported
    /// distinctly.
    #[instrument(skip(self, runner), fields(name = %name))]
    pub async fn claim_by_name<C: ConnectionTrait>(
        &self,
        runner: &C,
        name: &str,
    ) -> Result<ClaimOutcome, DomainError> {
        let filter = ServiceFilter::Name(name.to_owned());

        if let Some(row) = self
            .repo
            .find_one(runner, &filter, RowLock::ExclusiveSkipLocked)
            .await?
        {
            return match self.signer.verify(row) {
                Ok(record) => {
                    debug!(service_id = record.id, "Service claimed");
                    Ok(ClaimOutcome::Claimed(record))
                }
                Err(corruption) => {
                    report_corruption(corruption);
                    if self.config.report_corruption_as_not_found {
                        Ok(ClaimOutcome::Absent)
                    } else {
                        Err(DomainError::Corrupted { id: corruption.id })
                    }
                }
            };
        }

        // Nothing lockable: either the row is missing or someone else holds
        // it. A plain read does not wait on row locks.
        match self.repo.find_one(runner, &filter, RowLock::None).await? {
            Some(row) => match self.signer.verify(row) {
                Ok(record) => {
                    warn!(service_id = record.id, "Service is claimed by another transaction");
                    Ok(ClaimOutcome::HeldByOther)
                }
                Err(corruption) => {
                    report_corruption(corruption);
                    Ok(ClaimOutcome::Absent)
                }
            },
            None => Ok(ClaimOutcome::Absent),
        }
    }

    // ----- lifecycle -----

    /// Register a new service and sign it.
    ///
    /// # Errors
    /// `ConstraintViolation` when the name is taken, or a storage error.
    #[instrument(
        skip(self, service),
        fields(name = %service.name, service_type = %service.service_type)
    )]
    pub async fn insert(&self, service: NewServiceRecord) -> Result<ServiceRecord, DomainError> {
        self.insert_with(&self.db, service).await
    }

    /// Same as [`Self::insert`] inside the caller's connection or
    /// transaction.
    ///
    /// The row and its signature are written in one (nested) transaction, so
    /// an unsigned row is never visible to anyone else.
    ///
    /// # Errors
    /// Same as [`Self::insert`].
    pub async fn insert_with<C>(
        &self,
        runner: &C,
        service: NewServiceRecord,
    ) -> Result<ServiceRecord, DomainError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let target = format!("name={}", service.name);
        let tx = runner
            .begin()
            .await
            .map_err(|e| DomainError::database("insert", &target, e))?;

        let mut stored = StoredService {
            id: 0,
            name: service.name,
            service_type: service.service_type,
            consumer_id: service.consumer_id,
            last_heartbeat: service.last_heartbeat.trunc_subsecs(6),
            payload: service.payload,
            signature: Vec::new(),
        };
        stored.id = self.repo.insert(&tx, &stored).await?;

        let record = self.signer.seal(stored);
        self.repo
            .update(&tx, &StoredService::from(record.clone()))
            .await?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database("insert", &target, e))?;

        self.cache.invalidate(&record.service_type);
        info!(service_id = record.id, "Service registered");
        Ok(record)
    }

    /// Replace the whole stored state of a service and re-sign it.
    ///
    /// Cached listings of both the old and the new type are dropped.
    ///
    /// # Errors
    /// `NotFound` when the id no longer exists, `ConstraintViolation` when
    /// the new name is taken, or a storage error.
    #[instrument(skip(self, service), fields(service_id = service.id))]
    pub async fn update(&self, service: ServiceRecord) -> Result<ServiceRecord, DomainError> {
        self.update_with(&self.db, service).await
    }

    /// Same as [`Self::update`] on the caller's runner, typically the
    /// transaction that holds a claim on the row.
    ///
    /// # Errors
    /// Same as [`Self::update`].
    pub async fn update_with<C: ConnectionTrait>(
        &self,
        runner: &C,
        service: ServiceRecord,
    ) -> Result<ServiceRecord, DomainError> {
        let filter = ServiceFilter::Id(service.id);
        let previous_type = self
            .repo
            .find_one(runner, &filter, RowLock::None)
            .await?
            .map(|row| row.service_type)
            .ok_or_else(|| DomainError::not_found(filter.target()))?;

        let mut stored = StoredService::from(service);
        stored.last_heartbeat = stored.last_heartbeat.trunc_subsecs(6);
        let record = self.signer.seal(stored);

        let updated = self
            .repo
            .update(runner, &StoredService::from(record.clone()))
            .await?;
        if !updated {
            return Err(DomainError::not_found(filter.target()));
        }

        self.cache.invalidate(&record.service_type);
        if previous_type != record.service_type {
            self.cache.invalidate(&previous_type);
        }
        info!(service_id = record.id, "Service updated");
        Ok(record)
    }

    /// Set the heartbeat of a trusted service to now and re-sign it.
    ///
    /// # Errors
    /// `NotFound` when no trusted record has this id, or a storage error.
    #[instrument(skip(self), fields(service_id = id))]
    pub async fn heartbeat(&self, id: i64) -> Result<ServiceRecord, DomainError> {
        let target = format!("id={id}");
        let tx = self
            .db
            .begin()
            .await
            .map_err(|e| DomainError::database("heartbeat", &target, e))?;

        let mut record = self.load_one(&tx, &ServiceFilter::Id(id)).await?;
        record.last_heartbeat = heartbeat_now();
        let record = self.update_with(&tx, record).await?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database("heartbeat", &target, e))?;
        Ok(record)
    }

    /// Delete a service together with its dependents.
    ///
    /// Order: the hatchery's workers one by one, then the consumer identity
    /// (a missing identity is fine), then the service row. All three steps
    /// run in one transaction; the first failing step aborts and rolls back
    /// the whole cascade.
    ///
    /// A failed identity lookup aborts the cascade like any other step; only
    /// an identity that is confirmed missing is skipped.
    ///
    /// # Errors
    /// `DependencyFailure` naming the failing cascade step, or a storage
    /// error. Deleting a row that is already gone is not an error.
    #[instrument(skip(self, service), fields(service_id = service.id, name = %service.name))]
    pub async fn delete(&self, service: &ServiceRecord) -> Result<(), DomainError> {
        self.delete_with(&self.db, service).await
    }

    /// Same as [`Self::delete`] inside the caller's connection or
    /// transaction (a savepoint when already in one).
    ///
    /// # Errors
    /// Same as [`Self::delete`].
    pub async fn delete_with<C>(
        &self,
        runner: &C,
        service: &ServiceRecord,
    ) -> Result<(), DomainError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let target = format!("id={}", service.id);
        let tx = runner
            .begin()
            .await
            .map_err(|e| DomainError::database("delete", &target, e))?;

        if service.is_type(service_types::HATCHERY) {
            let workers = self
                .workers
                .list_by_owner(&tx, service.id)
                .await
                .map_err(|e| DomainError::dependency(CascadeStep::ListWorkers, &target, e))?;

            for worker in &workers {
                self.workers.delete(&tx, &worker.id).await.map_err(|e| {
                    DomainError::dependency(
                        CascadeStep::DeleteWorker,
                        format!("worker={}", worker.id),
                        e,
                    )
                })?;
            }
            debug!(count = workers.len(), "Hatchery workers deleted");
        }

        if let Some(consumer_id) = &service.consumer_id {
            let identity = self
                .identities
                .get(&tx, consumer_id)
                .await
                .map_err(|e| DomainError::dependency(CascadeStep::LoadIdentity, &target, e))?;

            if let Some(identity) = identity {
                self.identities.delete(&tx, &identity.id).await.map_err(|e| {
                    DomainError::dependency(
                        CascadeStep::RevokeIdentity,
                        format!("consumer={}", identity.id),
                        e,
                    )
                })?;
                debug!(consumer_id = %identity.id, "Consumer identity revoked");
            } else {
                debug!(consumer_id = %consumer_id, "Consumer identity already gone");
            }
        }

        if !self.repo.delete(&tx, service.id).await? {
            warn!("Service row was already deleted");
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::database("delete", &target, e))?;

        self.cache.invalidate(&service.service_type);
        info!("Service deleted");
        Ok(())
    }

    /// Delete a service found by [`Self::find_dead`] only if it is still
    /// dead.
    ///
    /// The row is claimed in a fresh transaction, its heartbeat is compared
    /// with `now - threshold` again, and the cascade runs inside that same
    /// transaction. A row that heartbeated since the scan, was replaced under
    /// the same name, or is claimed by someone else is left alone and
    /// `false` is returned.
    ///
    /// # Errors
    /// Same as [`Self::delete`].
    #[instrument(skip(self, service), fields(service_id = service.id, name = %service.name))]
    pub async fn delete_if_dead(
        &self,
        service: &ServiceRecord,
        threshold: Duration,
    ) -> Result<bool, DomainError> {
        let target = format!("id={}", service.id);
        let tx = self
            .db
            .begin()
            .await
            .map_err(|e| DomainError::database("reap", &target, e))?;

        let current = match self.claim_by_name(&tx, &service.name).await? {
            ClaimOutcome::Claimed(current) if current.id == service.id => current,
            outcome => {
                debug!(?outcome, "Service is no longer a reaping candidate");
                tx.rollback()
                    .await
                    .map_err(|e| DomainError::database("reap", &target, e))?;
                return Ok(false);
            }
        };

        if current.last_heartbeat >= heartbeat_cutoff(Utc::now(), threshold) {
            info!(last_heartbeat = %current.last_heartbeat, "Service is alive again, not reaping");
            tx.rollback()
                .await
                .map_err(|e| DomainError::database("reap", &target, e))?;
            return Ok(false);
        }

        self.delete_with(&tx, &current).await?;
        tx.commit()
            .await
            .map_err(|e| DomainError::database("reap", &target, e))?;
        Ok(true)
    }

    // ----- key rotation -----

    /// Count rows by signature state without changing anything.
    ///
    /// # Errors
    /// Returns an error if storage cannot be read.
    #[instrument(skip(self))]
    pub async fn audit_signatures(&self) -> Result<SignatureAudit, DomainError> {
        let rows = self.repo.find_all(&self.db, &ServiceFilter::All).await?;
        let mut audit = SignatureAudit {
            total: rows.len(),
            ..SignatureAudit::default()
        };

        for row in rows {
            match self.signer.verify(row) {
                Ok(record) => {
                    audit.trusted += 1;
                    if self.signer.needs_resign(&record) {
                        audit.stale_key += 1;
                    }
                }
                Err(corruption) => report_corruption(corruption),
            }
        }
        Ok(audit)
    }

    /// Re-sign every trusted row still carrying a previous key's signature.
    /// Corrupted rows are left alone.
    ///
    /// # Errors
    /// Returns the first storage error; rows re-signed before it stay
    /// re-signed.
    #[instrument(skip(self))]
    pub async fn resign_stale(&self) -> Result<usize, DomainError> {
        let stale: Vec<ServiceRecord> = self
            .load_all(&self.db, &ServiceFilter::All)
            .await?
            .into_iter()
            .filter(|record| self.signer.needs_resign(record))
            .collect();

        let count = stale.len();
        for record in stale {
            self.update_with(&self.db, record).await?;
        }
        if count > 0 {
            info!(count, "Services re-signed with the primary key");
        }
        Ok(count)
    }

    // ----- helpers -----

    async fn load_all<C: ConnectionTrait>(
        &self,
        runner: &C,
        filter: &ServiceFilter,
    ) -> Result<Vec<ServiceRecord>, DomainError> {
        let rows = self.repo.find_all(runner, filter).await?;
        let total = rows.len();

        let trusted: Vec<ServiceRecord> = rows
            .into_iter()
            .filter_map(|row| match self.signer.verify(row) {
                Ok(record) => Some(record),
                Err(corruption) => {
                    report_corruption(corruption);
                    None
                }
            })
            .collect();

        debug!(
            filter = %filter.target(),
            total,
            trusted = trusted.len(),
            "Services loaded"
        );
        Ok(trusted)
    }

    async fn load_one<C: ConnectionTrait>(
        &self,
        runner: &C,
        filter: &ServiceFilter,
    ) -> Result<ServiceRecord, DomainError> {
        let row = self
            .repo
            .find_one(runner, filter, RowLock::None)
            .await?
            .ok_or_else(|| DomainError::not_found(filter.target()))?;

        self.signer.verify(row).map_err(|corruption| {
            report_corruption(corruption);
            if self.config.report_corruption_as_not_found {
                DomainError::not_found(filter.target())
            } else {
                DomainError::Corrupted { id: corruption.id }
            }
        })
    }
}

fn report_corruption(corruption: Corruption) {
    error!(
        service_id = corruption.id,
        reason = %corruption.reason,
        "service {} data corrupted",
        corruption.id
    );
}

/// `now - threshold`, saturating instead of overflowing.
pub(crate) fn heartbeat_cutoff(now: DateTime<Utc>, threshold: Duration) -> DateTime<Utc> {
    let delta = TimeDelta::from_std(threshold).unwrap_or(TimeDelta::MAX);
    now.checked_sub_signed(delta)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
