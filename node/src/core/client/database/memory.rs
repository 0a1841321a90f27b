use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use alloy_primitives::Address;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::{DatabaseClient, DatabaseError, QueryMode, RecordKind};
use crate::types::bridge::BridgeType;
use crate::types::external_initiator::ExternalInitiator;
use crate::types::job_run::JobRun;
use crate::types::job_spec::{JobSpec, TaskType};
use crate::types::key::Key;
use crate::types::status::RunStatus;
use crate::types::sync_event::SyncEvent;
use crate::types::tx::{Tx, TxAttempt};

#[derive(Default)]
struct Tables {
    job_specs: HashMap<Uuid, JobSpec>,
    job_runs: HashMap<Uuid, JobRun>,
    bridges: HashMap<TaskType, BridgeType>,
    txs: HashMap<Uuid, Tx>,
    tx_attempts: HashMap<Uuid, TxAttempt>,
    keys: HashMap<Address, Key>,
    /// keyed by the autoincrement id, so iteration is creation order
    sync_events: BTreeMap<u64, SyncEvent>,
    next_sync_event_id: u64,
    external_initiators: HashMap<Uuid, ExternalInitiator>,
}

impl Tables {
    fn insert_sync_event(&mut self, mut event: SyncEvent) -> SyncEvent {
        self.next_sync_event_id += 1;
        event.id = self.next_sync_event_id;
        self.sync_events.insert(event.id, event.clone());
        event
    }

    fn nonce_taken(&self, tx: &Tx) -> bool {
        self.txs.values().any(|other| other.id != tx.id && other.from == tx.from && other.nonce == tx.nonce)
    }
}

/// Process local [`DatabaseClient`]. Every operation runs under a single lock
/// over all tables, so multi-row writes (a run plus its sync event) are
/// atomic.
pub struct InMemoryDatabase {
    tables: RwLock<Tables>,
    timeout: Duration,
    closed: AtomicBool,
}

impl InMemoryDatabase {
    pub fn new(timeout: Duration) -> Self {
        Self { tables: RwLock::new(Tables::default()), timeout, closed: AtomicBool::new(false) }
    }

    fn ensure_open(&self) -> Result<(), DatabaseError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DatabaseError::Unavailable("database is closed".to_string()));
        }
        Ok(())
    }

    async fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, DatabaseError> {
        self.ensure_open()?;
        tokio::time::timeout(self.timeout, self.tables.read()).await.map_err(|_| DatabaseError::Timeout(self.timeout))
    }

    async fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, DatabaseError> {
        self.ensure_open()?;
        tokio::time::timeout(self.timeout, self.tables.write()).await.map_err(|_| DatabaseError::Timeout(self.timeout))
    }
}

fn sorted_by_sent_at_desc(mut attempts: Vec<TxAttempt>) -> Vec<TxAttempt> {
    attempts.sort_by(|a, b| b.sent_at.cmp(&a.sent_at).then_with(|| b.created_at.cmp(&a.created_at)));
    attempts
}

#[async_trait]
impl DatabaseClient for InMemoryDatabase {
    async fn disconnect(&self) -> Result<(), DatabaseError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    async fn create_job_spec(&self, spec: JobSpec) -> Result<JobSpec, DatabaseError> {
        let mut tables = self.write().await?;
        if tables.job_specs.contains_key(&spec.id) {
            return Err(DatabaseError::Duplicate(format!("job spec {}", spec.id)));
        }
        tables.job_specs.insert(spec.id, spec.clone());
        Ok(spec)
    }

    async fn find_job_spec(&self, id: Uuid, mode: QueryMode) -> Result<JobSpec, DatabaseError> {
        let tables = self.read().await?;
        tables
            .job_specs
            .get(&id)
            .filter(|spec| mode.includes_deleted() || !spec.is_archived())
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("job spec", id))
    }

    async fn archive_job_spec(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut tables = self.write().await?;
        let spec = tables
            .job_specs
            .get_mut(&id)
            .filter(|spec| !spec.is_archived())
            .ok_or_else(|| DatabaseError::not_found("job spec", id))?;
        spec.deleted_at = Some(Utc::now());
        Ok(())
    }

    async fn create_job_run(&self, run: JobRun, event: Option<SyncEvent>) -> Result<JobRun, DatabaseError> {
        let mut tables = self.write().await?;
        if tables.job_runs.contains_key(&run.id) {
            return Err(DatabaseError::Duplicate(format!("job run {}", run.id)));
        }
        tables.job_runs.insert(run.id, run.clone());
        if let Some(event) = event {
            tables.insert_sync_event(event);
        }
        Ok(run)
    }

    async fn save_job_run(&self, run: &JobRun, event: Option<SyncEvent>) -> Result<JobRun, DatabaseError> {
        let mut tables = self.write().await?;
        let stored = tables.job_runs.get(&run.id).ok_or_else(|| DatabaseError::not_found("job run", run.id))?;
        if stored.version != run.version {
            return Err(DatabaseError::Conflict { id: run.id, expected: run.version, found: stored.version });
        }
        let mut updated = run.clone();
        updated.version += 1;
        updated.updated_at = Utc::now();
        tables.job_runs.insert(updated.id, updated.clone());
        if let Some(event) = event {
            tables.insert_sync_event(event);
        }
        Ok(updated)
    }

    async fn find_job_run(&self, id: Uuid) -> Result<JobRun, DatabaseError> {
        let tables = self.read().await?;
        tables.job_runs.get(&id).cloned().ok_or_else(|| DatabaseError::not_found("job run", id))
    }

    async fn job_runs_with_status(&self, statuses: Vec<RunStatus>) -> Result<Vec<JobRun>, DatabaseError> {
        let tables = self.read().await?;
        let mut runs: Vec<JobRun> =
            tables.job_runs.values().filter(|run| statuses.contains(&run.status)).cloned().collect();
        runs.sort_by_key(|run| run.created_at);
        Ok(runs)
    }

    async fn create_bridge_type(&self, bridge: BridgeType) -> Result<BridgeType, DatabaseError> {
        let mut tables = self.write().await?;
        if tables.bridges.contains_key(&bridge.name) {
            return Err(DatabaseError::Duplicate(format!("bridge {}", bridge.name)));
        }
        tables.bridges.insert(bridge.name.clone(), bridge.clone());
        Ok(bridge)
    }

    async fn find_bridge(&self, name: &TaskType) -> Result<BridgeType, DatabaseError> {
        let tables = self.read().await?;
        tables.bridges.get(name).cloned().ok_or_else(|| DatabaseError::not_found("bridge", name))
    }

    async fn create_tx(&self, tx: Tx) -> Result<Tx, DatabaseError> {
        let mut tables = self.write().await?;
        if tables.txs.contains_key(&tx.id) || tables.nonce_taken(&tx) {
            return Err(DatabaseError::Duplicate(format!("tx from {} with nonce {}", tx.from, tx.nonce)));
        }
        tables.txs.insert(tx.id, tx.clone());
        Ok(tx)
    }

    async fn find_tx(&self, id: Uuid) -> Result<Tx, DatabaseError> {
        let tables = self.read().await?;
        tables.txs.get(&id).cloned().ok_or_else(|| DatabaseError::not_found("tx", id))
    }

    async fn save_tx(&self, tx: &Tx) -> Result<(), DatabaseError> {
        let mut tables = self.write().await?;
        if !tables.txs.contains_key(&tx.id) {
            return Err(DatabaseError::not_found("tx", tx.id));
        }
        if tables.nonce_taken(tx) {
            return Err(DatabaseError::Duplicate(format!("tx from {} with nonce {}", tx.from, tx.nonce)));
        }
        tables.txs.insert(tx.id, tx.clone());
        Ok(())
    }

    async fn create_tx_attempt(&self, attempt: TxAttempt) -> Result<TxAttempt, DatabaseError> {
        let mut tables = self.write().await?;
        if !tables.txs.contains_key(&attempt.tx_id) {
            return Err(DatabaseError::not_found("tx", attempt.tx_id));
        }
        if tables.tx_attempts.values().any(|other| other.hash == attempt.hash) {
            return Err(DatabaseError::Duplicate(format!("tx attempt {}", attempt.hash)));
        }
        tables.tx_attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn save_tx_attempt(&self, attempt: &TxAttempt) -> Result<(), DatabaseError> {
        let mut tables = self.write().await?;
        let stored =
            tables.tx_attempts.get_mut(&attempt.id).ok_or_else(|| DatabaseError::not_found("tx attempt", attempt.id))?;
        *stored = attempt.clone();
        Ok(())
    }

    async fn delete_tx_attempt(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut tables = self.write().await?;
        tables.tx_attempts.remove(&id).map(|_| ()).ok_or_else(|| DatabaseError::not_found("tx attempt", id))
    }

    async fn tx_attempts_for(&self, tx_id: Uuid) -> Result<Vec<TxAttempt>, DatabaseError> {
        let tables = self.read().await?;
        Ok(sorted_by_sent_at_desc(tables.tx_attempts.values().filter(|a| a.tx_id == tx_id).cloned().collect()))
    }

    async fn tx_attempts(&self, offset: u64, limit: u64) -> Result<(Vec<TxAttempt>, u64), DatabaseError> {
        let tables = self.read().await?;
        let all = sorted_by_sent_at_desc(tables.tx_attempts.values().cloned().collect());
        let total = all.len() as u64;
        let page = all.into_iter().skip(offset as usize).take(limit as usize).collect();
        Ok((page, total))
    }

    async fn first_or_create_key(&self, key: Key) -> Result<Key, DatabaseError> {
        let mut tables = self.write().await?;
        Ok(tables.keys.entry(key.address).or_insert(key).clone())
    }

    async fn keys(&self) -> Result<Vec<Key>, DatabaseError> {
        let tables = self.read().await?;
        let mut keys: Vec<Key> = tables.keys.values().cloned().collect();
        keys.sort_by_key(|key| key.created_at);
        Ok(keys)
    }

    async fn find_key(&self, address: Address) -> Result<Key, DatabaseError> {
        let tables = self.read().await?;
        tables.keys.get(&address).cloned().ok_or_else(|| DatabaseError::not_found("key", address))
    }

    async fn create_sync_event(&self, event: SyncEvent) -> Result<SyncEvent, DatabaseError> {
        let mut tables = self.write().await?;
        Ok(tables.insert_sync_event(event))
    }

    async fn sync_events(&self) -> Result<Vec<SyncEvent>, DatabaseError> {
        let tables = self.read().await?;
        Ok(tables.sync_events.values().cloned().collect())
    }

    async fn delete_sync_event(&self, id: u64) -> Result<(), DatabaseError> {
        let mut tables = self.write().await?;
        tables.sync_events.remove(&id).map(|_| ()).ok_or_else(|| DatabaseError::not_found("sync event", id))
    }

    async fn count_of(&self, kind: RecordKind) -> Result<u64, DatabaseError> {
        let tables = self.read().await?;
        let count = match kind {
            RecordKind::JobSpec => tables.job_specs.values().filter(|spec| !spec.is_archived()).count(),
            RecordKind::JobRun => tables.job_runs.len(),
            RecordKind::BridgeType => tables.bridges.len(),
            RecordKind::Tx => tables.txs.len(),
            RecordKind::TxAttempt => tables.tx_attempts.len(),
            RecordKind::Key => tables.keys.len(),
            RecordKind::SyncEvent => tables.sync_events.len(),
            RecordKind::ExternalInitiator => tables.external_initiators.values().filter(|ei| !ei.is_deleted()).count(),
        };
        Ok(count as u64)
    }

    async fn create_external_initiator(
        &self,
        initiator: ExternalInitiator,
    ) -> Result<ExternalInitiator, DatabaseError> {
        let mut tables = self.write().await?;
        if tables.external_initiators.values().any(|ei| !ei.is_deleted() && ei.name == initiator.name) {
            return Err(DatabaseError::Duplicate(format!("external initiator {}", initiator.name)));
        }
        tables.external_initiators.insert(initiator.id, initiator.clone());
        Ok(initiator)
    }

    async fn find_external_initiator(
        &self,
        access_key: &str,
        mode: QueryMode,
    ) -> Result<ExternalInitiator, DatabaseError> {
        let tables = self.read().await?;
        tables
            .external_initiators
            .values()
            .find(|ei| ei.access_key == access_key && (mode.includes_deleted() || !ei.is_deleted()))
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("external initiator", access_key))
    }

    async fn find_external_initiator_by_name(
        &self,
        name: &str,
        mode: QueryMode,
    ) -> Result<ExternalInitiator, DatabaseError> {
        let tables = self.read().await?;
        tables
            .external_initiators
            .values()
            .find(|ei| ei.name == name && (mode.includes_deleted() || !ei.is_deleted()))
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("external initiator", name))
    }

    async fn delete_external_initiator(&self, name: &str) -> Result<(), DatabaseError> {
        let mut tables = self.write().await?;
        let initiator = tables
            .external_initiators
            .values_mut()
            .find(|ei| ei.name == name && !ei.is_deleted())
            .ok_or_else(|| DatabaseError::not_found("external initiator", name))?;
        initiator.deleted_at = Some(Utc::now());
        Ok(())
    }
}
