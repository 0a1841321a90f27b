pub mod error;
pub mod memory;

use alloy_primitives::Address;
use async_trait::async_trait;
use uuid::Uuid;

use crate::types::bridge::BridgeType;
use crate::types::external_initiator::ExternalInitiator;
use crate::types::job_run::JobRun;
use crate::types::job_spec::{JobSpec, TaskType};
use crate::types::key::Key;
use crate::types::status::RunStatus;
use crate::types::sync_event::SyncEvent;
use crate::types::tx::{Tx, TxAttempt};
pub use error::DatabaseError;
pub use memory::InMemoryDatabase;

/// Whether soft deleted records are visible to a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    #[default]
    Scoped,
    Unscoped,
}

impl QueryMode {
    pub fn includes_deleted(&self) -> bool {
        matches!(self, QueryMode::Unscoped)
    }
}

/// Tables that can be counted with [`DatabaseClient::count_of`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum RecordKind {
    JobSpec,
    JobRun,
    BridgeType,
    Tx,
    TxAttempt,
    Key,
    SyncEvent,
    ExternalInitiator,
}

/// Trait defining database operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// disconnect - Close the database; every later call fails with `Unavailable`
    async fn disconnect(&self) -> Result<(), DatabaseError>;

    /// create_job_spec - Store a new job spec
    async fn create_job_spec(&self, spec: JobSpec) -> Result<JobSpec, DatabaseError>;
    /// find_job_spec - Get a job spec by id, archived ones only when unscoped
    async fn find_job_spec(&self, id: Uuid, mode: QueryMode) -> Result<JobSpec, DatabaseError>;
    /// archive_job_spec - Soft delete a job spec
    async fn archive_job_spec(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// create_job_run - Store a new run, together with its sync event when given
    async fn create_job_run(&self, run: JobRun, event: Option<SyncEvent>) -> Result<JobRun, DatabaseError>;
    /// save_job_run - Update a run if nobody else did since it was read.
    /// The run and its sync event are written atomically. Returns the stored
    /// run with its bumped version.
    async fn save_job_run(&self, run: &JobRun, event: Option<SyncEvent>) -> Result<JobRun, DatabaseError>;
    /// find_job_run - Get a run by id
    async fn find_job_run(&self, id: Uuid) -> Result<JobRun, DatabaseError>;
    /// job_runs_with_status - Get all runs in one of the given states, oldest first
    async fn job_runs_with_status(&self, statuses: Vec<RunStatus>) -> Result<Vec<JobRun>, DatabaseError>;

    /// create_bridge_type - Register an external adapter
    async fn create_bridge_type(&self, bridge: BridgeType) -> Result<BridgeType, DatabaseError>;
    /// find_bridge - Get an external adapter by name
    async fn find_bridge(&self, name: &TaskType) -> Result<BridgeType, DatabaseError>;

    /// create_tx - Store a new tx; (from, nonce) is unique
    async fn create_tx(&self, tx: Tx) -> Result<Tx, DatabaseError>;
    /// find_tx - Get a tx by id
    async fn find_tx(&self, id: Uuid) -> Result<Tx, DatabaseError>;
    /// save_tx - Update a tx; (from, nonce) stays unique
    async fn save_tx(&self, tx: &Tx) -> Result<(), DatabaseError>;
    /// create_tx_attempt - Store a new attempt of an existing tx
    async fn create_tx_attempt(&self, attempt: TxAttempt) -> Result<TxAttempt, DatabaseError>;
    /// save_tx_attempt - Update an attempt
    async fn save_tx_attempt(&self, attempt: &TxAttempt) -> Result<(), DatabaseError>;
    /// delete_tx_attempt - Remove an attempt the chain never accepted
    async fn delete_tx_attempt(&self, id: Uuid) -> Result<(), DatabaseError>;
    /// tx_attempts_for - All attempts of a tx, most recently sent first
    async fn tx_attempts_for(&self, tx_id: Uuid) -> Result<Vec<TxAttempt>, DatabaseError>;
    /// tx_attempts - One page of all attempts, most recently sent first, and the total count
    async fn tx_attempts(&self, offset: u64, limit: u64) -> Result<(Vec<TxAttempt>, u64), DatabaseError>;

    /// first_or_create_key - Get the key for an address, inserting it when missing
    async fn first_or_create_key(&self, key: Key) -> Result<Key, DatabaseError>;
    /// keys - All known signing accounts
    async fn keys(&self) -> Result<Vec<Key>, DatabaseError>;
    /// find_key - Get the key of one address
    async fn find_key(&self, address: Address) -> Result<Key, DatabaseError>;

    /// create_sync_event - Store an event outside of a run mutation
    async fn create_sync_event(&self, event: SyncEvent) -> Result<SyncEvent, DatabaseError>;
    /// sync_events - Every undelivered event in creation order
    async fn sync_events(&self) -> Result<Vec<SyncEvent>, DatabaseError>;
    /// delete_sync_event - Drop an acknowledged event
    async fn delete_sync_event(&self, id: u64) -> Result<(), DatabaseError>;

    /// count_of - Number of live records of one kind
    async fn count_of(&self, kind: RecordKind) -> Result<u64, DatabaseError>;

    /// create_external_initiator - Store a new external initiator; names are unique
    async fn create_external_initiator(
        &self,
        initiator: ExternalInitiator,
    ) -> Result<ExternalInitiator, DatabaseError>;
    /// find_external_initiator - Get an external initiator by access key
    async fn find_external_initiator(
        &self,
        access_key: &str,
        mode: QueryMode,
    ) -> Result<ExternalInitiator, DatabaseError>;
    /// find_external_initiator_by_name - Get an external initiator by name
    async fn find_external_initiator_by_name(
        &self,
        name: &str,
        mode: QueryMode,
    ) -> Result<ExternalInitiator, DatabaseError>;
    /// delete_external_initiator - Soft delete an external initiator by name
    async fn delete_external_initiator(&self, name: &str) -> Result<(), DatabaseError>;
}
