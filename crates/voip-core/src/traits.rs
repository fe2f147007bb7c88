//! Store traits for CDR ingestion
//!
//! The ingestion engine never talks to a connection pool directly. It opens a
//! [`CdrTransaction`] through a [`CdrStore`] and runs every lookup and write of
//! one call against it, finishing with exactly one `commit` or `rollback`.

use crate::error::AppError;
use crate::models::{NormalizedCdr, RecordingBackend, ResolvedRefs};
use async_trait::async_trait;

/// Source of ingestion transactions
#[async_trait]
pub trait CdrStore: Send + Sync {
    /// Transaction type handed out by this store
    type Tx: CdrTransaction;

    /// Open a new transaction
    async fn begin(&self) -> Result<Self::Tx, AppError>;

    /// Check the store can serve requests
    async fn ping(&self) -> Result<(), AppError>;
}

/// One open transaction against the CDR tables
///
/// Dropping a transaction without calling `commit` must discard its writes.
#[async_trait]
pub trait CdrTransaction: Send {
    /// Look up a queue id by exact queue name
    async fn find_queue_id(&mut self, name: &str) -> Result<Option<i64>, AppError>;

    /// Look up an agent user id by external agent identifier
    async fn find_agent_user_id(&mut self, external_id: &str) -> Result<Option<i64>, AppError>;

    /// Insert or update the recording reference of a call, returning its id
    ///
    /// A call has at most one recording row; a repeated upsert keeps the row
    /// and synchronizes its path.
    async fn upsert_recording(
        &mut self,
        call_uuid: &str,
        path: &str,
        backend: RecordingBackend,
    ) -> Result<i64, AppError>;

    /// Insert the CDR row unless one with the same call uuid exists
    ///
    /// Returns the number of affected rows: 1 for a fresh insert, 0 when the
    /// call uuid was already stored.
    async fn insert_cdr(&mut self, cdr: &NormalizedCdr, refs: &ResolvedRefs)
        -> Result<u64, AppError>;

    /// Commit all writes made through this transaction
    async fn commit(self) -> Result<(), AppError>;

    /// Discard all writes made through this transaction
    async fn rollback(self) -> Result<(), AppError>;
}
