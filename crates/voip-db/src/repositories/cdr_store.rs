//! CDR store implementation
//!
//! PostgreSQL-backed transactional store used by the ingestion engine.
//! Uses runtime queries (not compile-time macros) to avoid requiring a
//! database connection at build time.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error, instrument};
use voip_core::{
    models::{NormalizedCdr, RecordingBackend, ResolvedRefs},
    traits::{CdrStore, CdrTransaction},
    AppError, AppResult,
};

const FIND_QUEUE_SQL: &str = "SELECT id FROM voip.queues WHERE name = $1";

const FIND_AGENT_SQL: &str = "SELECT id FROM voip.agent_users WHERE external_id = $1";

const UPSERT_RECORDING_SQL: &str = r#"
    INSERT INTO voip.recordings (call_uuid, path, backend)
    VALUES ($1, $2, $3)
    ON CONFLICT (call_uuid) DO UPDATE
    SET path = EXCLUDED.path
    RETURNING id
"#;

const INSERT_CDR_SQL: &str = r#"
    INSERT INTO voip.cdr (
        call_uuid, direction,
        caller_id_number, destination_number,
        start_time, answer_time, end_time,
        duration, billsec, hangup_cause,
        queue_id, agent_user_id, recording_id, raw_json
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
    ON CONFLICT (call_uuid) DO NOTHING
"#;

/// PostgreSQL implementation of CdrStore
#[derive(Clone)]
pub struct PgCdrStore {
    pool: PgPool,
}

impl PgCdrStore {
    /// Create a new CDR store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CdrStore for PgCdrStore {
    type Tx = PgCdrTransaction;

    #[instrument(skip(self))]
    async fn begin(&self) -> AppResult<PgCdrTransaction> {
        let tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        Ok(PgCdrTransaction { tx })
    }

    async fn ping(&self) -> AppResult<()> {
        crate::pool::ping(&self.pool).await
    }
}

/// One ingestion transaction on a pooled connection
///
/// sqlx rolls the transaction back when it is dropped without a commit,
/// which covers cancellation of the ingest future.
pub struct PgCdrTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CdrTransaction for PgCdrTransaction {
    #[instrument(skip(self))]
    async fn find_queue_id(&mut self, name: &str) -> AppResult<Option<i64>> {
        debug!("Looking up queue: {}", name);

        sqlx::query_scalar::<Postgres, i64>(FIND_QUEUE_SQL)
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error looking up queue {}: {}", name, e);
                AppError::Database(format!("Failed to look up queue: {}", e))
            })
    }

    #[instrument(skip(self))]
    async fn find_agent_user_id(&mut self, external_id: &str) -> AppResult<Option<i64>> {
        debug!("Looking up agent: {}", external_id);

        sqlx::query_scalar::<Postgres, i64>(FIND_AGENT_SQL)
            .bind(external_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error looking up agent {}: {}", external_id, e);
                AppError::Database(format!("Failed to look up agent: {}", e))
            })
    }

    #[instrument(skip(self))]
    async fn upsert_recording(
        &mut self,
        call_uuid: &str,
        path: &str,
        backend: RecordingBackend,
    ) -> AppResult<i64> {
        sqlx::query_scalar::<Postgres, i64>(UPSERT_RECORDING_SQL)
            .bind(call_uuid)
            .bind(path)
            .bind(backend.as_str())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error upserting recording for {}: {}", call_uuid, e);
                AppError::Database(format!("Failed to upsert recording: {}", e))
            })
    }

    #[instrument(skip(self, cdr, refs), fields(call_uuid = %cdr.call_uuid))]
    async fn insert_cdr(&mut self, cdr: &NormalizedCdr, refs: &ResolvedRefs) -> AppResult<u64> {
        let result = sqlx::query(INSERT_CDR_SQL)
            .bind(&cdr.call_uuid)
            .bind(&cdr.direction)
            .bind(&cdr.caller_id_number)
            .bind(&cdr.destination_number)
            .bind(cdr.start_time)
            .bind(cdr.answer_time)
            .bind(cdr.end_time)
            .bind(cdr.duration)
            .bind(cdr.billsec)
            .bind(&cdr.hangup_cause)
            .bind(refs.queue_id)
            .bind(refs.agent_user_id)
            .bind(refs.recording_id)
            .bind(&cdr.raw)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                error!("Database error inserting CDR {}: {}", cdr.call_uuid, e);
                AppError::Database(format!("Failed to insert CDR: {}", e))
            })?;

        Ok(result.rows_affected())
    }

    async fn commit(self) -> AppResult<()> {
        self.tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })
    }

    async fn rollback(self) -> AppResult<()> {
        self.tx.rollback().await.map_err(|e| {
            AppError::Transaction(format!("Failed to roll back transaction: {}", e))
        })
    }
}
