//! Per-call ingestion state
//!
//! An [`IngestSession`] owns the transaction of one CDR and the references
//! resolved so far. Steps must run in order; each one advances the
//! [`IngestStage`]. The session ends with exactly one of `commit` or
//! `rollback`, both of which consume it.

use crate::resolver;
use crate::writer::{self, WriteOutcome};
use tracing::{debug, error, info};
use voip_core::models::{NormalizedCdr, ResolvedRefs};
use voip_core::traits::{CdrStore, CdrTransaction};
use voip_core::AppResult;

/// Progress of an ingestion transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IngestStage {
    Open,
    QueueResolved,
    AgentResolved,
    RecordingResolved,
    Written,
}

/// One CDR being stored inside its own transaction
pub struct IngestSession<'a, T: CdrTransaction> {
    tx: T,
    cdr: &'a NormalizedCdr,
    refs: ResolvedRefs,
    stage: IngestStage,
}

impl<'a, T: CdrTransaction> IngestSession<'a, T> {
    /// Begin a transaction for `cdr`
    pub async fn open<S>(store: &S, cdr: &'a NormalizedCdr) -> AppResult<Self>
    where
        S: CdrStore<Tx = T>,
    {
        let tx = store.begin().await?;
        debug!(call_uuid = %cdr.call_uuid, "Opened ingestion transaction");

        Ok(Self {
            tx,
            cdr,
            refs: ResolvedRefs::default(),
            stage: IngestStage::Open,
        })
    }

    pub fn stage(&self) -> IngestStage {
        self.stage
    }

    pub fn refs(&self) -> &ResolvedRefs {
        &self.refs
    }

    pub fn cdr(&self) -> &NormalizedCdr {
        self.cdr
    }

    /// Resolve the queue reference, if the CDR names one
    pub async fn resolve_queue(&mut self) -> AppResult<()> {
        debug_assert_eq!(self.stage, IngestStage::Open);

        if let Some(name) = self.cdr.queue_name.as_deref() {
            self.refs.queue_id = resolver::resolve_queue(&mut self.tx, &self.cdr.call_uuid, name)
                .await?
                .id();
        }

        self.stage = IngestStage::QueueResolved;
        Ok(())
    }

    /// Resolve the agent reference, if the CDR names one
    pub async fn resolve_agent(&mut self) -> AppResult<()> {
        debug_assert_eq!(self.stage, IngestStage::QueueResolved);

        if let Some(agent_id) = self.cdr.agent_id.as_deref() {
            self.refs.agent_user_id =
                resolver::resolve_agent(&mut self.tx, &self.cdr.call_uuid, agent_id)
                    .await?
                    .id();
        }

        self.stage = IngestStage::AgentResolved;
        Ok(())
    }

    /// Upsert the recording row, if the CDR carries a recording path
    pub async fn resolve_recording(&mut self) -> AppResult<()> {
        debug_assert_eq!(self.stage, IngestStage::AgentResolved);

        if let Some(path) = self.cdr.recording_file.as_deref() {
            let id = resolver::resolve_recording(&mut self.tx, &self.cdr.call_uuid, path).await?;
            self.refs.recording_id = Some(id);
        }

        self.stage = IngestStage::RecordingResolved;
        Ok(())
    }

    /// Write the CDR row with the resolved references
    pub async fn write(&mut self) -> AppResult<WriteOutcome> {
        debug_assert_eq!(self.stage, IngestStage::RecordingResolved);

        let outcome = writer::write_cdr(&mut self.tx, self.cdr, &self.refs).await?;
        self.stage = IngestStage::Written;
        Ok(outcome)
    }

    /// Run every step up to and including the write
    pub async fn run(&mut self) -> AppResult<WriteOutcome> {
        self.resolve_queue().await?;
        self.resolve_agent().await?;
        self.resolve_recording().await?;
        self.write().await
    }

    /// Commit the transaction, returning the references stored with the row
    pub async fn commit(self) -> AppResult<ResolvedRefs> {
        debug_assert_eq!(self.stage, IngestStage::Written);

        let refs = self.refs;
        self.tx.commit().await?;
        Ok(refs)
    }

    /// Roll the transaction back
    ///
    /// A failed rollback is logged and swallowed so it never replaces the
    /// error that caused it; the driver discards the transaction anyway.
    pub async fn rollback(self) {
        let call_uuid = &self.cdr.call_uuid;
        let stage = self.stage;

        match self.tx.rollback().await {
            Ok(()) => info!(call_uuid = %call_uuid, ?stage, "Rolled back CDR transaction"),
            Err(e) => {
                error!(call_uuid = %call_uuid, ?stage, "Failed to roll back CDR transaction: {}", e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FailPoint, MemoryStore};
    use chrono::{TimeZone, Utc};

    fn sample_cdr() -> NormalizedCdr {
        NormalizedCdr {
            call_uuid: "session-1".to_string(),
            direction: "inbound".to_string(),
            caller_id_number: Some("1001".to_string()),
            destination_number: Some("2002".to_string()),
            start_time: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            answer_time: None,
            end_time: Utc.with_ymd_and_hms(2024, 1, 1, 10, 1, 0).unwrap(),
            duration: 60,
            billsec: 0,
            hangup_cause: None,
            queue_name: Some("support".to_string()),
            agent_id: Some("agent-7".to_string()),
            recording_file: Some("/rec/session-1.wav".to_string()),
            raw: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn test_session_advances_through_stages() {
        let store = MemoryStore::new();
        let queue = store.add_queue("support");
        let cdr = sample_cdr();

        let mut session = IngestSession::open(&store, &cdr).await.unwrap();
        assert_eq!(session.stage(), IngestStage::Open);

        session.resolve_queue().await.unwrap();
        assert_eq!(session.stage(), IngestStage::QueueResolved);
        assert_eq!(session.refs().queue_id, Some(queue));

        session.resolve_agent().await.unwrap();
        assert_eq!(session.stage(), IngestStage::AgentResolved);
        assert_eq!(session.refs().agent_user_id, None);

        session.resolve_recording().await.unwrap();
        assert_eq!(session.stage(), IngestStage::RecordingResolved);
        assert!(session.refs().recording_id.is_some());

        assert_eq!(session.write().await.unwrap(), WriteOutcome::Inserted);
        assert_eq!(session.stage(), IngestStage::Written);

        let refs = session.commit().await.unwrap();
        assert_eq!(refs.queue_id, Some(queue));
        assert_eq!(store.cdr("session-1").unwrap().refs, refs);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = MemoryStore::new();
        let cdr = sample_cdr();

        let mut session = IngestSession::open(&store, &cdr).await.unwrap();
        session.run().await.unwrap();
        session.rollback().await;

        assert!(store.cdr("session-1").is_none());
        assert!(store.recordings().is_empty());
        assert_eq!(store.stats().rolled_back, 1);
    }

    #[tokio::test]
    async fn test_failed_rollback_is_swallowed() {
        let store = MemoryStore::new();
        store.fail_on(FailPoint::Rollback);
        let cdr = sample_cdr();

        let mut session = IngestSession::open(&store, &cdr).await.unwrap();
        session.run().await.unwrap();
        session.rollback().await;

        assert!(store.cdr("session-1").is_none());
        assert_eq!(store.stats().committed, 0);
    }
}
