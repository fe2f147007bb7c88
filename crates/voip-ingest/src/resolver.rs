//! Reference resolution inside an ingestion transaction
//!
//! Queue and agent lookups are best effort: no match leaves the reference
//! null and the CDR is still stored. A recording path is always persisted,
//! so any error there aborts the ingestion.

use tracing::{info, instrument};
use voip_core::models::{RecordingBackend, Resolution};
use voip_core::traits::CdrTransaction;
use voip_core::AppResult;

/// Map a queue name to its id
#[instrument(skip(tx))]
pub async fn resolve_queue<T: CdrTransaction>(
    tx: &mut T,
    call_uuid: &str,
    queue_name: &str,
) -> AppResult<Resolution> {
    let resolution = Resolution::from_lookup(tx.find_queue_id(queue_name).await?);

    match resolution {
        Resolution::Resolved(queue_id) => {
            info!(call_uuid, queue_name, queue_id, "Mapped CDR queue");
        }
        Resolution::NotFound => {
            info!(call_uuid, queue_name, "Queue not found for CDR");
        }
    }

    Ok(resolution)
}

/// Map an external agent identifier to its agent user id
#[instrument(skip(tx))]
pub async fn resolve_agent<T: CdrTransaction>(
    tx: &mut T,
    call_uuid: &str,
    agent_id: &str,
) -> AppResult<Resolution> {
    let resolution = Resolution::from_lookup(tx.find_agent_user_id(agent_id).await?);

    match resolution {
        Resolution::Resolved(agent_user_id) => {
            info!(call_uuid, agent_id, agent_user_id, "Mapped CDR agent");
        }
        Resolution::NotFound => {
            info!(call_uuid, agent_id, "Agent not found for CDR");
        }
    }

    Ok(resolution)
}

/// Insert or refresh the recording row of a call and return its id
#[instrument(skip(tx))]
pub async fn resolve_recording<T: CdrTransaction>(
    tx: &mut T,
    call_uuid: &str,
    path: &str,
) -> AppResult<i64> {
    let recording_id = tx
        .upsert_recording(call_uuid, path, RecordingBackend::Local)
        .await?;

    info!(call_uuid, path, recording_id, "Upserted recording");
    Ok(recording_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FailPoint, MemoryStore};
    use voip_core::traits::CdrStore;
    use voip_core::AppError;

    #[tokio::test]
    async fn test_resolve_queue() {
        let store = MemoryStore::new();
        let support = store.add_queue("support");
        let mut tx = store.begin().await.unwrap();

        let found = resolve_queue(&mut tx, "abc", "support").await.unwrap();
        assert_eq!(found, Resolution::Resolved(support));

        let missing = resolve_queue(&mut tx, "abc", "sales").await.unwrap();
        assert_eq!(missing, Resolution::NotFound);
    }

    #[tokio::test]
    async fn test_resolve_agent_is_exact_match() {
        let store = MemoryStore::new();
        let agent = store.add_agent("agent-7");
        let mut tx = store.begin().await.unwrap();

        assert_eq!(
            resolve_agent(&mut tx, "abc", "agent-7").await.unwrap(),
            Resolution::Resolved(agent)
        );
        assert_eq!(
            resolve_agent(&mut tx, "abc", "AGENT-7").await.unwrap(),
            Resolution::NotFound
        );
    }

    #[tokio::test]
    async fn test_lookup_error_propagates() {
        let store = MemoryStore::new();
        store.add_queue("support");
        store.fail_on(FailPoint::QueueLookup);
        let mut tx = store.begin().await.unwrap();

        let err = resolve_queue(&mut tx, "abc", "support").await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test]
    async fn test_resolve_recording_reuses_row() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let first = resolve_recording(&mut tx, "abc", "/rec/a.wav").await.unwrap();
        let second = resolve_recording(&mut tx, "abc", "/rec/b.wav").await.unwrap();
        assert_eq!(first, second);

        tx.commit().await.unwrap();
        let recordings = store.recordings();
        assert_eq!(recordings.len(), 1);
        assert_eq!(recordings[0].path, "/rec/b.wav");
        assert_eq!(recordings[0].backend, RecordingBackend::Local);
    }
}
