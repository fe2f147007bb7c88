//! In-memory transactional store
//!
//! Mirrors the PostgreSQL store closely enough to exercise the ingestion
//! engine without a database: writes are staged per transaction and applied
//! on commit, and recording rows are keyed by call uuid. An insert for a call
//! uuid another open transaction already inserted waits until that
//! transaction finishes, then conflicts only if the row was committed.
//! Individual operations can be made to fail or stall.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use voip_core::models::{NormalizedCdr, RecordingBackend, ResolvedRefs};
use voip_core::traits::{CdrStore, CdrTransaction};
use voip_core::{AppError, AppResult};

/// Store operation that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Ping,
    Begin,
    QueueLookup,
    AgentLookup,
    RecordingUpsert,
    Insert,
    Commit,
    Rollback,
}

/// Committed CDR row
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCdr {
    pub id: i64,
    pub cdr: NormalizedCdr,
    pub refs: ResolvedRefs,
}

/// Committed recording row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecording {
    pub id: i64,
    pub call_uuid: String,
    pub path: String,
    pub backend: RecordingBackend,
}

/// Transaction counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxStats {
    pub begun: u64,
    pub committed: u64,
    pub rolled_back: u64,
    /// Transactions dropped without commit or rollback
    pub abandoned: u64,
}

#[derive(Default)]
struct State {
    queues: HashMap<String, i64>,
    agents: HashMap<String, i64>,
    recordings: BTreeMap<String, StoredRecording>,
    cdrs: BTreeMap<String, StoredCdr>,
    /// Call uuids inserted by transactions that have not finished yet,
    /// notified when the owning transaction ends
    pending_cdrs: HashMap<String, Arc<Notify>>,
    next_id: i64,
    fail_points: HashSet<FailPoint>,
    fail_once: HashSet<FailPoint>,
    delays: HashMap<FailPoint, Duration>,
    stats: TxStats,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&mut self, point: FailPoint) -> AppResult<()> {
        let armed = self.fail_points.contains(&point) || self.fail_once.remove(&point);
        if !armed {
            return Ok(());
        }

        Err(match point {
            FailPoint::Ping => AppError::Pool("injected ping failure".to_string()),
            FailPoint::Begin => AppError::Transaction("injected begin failure".to_string()),
            FailPoint::Commit => AppError::Transaction("injected commit failure".to_string()),
            FailPoint::Rollback => AppError::Transaction("injected rollback failure".to_string()),
            other => AppError::Database(format!("injected {:?} failure", other)),
        })
    }
}

/// Shared in-memory store; clones see the same data
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a queue and return its id
    pub fn add_queue(&self, name: &str) -> i64 {
        let mut state = self.state.lock();
        let id = state.next_id();
        state.queues.insert(name.to_string(), id);
        id
    }

    /// Add an agent user and return its id
    pub fn add_agent(&self, external_id: &str) -> i64 {
        let mut state = self.state.lock();
        let id = state.next_id();
        state.agents.insert(external_id.to_string(), id);
        id
    }

    /// Make every later call of `point` fail
    pub fn fail_on(&self, point: FailPoint) {
        self.state.lock().fail_points.insert(point);
    }

    /// Make only the next call of `point` fail
    pub fn fail_once(&self, point: FailPoint) {
        self.state.lock().fail_once.insert(point);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.fail_points.clear();
        state.fail_once.clear();
    }

    /// Delay every later call of `point` by `delay`
    pub fn stall_on(&self, point: FailPoint, delay: Duration) {
        self.state.lock().delays.insert(point, delay);
    }

    pub fn cdr(&self, call_uuid: &str) -> Option<StoredCdr> {
        self.state.lock().cdrs.get(call_uuid).cloned()
    }

    pub fn cdr_count(&self) -> usize {
        self.state.lock().cdrs.len()
    }

    pub fn recordings(&self) -> Vec<StoredRecording> {
        self.state.lock().recordings.values().cloned().collect()
    }

    pub fn stats(&self) -> TxStats {
        self.state.lock().stats
    }

    /// Check for an injected failure, after any configured stall
    async fn enter(state: &Mutex<State>, point: FailPoint) -> AppResult<()> {
        let delay = state.lock().delays.get(&point).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        state.lock().check(point)
    }
}

#[async_trait]
impl CdrStore for MemoryStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> AppResult<MemoryTransaction> {
        Self::enter(&self.state, FailPoint::Begin).await?;
        self.state.lock().stats.begun += 1;

        Ok(MemoryTransaction {
            state: Arc::clone(&self.state),
            recordings: BTreeMap::new(),
            cdrs: Vec::new(),
            finished: false,
        })
    }

    async fn ping(&self) -> AppResult<()> {
        Self::enter(&self.state, FailPoint::Ping).await
    }
}

/// Transaction over a [`MemoryStore`]
pub struct MemoryTransaction {
    state: Arc<Mutex<State>>,
    recordings: BTreeMap<String, StoredRecording>,
    cdrs: Vec<StoredCdr>,
    finished: bool,
}

impl MemoryTransaction {
    fn release(&mut self, state: &mut State) {
        for stored in self.cdrs.drain(..) {
            if let Some(waiters) = state.pending_cdrs.remove(&stored.cdr.call_uuid) {
                waiters.notify_waiters();
            }
        }
        self.recordings.clear();
        self.finished = true;
    }
}

#[async_trait]
impl CdrTransaction for MemoryTransaction {
    async fn find_queue_id(&mut self, name: &str) -> AppResult<Option<i64>> {
        MemoryStore::enter(&self.state, FailPoint::QueueLookup).await?;
        Ok(self.state.lock().queues.get(name).copied())
    }

    async fn find_agent_user_id(&mut self, external_id: &str) -> AppResult<Option<i64>> {
        MemoryStore::enter(&self.state, FailPoint::AgentLookup).await?;
        Ok(self.state.lock().agents.get(external_id).copied())
    }

    async fn upsert_recording(
        &mut self,
        call_uuid: &str,
        path: &str,
        backend: RecordingBackend,
    ) -> AppResult<i64> {
        MemoryStore::enter(&self.state, FailPoint::RecordingUpsert).await?;

        if let Some(staged) = self.recordings.get_mut(call_uuid) {
            staged.path = path.to_string();
            return Ok(staged.id);
        }

        let mut state = self.state.lock();
        let existing = state.recordings.get(call_uuid).map(|r| r.id);
        let id = match existing {
            Some(id) => id,
            None => state.next_id(),
        };
        drop(state);

        self.recordings.insert(
            call_uuid.to_string(),
            StoredRecording {
                id,
                call_uuid: call_uuid.to_string(),
                path: path.to_string(),
                backend,
            },
        );
        Ok(id)
    }

    async fn insert_cdr(&mut self, cdr: &NormalizedCdr, refs: &ResolvedRefs) -> AppResult<u64> {
        MemoryStore::enter(&self.state, FailPoint::Insert).await?;

        loop {
            let owner = {
                let mut state = self.state.lock();
                if state.cdrs.contains_key(&cdr.call_uuid) {
                    return Ok(0);
                }

                let pending = state.pending_cdrs.get(&cdr.call_uuid).cloned();
                match pending {
                    Some(owner) => owner,
                    None => {
                        state
                            .pending_cdrs
                            .insert(cdr.call_uuid.clone(), Arc::new(Notify::new()));
                        let id = state.next_id();
                        drop(state);

                        self.cdrs.push(StoredCdr {
                            id,
                            cdr: cdr.clone(),
                            refs: *refs,
                        });
                        return Ok(1);
                    }
                }
            };

            // Register before re-checking so a release in between is not missed
            let released = owner.notified();
            let still_pending = self
                .state
                .lock()
                .pending_cdrs
                .get(&cdr.call_uuid)
                .is_some_and(|current| Arc::ptr_eq(current, &owner));
            if still_pending {
                released.await;
            }
        }
    }

    async fn commit(mut self) -> AppResult<()> {
        MemoryStore::enter(&self.state, FailPoint::Commit).await?;

        let state_handle = Arc::clone(&self.state);
        let mut state = state_handle.lock();

        for (call_uuid, recording) in std::mem::take(&mut self.recordings) {
            state.recordings.insert(call_uuid, recording);
        }
        let mut released = Vec::new();
        for stored in self.cdrs.drain(..) {
            released.extend(state.pending_cdrs.remove(&stored.cdr.call_uuid));
            state.cdrs.insert(stored.cdr.call_uuid.clone(), stored);
        }

        state.stats.committed += 1;
        self.finished = true;
        drop(state);

        for waiters in released {
            waiters.notify_waiters();
        }
        Ok(())
    }

    async fn rollback(mut self) -> AppResult<()> {
        MemoryStore::enter(&self.state, FailPoint::Rollback).await?;

        let state_handle = Arc::clone(&self.state);
        let mut state = state_handle.lock();
        self.release(&mut state);
        state.stats.rolled_back += 1;
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let state_handle = Arc::clone(&self.state);
        let mut state = state_handle.lock();
        self.release(&mut state);
        state.stats.abandoned += 1;
    }
}
