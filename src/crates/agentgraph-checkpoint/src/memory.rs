//! In-memory checkpoint storage for development and testing
//!
//! **[`InMemoryCheckpointStore`]** is the reference implementation of
//! [`CheckpointStore`]: a primary map keyed by checkpoint id plus two index
//! maps (`run_id` and `graph_id` to id sets), all behind a single
//! `tokio::sync::RwLock`. The single lock is what makes a save one logical
//! operation - readers never observe a checkpoint in the primary store but
//! missing from an index, or the reverse.
//!
//! All data is lost on restart; production deployments implement
//! [`CheckpointStore`] over a database and keep the same index discipline.
//! Expired checkpoints are not evicted automatically - expiry is checked
//! lazily on access - but [`InMemoryCheckpointStore::delete_expired`] can be
//! called from a periodic reaper.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = InMemoryCheckpointStore::new();
//! let id = store.save(checkpoint).await?;
//!
//! let restored = store.load(&id).await?;
//! let history = store.list_by_run(&restored.run_id).await?; // newest first
//!
//! store.delete_by_run(&restored.run_id).await?;
//! assert!(store.is_empty().await);
//! ```

use crate::checkpoint::Checkpoint;
use crate::error::{CheckpointError, Result};
use crate::store::CheckpointStore;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct StoreInner {
    primary: HashMap<String, Checkpoint>,
    by_run: HashMap<String, HashSet<String>>,
    by_graph: HashMap<String, HashSet<String>>,
}

impl StoreInner {
    fn unindex(&mut self, checkpoint: &Checkpoint) {
        if let Some(ids) = self.by_run.get_mut(&checkpoint.run_id) {
            ids.remove(&checkpoint.id);
            if ids.is_empty() {
                self.by_run.remove(&checkpoint.run_id);
            }
        }
        if let Some(ids) = self.by_graph.get_mut(&checkpoint.graph_id) {
            ids.remove(&checkpoint.id);
            if ids.is_empty() {
                self.by_graph.remove(&checkpoint.graph_id);
            }
        }
    }

    fn remove(&mut self, id: &str) -> Option<Checkpoint> {
        let checkpoint = self.primary.remove(id)?;
        self.unindex(&checkpoint);
        Some(checkpoint)
    }

    fn collect_sorted(&self, ids: Option<&HashSet<String>>) -> Vec<Checkpoint> {
        let mut checkpoints: Vec<Checkpoint> = ids
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.primary.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        checkpoints.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        checkpoints
    }
}

/// Thread-safe in-memory checkpoint store
///
/// Cloning shares the underlying storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl InMemoryCheckpointStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored checkpoints
    pub async fn len(&self) -> usize {
        self.inner.read().await.primary.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.primary.is_empty()
    }

    /// Drop everything (test isolation)
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.primary.clear();
        inner.by_run.clear();
        inner.by_graph.clear();
    }

    /// Scan and remove expired checkpoints; returns how many were evicted
    ///
    /// Best-effort reaper hook. Expiry is otherwise checked lazily on access.
    pub async fn delete_expired(&self) -> usize {
        let mut inner = self.inner.write().await;
        let expired: Vec<String> = inner
            .primary
            .values()
            .filter(|cp| cp.is_expired())
            .map(|cp| cp.id.clone())
            .collect();
        for id in &expired {
            inner.remove(id);
        }
        expired.len()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: Checkpoint) -> Result<String> {
        let mut inner = self.inner.write().await;

        // overwrite: drop the old index entries first, the run or graph may differ
        if let Some(previous) = inner.primary.remove(&checkpoint.id) {
            inner.unindex(&previous);
        }

        let id = checkpoint.id.clone();
        inner
            .by_run
            .entry(checkpoint.run_id.clone())
            .or_default()
            .insert(id.clone());
        inner
            .by_graph
            .entry(checkpoint.graph_id.clone())
            .or_default()
            .insert(id.clone());
        inner.primary.insert(id.clone(), checkpoint);
        Ok(id)
    }

    async fn load(&self, id: &str) -> Result<Checkpoint> {
        self.inner
            .read()
            .await
            .primary
            .get(id)
            .cloned()
            .ok_or_else(|| CheckpointError::NotFound(id.to_string()))
    }

    async fn list_by_run(&self, run_id: &str) -> Result<Vec<Checkpoint>> {
        let inner = self.inner.read().await;
        Ok(inner.collect_sorted(inner.by_run.get(run_id)))
    }

    async fn list_by_graph(&self, graph_id: &str) -> Result<Vec<Checkpoint>> {
        let inner = self.inner.read().await;
        Ok(inner.collect_sorted(inner.by_graph.get(graph_id)))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.inner.write().await.remove(id);
        Ok(())
    }

    async fn delete_by_run(&self, run_id: &str) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let ids: Vec<String> = inner
            .by_run
            .get(run_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        for id in &ids {
            inner.remove(id);
        }
        Ok(ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::ExecutionState;
    use agentgraph_message::{Message, MessageState, ToolCall};
    use chrono::{DateTime, Duration, Utc};

    fn waiting_message(run_id: &str, graph_id: &str) -> Message {
        Message::text("user", "hi")
            .with_graph_id(graph_id)
            .with_run_id(run_id)
            .with_tool_call(ToolCall::request_input("?"))
            .transition_to(MessageState::Running, None, None)
            .unwrap()
            .transition_to(MessageState::Waiting, None, Some("ask".into()))
            .unwrap()
    }

    fn checkpoint(run_id: &str, graph_id: &str) -> Checkpoint {
        Checkpoint::from_message(&waiting_message(run_id, graph_id)).unwrap()
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = InMemoryCheckpointStore::new();
        let cp = checkpoint("r1", "g1");

        let id = store.save(cp.clone()).await.unwrap();
        let loaded = store.load(&id).await.unwrap();

        assert_eq!(loaded, cp);
    }

    #[tokio::test]
    async fn test_load_unknown_is_not_found() {
        let store = InMemoryCheckpointStore::new();
        let err = store.load("cp_0_0").await.unwrap_err();
        assert!(matches!(err, CheckpointError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_by_run_sorted_newest_first() {
        let store = InMemoryCheckpointStore::new();

        let mut first = checkpoint("r1", "g1");
        first.timestamp = DateTime::<Utc>::from_timestamp(1_000, 0).unwrap();
        let mut second = checkpoint("r1", "g1");
        second.timestamp = DateTime::<Utc>::from_timestamp(2_000, 0).unwrap();
        let mut third = checkpoint("r1", "g1");
        third.timestamp = DateTime::<Utc>::from_timestamp(3_000, 0).unwrap();

        store.save(first.clone()).await.unwrap();
        store.save(third.clone()).await.unwrap();
        store.save(second.clone()).await.unwrap();

        let listed = store.list_by_run("r1").await.unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed.iter().all(|cp| cp.run_id == "r1"));
        assert_eq!(listed[0].id, third.id);
        assert_eq!(listed[1].id, second.id);
        assert_eq!(listed[2].id, first.id);
    }

    #[tokio::test]
    async fn test_list_by_graph_filters() {
        let store = InMemoryCheckpointStore::new();
        store.save(checkpoint("r1", "g1")).await.unwrap();
        store.save(checkpoint("r2", "g1")).await.unwrap();
        store.save(checkpoint("r3", "g2")).await.unwrap();

        let g1 = store.list_by_graph("g1").await.unwrap();
        assert_eq!(g1.len(), 2);
        assert!(g1.iter().all(|cp| cp.graph_id == "g1"));
        assert_eq!(store.list_by_graph("g3").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_overwrite_does_not_duplicate_indexes() {
        let store = InMemoryCheckpointStore::new();
        let cp = checkpoint("r1", "g1");
        store.save(cp.clone()).await.unwrap();

        let updated = cp.with_metadata_entry("note", serde_json::json!("second save"));
        store.save(updated).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.list_by_run("r1").await.unwrap().len(), 1);
        assert_eq!(store.list_by_graph("g1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_overwrite_moving_run_reindexes() {
        let store = InMemoryCheckpointStore::new();
        let cp = checkpoint("r1", "g1");
        store.save(cp.clone()).await.unwrap();

        let mut moved = cp;
        moved.run_id = "r2".to_string();
        store.save(moved).await.unwrap();

        assert!(store.list_by_run("r1").await.unwrap().is_empty());
        assert_eq!(store.list_by_run("r2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_from_all_indexes() {
        let store = InMemoryCheckpointStore::new();
        let cp = checkpoint("r1", "g1");
        let id = store.save(cp).await.unwrap();

        store.delete(&id).await.unwrap();

        assert!(store.load(&id).await.is_err());
        assert!(store.list_by_run("r1").await.unwrap().is_empty());
        assert!(store.list_by_graph("g1").await.unwrap().is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_by_run_removes_everything_for_that_run() {
        let store = InMemoryCheckpointStore::new();
        let kept = store.save(checkpoint("r2", "g1")).await.unwrap();
        let doomed_a = store.save(checkpoint("r1", "g1")).await.unwrap();
        let doomed_b = store.save(checkpoint("r1", "g1")).await.unwrap();

        let removed = store.delete_by_run("r1").await.unwrap();
        assert_eq!(removed, 2);

        assert!(store.list_by_run("r1").await.unwrap().is_empty());
        assert!(store.load(&doomed_a).await.is_err());
        assert!(store.load(&doomed_b).await.is_err());
        assert!(store.load(&kept).await.is_ok());
        assert_eq!(store.list_by_graph("g1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_expired_reaps_only_expired() {
        let store = InMemoryCheckpointStore::new();
        let expired = checkpoint("r1", "g1")
            .with_expires_at(DateTime::<Utc>::from_timestamp(0, 0).unwrap());
        let live = checkpoint("r2", "g1").with_ttl(Duration::hours(1));
        let forever = checkpoint("r3", "g1");

        store.save(expired).await.unwrap();
        let live_id = store.save(live).await.unwrap();
        let forever_id = store.save(forever).await.unwrap();

        let evicted = store.delete_expired().await;
        assert_eq!(evicted, 1);
        assert_eq!(store.len().await, 2);
        assert!(store.load(&live_id).await.is_ok());
        assert!(store.load(&forever_id).await.is_ok());
        assert!(store.list_by_run("r1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_saves_are_all_visible() {
        let store = InMemoryCheckpointStore::new();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.save(checkpoint(&format!("r{i}"), "g1")).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await, 16);
        assert_eq!(store.list_by_graph("g1").await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_execution_state_preserved() {
        let store = InMemoryCheckpointStore::new();
        let cp = checkpoint("r1", "g1");
        assert_eq!(cp.execution_state, ExecutionState::WaitingForHuman);

        let id = store.save(cp).await.unwrap();
        let loaded = store.load(&id).await.unwrap();
        assert_eq!(loaded.execution_state, ExecutionState::WaitingForHuman);
    }
}
