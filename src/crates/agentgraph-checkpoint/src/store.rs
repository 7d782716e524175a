//! Storage abstraction for checkpoints
//!
//! Backends must keep the primary store and both indexes consistent: a
//! checkpoint is either present everywhere or nowhere. Listings are sorted by
//! snapshot timestamp, newest first.

use crate::checkpoint::Checkpoint;
use crate::error::Result;
use async_trait::async_trait;

/// Durable (where the backend is durable) checkpoint storage
///
/// Implementations must be safe for concurrent access from many runs; every
/// method may suspend.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist a checkpoint and index it by run and graph
    ///
    /// Saving an id that already exists overwrites the stored value without
    /// duplicating index entries. Returns the checkpoint id.
    async fn save(&self, checkpoint: Checkpoint) -> Result<String>;

    /// Load a checkpoint by id, or `NotFound`
    async fn load(&self, id: &str) -> Result<Checkpoint>;

    /// All checkpoints of one run, newest first
    async fn list_by_run(&self, run_id: &str) -> Result<Vec<Checkpoint>>;

    /// All checkpoints of one graph, newest first
    async fn list_by_graph(&self, graph_id: &str) -> Result<Vec<Checkpoint>>;

    /// Remove a checkpoint from the primary store and both indexes
    ///
    /// Deleting an unknown id is a no-op.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Remove every checkpoint of one run; returns how many were removed
    async fn delete_by_run(&self, run_id: &str) -> Result<usize>;
}
