//! # agentgraph-checkpoint - Durable pause points for graph runs
//!
//! This crate captures a run paused in the WAITING state as a **[`Checkpoint`]**,
//! persists it through the **[`CheckpointStore`]** abstraction, and restores it
//! when the caller resumes with a user response. Checkpoints are what let a
//! human-blocked run survive a process restart.
//!
//! ## Overview
//!
//! - **[`Checkpoint`]** - Snapshot of a run: the full message, the node it
//!   paused on, the pending HITL tool call, and an optional expiry.
//! - **[`CheckpointStore`]** - Async storage trait: save/load plus listing by
//!   `run_id` and `graph_id` and bulk deletion per run.
//! - **[`InMemoryCheckpointStore`]** - Reference implementation backed by one
//!   `RwLock` over a primary map and two index maps, so every save is a single
//!   logical operation.
//! - **[`CheckpointSerializer`]** / **[`JsonSerializer`]** - Structural JSON
//!   wire form, compact or pretty, with lossless round-trips for nested maps
//!   and ordered sequences.
//! - **[`CheckpointConfig`]** - When to save (HITL, every N nodes, on error),
//!   TTL, and auto-cleanup, with DEFAULT / AGGRESSIVE / MINIMAL / DISABLED
//!   presets.
//!
//! ## Lifecycle
//!
//! ```text
//! runner hits HumanNode ──► message WAITING
//!                               │
//!                        Checkpoint::from_message
//!                               │ expiresAt = now + ttl
//!                               ▼
//!                         store.save(cp) ──► indexes: runId, graphId
//!                               ⋮
//!                         (process may restart)
//!                               ⋮
//!                         store.load(id) ── expired? ──► CheckpointExpired
//!                               │
//!                               ▼
//!                   reconstructed message resumes at cp.currentNodeId
//! ```
//!
//! A checkpoint is either present in the primary store and both indexes or
//! absent from all three; deletion is atomic across them. Expiration is
//! checked lazily on access; [`InMemoryCheckpointStore::delete_expired`]
//! offers best-effort eviction for the reference store.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod memory;
pub mod serializer;
pub mod store;

pub use checkpoint::{Checkpoint, ExecutionState};
pub use config::CheckpointConfig;
pub use error::{CheckpointError, Result};
pub use memory::InMemoryCheckpointStore;
pub use serializer::{CheckpointSerializer, JsonSerializer};
pub use store::CheckpointStore;
