//! Error types for graph construction and execution
//!
//! All errors implement `std::error::Error` via `thiserror`. Checkpoint and
//! state-machine errors from the sibling crates are wrapped with `#[from]`
//! so the runner's public API surfaces a single error type.
//!
//! # Propagation policy
//!
//! - Node handler errors go through the retry classifier first; once retries
//!   are exhausted (or the error is not retryable) the message transitions to
//!   FAILED and the error is returned.
//! - [`GraphError::Routing`] never retries and is returned as-is.
//! - [`GraphError::Transition`] is a programmer error; it aborts the run and
//!   is returned unwrapped.
//! - [`GraphError::Checkpoint`] never transitions the in-flight message; the
//!   original message state is preserved.

use agentgraph_checkpoint::CheckpointError;
use agentgraph_message::TransitionError;
use thiserror::Error;

/// Convenience result type using [`GraphError`]
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors for all graph operations
#[derive(Error, Debug)]
pub enum GraphError {
    /// Invalid input at an API boundary or invalid graph structure
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The graph references a node absent from its registry
    #[error("Node not found: {node_id}")]
    NodeNotFound {
        /// The missing node id
        node_id: String,
    },

    /// A node handler failed
    #[error("Execution failed{}: {message}", node_id.as_ref().map(|n| format!(" at node '{n}'")).unwrap_or_default())]
    Execution {
        /// What went wrong
        message: String,
        /// Node that failed, when known
        node_id: Option<String>,
    },

    /// A decision result had no mapping and no fallback
    #[error("Routing failed{}: {message}", node_id.as_ref().map(|n| format!(" at node '{n}'")).unwrap_or_default())]
    Routing {
        /// What went wrong
        message: String,
        /// Engine that produced the unroutable result
        engine_id: Option<String>,
        /// The result id that had no mapping
        result_id: Option<String>,
        /// Decision node involved
        node_id: Option<String>,
        /// The mappings that were available, sorted
        available_targets: Vec<String>,
    },

    /// Checkpoint save/load/delete failure, including expiry
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// State machine rule violation
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The run was cancelled by the caller
    #[error("Run cancelled")]
    Cancelled,
}

impl GraphError {
    /// Create a node execution error
    pub fn execution(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            node_id: Some(node_id.into()),
        }
    }

    /// Create an execution error without node context
    pub fn execution_untargeted(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            node_id: None,
        }
    }

    /// Create a routing error for an unmapped decision result
    pub fn unmapped_result(
        node_id: impl Into<String>,
        engine_id: impl Into<String>,
        result_id: impl Into<String>,
        mut available_targets: Vec<String>,
    ) -> Self {
        let result_id = result_id.into();
        available_targets.sort();
        Self::Routing {
            message: format!(
                "no mapping for decision result '{result_id}' and no fallback; available: [{}]",
                available_targets.join(", ")
            ),
            engine_id: Some(engine_id.into()),
            result_id: Some(result_id),
            node_id: Some(node_id.into()),
            available_targets,
        }
    }
}
