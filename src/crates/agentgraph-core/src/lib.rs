//! # agentgraph-core - Graph execution for multi-agent orchestration
//!
//! The execution core of agentgraph: a directed-graph runner that drives an
//! immutable message through agent, tool, decision, and human nodes, with
//! pluggable decision routing, retry classification, and checkpoint-backed
//! human-in-the-loop pauses.
//!
//! ## Overview
//!
//! - **[`GraphRunner`]** - Walks nodes sequentially per run, applies retries,
//!   resolves edges, persists WAITING runs, and resumes them from checkpoints.
//! - **[`Graph`]** / **[`Node`]** - A validated node registry with one entry
//!   point; nodes are a tagged enum over agent, tool, decision, and human
//!   variants.
//! - **[`DecisionEngine`]** / **[`DecisionResult`]** - Pluggable evaluators
//!   producing typed routing decisions, composable through [`engine`]
//!   combinators.
//! - **[`RetryPolicy`]** - Jittered exponential backoff with a pluggable
//!   [`RetryClassifier`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use agentgraph_core::{engine, DecisionResult, Graph, GraphRunner, Node};
//! use agentgraph_message::Message;
//! use std::collections::HashMap;
//!
//! let graph = Graph::builder("approval")
//!     .add_node("classify", Node::agent(classifier))
//!     .add_node(
//!         "gate",
//!         Node::decision(
//!             engine::from_data("risk", risk_routes(), DecisionResult::uncertain()),
//!             HashMap::from([
//!                 ("YES".to_string(), "approve".to_string()),
//!                 ("NO".to_string(), "reject".to_string()),
//!             ]),
//!             Some("manual".to_string()),
//!         ),
//!     )
//!     .add_node("approve", Node::agent(approver))
//!     .add_node("reject", Node::agent(rejecter))
//!     .add_node("manual", Node::human_confirmation("Approve this?", None))
//!     .add_edge("classify", "gate")
//!     .entry_point("classify")
//!     .build()?;
//!
//! let runner = GraphRunner::new();
//! let result = runner.execute(&graph, Message::text("user", "review order 42")).await?;
//! ```
//!
//! ## Human-in-the-loop
//!
//! A human node emits a `request_user_*` tool call and moves the message to
//! WAITING; [`GraphRunner::execute_with_checkpoint`] persists the pause and
//! returns to the caller. Later - possibly after a process restart -
//! [`GraphRunner::resume_from_checkpoint`] restores the message, merges the
//! user's `user_response` tool call, and re-enters the loop where the run
//! left off.
//!
//! ## Concurrency
//!
//! One run executes strictly sequentially; separate runs execute
//! concurrently. Stores, engines, and handlers are shared and must be
//! `Send + Sync`; messages are immutable, so passing them between tasks is
//! safe by construction. There is no global mutable state in this crate.

pub mod decision;
pub mod engine;
pub mod error;
pub mod graph;
pub mod listener;
pub mod node;
pub mod retry;
pub mod runner;

pub use decision::{DecisionKind, DecisionResult};
pub use engine::DecisionEngine;
pub use error::{GraphError, Result};
pub use graph::{Edge, Graph, GraphBuilder, NodeId};
pub use listener::{
    DecisionListener, NoopDecisionListener, NoopRunnerListener, RunnerListener, ToolCallCompleted,
};
pub use node::{
    AgentHandler, HumanInteraction, Node, NodeContext, NodeOutput, ParamProjection, RouteHint,
    ToolHandler,
};
pub use retry::{DefaultRetryClassifier, RetryClassifier, RetryPolicy};
pub use runner::{CancelHandle, GraphRunner};

// Re-export the sibling crates' surface so callers depend on one crate.
pub use agentgraph_checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointError, CheckpointSerializer, CheckpointStore,
    ExecutionState, InMemoryCheckpointStore, JsonSerializer,
};
pub use agentgraph_message::{
    parse_user_response, AgentContext, Message, MessageState, MessageStats, MessageType,
    SelectionItem, SelectionTemplate, SelectionType, StateTransition, ToolCall, TransitionError,
    UserResponse,
};
