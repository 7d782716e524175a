//! # agentgraph-message - Execution messages and the HITL tool-call protocol
//!
//! This crate defines the unit of work that flows through an agentgraph
//! execution: the immutable [`Message`], its [`MessageState`] lifecycle, and
//! the [`ToolCall`] records that carry human-in-the-loop (HITL) requests and
//! responses between a paused run and its caller.
//!
//! ## Overview
//!
//! - **[`Message`]** - Immutable record carrying content, arbitrary `data` and
//!   `metadata` maps, tool calls, and graph context (`graph_id`, `node_id`,
//!   `run_id`). Every mutation produces a new value via `with_*` builders.
//! - **[`MessageState`]** - READY → RUNNING → WAITING/COMPLETED/FAILED state
//!   machine. Transitions are validated; each successful transition appends a
//!   [`StateTransition`] to the append-only history.
//! - **[`AgentContext`]** - Immutable tenant/user/session/correlation carrier,
//!   propagated by copy through every node and checkpoint round-trip.
//! - **[`ToolCall`]** - `{id, type: "function", function: {name, arguments}}`
//!   records, with well-known constructors for the three `request_user_*`
//!   HITL functions and the `user_response` reply.
//! - **[`UserResponse`]** - Normalized parse of a `user_response` tool call
//!   (text, single/multi selection, or quantities).
//!
//! ## State machine
//!
//! ```text
//! READY ──► RUNNING ──► COMPLETED
//!              │ ▲
//!              ▼ │
//!           WAITING ──► FAILED ◄── RUNNING
//! ```
//!
//! COMPLETED and FAILED are terminal. A WAITING message always carries the
//! `node_id` it paused on, which is what allows a checkpoint to resume it.
//!
//! ## Quick Start
//!
//! ```rust
//! use agentgraph_message::{Message, MessageState};
//!
//! let msg = Message::text("user", "Start workflow");
//! let running = msg
//!     .transition_to(MessageState::Running, Some("picked up".to_string()), None)
//!     .unwrap();
//!
//! assert_eq!(running.state, MessageState::Running);
//! assert_eq!(running.state_history.len(), 1);
//! ```

pub mod context;
pub mod error;
pub mod message;
pub mod response;
pub mod tool_call;

pub use context::AgentContext;
pub use error::TransitionError;
pub use message::{Message, MessageState, MessageStats, MessageType, StateTransition};
pub use response::{parse_user_response, SelectionTemplate, UserResponse};
pub use tool_call::{
    FunctionCall, SelectionItem, SelectionType, ToolCall, FN_REQUEST_USER_CONFIRMATION,
    FN_REQUEST_USER_INPUT, FN_REQUEST_USER_SELECTION, FN_USER_RESPONSE,
};
