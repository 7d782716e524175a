//! Lifecycle listeners
//!
//! Optional observation hooks with no-op defaults. Decision listeners watch
//! individual decision-node executions; the runner listener observes the HITL
//! tool-call correlation event emitted on resume. Hooks must not fail; they
//! return nothing and the runner ignores whatever they do internally.

use crate::decision::DecisionResult;
use agentgraph_message::ToolCall;
use chrono::Duration;
use serde_json::Value;
use std::collections::HashMap;

/// Hooks around one decision-node execution
///
/// Emission order where applicable: `on_decision_start`, then exactly one of
/// `on_decision_complete` / `on_decision_error`, with `on_decision_fallback`
/// in between when the fallback target was used.
pub trait DecisionListener: Send + Sync {
    /// Evaluation is about to start
    fn on_decision_start(&self, _node_id: &str, _engine_id: &str) {}

    /// A target was resolved
    fn on_decision_complete(
        &self,
        _node_id: &str,
        _result: &DecisionResult,
        _target: &str,
        _elapsed_ms: u64,
    ) {
    }

    /// Evaluation failed or the result had no route
    fn on_decision_error(&self, _node_id: &str, _error: &str, _elapsed_ms: u64) {}

    /// The unmapped result was routed through the fallback target
    fn on_decision_fallback(&self, _node_id: &str, _result_id: &str, _fallback_target: &str) {}
}

/// Listener that observes nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDecisionListener;

impl DecisionListener for NoopDecisionListener {}

/// Correlation event emitted when a pending HITL request is answered
///
/// Emitted at most once per response tool call id, keyed by
/// `original_event_id`; a second resume with the same response re-persists
/// the checkpoint but does not re-emit.
#[derive(Debug, Clone)]
pub struct ToolCallCompleted {
    /// Id of the original pending request tool call
    pub original_event_id: String,

    /// The request the run was waiting on
    pub pending_tool_call: ToolCall,

    /// The user's response
    pub response_tool_call: ToolCall,

    /// Time from checkpoint capture to resume
    pub duration: Duration,

    /// Run the event belongs to
    pub run_id: String,

    /// Graph the run executes
    pub graph_id: String,

    /// Node the run paused on
    pub node_id: String,

    /// Correlation metadata (tenant/user/correlation identifiers)
    pub correlation: HashMap<String, Value>,
}

/// Hooks around runner-level events
pub trait RunnerListener: Send + Sync {
    /// A pending HITL request was answered and the run resumed
    fn on_tool_call_completed(&self, _event: &ToolCallCompleted) {}
}

/// Runner listener that observes nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRunnerListener;

impl RunnerListener for NoopRunnerListener {}
