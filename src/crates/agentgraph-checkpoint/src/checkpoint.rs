//! Checkpoint data structures
//!
//! A [`Checkpoint`] is a snapshot of one run at a pause point: the full
//! message, the node it stopped on, the HITL tool call the run is waiting
//! for, and an optional expiry. Checkpoints are created from a WAITING
//! message with [`Checkpoint::from_message`]; the failure and periodic-save
//! paths use [`Checkpoint::from_failed_message`] and
//! [`Checkpoint::running_snapshot`].
//!
//! Checkpoint ids follow the grammar `cp_<epochMillis>_<random below 1000000>`.
//! Expiration is inclusive: a checkpoint whose `expires_at` equals the
//! current instant is already expired.

use crate::error::{CheckpointError, Result};
use agentgraph_message::{Message, MessageState, ToolCall};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Graph-level execution state recorded on a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    /// Run was executing when the snapshot was taken
    Running,
    /// Run is paused on a HITL request
    WaitingForHuman,
    /// Run finished successfully
    Completed,
    /// Run failed
    Failed,
    /// Run was cancelled by the caller
    Cancelled,
}

/// Metadata key tracking which response tool calls have already been
/// processed by a resume; drives at-most-once event emission.
pub const PROCESSED_RESPONSE_IDS_KEY: &str = "processedResponseIds";

/// Durable snapshot of a run at a pause point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Unique id: `cp_<epochMillis>_<rand>`
    pub id: String,

    /// Run this checkpoint belongs to
    pub run_id: String,

    /// Graph the run is executing
    pub graph_id: String,

    /// Node the run paused on
    pub current_node_id: String,

    /// Arbitrary nested snapshot state
    #[serde(default)]
    pub state: HashMap<String, Value>,

    /// Arbitrary nested bookkeeping (audit, dedup markers)
    #[serde(default)]
    pub metadata: HashMap<String, Value>,

    /// The full message at the pause point
    pub message: Option<Message>,

    /// Graph-level execution state
    pub execution_state: ExecutionState,

    /// The HITL request the run is waiting on, if any
    pub pending_tool_call: Option<ToolCall>,

    /// The user's response, set only after a resume delivered one
    pub response_tool_call: Option<ToolCall>,

    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,

    /// Lazy expiry; `None` never expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    /// Generate a fresh checkpoint id
    pub fn generate_id() -> String {
        let millis = Utc::now().timestamp_millis();
        let suffix = rand::thread_rng().gen_range(0..1_000_000u32);
        format!("cp_{millis}_{suffix}")
    }

    /// Capture a WAITING message as a checkpoint
    ///
    /// The pending tool call is the most recent `request_user_*` call on the
    /// message. Fails when the message is not WAITING, has no `node_id`, or
    /// is missing its run/graph context.
    pub fn from_message(message: &Message) -> Result<Self> {
        if message.state != MessageState::Waiting {
            return Err(CheckpointError::Invalid(format!(
                "expected a WAITING message, got {}",
                message.state
            )));
        }
        Self::snapshot(message, ExecutionState::WaitingForHuman)
    }

    /// Capture a FAILED message for post-mortem resume/inspection
    pub fn from_failed_message(message: &Message) -> Result<Self> {
        Self::snapshot(message, ExecutionState::Failed)
    }

    /// Capture an in-flight RUNNING message (periodic saves)
    pub fn running_snapshot(message: &Message) -> Result<Self> {
        Self::snapshot(message, ExecutionState::Running)
    }

    fn snapshot(message: &Message, execution_state: ExecutionState) -> Result<Self> {
        let current_node_id = message
            .node_id
            .clone()
            .ok_or_else(|| CheckpointError::Invalid("message has no node_id".to_string()))?;
        let run_id = message
            .run_id
            .clone()
            .ok_or_else(|| CheckpointError::Invalid("message has no run_id".to_string()))?;
        let graph_id = message
            .graph_id
            .clone()
            .ok_or_else(|| CheckpointError::Invalid("message has no graph_id".to_string()))?;

        Ok(Self {
            id: Self::generate_id(),
            run_id,
            graph_id,
            current_node_id,
            state: HashMap::new(),
            metadata: HashMap::new(),
            message: Some(message.clone()),
            execution_state,
            pending_tool_call: message.last_hitl_request().cloned(),
            response_tool_call: None,
            timestamp: Utc::now(),
            expires_at: None,
        })
    }

    /// Set expiry to `timestamp + ttl`
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.expires_at = Some(self.timestamp + ttl);
        self
    }

    /// Set an absolute expiry
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Add a snapshot state entry
    pub fn with_state_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.state.insert(key.into(), value);
        self
    }

    /// Add a metadata entry
    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Record the user's response tool call after a resume
    pub fn with_response_tool_call(mut self, response: ToolCall) -> Self {
        self.response_tool_call = Some(response);
        self
    }

    /// Whether the checkpoint has expired; the boundary instant counts as
    /// expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Expiry check against an explicit clock
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }

    /// Response tool call ids already processed by a resume
    pub fn processed_response_ids(&self) -> Vec<String> {
        self.metadata
            .get(PROCESSED_RESPONSE_IDS_KEY)
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Mark a response tool call id as processed (idempotent)
    pub fn mark_response_processed(mut self, response_id: &str) -> Self {
        let mut ids = self.processed_response_ids();
        if !ids.iter().any(|id| id == response_id) {
            ids.push(response_id.to_string());
        }
        self.metadata.insert(
            PROCESSED_RESPONSE_IDS_KEY.to_string(),
            Value::Array(ids.into_iter().map(Value::String).collect()),
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentgraph_message::{SelectionItem, SelectionType};

    fn waiting_message() -> Message {
        Message::text("user", "Start workflow")
            .with_graph_id("g1")
            .with_run_id("r1")
            .transition_to(MessageState::Running, None, None)
            .unwrap()
            .transition_to(
                MessageState::Waiting,
                Some("HITL required".into()),
                Some("select".into()),
            )
            .unwrap()
    }

    #[test]
    fn test_from_message_captures_context() {
        let msg = waiting_message().with_tool_call(ToolCall::request_input("name?"));
        let cp = Checkpoint::from_message(&msg).unwrap();

        assert_eq!(cp.run_id, "r1");
        assert_eq!(cp.graph_id, "g1");
        assert_eq!(cp.current_node_id, "select");
        assert_eq!(cp.execution_state, ExecutionState::WaitingForHuman);
        assert_eq!(cp.message.as_ref().unwrap().id, msg.id);
        assert_eq!(
            cp.pending_tool_call.as_ref().unwrap().function_name(),
            agentgraph_message::FN_REQUEST_USER_INPUT
        );
        assert!(cp.response_tool_call.is_none());
    }

    #[test]
    fn test_id_grammar() {
        let id = Checkpoint::generate_id();
        let parts: Vec<&str> = id.split('_').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "cp");
        assert!(parts[1].parse::<i64>().unwrap() > 0);
        assert!(parts[2].parse::<u32>().unwrap() < 1_000_000);
    }

    #[test]
    fn test_waiting_without_node_is_rejected() {
        let mut msg = waiting_message();
        msg.node_id = None;

        let err = Checkpoint::from_message(&msg).unwrap_err();
        assert!(matches!(err, CheckpointError::Invalid(_)));
    }

    #[test]
    fn test_non_waiting_message_is_rejected() {
        let msg = Message::text("user", "hi")
            .with_graph_id("g1")
            .with_run_id("r1")
            .with_node_id("n1");

        assert!(Checkpoint::from_message(&msg).is_err());
    }

    #[test]
    fn test_pending_tool_call_is_most_recent_request() {
        let msg = waiting_message()
            .with_tool_call(ToolCall::request_input("old"))
            .with_tool_call(ToolCall::request_selection(
                vec![SelectionItem::new("a", "A")],
                "new",
                SelectionType::Single,
            ));

        let cp = Checkpoint::from_message(&msg).unwrap();
        assert_eq!(
            cp.pending_tool_call.unwrap().function_name(),
            agentgraph_message::FN_REQUEST_USER_SELECTION
        );
    }

    #[test]
    fn test_expiry_is_inclusive() {
        let cp = Checkpoint::from_message(&waiting_message()).unwrap();
        let boundary = Utc::now();
        let cp = cp.with_expires_at(boundary);

        assert!(cp.is_expired_at(boundary));
        assert!(cp.is_expired_at(boundary + Duration::seconds(1)));
        assert!(!cp.is_expired_at(boundary - Duration::seconds(1)));
    }

    #[test]
    fn test_epoch_expiry_is_expired_now() {
        let cp = Checkpoint::from_message(&waiting_message())
            .unwrap()
            .with_expires_at(DateTime::<Utc>::from_timestamp(0, 0).unwrap());

        assert!(cp.is_expired());
    }

    #[test]
    fn test_no_expiry_never_expires() {
        let cp = Checkpoint::from_message(&waiting_message()).unwrap();
        assert!(!cp.is_expired());
    }

    #[test]
    fn test_ttl_is_relative_to_snapshot_time() {
        let cp = Checkpoint::from_message(&waiting_message())
            .unwrap()
            .with_ttl(Duration::hours(24));

        assert_eq!(cp.expires_at.unwrap(), cp.timestamp + Duration::hours(24));
    }

    #[test]
    fn test_processed_response_ids_round_trip() {
        let cp = Checkpoint::from_message(&waiting_message()).unwrap();
        assert!(cp.processed_response_ids().is_empty());

        let cp = cp.mark_response_processed("resp-1");
        let cp = cp.mark_response_processed("resp-1");
        let cp = cp.mark_response_processed("resp-2");

        assert_eq!(cp.processed_response_ids(), vec!["resp-1", "resp-2"]);
    }
}
