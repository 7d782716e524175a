//! Immutable execution messages and their state machine
//!
//! A [`Message`] is the unit of work a graph run drives forward. It is
//! immutable: every mutation goes through a `with_*` builder or
//! [`Message::transition_to`] and returns a new value. State changes append a
//! [`StateTransition`] to the append-only `state_history`, which is the sole
//! record of what happened to the run and when.
//!
//! # Allowed transitions
//!
//! | From | To |
//! |------|----|
//! | READY | RUNNING |
//! | RUNNING | WAITING, COMPLETED, FAILED |
//! | WAITING | RUNNING, FAILED |
//! | COMPLETED, FAILED | (terminal) |
//!
//! Transition timestamps are assigned here, never by the caller, so history
//! timestamps are monotonic non-decreasing within a run.

use crate::context::AgentContext;
use crate::error::TransitionError;
use crate::tool_call::ToolCall;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Lifecycle state of an in-flight execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageState {
    /// Created, not yet picked up by a runner
    Ready,
    /// A runner is walking nodes for this message
    Running,
    /// Suspended awaiting external input (HITL)
    Waiting,
    /// Terminal success
    Completed,
    /// Terminal failure
    Failed,
}

impl MessageState {
    /// Whether the state machine permits a transition to `target`
    pub fn can_transition_to(&self, target: MessageState) -> bool {
        use MessageState::*;
        matches!(
            (self, target),
            (Ready, Running)
                | (Running, Waiting)
                | (Running, Completed)
                | (Running, Failed)
                | (Waiting, Running)
                | (Waiting, Failed)
        )
    }

    /// Whether this state admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageState::Completed | MessageState::Failed)
    }
}

impl std::fmt::Display for MessageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageState::Ready => "READY",
            MessageState::Running => "RUNNING",
            MessageState::Waiting => "WAITING",
            MessageState::Completed => "COMPLETED",
            MessageState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Payload classification of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Text,
    ToolCall,
    ToolResult,
    System,
    Error,
}

/// One recorded state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTransition {
    /// State before the transition
    pub from: MessageState,

    /// State after the transition
    pub to: MessageState,

    /// When the transition happened (assigned by the state machine)
    pub timestamp: DateTime<Utc>,

    /// Why the transition happened
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Node the message was at, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

/// Aggregate timing derived from a message's state history
#[derive(Debug, Clone, PartialEq)]
pub struct MessageStats {
    /// First transition timestamp to now
    pub total_duration: chrono::Duration,

    /// Time spent in RUNNING
    pub running_time: chrono::Duration,

    /// Time spent in WAITING
    pub waiting_time: chrono::Duration,

    /// Number of recorded transitions
    pub transition_count: usize,

    /// Reason of the last transition into FAILED, when currently failed
    pub failure_reason: Option<String>,
}

/// The unit of work driven through a graph
///
/// Messages are immutable; builders return new values. Cloning is cheap
/// enough for the short-lived per-run history this core keeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Opaque unique id
    pub id: String,

    /// Origin actor id
    pub from: String,

    /// Primary text payload
    pub content: String,

    /// Payload classification
    #[serde(rename = "type")]
    pub message_type: MessageType,

    /// Arbitrary structured payload; nested maps and ordered sequences survive
    /// checkpoint round-trips
    #[serde(default)]
    pub data: HashMap<String, Value>,

    /// Tracing and tenant-scoping metadata
    #[serde(default)]
    pub metadata: HashMap<String, Value>,

    /// Ordered tool calls recorded on this message
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    /// Current lifecycle state
    pub state: MessageState,

    /// Append-only transition history
    #[serde(default)]
    pub state_history: Vec<StateTransition>,

    /// Graph this message is executing in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_id: Option<String>,

    /// Node the message is currently at (required while WAITING)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,

    /// Stable id of this execution, assigned once per run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// Optional tenant/user/session/correlation carrier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_context: Option<AgentContext>,
}

impl Message {
    /// Create a READY text message
    pub fn text(from: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from: from.into(),
            content: content.into(),
            message_type: MessageType::Text,
            data: HashMap::new(),
            metadata: HashMap::new(),
            tool_calls: Vec::new(),
            state: MessageState::Ready,
            state_history: Vec::new(),
            graph_id: None,
            node_id: None,
            run_id: None,
            agent_context: None,
        }
    }

    /// Create a READY system message
    pub fn system(content: impl Into<String>) -> Self {
        let mut msg = Self::text("system", content);
        msg.message_type = MessageType::System;
        msg
    }

    /// Create a READY error message
    pub fn error(content: impl Into<String>) -> Self {
        let mut msg = Self::text("system", content);
        msg.message_type = MessageType::Error;
        msg
    }

    /// Reply to this message: new id and content, same graph context,
    /// metadata, and agent context
    pub fn reply(&self, from: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from: from.into(),
            content: content.into(),
            message_type: MessageType::Text,
            data: self.data.clone(),
            metadata: self.metadata.clone(),
            tool_calls: self.tool_calls.clone(),
            state: self.state,
            state_history: self.state_history.clone(),
            graph_id: self.graph_id.clone(),
            node_id: self.node_id.clone(),
            run_id: self.run_id.clone(),
            agent_context: self.agent_context.clone(),
        }
    }

    /// Set the message type
    pub fn with_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    /// Replace the content
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Add one data entry
    pub fn with_data_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Replace the whole data map
    pub fn with_data(mut self, data: HashMap<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Add one metadata entry
    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Append a tool call
    pub fn with_tool_call(mut self, tool_call: ToolCall) -> Self {
        self.tool_calls.push(tool_call);
        self
    }

    /// Append several tool calls, preserving order
    pub fn with_tool_calls(mut self, tool_calls: impl IntoIterator<Item = ToolCall>) -> Self {
        self.tool_calls.extend(tool_calls);
        self
    }

    /// Set the graph id
    pub fn with_graph_id(mut self, graph_id: impl Into<String>) -> Self {
        self.graph_id = Some(graph_id.into());
        self
    }

    /// Set the current node id
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    /// Set the run id
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Attach an agent context
    pub fn with_agent_context(mut self, context: AgentContext) -> Self {
        self.agent_context = Some(context);
        self
    }

    /// Transition to `target`, appending one history entry
    ///
    /// Fails with [`TransitionError::InvalidTransition`] when the state
    /// machine forbids the move. The transition timestamp is assigned here.
    pub fn transition_to(
        &self,
        target: MessageState,
        reason: Option<String>,
        node_id: Option<String>,
    ) -> Result<Self, TransitionError> {
        if !self.state.can_transition_to(target) {
            return Err(TransitionError::InvalidTransition {
                from: self.state,
                to: target,
            });
        }

        let node_id = node_id.or_else(|| self.node_id.clone());
        if target == MessageState::Waiting && node_id.is_none() {
            return Err(TransitionError::WaitingWithoutNode);
        }

        let mut next = self.clone();
        next.state_history.push(StateTransition {
            from: self.state,
            to: target,
            timestamp: Utc::now(),
            reason,
            node_id: node_id.clone(),
        });
        next.state = target;
        if let Some(node_id) = node_id {
            next.node_id = Some(node_id);
        }
        Ok(next)
    }

    /// The most recent `request_user_*` tool call, if any
    ///
    /// "Most recent" is by position in `tool_calls`, which handles retry
    /// loops where several pending requests accumulate.
    pub fn last_hitl_request(&self) -> Option<&ToolCall> {
        self.tool_calls.iter().rev().find(|call| call.is_hitl_request())
    }

    /// Whether this message is paused on an unanswered HITL request
    ///
    /// True when the latest HITL-relevant tool call is a request rather than
    /// a `user_response`.
    pub fn is_pending_hitl(&self) -> bool {
        self.tool_calls
            .iter()
            .rev()
            .find(|call| call.is_hitl_request() || call.is_user_response())
            .map(|call| call.is_hitl_request())
            .unwrap_or(false)
    }

    /// Derive timing statistics from the state history
    pub fn stats(&self) -> MessageStats {
        self.stats_at(Utc::now())
    }

    fn stats_at(&self, now: DateTime<Utc>) -> MessageStats {
        let total_duration = self
            .state_history
            .first()
            .map(|first| now - first.timestamp)
            .unwrap_or_else(chrono::Duration::zero);

        let mut running_time = chrono::Duration::zero();
        let mut waiting_time = chrono::Duration::zero();
        for (index, transition) in self.state_history.iter().enumerate() {
            let end = self
                .state_history
                .get(index + 1)
                .map(|next| next.timestamp)
                .unwrap_or(now);
            let span = end - transition.timestamp;
            match transition.to {
                MessageState::Running => running_time = running_time + span,
                MessageState::Waiting => waiting_time = waiting_time + span,
                _ => {}
            }
        }

        let failure_reason = if self.state == MessageState::Failed {
            self.state_history
                .iter()
                .rev()
                .find(|t| t.to == MessageState::Failed)
                .and_then(|t| t.reason.clone())
        } else {
            None
        };

        MessageStats {
            total_duration,
            running_time,
            waiting_time,
            transition_count: self.state_history.len(),
            failure_reason,
        }
    }
}
