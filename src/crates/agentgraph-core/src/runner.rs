//! The graph runner
//!
//! [`GraphRunner`] walks a message through a graph: it dispatches nodes,
//! applies retry classification, resolves edges, and - through the
//! checkpoint-aware entry points - persists WAITING runs and resumes them
//! with user responses.
//!
//! # Execution model
//!
//! One run is a strictly sequential walk; the runner never executes two
//! nodes of the same run in parallel. Different runs execute concurrently
//! against shared stores and engines. Within the loop the runner suspends at
//! node handlers, store operations, and retry sleeps; a WAITING message ends
//! the invocation and control returns to the caller until resume.
//!
//! ```text
//! execute(graph, message)
//!   READY → RUNNING, assign runId, attach graphId
//!   loop:
//!     node = graph[current]          (NodeNotFound)
//!     out  = node.run(ctx)           (retry policy on failure)
//!     WAITING?  → return             (caller checkpoints / resumes later)
//!     next = hint | edges[current]   (RoutingError when only guards and
//!     none?  → COMPLETED              no decision is recorded)
//! ```
//!
//! # Checkpointed execution
//!
//! [`GraphRunner::execute_with_checkpoint`] saves on HITL pauses, optionally
//! every N nodes and on errors, and cleans up a run's checkpoints on
//! terminal success. [`GraphRunner::resume_from_checkpoint`] restores the
//! message, merges the user response, persists an audit copy carrying the
//! response tool call, and emits [`ToolCallCompleted`] at most once per
//! response id before re-entering the loop.

use crate::error::{GraphError, Result};
use crate::graph::{Edge, Graph};
use crate::listener::{NoopRunnerListener, RunnerListener, ToolCallCompleted};
use crate::node::{NodeContext, RouteHint};
use crate::retry::{DefaultRetryClassifier, RetryClassifier, RetryPolicy};
use agentgraph_checkpoint::{Checkpoint, CheckpointConfig, CheckpointError, CheckpointStore};
use agentgraph_message::{Message, MessageState, TransitionError};
use chrono::Utc;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Cooperative cancellation flag, observed at the top of the node loop
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Create an un-cancelled handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; takes effect at the next suspension point
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Walks messages through graphs
///
/// A runner is cheap to build; give each run its own when per-run
/// cancellation is needed.
#[derive(Clone)]
pub struct GraphRunner {
    retry_policy: RetryPolicy,
    classifier: Arc<dyn RetryClassifier>,
    listener: Arc<dyn RunnerListener>,
    max_steps: u32,
    cancel: Option<CancelHandle>,
}

impl Default for GraphRunner {
    fn default() -> Self {
        Self::new()
    }
}

enum RunOutcome {
    Complete(Message),
    Waiting(Message),
    Failed { message: Message, error: GraphError },
    Aborted(GraphError),
}

struct PeriodicSave<'a> {
    store: &'a dyn CheckpointStore,
    every: u32,
    ttl: chrono::Duration,
    executed: u32,
}

impl PeriodicSave<'_> {
    async fn after_node(&mut self, message: &Message) -> Result<()> {
        self.executed += 1;
        if self.executed % self.every == 0 && message.state == MessageState::Running {
            let checkpoint = Checkpoint::running_snapshot(message)?.with_ttl(self.ttl);
            self.store.save(checkpoint).await?;
        }
        Ok(())
    }
}

impl GraphRunner {
    /// Runner with default retry policy and no listener
    pub fn new() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            classifier: Arc::new(DefaultRetryClassifier),
            listener: Arc::new(NoopRunnerListener),
            max_steps: 100,
            cancel: None,
        }
    }

    /// Set the retry policy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set the retry classifier
    pub fn with_classifier(mut self, classifier: Arc<dyn RetryClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Set the runner listener
    pub fn with_listener(mut self, listener: Arc<dyn RunnerListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Cap the number of node executions per invocation
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Attach a cancellation handle
    pub fn with_cancel_handle(mut self, handle: CancelHandle) -> Self {
        self.cancel = Some(handle);
        self
    }

    /// Execute a graph to completion, WAITING, or failure
    ///
    /// The message must be READY or RUNNING. A READY message transitions to
    /// RUNNING and receives a `run_id` when it has none. Returns the final
    /// message on terminal success or on WAITING; failures are returned as
    /// errors after the message transitioned to FAILED.
    #[tracing::instrument(skip_all, fields(graph = %graph.id))]
    pub async fn execute(&self, graph: &Graph, message: Message) -> Result<Message> {
        match self.execute_outcome(graph, message, None).await {
            RunOutcome::Complete(message) | RunOutcome::Waiting(message) => Ok(message),
            RunOutcome::Failed { error, .. } => Err(error),
            RunOutcome::Aborted(error) => Err(error),
        }
    }

    /// Re-enter a run with a reconstructed message
    ///
    /// A WAITING message transitions to RUNNING first; a RUNNING message
    /// enters the loop as-is. Resuming a terminal message fails with
    /// `InvalidTransition` and leaves the message unchanged.
    pub async fn resume(&self, graph: &Graph, message: Message) -> Result<Message> {
        match message.state {
            MessageState::Waiting => {
                let message = message.transition_to(
                    MessageState::Running,
                    Some("Resuming from checkpoint".to_string()),
                    None,
                )?;
                self.execute(graph, message).await
            }
            MessageState::Running => self.execute(graph, message).await,
            MessageState::Ready => Err(GraphError::Validation(
                "resume requires a message that has started execution".to_string(),
            )),
            state => Err(TransitionError::InvalidTransition {
                from: state,
                to: MessageState::Running,
            }
            .into()),
        }
    }

    /// Execute with checkpoint persistence per `config`
    pub async fn execute_with_checkpoint(
        &self,
        graph: &Graph,
        message: Message,
        store: &dyn CheckpointStore,
        config: &CheckpointConfig,
    ) -> Result<Message> {
        let periodic = config
            .save_every_n_nodes
            .filter(|every| *every > 0)
            .map(|every| PeriodicSave {
                store,
                every,
                ttl: config.ttl,
                executed: 0,
            });
        let outcome = self.execute_outcome(graph, message, periodic).await;
        self.settle(graph, outcome, store, config).await
    }

    /// Load a checkpoint, merge the optional user response, and resume
    ///
    /// Expired checkpoints fail with `CheckpointExpired`. When the response
    /// carries a `user_response` tool call, an updated checkpoint copy with
    /// `response_tool_call` set is persisted for audit and a
    /// [`ToolCallCompleted`] event is emitted - at most once per response
    /// tool-call id, across repeated resumes.
    pub async fn resume_from_checkpoint(
        &self,
        graph: &Graph,
        checkpoint_id: &str,
        user_response: Option<&Message>,
        store: &dyn CheckpointStore,
        config: &CheckpointConfig,
    ) -> Result<Message> {
        let checkpoint = store.load(checkpoint_id).await?;
        if checkpoint.is_expired() {
            return Err(CheckpointError::Expired {
                checkpoint_id: checkpoint_id.to_string(),
            }
            .into());
        }

        let mut message = checkpoint.message.clone().ok_or_else(|| {
            CheckpointError::Invalid(format!("checkpoint '{checkpoint_id}' has no message"))
        })?;

        let mut response_call = None;
        if let Some(response) = user_response {
            response_call = response
                .tool_calls
                .iter()
                .find(|call| call.is_user_response())
                .cloned();
            match &response_call {
                Some(call) => {
                    if let Some(text) = call.argument("text").and_then(Value::as_str) {
                        message = message
                            .with_data_entry("response_text", Value::String(text.to_string()));
                    }
                    if let Some(option) = call
                        .argument("structured_data")
                        .and_then(|sd| sd.get("selected_option"))
                        .and_then(Value::as_str)
                    {
                        message = message
                            .with_data_entry("selected_option", Value::String(option.to_string()));
                    }
                    let preserved =
                        serde_json::to_value(call).map_err(CheckpointError::Serialization)?;
                    message = message.with_data_entry("user_response_tool_call", preserved);
                }
                None => {
                    message = message
                        .with_data_entry("response_text", Value::String(response.content.clone()));
                }
            }
            message = message.with_tool_calls(response.tool_calls.iter().cloned());
        }

        let reason = if user_response.is_some() {
            "Resuming after user response"
        } else {
            "Resuming from checkpoint"
        };
        let message = match message.state {
            MessageState::Waiting => {
                message.transition_to(MessageState::Running, Some(reason.to_string()), None)?
            }
            MessageState::Running => message,
            state => {
                return Err(TransitionError::InvalidTransition {
                    from: state,
                    to: MessageState::Running,
                }
                .into())
            }
        };

        if let Some(call) = response_call {
            let already_processed = checkpoint
                .processed_response_ids()
                .iter()
                .any(|id| id == &call.id);
            let audit = checkpoint
                .clone()
                .with_response_tool_call(call.clone())
                .mark_response_processed(&call.id);
            store.save(audit).await?;

            if already_processed {
                tracing::debug!(
                    response = %call.id,
                    "Response already processed, skipping completion event"
                );
            } else if let Some(pending) = checkpoint.pending_tool_call.clone() {
                let correlation = message
                    .agent_context
                    .as_ref()
                    .map(|ctx| ctx.to_parameters())
                    .unwrap_or_default();
                let event = ToolCallCompleted {
                    original_event_id: pending.id.clone(),
                    pending_tool_call: pending,
                    response_tool_call: call,
                    duration: Utc::now() - checkpoint.timestamp,
                    run_id: checkpoint.run_id.clone(),
                    graph_id: checkpoint.graph_id.clone(),
                    node_id: checkpoint.current_node_id.clone(),
                    correlation,
                };
                tracing::info!(
                    original = %event.original_event_id,
                    run = %event.run_id,
                    "Tool call completed"
                );
                self.listener.on_tool_call_completed(&event);
            }
        }

        self.execute_with_checkpoint(graph, message, store, config).await
    }

    async fn execute_outcome(
        &self,
        graph: &Graph,
        message: Message,
        periodic: Option<PeriodicSave<'_>>,
    ) -> RunOutcome {
        let message = match self.prepare(graph, message) {
            Ok(message) => message,
            Err(error) => return RunOutcome::Aborted(error),
        };
        self.run_loop(graph, message, periodic).await
    }

    fn prepare(&self, graph: &Graph, message: Message) -> Result<Message> {
        let mut message = match message.state {
            MessageState::Ready => message.transition_to(
                MessageState::Running,
                Some("Execution started".to_string()),
                None,
            )?,
            MessageState::Running => message,
            state => {
                return Err(GraphError::Validation(format!(
                    "execute requires a READY or RUNNING message, got {state}"
                )))
            }
        };
        if message.run_id.is_none() {
            message = message.with_run_id(Uuid::new_v4().to_string());
        }
        if message.graph_id.is_none() {
            message = message.with_graph_id(graph.id.clone());
        }
        Ok(message)
    }

    async fn run_loop(
        &self,
        graph: &Graph,
        mut message: Message,
        mut periodic: Option<PeriodicSave<'_>>,
    ) -> RunOutcome {
        let mut current = message
            .node_id
            .clone()
            .unwrap_or_else(|| graph.entry_point.clone());
        let mut steps = 0u32;

        loop {
            if let Some(cancel) = &self.cancel {
                if cancel.is_cancelled() {
                    return RunOutcome::Aborted(GraphError::Cancelled);
                }
            }

            steps += 1;
            if steps > self.max_steps {
                let error = GraphError::execution(
                    current.clone(),
                    format!("step limit of {} exceeded", self.max_steps),
                );
                return self.fail(message, &current, error);
            }

            let node = match graph.node(&current) {
                Some(node) => node,
                None => {
                    return RunOutcome::Aborted(GraphError::NodeNotFound { node_id: current })
                }
            };

            message = message.with_node_id(current.clone());
            tracing::debug!(node = %current, "Executing node");

            let output = {
                let mut attempts = 1u32;
                loop {
                    let ctx = NodeContext::new(message.clone(), graph.id.clone(), current.clone());
                    match node.run(ctx).await {
                        Ok(output) => break Ok(output),
                        Err(error) => {
                            let never_retry = matches!(
                                error,
                                GraphError::Routing { .. } | GraphError::Transition(_)
                            );
                            if !never_retry
                                && self.retry_policy.allows_retry(attempts)
                                && self.classifier.should_retry(&error)
                            {
                                let delay = self.retry_policy.delay_for_attempt(attempts);
                                tracing::warn!(
                                    node = %current,
                                    attempt = attempts,
                                    delay_ms = delay.as_millis() as u64,
                                    error = %error,
                                    "Node failed, retrying"
                                );
                                tokio::time::sleep(delay).await;
                                attempts += 1;
                            } else {
                                break Err(error);
                            }
                        }
                    }
                }
            };

            let output = match output {
                Ok(output) => output,
                Err(error @ GraphError::Routing { .. }) => return RunOutcome::Aborted(error),
                Err(error @ GraphError::Transition(_)) => return RunOutcome::Aborted(error),
                Err(error) => {
                    tracing::error!(node = %current, error = %error, "Node failed");
                    return self.fail(message, &current, error);
                }
            };

            message = output.message;

            if let Some(periodic) = periodic.as_mut() {
                if let Err(error) = periodic.after_node(&message).await {
                    return RunOutcome::Aborted(error);
                }
            }

            if message.state == MessageState::Waiting {
                tracing::info!(node = %current, run = ?message.run_id, "Run suspended awaiting input");
                return RunOutcome::Waiting(message);
            }

            let next = match output.route {
                RouteHint::Goto(target) => Some(target),
                RouteHint::Auto => match next_from_edges(graph, &current, &message) {
                    Ok(next) => next,
                    Err(error) => return RunOutcome::Aborted(error),
                },
            };

            match next {
                Some(next) => current = next,
                None => {
                    let completed = match message.transition_to(
                        MessageState::Completed,
                        Some("Execution completed".to_string()),
                        None,
                    ) {
                        Ok(completed) => completed,
                        Err(error) => return RunOutcome::Aborted(error.into()),
                    };
                    tracing::info!(run = ?completed.run_id, "Run completed");
                    return RunOutcome::Complete(completed);
                }
            }
        }
    }

    fn fail(&self, message: Message, node_id: &str, error: GraphError) -> RunOutcome {
        match message.transition_to(
            MessageState::Failed,
            Some(error.to_string()),
            Some(node_id.to_string()),
        ) {
            Ok(failed) => RunOutcome::Failed {
                message: failed,
                error,
            },
            Err(transition_error) => RunOutcome::Aborted(transition_error.into()),
        }
    }

    async fn settle(
        &self,
        graph: &Graph,
        outcome: RunOutcome,
        store: &dyn CheckpointStore,
        config: &CheckpointConfig,
    ) -> Result<Message> {
        match outcome {
            RunOutcome::Waiting(message) => {
                if config.save_on_hitl {
                    // a human node's own deadline overrides the configured TTL
                    let ttl = message
                        .node_id
                        .as_deref()
                        .and_then(|node_id| graph.node(node_id))
                        .and_then(|node| match node {
                            crate::node::Node::Human {
                                timeout: Some(timeout),
                                ..
                            } => Some(*timeout),
                            _ => None,
                        })
                        .unwrap_or(config.ttl);
                    let checkpoint = Checkpoint::from_message(&message)?.with_ttl(ttl);
                    let id = store.save(checkpoint).await?;
                    tracing::debug!(checkpoint = %id, "Saved HITL checkpoint");
                }
                Ok(message)
            }
            RunOutcome::Complete(message) => {
                if config.auto_cleanup {
                    if let Some(run_id) = &message.run_id {
                        let removed = store.delete_by_run(run_id).await?;
                        tracing::debug!(run = %run_id, removed, "Cleaned up checkpoints");
                    }
                }
                Ok(message)
            }
            RunOutcome::Failed { message, error } => {
                if config.save_on_error {
                    // best-effort: the execution error always wins over save errors
                    match Checkpoint::from_failed_message(&message) {
                        Ok(checkpoint) => {
                            if let Err(save_error) = store.save(checkpoint.with_ttl(config.ttl)).await
                            {
                                tracing::warn!(error = %save_error, "Failed to save error checkpoint");
                            }
                        }
                        Err(build_error) => {
                            tracing::warn!(error = %build_error, "Could not build error checkpoint");
                        }
                    }
                }
                Err(error)
            }
            RunOutcome::Aborted(error) => Err(error),
        }
    }
}

fn next_from_edges(graph: &Graph, current: &str, message: &Message) -> Result<Option<String>> {
    let edges = graph.successors(current);
    if edges.is_empty() {
        return Ok(None);
    }

    let recorded = message.data.get("_decisionResult").and_then(Value::as_str);

    if let Some(result_id) = recorded {
        let matched = edges.iter().find(
            |edge| matches!(edge, Edge::Guarded { result_id: guard, .. } if guard == result_id),
        );
        if let Some(edge) = matched {
            return Ok(Some(edge.target().to_string()));
        }
    }

    if let Some(direct) = edges.iter().find_map(|edge| match edge {
        Edge::Direct(target) => Some(target.clone()),
        Edge::Guarded { .. } => None,
    }) {
        return Ok(Some(direct));
    }

    let mut guards: Vec<String> = edges
        .iter()
        .filter_map(|edge| match edge {
            Edge::Guarded { result_id, .. } => Some(result_id.clone()),
            Edge::Direct(_) => None,
        })
        .collect();
    guards.sort();

    Err(GraphError::Routing {
        message: match recorded {
            Some(result_id) => format!(
                "node '{current}' has no guarded edge for decision result '{result_id}'"
            ),
            None => format!(
                "node '{current}' has only guarded edges and no decision has been recorded"
            ),
        },
        engine_id: None,
        result_id: recorded.map(str::to_string),
        node_id: Some(current.to_string()),
        available_targets: guards,
    })
}
