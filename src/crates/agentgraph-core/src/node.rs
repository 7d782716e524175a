//! Node variants and their execution contract
//!
//! A [`Node`] is one unit of execution within a graph. The four variants
//! share a single operation, [`Node::run`], which takes a [`NodeContext`]
//! and returns the transformed message plus a [`RouteHint`]:
//!
//! - **Agent** - projects the message into an opaque [`AgentHandler`] and
//!   returns its reply unchanged. The agent may record tool calls on the
//!   returned message.
//! - **Tool** - projects parameters out of `message.data` (or a custom
//!   projection), merges agent-context identifiers, invokes the
//!   [`ToolHandler`], and stores the result under `data.toolResult`.
//! - **Decision** - evaluates a [`DecisionEngine`], maps the result id to a
//!   target node, and records `_decision*` metadata on the message.
//! - **Human** - emits a `request_user_*` tool call and moves the message to
//!   WAITING; the runner checkpoints and returns to the caller.
//!
//! Handlers are shared across runs; they must be `Send + Sync`.

use crate::engine::DecisionEngine;
use crate::error::{GraphError, Result};
use crate::listener::{DecisionListener, NoopDecisionListener};
use agentgraph_message::{
    AgentContext, Message, MessageState, SelectionItem, SelectionType, ToolCall,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Reserved prefix for decision metadata keys written onto the message
pub const DECISION_KEY_PREFIX: &str = "_decision";

/// Everything a node sees when it runs
#[derive(Debug, Clone)]
pub struct NodeContext {
    /// The in-flight message
    pub message: Message,

    /// Graph being executed
    pub graph_id: String,

    /// Id of the node being executed
    pub node_id: String,

    /// Tenant/user/session carrier, when the message has one
    pub agent_context: Option<AgentContext>,
}

impl NodeContext {
    /// Build a context for one node execution
    pub fn new(message: Message, graph_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        let agent_context = message.agent_context.clone();
        Self {
            message,
            graph_id: graph_id.into(),
            node_id: node_id.into(),
            agent_context,
        }
    }
}

/// Where the runner should go after a node completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteHint {
    /// Let the runner consult the graph's edges
    Auto,

    /// Route to this node next
    Goto(String),
}

/// A node's result: the transformed message plus a routing hint
#[derive(Debug, Clone)]
pub struct NodeOutput {
    /// The (possibly) transformed message
    pub message: Message,

    /// Routing hint for the runner
    pub route: RouteHint,
}

impl NodeOutput {
    /// Let the runner decide the next node from the edge map
    pub fn auto(message: Message) -> Self {
        Self {
            message,
            route: RouteHint::Auto,
        }
    }

    /// Route directly to `target`
    pub fn goto(message: Message, target: impl Into<String>) -> Self {
        Self {
            message,
            route: RouteHint::Goto(target.into()),
        }
    }
}

/// Opaque agent: message in, replied message out
///
/// Prompt building and LLM calls live behind this trait and are out of the
/// runner's sight.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    /// Handle the message and reply
    async fn handle(&self, message: Message) -> Result<Message>;
}

/// An invocable tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Tool name, recorded next to the result
    fn name(&self) -> &str;

    /// Invoke with projected parameters
    async fn call(&self, parameters: HashMap<String, Value>) -> Result<Value>;
}

/// Pure projection from a message to tool parameters
pub type ParamProjection = Arc<dyn Fn(&Message) -> HashMap<String, Value> + Send + Sync>;

/// What a human node asks for
#[derive(Debug, Clone)]
pub enum HumanInteraction {
    /// Free-text input
    Input {
        /// Prompt shown to the user
        prompt: String,
    },

    /// Pick from options
    Selection {
        /// Prompt shown to the user
        prompt: String,
        /// The options on offer
        items: Vec<SelectionItem>,
        /// One or many
        selection_type: SelectionType,
    },

    /// Confirm or reject
    Confirmation {
        /// Question shown to the user
        message: String,
        /// Optional answer labels
        options: Option<Vec<String>>,
    },
}

/// One unit of execution within a graph
#[derive(Clone)]
pub enum Node {
    /// Wraps an agent handler
    Agent {
        /// The opaque agent
        handler: Arc<dyn AgentHandler>,
    },

    /// Wraps a tool handler plus a parameter projection
    Tool {
        /// The tool
        handler: Arc<dyn ToolHandler>,
        /// Projection from message to parameters; defaults to `message.data`
        projection: Option<ParamProjection>,
    },

    /// Routes by decision-engine result id
    Decision {
        /// The engine to evaluate
        engine: Arc<dyn DecisionEngine>,
        /// result id to target node id
        routes: HashMap<String, String>,
        /// Target when the result id has no mapping
        fallback: Option<String>,
        /// Lifecycle hooks
        listener: Arc<dyn DecisionListener>,
    },

    /// Pauses the run for human input
    Human {
        /// What to ask
        interaction: HumanInteraction,
        /// Optional response deadline, applied as checkpoint TTL by callers
        timeout: Option<chrono::Duration>,
    },
}

impl Node {
    /// Agent node
    pub fn agent(handler: Arc<dyn AgentHandler>) -> Self {
        Node::Agent { handler }
    }

    /// Tool node projecting parameters from `message.data`
    pub fn tool(handler: Arc<dyn ToolHandler>) -> Self {
        Node::Tool {
            handler,
            projection: None,
        }
    }

    /// Tool node with a custom parameter projection
    pub fn tool_with_projection(handler: Arc<dyn ToolHandler>, projection: ParamProjection) -> Self {
        Node::Tool {
            handler,
            projection: Some(projection),
        }
    }

    /// Decision node with no listener
    pub fn decision(
        engine: Arc<dyn DecisionEngine>,
        routes: HashMap<String, String>,
        fallback: Option<String>,
    ) -> Self {
        Node::Decision {
            engine,
            routes,
            fallback,
            listener: Arc::new(NoopDecisionListener),
        }
    }

    /// Decision node with lifecycle hooks
    pub fn decision_with_listener(
        engine: Arc<dyn DecisionEngine>,
        routes: HashMap<String, String>,
        fallback: Option<String>,
        listener: Arc<dyn DecisionListener>,
    ) -> Self {
        Node::Decision {
            engine,
            routes,
            fallback,
            listener,
        }
    }

    /// Human node requesting free-text input
    pub fn human_input(prompt: impl Into<String>) -> Self {
        Node::Human {
            interaction: HumanInteraction::Input {
                prompt: prompt.into(),
            },
            timeout: None,
        }
    }

    /// Human node requesting a selection
    pub fn human_selection(
        prompt: impl Into<String>,
        items: Vec<SelectionItem>,
        selection_type: SelectionType,
    ) -> Self {
        Node::Human {
            interaction: HumanInteraction::Selection {
                prompt: prompt.into(),
                items,
                selection_type,
            },
            timeout: None,
        }
    }

    /// Human node requesting confirmation
    pub fn human_confirmation(message: impl Into<String>, options: Option<Vec<String>>) -> Self {
        Node::Human {
            interaction: HumanInteraction::Confirmation {
                message: message.into(),
                options,
            },
            timeout: None,
        }
    }

    /// Set a human-node timeout
    pub fn with_timeout(self, timeout: chrono::Duration) -> Self {
        match self {
            Node::Human { interaction, .. } => Node::Human {
                interaction,
                timeout: Some(timeout),
            },
            other => other,
        }
    }

    /// Execute this node
    pub async fn run(&self, ctx: NodeContext) -> Result<NodeOutput> {
        match self {
            Node::Agent { handler } => {
                let replied = handler.handle(ctx.message).await?;
                Ok(NodeOutput::auto(replied))
            }
            Node::Tool {
                handler,
                projection,
            } => run_tool(handler.as_ref(), projection.as_ref(), ctx).await,
            Node::Decision {
                engine,
                routes,
                fallback,
                listener,
            } => {
                run_decision(
                    engine.as_ref(),
                    routes,
                    fallback.as_deref(),
                    listener.as_ref(),
                    ctx,
                )
                .await
            }
            Node::Human { interaction, .. } => run_human(interaction, ctx),
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Agent { .. } => f.debug_struct("Agent").field("handler", &"<handler>").finish(),
            Node::Tool { handler, .. } => f
                .debug_struct("Tool")
                .field("name", &handler.name())
                .finish(),
            Node::Decision {
                engine,
                routes,
                fallback,
                ..
            } => f
                .debug_struct("Decision")
                .field("engine", &engine.id())
                .field("routes", routes)
                .field("fallback", fallback)
                .finish(),
            Node::Human { interaction, timeout } => f
                .debug_struct("Human")
                .field("interaction", interaction)
                .field("timeout", timeout)
                .finish(),
        }
    }
}

async fn run_tool(
    handler: &dyn ToolHandler,
    projection: Option<&ParamProjection>,
    ctx: NodeContext,
) -> Result<NodeOutput> {
    let mut parameters = match projection {
        Some(project) => project(&ctx.message),
        None => ctx.message.data.clone(),
    };
    parameters.retain(|_, value| !value.is_null());
    if let Some(agent_context) = &ctx.agent_context {
        parameters.extend(agent_context.to_parameters());
    }

    let result = handler.call(parameters).await?;

    let message = ctx
        .message
        .with_data_entry("toolResult", result)
        .with_data_entry("toolName", Value::String(handler.name().to_string()))
        .with_data_entry("toolSuccess", Value::Bool(true));
    Ok(NodeOutput::auto(message))
}

async fn run_decision(
    engine: &dyn DecisionEngine,
    routes: &HashMap<String, String>,
    fallback: Option<&str>,
    listener: &dyn DecisionListener,
    ctx: NodeContext,
) -> Result<NodeOutput> {
    let started = Instant::now();
    listener.on_decision_start(&ctx.node_id, engine.id());

    let result = match engine.evaluate(&ctx.message).await {
        Ok(result) => result,
        Err(err) => {
            listener.on_decision_error(&ctx.node_id, &err.to_string(), elapsed_ms(started));
            return Err(err);
        }
    };

    let result_id = result.result_id();
    let (target, used_fallback) = match routes.get(&result_id) {
        Some(target) => (target.clone(), false),
        None => match fallback {
            Some(target) => {
                listener.on_decision_fallback(&ctx.node_id, &result_id, target);
                (target.to_string(), true)
            }
            None => {
                let err = GraphError::unmapped_result(
                    &ctx.node_id,
                    engine.id(),
                    &result_id,
                    routes.keys().cloned().collect(),
                );
                listener.on_decision_error(&ctx.node_id, &err.to_string(), elapsed_ms(started));
                return Err(err);
            }
        },
    };

    let mut message = ctx
        .message
        .with_data_entry("_decisionResult", Value::String(result_id))
        .with_data_entry("_decisionTarget", Value::String(target.clone()))
        .with_data_entry("_decisionEngine", Value::String(engine.id().to_string()))
        .with_data_entry("_decisionNodeId", Value::String(ctx.node_id.clone()))
        .with_data_entry(
            "_decisionDescription",
            Value::String(result.description.clone()),
        )
        .with_data_entry("_decisionUsedFallback", Value::Bool(used_fallback));
    for (key, value) in &result.metadata {
        message = message.with_data_entry(format!("{DECISION_KEY_PREFIX}.{key}"), value.clone());
    }

    listener.on_decision_complete(&ctx.node_id, &result, &target, elapsed_ms(started));
    Ok(NodeOutput::goto(message, target))
}

fn run_human(interaction: &HumanInteraction, ctx: NodeContext) -> Result<NodeOutput> {
    // A resumed run re-enters the loop at this node. When the latest HITL
    // activity is an unconsumed user_response, the answer is for us: consume
    // it and pass through. A still-unanswered request re-waits without
    // emitting a duplicate.
    if let Some(response_id) = latest_unconsumed_response(&ctx.message) {
        let marker = format!("{HITL_CONSUMED_PREFIX}{response_id}");
        let message = ctx.message.with_data_entry(marker, Value::Bool(true));
        return Ok(NodeOutput::auto(message));
    }
    if ctx.message.is_pending_hitl() {
        let node_id = ctx.node_id.clone();
        let message = ctx.message.transition_to(
            MessageState::Waiting,
            Some("HITL required".to_string()),
            Some(node_id),
        )?;
        return Ok(NodeOutput::auto(message));
    }

    let call = match interaction {
        HumanInteraction::Input { prompt } => ToolCall::request_input(prompt.clone()),
        HumanInteraction::Selection {
            prompt,
            items,
            selection_type,
        } => ToolCall::request_selection(items.clone(), prompt.clone(), *selection_type),
        HumanInteraction::Confirmation { message, options } => {
            ToolCall::request_confirmation(message.clone(), options.clone())
        }
    };

    let node_id = ctx.node_id.clone();
    let message = ctx.message.with_tool_call(call).transition_to(
        MessageState::Waiting,
        Some("HITL required".to_string()),
        Some(node_id),
    )?;
    Ok(NodeOutput::auto(message))
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Data-key prefix marking user responses already consumed by a human node
const HITL_CONSUMED_PREFIX: &str = "_hitlConsumed.";

/// The id of the most recent `user_response` call, when it is the latest
/// HITL-relevant call and no human node has consumed it yet
fn latest_unconsumed_response(message: &Message) -> Option<String> {
    let latest = message
        .tool_calls
        .iter()
        .rev()
        .find(|call| call.is_hitl_request() || call.is_user_response())?;
    if !latest.is_user_response() {
        return None;
    }
    let marker = format!("{HITL_CONSUMED_PREFIX}{}", latest.id);
    if message.data.contains_key(&marker) {
        None
    } else {
        Some(latest.id.clone())
    }
}
