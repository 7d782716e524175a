//! Typed routing decisions
//!
//! A [`DecisionResult`] is what a decision engine produces: a kind, a
//! human-readable description, and arbitrary metadata. Edge matching uses the
//! derived [`DecisionResult::result_id`] string, never the kind directly, so
//! custom engines can route with ids that no standard kind covers.
//!
//! # Result ids
//!
//! | Kind | result id |
//! |------|-----------|
//! | standard kinds | `YES`, `NO`, `SKIP`, `RETRY`, `ERROR`, `DEFAULT`, `UNCERTAIN` |
//! | delegate to LLM | `DELEGATE_TO_LLM` |
//! | delegate to agent | `DELEGATE_TO_AGENT` |
//! | reorchestrate | `REORCHESTRATE` |
//! | escalate | `ESCALATE` |
//! | selection (per-option routing) | `OPTION:{option_id}` |
//! | selection (fixed routing) | `OPTION_SELECTED` |
//! | custom | the user-defined id |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The sealed set of decision variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionKind {
    /// Affirmative
    Yes,
    /// Negative
    No,
    /// Skip the guarded step
    Skip,
    /// Ask the caller to retry
    Retry,
    /// The evaluation itself failed
    Error,
    /// No opinion; combinators treat this as "keep looking"
    Default,
    /// The engine could not decide
    Uncertain,
    /// Hand the decision to an LLM
    DelegateToLlm,
    /// Hand the decision to a named agent
    DelegateToAgent {
        /// Agent to delegate to
        agent_id: String,
    },
    /// Restart under a different workflow
    Reorchestrate {
        /// Target workflow id
        workflow: String,
    },
    /// Escalate to a human operator
    Escalate {
        /// Why escalation is needed
        reason: String,
    },
    /// A user picked an option from a selection request
    Selection {
        /// The chosen option id
        option_id: String,
        /// Route per option (`OPTION:{id}`) instead of one fixed edge
        per_option_routing: bool,
    },
    /// User-defined result id
    Custom {
        /// The routing id
        id: String,
    },
}

/// A routing decision produced by a [`DecisionEngine`](crate::engine::DecisionEngine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    /// Which decision was made
    pub kind: DecisionKind,

    /// Human-readable description, surfaced in decision metadata
    #[serde(default)]
    pub description: String,

    /// Arbitrary engine metadata, copied onto the message under `_decision.<k>`
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Default for DecisionResult {
    fn default() -> Self {
        Self::of(DecisionKind::Default)
    }
}

impl DecisionResult {
    /// Wrap a kind with an empty description and metadata
    pub fn of(kind: DecisionKind) -> Self {
        Self {
            kind,
            description: String::new(),
            metadata: HashMap::new(),
        }
    }

    /// YES
    pub fn yes() -> Self {
        Self::of(DecisionKind::Yes)
    }

    /// NO
    pub fn no() -> Self {
        Self::of(DecisionKind::No)
    }

    /// SKIP
    pub fn skip() -> Self {
        Self::of(DecisionKind::Skip)
    }

    /// RETRY
    pub fn retry() -> Self {
        Self::of(DecisionKind::Retry)
    }

    /// ERROR
    pub fn error() -> Self {
        Self::of(DecisionKind::Error)
    }

    /// UNCERTAIN
    pub fn uncertain() -> Self {
        Self::of(DecisionKind::Uncertain)
    }

    /// DELEGATE_TO_LLM
    pub fn delegate_to_llm() -> Self {
        Self::of(DecisionKind::DelegateToLlm)
    }

    /// DELEGATE_TO_AGENT
    pub fn delegate_to_agent(agent_id: impl Into<String>) -> Self {
        Self::of(DecisionKind::DelegateToAgent {
            agent_id: agent_id.into(),
        })
    }

    /// REORCHESTRATE
    pub fn reorchestrate(workflow: impl Into<String>) -> Self {
        Self::of(DecisionKind::Reorchestrate {
            workflow: workflow.into(),
        })
    }

    /// ESCALATE
    pub fn escalate(reason: impl Into<String>) -> Self {
        Self::of(DecisionKind::Escalate {
            reason: reason.into(),
        })
    }

    /// A selection routed per option: result id `OPTION:{option_id}`
    pub fn option(option_id: impl Into<String>) -> Self {
        Self::of(DecisionKind::Selection {
            option_id: option_id.into(),
            per_option_routing: true,
        })
    }

    /// A selection routed through one fixed edge: result id `OPTION_SELECTED`
    pub fn selected(option_id: impl Into<String>) -> Self {
        Self::of(DecisionKind::Selection {
            option_id: option_id.into(),
            per_option_routing: false,
        })
    }

    /// A custom result id
    pub fn custom(id: impl Into<String>) -> Self {
        Self::of(DecisionKind::Custom { id: id.into() })
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a metadata entry
    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The string used for edge matching
    pub fn result_id(&self) -> String {
        match &self.kind {
            DecisionKind::Yes => "YES".to_string(),
            DecisionKind::No => "NO".to_string(),
            DecisionKind::Skip => "SKIP".to_string(),
            DecisionKind::Retry => "RETRY".to_string(),
            DecisionKind::Error => "ERROR".to_string(),
            DecisionKind::Default => "DEFAULT".to_string(),
            DecisionKind::Uncertain => "UNCERTAIN".to_string(),
            DecisionKind::DelegateToLlm => "DELEGATE_TO_LLM".to_string(),
            DecisionKind::DelegateToAgent { .. } => "DELEGATE_TO_AGENT".to_string(),
            DecisionKind::Reorchestrate { .. } => "REORCHESTRATE".to_string(),
            DecisionKind::Escalate { .. } => "ESCALATE".to_string(),
            DecisionKind::Selection {
                option_id,
                per_option_routing,
            } => {
                if *per_option_routing {
                    format!("OPTION:{option_id}")
                } else {
                    "OPTION_SELECTED".to_string()
                }
            }
            DecisionKind::Custom { id } => id.clone(),
        }
    }

    /// Whether this is the DEFAULT kind (no opinion)
    pub fn is_default(&self) -> bool {
        matches!(self.kind, DecisionKind::Default)
    }
}
