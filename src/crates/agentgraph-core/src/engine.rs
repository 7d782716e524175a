//! Decision engines and their combinators
//!
//! A [`DecisionEngine`] evaluates a message into a [`DecisionResult`].
//! Engines are built from closures rather than a class hierarchy, and
//! compose:
//!
//! - [`create`] - wrap an async closure
//! - [`from_data`] / [`from_metadata`] - map a message field through a
//!   lookup table with a default
//! - [`fallback`] - try engines in order, first non-DEFAULT result wins
//! - [`conditional`] - pick one of two engines with a predicate
//! - [`always`] / [`noop`] - constant engines
//!
//! Engines are shared across concurrent runs; implementations must be
//! `Send + Sync` and safe for concurrent evaluation.
//!
//! # Example
//!
//! ```rust,ignore
//! let by_amount = engine::from_data(
//!     "amount_class",
//!     HashMap::from([
//!         ("low".to_string(), DecisionResult::yes()),
//!         ("high".to_string(), DecisionResult::escalate("manual review")),
//!     ]),
//!     DecisionResult::uncertain(),
//! );
//!
//! let router = engine::fallback(vec![by_amount, engine::always(DecisionResult::no())]);
//! let decision = router.evaluate(&message).await?;
//! ```

use crate::decision::DecisionResult;
use crate::error::Result;
use agentgraph_message::{parse_user_response, Message, SelectionTemplate, UserResponse};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Produces a routing decision from a message
#[async_trait]
pub trait DecisionEngine: Send + Sync {
    /// Stable engine id, recorded in decision metadata
    fn id(&self) -> &str;

    /// Evaluate the message into a decision
    async fn evaluate(&self, message: &Message) -> Result<DecisionResult>;

    /// Configuration warnings, for surfacing misconfigured engines early
    fn validate(&self) -> Vec<String> {
        Vec::new()
    }
}

type EvalFn = Arc<dyn Fn(Message) -> BoxFuture<'static, Result<DecisionResult>> + Send + Sync>;

struct FnEngine {
    id: String,
    eval: EvalFn,
}

#[async_trait]
impl DecisionEngine for FnEngine {
    fn id(&self) -> &str {
        &self.id
    }

    async fn evaluate(&self, message: &Message) -> Result<DecisionResult> {
        (self.eval)(message.clone()).await
    }
}

/// Wrap an async closure as an engine
pub fn create<F, Fut>(id: impl Into<String>, eval: F) -> Arc<dyn DecisionEngine>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<DecisionResult>> + Send + 'static,
{
    Arc::new(FnEngine {
        id: id.into(),
        eval: Arc::new(move |message| Box::pin(eval(message))),
    })
}

#[derive(Clone, Copy)]
enum MappingSource {
    Data,
    Metadata,
}

struct MappingEngine {
    id: String,
    source: MappingSource,
    key: String,
    mapping: HashMap<String, DecisionResult>,
    default: DecisionResult,
}

#[async_trait]
impl DecisionEngine for MappingEngine {
    fn id(&self) -> &str {
        &self.id
    }

    async fn evaluate(&self, message: &Message) -> Result<DecisionResult> {
        let map = match self.source {
            MappingSource::Data => &message.data,
            MappingSource::Metadata => &message.metadata,
        };
        let decision = map
            .get(&self.key)
            .and_then(Value::as_str)
            .and_then(|value| self.mapping.get(value))
            .cloned()
            .unwrap_or_else(|| self.default.clone());
        Ok(decision)
    }

    fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.mapping.is_empty() {
            warnings.push(format!(
                "engine '{}': mapping for key '{}' is empty, every message takes the default",
                self.id, self.key
            ));
        }
        warnings
    }
}

/// Map `message.data[key]` through a lookup table, falling back to `default`
pub fn from_data(
    key: impl Into<String>,
    mapping: HashMap<String, DecisionResult>,
    default: DecisionResult,
) -> Arc<dyn DecisionEngine> {
    let key = key.into();
    Arc::new(MappingEngine {
        id: format!("data:{key}"),
        source: MappingSource::Data,
        key,
        mapping,
        default,
    })
}

/// Map `message.metadata[key]` through a lookup table, falling back to `default`
pub fn from_metadata(
    key: impl Into<String>,
    mapping: HashMap<String, DecisionResult>,
    default: DecisionResult,
) -> Arc<dyn DecisionEngine> {
    let key = key.into();
    Arc::new(MappingEngine {
        id: format!("metadata:{key}"),
        source: MappingSource::Metadata,
        key,
        mapping,
        default,
    })
}

struct FallbackEngine {
    id: String,
    engines: Vec<Arc<dyn DecisionEngine>>,
}

#[async_trait]
impl DecisionEngine for FallbackEngine {
    fn id(&self) -> &str {
        &self.id
    }

    async fn evaluate(&self, message: &Message) -> Result<DecisionResult> {
        for engine in &self.engines {
            let decision = engine.evaluate(message).await?;
            if !decision.is_default() {
                return Ok(decision);
            }
        }
        Ok(DecisionResult::default())
    }

    fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.engines.is_empty() {
            warnings.push("fallback engine has no inner engines".to_string());
        }
        for engine in &self.engines {
            for warning in engine.validate() {
                warnings.push(format!("{}: {warning}", engine.id()));
            }
        }
        warnings
    }
}

/// Evaluate engines in order; the first non-DEFAULT result wins
///
/// `validate()` aggregates the warnings of every inner engine.
pub fn fallback(engines: Vec<Arc<dyn DecisionEngine>>) -> Arc<dyn DecisionEngine> {
    Arc::new(FallbackEngine {
        id: "fallback".to_string(),
        engines,
    })
}

struct ConditionalEngine {
    id: String,
    predicate: Arc<dyn Fn(&Message) -> bool + Send + Sync>,
    if_true: Arc<dyn DecisionEngine>,
    if_false: Arc<dyn DecisionEngine>,
}

#[async_trait]
impl DecisionEngine for ConditionalEngine {
    fn id(&self) -> &str {
        &self.id
    }

    async fn evaluate(&self, message: &Message) -> Result<DecisionResult> {
        if (self.predicate)(message) {
            self.if_true.evaluate(message).await
        } else {
            self.if_false.evaluate(message).await
        }
    }

    fn validate(&self) -> Vec<String> {
        let mut warnings = self.if_true.validate();
        warnings.extend(self.if_false.validate());
        warnings
    }
}

/// Route evaluation through one of two engines based on a predicate
pub fn conditional(
    predicate: impl Fn(&Message) -> bool + Send + Sync + 'static,
    if_true: Arc<dyn DecisionEngine>,
    if_false: Arc<dyn DecisionEngine>,
) -> Arc<dyn DecisionEngine> {
    Arc::new(ConditionalEngine {
        id: "conditional".to_string(),
        predicate: Arc::new(predicate),
        if_true,
        if_false,
    })
}

struct AlwaysEngine {
    id: String,
    result: DecisionResult,
}

#[async_trait]
impl DecisionEngine for AlwaysEngine {
    fn id(&self) -> &str {
        &self.id
    }

    async fn evaluate(&self, _message: &Message) -> Result<DecisionResult> {
        Ok(self.result.clone())
    }
}

/// Constant engine returning the same result for every message
pub fn always(result: DecisionResult) -> Arc<dyn DecisionEngine> {
    Arc::new(AlwaysEngine {
        id: format!("always:{}", result.result_id()),
        result,
    })
}

/// Engine that always returns DEFAULT
pub fn noop() -> Arc<dyn DecisionEngine> {
    Arc::new(AlwaysEngine {
        id: "noop".to_string(),
        result: DecisionResult::default(),
    })
}

struct SelectionEngine {
    id: String,
    template: SelectionTemplate,
    per_option_routing: bool,
}

#[async_trait]
impl DecisionEngine for SelectionEngine {
    fn id(&self) -> &str {
        &self.id
    }

    async fn evaluate(&self, message: &Message) -> Result<DecisionResult> {
        let response = message
            .tool_calls
            .iter()
            .rev()
            .find(|call| call.is_user_response())
            .and_then(|call| {
                parse_user_response(&call.function.arguments, Some(&self.template))
            });

        let decision = match response {
            Some(UserResponse::Single { option_id }) => {
                if self.per_option_routing {
                    DecisionResult::option(&option_id)
                } else {
                    DecisionResult::selected(&option_id)
                }
                .with_metadata_entry("selectedOption", Value::String(option_id))
            }
            Some(UserResponse::Multi { option_ids }) => {
                let first = option_ids.first().cloned().unwrap_or_default();
                DecisionResult::selected(first).with_metadata_entry(
                    "selectedOptions",
                    Value::Array(option_ids.into_iter().map(Value::String).collect()),
                )
            }
            // text/quantity answers (or a rejected text-only answer) leave the
            // decision to the node's fallback edge
            _ => DecisionResult::default(),
        };
        Ok(decision)
    }
}

/// Route on the user's most recent `user_response` selection
///
/// Parses the response through the HITL normalization rules, honoring the
/// template's free-text gating. Single selections route per option
/// (`OPTION:{id}`) when `per_option_routing` is set, through the fixed
/// `OPTION_SELECTED` edge otherwise. Unparseable or text-only answers return
/// DEFAULT so the decision node's fallback target handles them.
pub fn selection(template: SelectionTemplate, per_option_routing: bool) -> Arc<dyn DecisionEngine> {
    Arc::new(SelectionEngine {
        id: "selection".to_string(),
        template,
        per_option_routing,
    })
}
