//! Tenant/user/session context propagated through a run
//!
//! An [`AgentContext`] is attached to a message once and then carried by copy
//! through every node execution and checkpoint round-trip. The runner never
//! interprets it; downstream consumers (repositories, services) use it for
//! tenant scoping and request correlation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable carrier of tenant, user, session, and correlation identifiers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentContext {
    /// Tenant the run belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    /// End user on whose behalf the run executes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Session grouping related runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Correlation id for tracing across systems
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Additional opaque key/value pairs
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

impl AgentContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tenant id
    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Set the user id
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the session id
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the correlation id
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Add an extra key/value pair
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Project the well-known identifiers into a parameter map
    ///
    /// Used by tool dispatch to hand tenant/user/correlation identifiers to
    /// tools alongside their regular parameters. Absent identifiers are
    /// omitted rather than passed as null.
    pub fn to_parameters(&self) -> HashMap<String, serde_json::Value> {
        let mut params = HashMap::new();
        if let Some(tenant) = &self.tenant_id {
            params.insert("tenantId".to_string(), serde_json::json!(tenant));
        }
        if let Some(user) = &self.user_id {
            params.insert("userId".to_string(), serde_json::json!(user));
        }
        if let Some(session) = &self.session_id {
            params.insert("sessionId".to_string(), serde_json::json!(session));
        }
        if let Some(correlation) = &self.correlation_id {
            params.insert("correlationId".to_string(), serde_json::json!(correlation));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let ctx = AgentContext::new()
            .with_tenant_id("acme")
            .with_user_id("u-1")
            .with_session_id("s-9")
            .with_correlation_id("corr-7")
            .with_extra("locale", "en-US");

        assert_eq!(ctx.tenant_id.as_deref(), Some("acme"));
        assert_eq!(ctx.user_id.as_deref(), Some("u-1"));
        assert_eq!(ctx.extra.get("locale").map(String::as_str), Some("en-US"));
    }

    #[test]
    fn test_to_parameters_skips_absent_ids() {
        let ctx = AgentContext::new().with_tenant_id("acme");
        let params = ctx.to_parameters();

        assert_eq!(params.get("tenantId"), Some(&serde_json::json!("acme")));
        assert!(!params.contains_key("userId"));
        assert!(!params.contains_key("correlationId"));
    }

    #[test]
    fn test_serde_round_trip() {
        let ctx = AgentContext::new()
            .with_tenant_id("acme")
            .with_correlation_id("corr-1");

        let json = serde_json::to_string(&ctx).unwrap();
        let back: AgentContext = serde_json::from_str(&json).unwrap();
        assert_eq!(ctx, back);
    }
}
