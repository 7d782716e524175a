//! Graph structure: nodes, edges, entry point
//!
//! A [`Graph`] is a directed collection of [`Node`]s with exactly one entry
//! point and an edge map from source node to outgoing [`Edge`]s. Build one
//! with [`Graph::builder`], which validates the structure before handing it
//! to the runner.
//!
//! # Example
//!
//! ```rust,ignore
//! let graph = Graph::builder("approval")
//!     .add_node("classify", Node::agent(classifier))
//!     .add_node("gate", Node::decision(engine, routes, Some("manual".into())))
//!     .add_node("approve", Node::agent(approver))
//!     .add_node("manual", Node::human_confirmation("Approve?", None))
//!     .add_edge("classify", "gate")
//!     .entry_point("classify")
//!     .build()?;
//! ```

use crate::error::{GraphError, Result};
use crate::node::Node;
use std::collections::HashMap;

/// Node identifier within a graph
pub type NodeId = String;

/// A link from a source node to a target node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edge {
    /// Unconditional: always proceed to this target
    Direct(NodeId),

    /// Guarded: follow only when the recorded decision result id matches
    Guarded {
        /// Decision result id that opens this edge
        result_id: String,
        /// Target node
        target: NodeId,
    },
}

impl Edge {
    /// The edge's target node
    pub fn target(&self) -> &str {
        match self {
            Edge::Direct(target) => target,
            Edge::Guarded { target, .. } => target,
        }
    }
}

/// A directed graph of nodes with one entry point
#[derive(Debug, Clone)]
pub struct Graph {
    /// Graph id, recorded on messages and checkpoints
    pub id: String,

    /// Where execution starts
    pub entry_point: NodeId,

    /// Node registry
    pub nodes: HashMap<NodeId, Node>,

    /// Outgoing edges per source node
    pub edges: HashMap<NodeId, Vec<Edge>>,
}

impl Graph {
    /// Start building a graph
    pub fn builder(id: impl Into<String>) -> GraphBuilder {
        GraphBuilder {
            id: id.into(),
            entry_point: None,
            nodes: HashMap::new(),
            edges: HashMap::new(),
        }
    }

    /// Look up a node
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Outgoing edges of a node; empty when the node is terminal
    pub fn successors(&self, id: &str) -> &[Edge] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Builder validating the graph structure on [`GraphBuilder::build`]
#[derive(Debug)]
pub struct GraphBuilder {
    id: String,
    entry_point: Option<NodeId>,
    nodes: HashMap<NodeId, Node>,
    edges: HashMap<NodeId, Vec<Edge>>,
}

impl GraphBuilder {
    /// Register a node
    pub fn add_node(mut self, id: impl Into<String>, node: Node) -> Self {
        self.nodes.insert(id.into(), node);
        self
    }

    /// Add an unconditional edge
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges
            .entry(from.into())
            .or_default()
            .push(Edge::Direct(to.into()));
        self
    }

    /// Add an edge guarded by a decision result id
    pub fn add_guarded_edge(
        mut self,
        from: impl Into<String>,
        result_id: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.edges.entry(from.into()).or_default().push(Edge::Guarded {
            result_id: result_id.into(),
            target: to.into(),
        });
        self
    }

    /// Set the entry point
    pub fn entry_point(mut self, node: impl Into<String>) -> Self {
        self.entry_point = Some(node.into());
        self
    }

    /// Validate and build the graph
    ///
    /// Fails with [`GraphError::Validation`] when the entry point is missing
    /// or unknown, an edge references an unknown node, or a source carries
    /// more than one unconditional edge.
    pub fn build(self) -> Result<Graph> {
        let entry_point = self
            .entry_point
            .ok_or_else(|| GraphError::Validation("graph has no entry point".to_string()))?;
        if !self.nodes.contains_key(&entry_point) {
            return Err(GraphError::Validation(format!(
                "entry point '{entry_point}' is not a registered node"
            )));
        }

        for (source, edges) in &self.edges {
            if !self.nodes.contains_key(source) {
                return Err(GraphError::Validation(format!(
                    "edge source '{source}' is not a registered node"
                )));
            }
            let mut direct_count = 0usize;
            for edge in edges {
                if !self.nodes.contains_key(edge.target()) {
                    return Err(GraphError::Validation(format!(
                        "edge target '{}' is not a registered node",
                        edge.target()
                    )));
                }
                if matches!(edge, Edge::Direct(_)) {
                    direct_count += 1;
                }
            }
            if direct_count > 1 {
                return Err(GraphError::Validation(format!(
                    "node '{source}' has {direct_count} unconditional edges; at most one is allowed"
                )));
            }
        }

        Ok(Graph {
            id: self.id,
            entry_point,
            nodes: self.nodes,
            edges: self.edges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{AgentHandler, Node};
    use agentgraph_message::Message;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Echo;

    #[async_trait]
    impl AgentHandler for Echo {
        async fn handle(&self, message: Message) -> crate::error::Result<Message> {
            Ok(message)
        }
    }

    fn agent() -> Node {
        Node::agent(Arc::new(Echo))
    }

    #[test]
    fn test_build_valid_graph() {
        let graph = Graph::builder("g")
            .add_node("a", agent())
            .add_node("b", agent())
            .add_edge("a", "b")
            .entry_point("a")
            .build()
            .unwrap();

        assert_eq!(graph.id, "g");
        assert_eq!(graph.entry_point, "a");
        assert_eq!(graph.successors("a"), &[Edge::Direct("b".to_string())]);
        assert!(graph.successors("b").is_empty());
    }

    #[test]
    fn test_missing_entry_point() {
        let err = Graph::builder("g").add_node("a", agent()).build().unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
    }

    #[test]
    fn test_unknown_entry_point() {
        let err = Graph::builder("g")
            .add_node("a", agent())
            .entry_point("nope")
            .build()
            .unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
    }

    #[test]
    fn test_dangling_edge_target() {
        let err = Graph::builder("g")
            .add_node("a", agent())
            .add_edge("a", "ghost")
            .entry_point("a")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_dangling_edge_source() {
        let err = Graph::builder("g")
            .add_node("a", agent())
            .add_edge("ghost", "a")
            .entry_point("a")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_multiple_direct_edges_rejected() {
        let err = Graph::builder("g")
            .add_node("a", agent())
            .add_node("b", agent())
            .add_node("c", agent())
            .add_edge("a", "b")
            .add_edge("a", "c")
            .entry_point("a")
            .build()
            .unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
    }

    #[test]
    fn test_guarded_edges_coexist_with_one_direct() {
        let graph = Graph::builder("g")
            .add_node("a", agent())
            .add_node("b", agent())
            .add_node("c", agent())
            .add_guarded_edge("a", "YES", "b")
            .add_guarded_edge("a", "NO", "c")
            .add_edge("a", "b")
            .entry_point("a")
            .build()
            .unwrap();

        assert_eq!(graph.successors("a").len(), 3);
    }
}
