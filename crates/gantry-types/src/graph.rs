//! Workflow graph types.
//!
//! `GraphSpec` is the raw build payload accepted from callers (HTTP body,
//! programmatic builders). `Graph` is the validated, immutable form the
//! engine interprets: validated once at construction, read-only thereafter,
//! safe to share across concurrently executing runs behind an `Arc`.

use std::collections::HashMap;

use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GraphError;

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A single named step in a workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Node identity; must equal the node's key in the graph's node map.
    pub name: String,
    /// Capability identifier resolved through the directory at execution.
    pub capability: String,
    /// Named arguments passed to the capability on every invocation.
    #[serde(default)]
    pub params: HashMap<String, Value>,
}

impl NodeSpec {
    /// Build a node with no params.
    pub fn new(name: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capability: capability.into(),
            params: HashMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loop rule
// ---------------------------------------------------------------------------

/// A per-node override transition permitting revisits to earlier nodes.
///
/// Evaluated fresh at every visit to the owning node: while
/// `state[until] < threshold`, the next node is `goto` instead of the
/// node's default edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopRule {
    /// State key whose value gates the loop.
    pub until: String,
    /// Numeric threshold the state value must reach to exit the loop.
    pub threshold: f64,
    /// Node to revisit while the threshold is not reached.
    pub goto: String,
}

// ---------------------------------------------------------------------------
// GraphSpec (raw build payload)
// ---------------------------------------------------------------------------

/// The raw, unvalidated shape of a workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSpec {
    /// Node definitions keyed by node name.
    pub nodes: HashMap<String, NodeSpec>,
    /// Default transitions; a `None` target marks a terminal node.
    pub edges: HashMap<String, Option<String>>,
    /// Entry node name.
    pub start: String,
    /// Per-node loop overrides (may be empty).
    #[serde(default)]
    pub loops: HashMap<String, LoopRule>,
}

// ---------------------------------------------------------------------------
// Graph (validated, immutable)
// ---------------------------------------------------------------------------

/// A validated workflow graph.
///
/// Constructed only through [`Graph::new`]; the inner spec is private so the
/// validated invariants (start and all transition targets resolve to defined
/// nodes) hold for the graph's whole lifetime. Deserialization runs the same
/// validation via `try_from`.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "GraphSpec")]
pub struct Graph {
    spec: GraphSpec,
}

impl Serialize for Graph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.spec.serialize(serializer)
    }
}

impl Graph {
    /// Validate a spec and seal it into an immutable graph.
    ///
    /// Fails when `start` is not a defined node, when any `Some` edge target
    /// or loop `goto` references an undefined node, or when a node-map key
    /// disagrees with its node's `name`.
    pub fn new(spec: GraphSpec) -> Result<Self, GraphError> {
        for (key, node) in &spec.nodes {
            if key != &node.name {
                return Err(GraphError::NodeNameMismatch {
                    key: key.clone(),
                    name: node.name.clone(),
                });
            }
        }

        if !spec.nodes.contains_key(&spec.start) {
            return Err(GraphError::UnknownStart(spec.start.clone()));
        }

        for (from, target) in &spec.edges {
            if let Some(to) = target {
                if !spec.nodes.contains_key(to) {
                    return Err(GraphError::UnknownEdgeTarget {
                        from: from.clone(),
                        to: to.clone(),
                    });
                }
            }
        }

        for (node, rule) in &spec.loops {
            if !spec.nodes.contains_key(&rule.goto) {
                return Err(GraphError::UnknownLoopTarget {
                    node: node.clone(),
                    goto: rule.goto.clone(),
                });
            }
        }

        Ok(Self { spec })
    }

    /// The entry node name.
    pub fn start(&self) -> &str {
        &self.spec.start
    }

    /// Look up a node by name.
    pub fn node(&self, name: &str) -> Option<&NodeSpec> {
        self.spec.nodes.get(name)
    }

    /// The default successor of `from`, or `None` when the node is terminal
    /// (explicit `None` edge or no edge entry at all).
    pub fn edge(&self, from: &str) -> Option<&str> {
        self.spec
            .edges
            .get(from)
            .and_then(|t| t.as_deref())
    }

    /// The loop rule owned by `node`, if any.
    pub fn loop_rule(&self, node: &str) -> Option<&LoopRule> {
        self.spec.loops.get(node)
    }

    /// Read access to the underlying spec (for snapshots and serialization).
    pub fn spec(&self) -> &GraphSpec {
        &self.spec
    }
}

impl TryFrom<GraphSpec> for Graph {
    type Error = GraphError;

    fn try_from(spec: GraphSpec) -> Result<Self, Self::Error> {
        Graph::new(spec)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: a two-node linear spec `a -> b -> (terminal)`.
    fn linear_spec() -> GraphSpec {
        let mut nodes = HashMap::new();
        nodes.insert("a".to_string(), NodeSpec::new("a", "cap-a"));
        nodes.insert("b".to_string(), NodeSpec::new("b", "cap-b"));

        let mut edges = HashMap::new();
        edges.insert("a".to_string(), Some("b".to_string()));
        edges.insert("b".to_string(), None);

        GraphSpec {
            nodes,
            edges,
            start: "a".to_string(),
            loops: HashMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn test_valid_graph_construction() {
        let graph = Graph::new(linear_spec()).expect("should validate");
        assert_eq!(graph.start(), "a");
        assert_eq!(graph.edge("a"), Some("b"));
        assert_eq!(graph.edge("b"), None);
        assert!(graph.node("a").is_some());
        assert!(graph.node("missing").is_none());
    }

    #[test]
    fn test_absent_edge_entry_is_terminal() {
        let mut spec = linear_spec();
        spec.edges.remove("b");
        let graph = Graph::new(spec).unwrap();
        assert_eq!(graph.edge("b"), None);
    }

    // -----------------------------------------------------------------------
    // Validation failures
    // -----------------------------------------------------------------------

    #[test]
    fn test_rejects_unknown_start() {
        let mut spec = linear_spec();
        spec.start = "nope".to_string();
        let err = Graph::new(spec).unwrap_err();
        assert!(matches!(err, GraphError::UnknownStart(_)));
    }

    #[test]
    fn test_rejects_unknown_edge_target() {
        let mut spec = linear_spec();
        spec.edges
            .insert("b".to_string(), Some("ghost".to_string()));
        let err = Graph::new(spec).unwrap_err();
        assert!(matches!(err, GraphError::UnknownEdgeTarget { .. }));
    }

    #[test]
    fn test_rejects_unknown_loop_target() {
        let mut spec = linear_spec();
        spec.loops.insert(
            "b".to_string(),
            LoopRule {
                until: "score".to_string(),
                threshold: 85.0,
                goto: "ghost".to_string(),
            },
        );
        let err = Graph::new(spec).unwrap_err();
        assert!(matches!(err, GraphError::UnknownLoopTarget { .. }));
    }

    #[test]
    fn test_rejects_key_name_mismatch() {
        let mut spec = linear_spec();
        spec.nodes
            .insert("c".to_string(), NodeSpec::new("not-c", "cap-c"));
        let err = Graph::new(spec).unwrap_err();
        assert!(matches!(err, GraphError::NodeNameMismatch { .. }));
    }

    // -----------------------------------------------------------------------
    // Serde
    // -----------------------------------------------------------------------

    #[test]
    fn test_deserialization_validates() {
        let json = serde_json::json!({
            "nodes": {
                "a": { "name": "a", "capability": "cap-a" }
            },
            "edges": { "a": null },
            "start": "ghost"
        });
        let result: Result<Graph, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut spec = linear_spec();
        spec.loops.insert(
            "b".to_string(),
            LoopRule {
                until: "score".to_string(),
                threshold: 85.0,
                goto: "a".to_string(),
            },
        );
        let graph = Graph::new(spec).unwrap();
        let json = serde_json::to_value(&graph).unwrap();
        let restored: Graph = serde_json::from_value(json).unwrap();
        assert_eq!(restored.start(), "a");
        let rule = restored.loop_rule("b").unwrap();
        assert_eq!(rule.until, "score");
        assert_eq!(rule.goto, "a");
    }
}
