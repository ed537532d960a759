//! In-memory block graph for one session.
//!
//! Nodes and edges are keyed by derived string identifiers and inserted
//! idempotently: the first write wins and later inserts with the same id
//! are no-ops. The store only grows; a reset replaces it wholesale.

use crate::error::GraphError;
use crate::identifier::{Identifier, shorten_label};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Utxo,
    Header,
    Body,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Utxo => "utxo",
            NodeKind::Header => "header",
            NodeKind::Body => "body",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    UtxoLink,
    Accept,
    Reject,
    BodyLink,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::UtxoLink => "utxo_link",
            EdgeKind::Accept => "accept",
            EdgeKind::Reject => "reject",
            EdgeKind::BodyLink => "body_link",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Identifier,
    pub kind: NodeKind,
    pub display_label: String,
    pub metadata: BTreeMap<String, String>,
}

impl Node {
    pub fn new(id: impl Into<Identifier>, kind: NodeKind) -> Self {
        let id = id.into();
        Self {
            display_label: shorten_label(&id),
            id,
            kind,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.metadata.insert(key.to_string(), value.to_string());
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub from: Identifier,
    pub to: Identifier,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(from: &str, to: &str, kind: EdgeKind) -> Self {
        Self {
            id: edge_id(from, to),
            from: from.to_string(),
            to: to.to_string(),
            kind,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_label)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_str())
    }
}

/// `<from>|<to>`
pub fn edge_id(from: &str, to: &str) -> String {
    format!("{}|{}", from, to)
}

#[derive(Debug, Default, Clone)]
pub struct GraphStore {
    graph: DiGraph<Node, Edge>,
    nodes: HashMap<Identifier, NodeIndex>,
    edges: HashMap<String, EdgeIndex>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node unless one with the same id exists. Returns whether
    /// the node was new.
    pub fn insert_node(&mut self, node: Node) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        let id = node.id.clone();
        debug!("Adding {} node {}", node.kind.as_str(), id);
        let index = self.graph.add_node(node);
        self.nodes.insert(id, index);
        true
    }

    /// Adds a metadata entry to an existing node if the key is not set yet.
    pub fn annotate(&mut self, id: &str, key: &str, value: &str) -> bool {
        let Some(&index) = self.nodes.get(id) else {
            return false;
        };
        let metadata = &mut self.graph[index].metadata;
        if metadata.contains_key(key) {
            return false;
        }
        metadata.insert(key.to_string(), value.to_string());
        true
    }

    /// Inserts an edge between two present nodes. Returns `Ok(false)` when
    /// an edge with the same composite id already exists.
    pub fn insert_edge(&mut self, from: &str, to: &str, kind: EdgeKind) -> Result<bool, GraphError> {
        let edge = Edge::new(from, to, kind);
        if self.edges.contains_key(&edge.id) {
            return Ok(false);
        }
        let source = self.index_of(from, &edge.id)?;
        let target = self.index_of(to, &edge.id)?;
        debug!("Adding {} edge {}", kind.as_str(), edge.id);
        let id = edge.id.clone();
        let index = self.graph.add_edge(source, target, edge);
        self.edges.insert(id, index);
        Ok(true)
    }

    fn index_of(&self, id: &str, edge: &str) -> Result<NodeIndex, GraphError> {
        self.nodes
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::DanglingEdge {
                edge: edge.to_string(),
                missing: id.to_string(),
            })
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id).map(|&index| &self.graph[index])
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.get(id).map(|&index| &self.graph[index])
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn contains_edge(&self, id: &str) -> bool {
        self.edges.contains_key(id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.graph.edge_weights()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn count_nodes(&self, kind: NodeKind) -> usize {
        self.nodes().filter(|n| n.kind == kind).count()
    }

    pub fn count_edges(&self, kind: EdgeKind) -> usize {
        self.edges().filter(|e| e.kind == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Underlying directed graph, for layout and export.
    pub fn graph(&self) -> &DiGraph<Node, Edge> {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_node_is_idempotent_first_write_wins() {
        let mut store = GraphStore::new();
        assert!(store.insert_node(Node::new("a", NodeKind::Header).with_metadata("Issuer", Some("first"))));
        assert!(!store.insert_node(Node::new("a", NodeKind::Body).with_metadata("Issuer", Some("second"))));

        assert_eq!(store.node_count(), 1);
        let node = store.node("a").unwrap();
        assert_eq!(node.kind, NodeKind::Header);
        assert_eq!(node.metadata["Issuer"], "first");
    }

    #[test]
    fn test_insert_edge_is_idempotent_by_composite_id() {
        let mut store = GraphStore::new();
        store.insert_node(Node::new("p", NodeKind::Header));
        store.insert_node(Node::new("c", NodeKind::Header));

        assert_eq!(store.insert_edge("p", "c", EdgeKind::Accept), Ok(true));
        assert_eq!(store.insert_edge("p", "c", EdgeKind::Reject), Ok(false));

        assert_eq!(store.edge_count(), 1);
        assert_eq!(store.edge("p|c").unwrap().kind, EdgeKind::Accept);
    }

    #[test]
    fn test_insert_edge_requires_both_nodes() {
        let mut store = GraphStore::new();
        store.insert_node(Node::new("p", NodeKind::Header));

        let err = store.insert_edge("p", "missing", EdgeKind::Accept).unwrap_err();
        assert_eq!(
            err,
            GraphError::DanglingEdge {
                edge: "p|missing".to_string(),
                missing: "missing".to_string(),
            }
        );
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn test_annotate_does_not_overwrite() {
        let mut store = GraphStore::new();
        store.insert_node(Node::new("h", NodeKind::Header));

        assert!(store.annotate("h", "Issuer", "X"));
        assert!(!store.annotate("h", "Issuer", "Y"));
        assert!(!store.annotate("missing", "Issuer", "X"));
        assert_eq!(store.node("h").unwrap().metadata["Issuer"], "X");
    }

    #[test]
    fn test_counts_by_kind_and_insertion_order() {
        let mut store = GraphStore::new();
        store.insert_node(Node::new("u#0", NodeKind::Utxo));
        store.insert_node(Node::new("h", NodeKind::Header));
        store.insert_node(Node::new("b", NodeKind::Body));
        store.insert_edge("u#0", "h", EdgeKind::UtxoLink).unwrap();
        store.insert_edge("h", "b", EdgeKind::BodyLink).unwrap();

        let ids: Vec<&str> = store.nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["u#0", "h", "b"]);
        assert_eq!(store.count_nodes(NodeKind::Header), 1);
        assert_eq!(store.count_edges(EdgeKind::BodyLink), 1);
        assert!(store.contains_edge("u#0|h"));
        assert!(!store.is_empty());
    }

    #[test]
    fn test_display_label_is_shortened_id() {
        let node = Node::new("bafyreiabcdefghijklmnop", NodeKind::Body);
        assert_eq!(node.display_label, "bafyr..lmnop");
    }
}
