use crate::index::AdjacencyIndex;
use chrono::Utc;
use reelgraph_core::error::{ErrorCode, ReelgraphError};
use reelgraph_core::model::{
    Edge, EdgeId, EdgeKind, EdgeProperties, Node, NodeId, NodeKind, NodeProperties,
};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("edge {edge_id} references missing {role} node {node_id}")]
    MissingEndpoint {
        edge_id: EdgeId,
        role: &'static str,
        node_id: NodeId,
    },
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("edge not found: {0}")]
    EdgeNotFound(EdgeId),
    #[error("node {id} already exists as {existing}, cannot add it as {requested}")]
    KindConflict {
        id: NodeId,
        existing: NodeKind,
        requested: NodeKind,
    },
    #[error("edge {0} already exists with different endpoints or kind")]
    EdgeConflict(EdgeId),
    #[error("invalid interaction: {0}")]
    InvalidInteraction(String),
}

impl ReelgraphError for GraphError {
    fn error_code(&self) -> ErrorCode {
        match self {
            GraphError::MissingEndpoint { .. } => ErrorCode::FailedPrecondition,
            GraphError::NodeNotFound(_) | GraphError::EdgeNotFound(_) => ErrorCode::NotFound,
            GraphError::KindConflict { .. } | GraphError::EdgeConflict(_) => {
                ErrorCode::FailedPrecondition
            }
            GraphError::InvalidInteraction(_) => ErrorCode::InvalidArgument,
        }
    }
}

/// In-memory typed property graph.
///
/// Nodes and edges live in id-keyed maps; relationships are expressed by id
/// only, so there are no reference cycles. Iteration order is the id order,
/// which keeps every analysis deterministic.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeId, Edge>,
    index: AdjacencyIndex,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.index.clear();
    }

    /// Insert a node, or merge its properties into the existing node with
    /// the same id. The node count never grows on a repeated id.
    pub fn add_node(&mut self, node: Node) -> Result<&Node, GraphError> {
        match self.nodes.get(&node.id) {
            Some(existing) if existing.kind != node.kind => Err(GraphError::KindConflict {
                id: node.id,
                existing: existing.kind,
                requested: node.kind,
            }),
            Some(_) => {
                let id = node.id.clone();
                let existing = self
                    .nodes
                    .get_mut(&id)
                    .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
                existing.properties.merge(node.properties);
                if node.embeddings.is_some() {
                    existing.embeddings = node.embeddings;
                }
                existing.updated_at = node.updated_at;
                Ok(existing)
            }
            None => {
                let id = node.id.clone();
                Ok(self.nodes.entry(id).or_insert(node))
            }
        }
    }

    pub fn update_node(&mut self, id: &str, patch: NodeProperties) -> Result<&Node, GraphError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        node.properties.merge(patch);
        node.updated_at = Utc::now();
        Ok(node)
    }

    /// Insert an edge. Both endpoints must already exist; nothing is
    /// mutated when validation fails.
    pub fn add_edge(&mut self, edge: Edge) -> Result<&Edge, GraphError> {
        if !self.nodes.contains_key(&edge.source) {
            return Err(GraphError::MissingEndpoint {
                edge_id: edge.id,
                role: "source",
                node_id: edge.source,
            });
        }
        if !self.nodes.contains_key(&edge.target) {
            return Err(GraphError::MissingEndpoint {
                edge_id: edge.id,
                role: "target",
                node_id: edge.target,
            });
        }

        if let Some(existing) = self.edges.get(&edge.id) {
            if existing.source != edge.source
                || existing.target != edge.target
                || existing.kind != edge.kind
            {
                return Err(GraphError::EdgeConflict(edge.id));
            }
            let id = edge.id.clone();
            let existing = self
                .edges
                .get_mut(&id)
                .ok_or_else(|| GraphError::EdgeNotFound(id.clone()))?;
            existing.weight = edge.weight;
            existing.properties.merge(edge.properties);
            existing.updated_at = edge.updated_at;
            return Ok(existing);
        }

        self.index
            .insert(&edge.id, edge.kind, &edge.source, &edge.target);
        let id = edge.id.clone();
        Ok(self.edges.entry(id).or_insert(edge))
    }

    pub fn update_edge(
        &mut self,
        id: &str,
        weight: Option<f64>,
        patch: EdgeProperties,
    ) -> Result<&Edge, GraphError> {
        let edge = self
            .edges
            .get_mut(id)
            .ok_or_else(|| GraphError::EdgeNotFound(id.to_string()))?;
        if let Some(weight) = weight {
            edge.weight = weight;
        }
        edge.properties.merge(patch);
        edge.updated_at = Utc::now();
        Ok(edge)
    }

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub(crate) fn get_node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get_edge(&self, id: &str) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn get_nodes_by_type(&self, kind: NodeKind) -> Vec<&Node> {
        self.nodes.values().filter(|node| node.kind == kind).collect()
    }

    pub fn get_edges_by_type(&self, kind: EdgeKind) -> Vec<&Edge> {
        self.edges.values().filter(|edge| edge.kind == kind).collect()
    }

    pub fn get_outgoing_edges(&self, node_id: &str) -> Vec<&Edge> {
        self.index
            .outgoing(node_id)
            .filter_map(|edge_id| self.edges.get(edge_id))
            .collect()
    }

    pub fn outgoing_edges_of_kind(&self, node_id: &str, kind: EdgeKind) -> Vec<&Edge> {
        self.index
            .outgoing_of_kind(node_id, kind)
            .iter()
            .filter_map(|edge_id| self.edges.get(edge_id))
            .collect()
    }

    pub fn get_incoming_edges(&self, node_id: &str) -> Vec<&Edge> {
        self.index
            .incoming(node_id)
            .iter()
            .filter_map(|edge_id| self.edges.get(edge_id))
            .collect()
    }

    pub fn incoming_edges_of_kind(&self, node_id: &str, kind: EdgeKind) -> Vec<&Edge> {
        self.get_incoming_edges(node_id)
            .into_iter()
            .filter(|edge| edge.kind == kind)
            .collect()
    }

    /// Total number of incident edges (in + out).
    pub fn degree(&self, node_id: &str) -> usize {
        self.index.out_degree(node_id) + self.index.in_degree(node_id)
    }

    /// Distinct targets of outgoing edges, optionally restricted to one kind.
    pub fn get_neighbors(&self, node_id: &str, kind: Option<EdgeKind>) -> Vec<&Node> {
        let edges = match kind {
            Some(kind) => self.outgoing_edges_of_kind(node_id, kind),
            None => self.get_outgoing_edges(node_id),
        };

        let mut seen = HashSet::new();
        edges
            .into_iter()
            .filter(|edge| seen.insert(edge.target.as_str()))
            .filter_map(|edge| self.nodes.get(&edge.target))
            .collect()
    }

    /// Enumerate every simple directed path from `source` to `target` with
    /// at most `max_depth` edges. A node is never revisited within a path.
    ///
    /// When `source == target` the result is the single zero-edge path.
    pub fn find_paths(&self, source: &str, target: &str, max_depth: usize) -> Vec<Vec<&Edge>> {
        if !self.contains_node(source) || !self.contains_node(target) {
            return Vec::new();
        }
        if source == target {
            return vec![Vec::new()];
        }

        let mut results = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(source);
        let mut path = Vec::new();
        self.collect_paths(source, target, max_depth, &mut visited, &mut path, &mut results);
        results
    }

    fn collect_paths<'a: 'v, 'v>(
        &'a self,
        current: &str,
        target: &str,
        max_depth: usize,
        visited: &mut HashSet<&'v str>,
        path: &mut Vec<&'a Edge>,
        results: &mut Vec<Vec<&'a Edge>>,
    ) {
        if path.len() >= max_depth {
            return;
        }

        for edge in self.get_outgoing_edges(current) {
            let next = edge.target.as_str();
            if visited.contains(next) {
                continue;
            }

            path.push(edge);
            if next == target {
                results.push(path.clone());
            } else {
                visited.insert(next);
                self.collect_paths(next, target, max_depth, visited, path, results);
                visited.remove(next);
            }
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, kind: NodeKind) -> Node {
        Node::new(id, kind)
    }

    fn edge(id: &str, kind: EdgeKind, source: &str, target: &str) -> Edge {
        Edge::new(id, kind, source, target, 1.0)
    }

    fn diamond() -> Graph {
        let mut graph = Graph::new();
        for id in ["a", "b", "c", "d"] {
            graph.add_node(node(id, NodeKind::Video)).unwrap();
        }
        graph.add_edge(edge("ab", EdgeKind::SimilarTo, "a", "b")).unwrap();
        graph.add_edge(edge("ac", EdgeKind::SimilarTo, "a", "c")).unwrap();
        graph.add_edge(edge("bd", EdgeKind::SimilarTo, "b", "d")).unwrap();
        graph.add_edge(edge("cd", EdgeKind::SimilarTo, "c", "d")).unwrap();
        graph.add_edge(edge("da", EdgeKind::SimilarTo, "d", "a")).unwrap();
        graph
    }

    #[test]
    fn test_add_edge_rejects_missing_endpoint_without_mutation() {
        let mut graph = Graph::new();
        graph.add_node(node("u1", NodeKind::User)).unwrap();

        let err = graph
            .add_edge(edge("e1", EdgeKind::Viewed, "u1", "missing"))
            .unwrap_err();
        assert!(matches!(err, GraphError::MissingEndpoint { role: "target", .. }));
        assert_eq!(err.error_code(), ErrorCode::FailedPrecondition);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.get_outgoing_edges("u1").is_empty());
    }

    #[test]
    fn test_add_node_twice_merges() {
        let mut graph = Graph::new();
        graph
            .add_node(node("v1", NodeKind::Video).with_properties(NodeProperties::named("first")))
            .unwrap();
        graph
            .add_node(
                node("v1", NodeKind::Video)
                    .with_properties(NodeProperties::default().with_category("Comedy")),
            )
            .unwrap();

        assert_eq!(graph.node_count(), 1);
        let merged = graph.get_node("v1").unwrap();
        assert_eq!(merged.properties.name.as_deref(), Some("first"));
        assert_eq!(merged.properties.category.as_deref(), Some("Comedy"));
    }

    #[test]
    fn test_add_node_rejects_kind_change() {
        let mut graph = Graph::new();
        graph.add_node(node("x", NodeKind::User)).unwrap();
        assert!(graph.add_node(node("x", NodeKind::Video)).is_err());
        assert_eq!(graph.get_node("x").unwrap().kind, NodeKind::User);
    }

    #[test]
    fn test_repeated_edge_id_updates_in_place() {
        let mut graph = diamond();
        graph
            .add_edge(Edge::new("ab", EdgeKind::SimilarTo, "a", "b", 0.4))
            .unwrap();
        assert_eq!(graph.edge_count(), 5);
        assert_eq!(graph.get_outgoing_edges("a").len(), 2);
        assert_eq!(graph.get_edge("ab").unwrap().weight, 0.4);

        let conflict = graph.add_edge(edge("ab", EdgeKind::SimilarTo, "a", "c"));
        assert!(matches!(conflict, Err(GraphError::EdgeConflict(_))));
    }

    #[test]
    fn test_neighbors_are_deduplicated_and_filterable() {
        let mut graph = diamond();
        graph.add_edge(edge("ab2", EdgeKind::InspiredBy, "a", "b")).unwrap();

        assert_eq!(graph.get_neighbors("a", None).len(), 2);
        let inspired = graph.get_neighbors("a", Some(EdgeKind::InspiredBy));
        assert_eq!(inspired.len(), 1);
        assert_eq!(inspired[0].id, "b");
    }

    #[test]
    fn test_find_paths_enumerates_all_simple_paths() {
        let graph = diamond();
        let paths = graph.find_paths("a", "d", 3);
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|path| path.len() == 2));

        assert!(graph.find_paths("a", "d", 1).is_empty());
    }

    #[test]
    fn test_find_paths_to_self_is_trivial() {
        let graph = diamond();
        let paths = graph.find_paths("a", "a", 5);
        assert_eq!(paths.len(), 1);
        assert!(paths[0].is_empty());
    }

    #[test]
    fn test_degree_counts_both_directions() {
        let graph = diamond();
        assert_eq!(graph.degree("a"), 3);
        assert_eq!(graph.degree("d"), 3);
        assert_eq!(graph.get_incoming_edges("d").len(), 2);
    }
}
