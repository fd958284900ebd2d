use crate::graph::{Graph, GraphError};
use chrono::{DateTime, Utc};
use reelgraph_core::error::{ErrorCode, ReelgraphError};
use reelgraph_core::model::{Edge, Node};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("duplicate node id in snapshot: {0}")]
    DuplicateNode(String),
    #[error("duplicate edge id in snapshot: {0}")]
    DuplicateEdge(String),
    #[error("invalid snapshot: {0}")]
    Graph(#[from] GraphError),
}

impl ReelgraphError for SnapshotError {
    fn error_code(&self) -> ErrorCode {
        match self {
            SnapshotError::Serde(_)
            | SnapshotError::DuplicateNode(_)
            | SnapshotError::DuplicateEdge(_) => ErrorCode::InvalidArgument,
            SnapshotError::Graph(err) => err.error_code(),
        }
    }
}

/// Portable copy of the whole graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub exported_at: DateTime<Utc>,
}

impl GraphSnapshot {
    pub fn from_graph(graph: &Graph) -> Self {
        Self {
            nodes: graph.nodes().cloned().collect(),
            edges: graph.edges().cloned().collect(),
            exported_at: Utc::now(),
        }
    }

    /// Rebuild a graph. Duplicate ids and dangling edges are rejected
    /// rather than merged.
    pub fn into_graph(self) -> Result<Graph, SnapshotError> {
        let mut graph = Graph::new();

        let mut node_ids = HashSet::new();
        for node in self.nodes {
            if !node_ids.insert(node.id.clone()) {
                return Err(SnapshotError::DuplicateNode(node.id));
            }
            graph.add_node(node)?;
        }

        let mut edge_ids = HashSet::new();
        for edge in self.edges {
            if !edge_ids.insert(edge.id.clone()) {
                return Err(SnapshotError::DuplicateEdge(edge.id));
            }
            graph.add_edge(edge)?;
        }

        Ok(graph)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelgraph_core::model::{EdgeKind, NodeKind};

    #[test]
    fn test_dangling_edge_is_rejected() {
        let snapshot = GraphSnapshot {
            nodes: vec![Node::new("u1", NodeKind::User)],
            edges: vec![Edge::new("e1", EdgeKind::Viewed, "u1", "v404", 1.0)],
            exported_at: Utc::now(),
        };
        let err = snapshot.into_graph().unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::FailedPrecondition);
    }

    #[test]
    fn test_duplicate_node_is_rejected() {
        let snapshot = GraphSnapshot {
            nodes: vec![
                Node::new("u1", NodeKind::User),
                Node::new("u1", NodeKind::User),
            ],
            edges: Vec::new(),
            exported_at: Utc::now(),
        };
        assert!(matches!(
            snapshot.into_graph(),
            Err(SnapshotError::DuplicateNode(id)) if id == "u1"
        ));
    }

    #[test]
    fn test_garbage_json_is_invalid_argument() {
        let err = GraphSnapshot::from_json("{not json").unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidArgument);
    }
}
