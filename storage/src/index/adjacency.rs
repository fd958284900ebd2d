use reelgraph_core::model::{EdgeId, EdgeKind, NodeId};
use std::collections::{BTreeMap, HashMap};

/// Forward/reverse adjacency over edge ids.
///
/// Forward entries are keyed by edge kind so typed traversals never scan
/// unrelated edges. Each edge id appears exactly once in the forward list of
/// its source and once in the reverse list of its target.
#[derive(Debug, Clone, Default)]
pub struct AdjacencyIndex {
    forward: HashMap<NodeId, BTreeMap<EdgeKind, Vec<EdgeId>>>,
    reverse: HashMap<NodeId, Vec<EdgeId>>,
}

impl AdjacencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, edge_id: &str, kind: EdgeKind, source: &str, target: &str) {
        self.forward
            .entry(source.to_string())
            .or_default()
            .entry(kind)
            .or_default()
            .push(edge_id.to_string());
        self.reverse
            .entry(target.to_string())
            .or_default()
            .push(edge_id.to_string());
    }

    /// Outgoing edge ids, grouped by kind in declaration order.
    pub fn outgoing(&self, node_id: &str) -> impl Iterator<Item = &EdgeId> {
        self.forward
            .get(node_id)
            .into_iter()
            .flat_map(|by_kind| by_kind.values().flatten())
    }

    pub fn outgoing_of_kind(&self, node_id: &str, kind: EdgeKind) -> &[EdgeId] {
        self.forward
            .get(node_id)
            .and_then(|by_kind| by_kind.get(&kind))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn incoming(&self, node_id: &str) -> &[EdgeId] {
        self.reverse
            .get(node_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn out_degree(&self, node_id: &str) -> usize {
        self.forward
            .get(node_id)
            .map(|by_kind| by_kind.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn in_degree(&self, node_id: &str) -> usize {
        self.incoming(node_id).len()
    }

    pub fn edge_count(&self) -> usize {
        self.forward
            .values()
            .map(|by_kind| by_kind.values().map(Vec::len).sum::<usize>())
            .sum()
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }
}
