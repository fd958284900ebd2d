use crate::stats::desc;
use chrono::Duration;
use reelgraph_core::config::PatternConfig;
use reelgraph_core::model::{Edge, EdgeKind, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use storage::{Graph, GraphStore};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    #[default]
    Frequent,
    Sequential,
    Causal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphPattern {
    pub id: String,
    pub kind: PatternKind,
    pub node_ids: Vec<String>,
    pub edge_ids: Vec<String>,
    pub node_types: Vec<NodeKind>,
    pub edge_types: Vec<EdgeKind>,
    pub support: f64,
    pub confidence: f64,
}

/// Restrictions and thresholds for one mining run. `None` falls back to the
/// configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatternOptions {
    pub node_types: Option<Vec<NodeKind>>,
    pub edge_types: Option<Vec<EdgeKind>>,
    pub min_support: Option<f64>,
    pub max_pattern_size: Option<usize>,
}

/// Connected sub-structure under construction.
#[derive(Debug, Clone)]
struct Candidate<'a> {
    nodes: Vec<&'a str>,
    edges: Vec<&'a Edge>,
}

impl<'a> Candidate<'a> {
    fn key(&self) -> (Vec<&'a str>, Vec<&'a str>) {
        let mut nodes = self.nodes.clone();
        nodes.sort_unstable();
        let mut edges: Vec<&str> = self.edges.iter().map(|edge| edge.id.as_str()).collect();
        edges.sort_unstable();
        (nodes, edges)
    }

    fn node_types(&self, graph: &Graph) -> Vec<NodeKind> {
        self.nodes
            .iter()
            .filter_map(|id| graph.get_node(id).map(|node| node.kind))
            .collect()
    }

    fn edge_types(&self) -> Vec<EdgeKind> {
        self.edges.iter().map(|edge| edge.kind).collect()
    }

    /// Sorted node and edge kinds; candidates with the same signature count
    /// toward each other's support.
    fn signature(&self, graph: &Graph) -> (Vec<NodeKind>, Vec<EdgeKind>) {
        let mut nodes = self.node_types(graph);
        nodes.sort_unstable();
        let mut edges = self.edge_types();
        edges.sort_unstable();
        (nodes, edges)
    }
}

pub struct PatternDetector<'g> {
    graph: &'g Graph,
    config: PatternConfig,
}

impl<'g> PatternDetector<'g> {
    pub fn new(graph: &'g Graph, config: PatternConfig) -> Self {
        Self { graph, config }
    }

    pub fn detect(&self, kind: PatternKind, options: &PatternOptions) -> Vec<GraphPattern> {
        let frequent = self.frequent_patterns(options);
        let patterns: Vec<GraphPattern> = match kind {
            PatternKind::Frequent => frequent,
            PatternKind::Sequential => self.sequential(frequent, PatternKind::Sequential),
            PatternKind::Causal => self
                .sequential(frequent, PatternKind::Causal)
                .into_iter()
                .filter(|pattern| {
                    pattern
                        .edge_types
                        .iter()
                        .all(|kind| matches!(kind, EdgeKind::Created | EdgeKind::InspiredBy))
                })
                .collect(),
        };
        debug!("Detected {} {:?} patterns", patterns.len(), kind);
        patterns
    }

    fn frequent_patterns(&self, options: &PatternOptions) -> Vec<GraphPattern> {
        let min_support = options.min_support.unwrap_or(self.config.min_support);
        let max_size = options
            .max_pattern_size
            .unwrap_or(self.config.max_pattern_size)
            .max(1);
        let node_filter: Option<HashSet<NodeKind>> = options
            .node_types
            .as_ref()
            .map(|kinds| kinds.iter().copied().collect());
        let edge_filter: Option<HashSet<EdgeKind>> = options
            .edge_types
            .as_ref()
            .map(|kinds| kinds.iter().copied().collect());

        let allowed_node = |kind: NodeKind| node_filter.as_ref().map_or(true, |f| f.contains(&kind));
        let allowed_edge = |kind: EdgeKind| edge_filter.as_ref().map_or(true, |f| f.contains(&kind));

        let nodes: Vec<_> = self.graph.nodes().filter(|node| allowed_node(node.kind)).collect();
        let mut type_counts: HashMap<NodeKind, usize> = HashMap::new();
        for node in &nodes {
            *type_counts.entry(node.kind).or_insert(0) += 1;
        }

        let mut patterns = Vec::new();
        let mut generation: Vec<Candidate> = Vec::new();
        for node in &nodes {
            // 1/|type| rewards rare kinds rather than measuring frequency.
            // Kept for compatibility with existing consumers.
            let support = 1.0 / type_counts[&node.kind] as f64;
            if support < min_support {
                continue;
            }
            let candidate = Candidate {
                nodes: vec![node.id.as_str()],
                edges: Vec::new(),
            };
            patterns.push(self.to_pattern(&candidate, PatternKind::Frequent, support, support));
            generation.push(candidate);
        }

        for _size in 2..=max_size {
            if generation.is_empty() {
                break;
            }

            let mut seen = HashSet::new();
            let mut extended = Vec::new();
            'grow: for candidate in &generation {
                for node_id in &candidate.nodes {
                    for edge in self.graph.get_outgoing_edges(node_id) {
                        if !allowed_edge(edge.kind) || candidate.nodes.contains(&edge.target.as_str()) {
                            continue;
                        }
                        let target_allowed = self
                            .graph
                            .get_node(&edge.target)
                            .is_some_and(|target| allowed_node(target.kind));
                        if !target_allowed {
                            continue;
                        }

                        let mut next = candidate.clone();
                        next.nodes.push(edge.target.as_str());
                        next.edges.push(edge);
                        if seen.insert(next.key()) {
                            extended.push(next);
                            if extended.len() >= self.config.max_candidates_per_level {
                                break 'grow;
                            }
                        }
                    }
                }
            }

            if extended.is_empty() {
                break;
            }

            let mut signature_counts = HashMap::new();
            for candidate in &extended {
                *signature_counts.entry(candidate.signature(self.graph)).or_insert(0usize) += 1;
            }
            let total = extended.len() as f64;

            generation = Vec::new();
            for candidate in extended {
                let support = signature_counts[&candidate.signature(self.graph)] as f64 / total;
                if support < min_support {
                    continue;
                }
                let confidence = 0.7 * support + 0.3 * self.type_diversity(&candidate);
                patterns.push(self.to_pattern(&candidate, PatternKind::Frequent, support, confidence));
                generation.push(candidate);
            }
        }

        patterns.sort_by(|a, b| desc(a.support, b.support));
        patterns
    }

    fn type_diversity(&self, candidate: &Candidate) -> f64 {
        let node_kinds: BTreeSet<NodeKind> = candidate.node_types(self.graph).into_iter().collect();
        let edge_kinds: BTreeSet<EdgeKind> = candidate.edge_types().into_iter().collect();
        let total = candidate.nodes.len() + candidate.edges.len();
        if total == 0 {
            return 0.0;
        }
        (node_kinds.len() + edge_kinds.len()) as f64 / total as f64
    }

    /// Patterns whose edges, in time order, are each more than an hour apart.
    fn sequential(&self, frequent: Vec<GraphPattern>, kind: PatternKind) -> Vec<GraphPattern> {
        frequent
            .into_iter()
            .filter(|pattern| pattern.edge_ids.len() >= 2)
            .filter(|pattern| {
                let mut times: Vec<_> = pattern
                    .edge_ids
                    .iter()
                    .filter_map(|id| self.graph.get_edge(id).map(|edge| edge.created_at))
                    .collect();
                times.sort_unstable();
                times
                    .windows(2)
                    .all(|pair| pair[1] - pair[0] > Duration::hours(1))
            })
            .map(|mut pattern| {
                pattern.kind = kind;
                pattern.id = format!("{}:{}", pattern_prefix(kind), pattern.edge_ids.join("+"));
                pattern
            })
            .collect()
    }

    fn to_pattern(
        &self,
        candidate: &Candidate,
        kind: PatternKind,
        support: f64,
        confidence: f64,
    ) -> GraphPattern {
        let edge_ids: Vec<String> = candidate.edges.iter().map(|edge| edge.id.clone()).collect();
        let id = if edge_ids.is_empty() {
            format!("{}:{}", pattern_prefix(kind), candidate.nodes.join("+"))
        } else {
            format!("{}:{}", pattern_prefix(kind), edge_ids.join("+"))
        };
        GraphPattern {
            id,
            kind,
            node_ids: candidate.nodes.iter().map(|id| id.to_string()).collect(),
            edge_ids,
            node_types: candidate.node_types(self.graph),
            edge_types: candidate.edge_types(),
            support,
            confidence,
        }
    }
}

fn pattern_prefix(kind: PatternKind) -> &'static str {
    match kind {
        PatternKind::Frequent => "frequent",
        PatternKind::Sequential => "sequential",
        PatternKind::Causal => "causal",
    }
}

/// Store-backed pattern mining.
pub struct PatternService {
    store: Arc<GraphStore>,
    config: PatternConfig,
}

impl PatternService {
    pub fn new(store: Arc<GraphStore>, config: PatternConfig) -> Self {
        Self { store, config }
    }

    pub async fn detect_patterns(
        &self,
        kind: PatternKind,
        options: &PatternOptions,
    ) -> Vec<GraphPattern> {
        let graph = self.store.read().await;
        PatternDetector::new(&graph, self.config.clone()).detect(kind, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use reelgraph_core::model::Node;

    fn creator_chain() -> Graph {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut graph = Graph::new();
        graph.add_node(Node::new("c1", NodeKind::Creator)).unwrap();
        graph.add_node(Node::new("v1", NodeKind::Video)).unwrap();
        graph.add_node(Node::new("v2", NodeKind::Video)).unwrap();
        graph
            .add_edge(Edge::new("e1", EdgeKind::Created, "c1", "v1", 1.0).with_created_at(t0))
            .unwrap();
        graph
            .add_edge(
                Edge::new("e2", EdgeKind::InspiredBy, "v1", "v2", 1.0)
                    .with_created_at(t0 + Duration::hours(3)),
            )
            .unwrap();
        graph
    }

    #[test]
    fn test_single_node_support_is_inverse_type_count() {
        let graph = creator_chain();
        let detector = PatternDetector::new(&graph, PatternConfig::default());
        let options = PatternOptions {
            max_pattern_size: Some(1),
            ..PatternOptions::default()
        };
        let patterns = detector.detect(PatternKind::Frequent, &options);

        assert_eq!(patterns.len(), 3);
        let creator = patterns.iter().find(|p| p.node_ids == ["c1"]).unwrap();
        assert_eq!(creator.support, 1.0);
        let video = patterns.iter().find(|p| p.node_ids == ["v1"]).unwrap();
        assert_eq!(video.support, 0.5);
    }

    #[test]
    fn test_min_support_prunes_common_kinds() {
        let graph = creator_chain();
        let detector = PatternDetector::new(&graph, PatternConfig::default());
        let options = PatternOptions {
            min_support: Some(0.6),
            max_pattern_size: Some(1),
            ..PatternOptions::default()
        };
        let patterns = detector.detect(PatternKind::Frequent, &options);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].node_types, [NodeKind::Creator]);
    }

    #[test]
    fn test_causal_chain_is_sequential_and_causal() {
        let graph = creator_chain();
        let detector = PatternDetector::new(&graph, PatternConfig::default());
        let options = PatternOptions::default();

        let sequential = detector.detect(PatternKind::Sequential, &options);
        assert_eq!(sequential.len(), 1);
        assert_eq!(sequential[0].edge_ids, ["e1", "e2"]);

        let causal = detector.detect(PatternKind::Causal, &options);
        assert_eq!(causal.len(), 1);
        assert_eq!(causal[0].kind, PatternKind::Causal);
        assert!(causal[0].confidence > 0.0 && causal[0].confidence <= 1.0);
    }
}
