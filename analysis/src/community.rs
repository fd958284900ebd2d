use crate::stats::ratio;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use reelgraph_core::config::CommunityConfig;
use reelgraph_core::model::NodeKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use storage::{Graph, GraphStore};
use tracing::debug;

const MIN_GAIN: f64 = 1e-12;
const CENTRAL_FRACTION: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum CommunityAlgorithm {
    #[default]
    Louvain,
    LabelPropagation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    pub id: usize,
    pub members: Vec<String>,
    pub density: f64,
    pub cohesion: f64,
    pub central_nodes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityReport {
    pub algorithm: CommunityAlgorithm,
    pub communities: Vec<Community>,
    pub modularity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommunityOptions {
    pub algorithm: CommunityAlgorithm,
    pub min_community_size: Option<usize>,
    pub seed: Option<u64>,
    pub node_types: Option<Vec<NodeKind>>,
}

/// Undirected weighted view of the graph. Parallel edges are summed and
/// self-loops dropped.
type Adjacency = BTreeMap<String, BTreeMap<String, f64>>;

fn build_undirected_adj(graph: &Graph, node_types: Option<&[NodeKind]>) -> Adjacency {
    let allowed = |kind: NodeKind| node_types.map_or(true, |kinds| kinds.contains(&kind));

    let mut adj = Adjacency::new();
    for node in graph.nodes().filter(|node| allowed(node.kind)) {
        adj.entry(node.id.clone()).or_default();
    }

    for edge in graph.edges() {
        if edge.source == edge.target
            || !adj.contains_key(&edge.source)
            || !adj.contains_key(&edge.target)
        {
            continue;
        }
        *adj.entry(edge.source.clone())
            .or_default()
            .entry(edge.target.clone())
            .or_insert(0.0) += edge.weight;
        *adj.entry(edge.target.clone())
            .or_default()
            .entry(edge.source.clone())
            .or_insert(0.0) += edge.weight;
    }

    adj
}

fn node_degree(node_id: &str, adj: &Adjacency) -> f64 {
    adj.get(node_id)
        .map(|neighbors| neighbors.values().sum())
        .unwrap_or(0.0)
}

fn total_undirected_weight(adj: &Adjacency) -> f64 {
    adj.values()
        .map(|neighbors| neighbors.values().sum::<f64>())
        .sum::<f64>()
        / 2.0
}

/// Newman modularity of a partition over the undirected view.
fn modularity(adj: &Adjacency, assignment: &HashMap<String, usize>) -> f64 {
    let m = total_undirected_weight(adj);
    if m <= f64::EPSILON {
        return 0.0;
    }

    let mut internal: HashMap<usize, f64> = HashMap::new();
    let mut totals: HashMap<usize, f64> = HashMap::new();
    for (node_id, neighbors) in adj {
        let Some(comm) = assignment.get(node_id) else {
            continue;
        };
        *totals.entry(*comm).or_insert(0.0) += neighbors.values().sum::<f64>();
        for (neighbor_id, weight) in neighbors {
            if assignment.get(neighbor_id) == Some(comm) {
                *internal.entry(*comm).or_insert(0.0) += weight;
            }
        }
    }

    totals
        .iter()
        .map(|(comm, total)| {
            let inside = internal.get(comm).copied().unwrap_or(0.0);
            inside / (2.0 * m) - (total / (2.0 * m)).powi(2)
        })
        .sum()
}

/// Local-moving modularity optimization from singleton communities.
///
/// A node leaves its community only for a strictly better one. Communities
/// that end up disconnected are split into their connected parts.
fn louvain(adj: &Adjacency, max_passes: usize) -> HashMap<String, usize> {
    let nodes: Vec<&String> = adj.keys().collect();
    let mut assignment: HashMap<String, usize> = nodes
        .iter()
        .enumerate()
        .map(|(idx, id)| ((*id).clone(), idx))
        .collect();

    let m = total_undirected_weight(adj);
    if m <= f64::EPSILON {
        return assignment;
    }

    let degrees: HashMap<&str, f64> = nodes
        .iter()
        .map(|id| (id.as_str(), node_degree(id, adj)))
        .collect();
    let mut sum_tot: HashMap<usize, f64> = nodes
        .iter()
        .enumerate()
        .map(|(idx, id)| (idx, degrees[id.as_str()]))
        .collect();

    for _ in 0..max_passes {
        let mut moved = false;

        for node_id in &nodes {
            let k_i = degrees[node_id.as_str()];
            if k_i <= f64::EPSILON {
                continue;
            }
            let current = assignment[node_id.as_str()];

            let mut links: BTreeMap<usize, f64> = BTreeMap::new();
            links.insert(current, 0.0);
            if let Some(neighbors) = adj.get(node_id.as_str()) {
                for (neighbor_id, weight) in neighbors {
                    if let Some(comm) = assignment.get(neighbor_id) {
                        *links.entry(*comm).or_insert(0.0) += weight;
                    }
                }
            }

            *sum_tot.entry(current).or_insert(0.0) -= k_i;

            let gain = |comm: usize, k_i_in: f64| {
                k_i_in - sum_tot.get(&comm).copied().unwrap_or(0.0) * k_i / (2.0 * m)
            };
            let stay_gain = gain(current, links[&current]);
            let mut best = (current, stay_gain);
            for (comm, k_i_in) in &links {
                let candidate = gain(*comm, *k_i_in);
                if candidate > best.1 + MIN_GAIN {
                    best = (*comm, candidate);
                }
            }

            *sum_tot.entry(best.0).or_insert(0.0) += k_i;
            if best.0 != current {
                assignment.insert((*node_id).clone(), best.0);
                moved = true;
            }
        }

        if !moved {
            break;
        }
    }

    refine_connected_communities(adj, &assignment)
}

fn refine_connected_communities(
    adj: &Adjacency,
    assignment: &HashMap<String, usize>,
) -> HashMap<String, usize> {
    let mut by_community: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
    for node_id in adj.keys() {
        if let Some(comm) = assignment.get(node_id) {
            by_community.entry(*comm).or_default().push(node_id);
        }
    }

    let mut refined = HashMap::new();
    let mut next_comm_id = 0usize;
    for nodes in by_community.into_values() {
        for component in connected_components(&nodes, adj) {
            for node_id in component {
                refined.insert(node_id.to_string(), next_comm_id);
            }
            next_comm_id += 1;
        }
    }
    refined
}

fn connected_components<'a>(nodes: &[&'a str], adj: &'a Adjacency) -> Vec<Vec<&'a str>> {
    let members: HashSet<&str> = nodes.iter().copied().collect();
    let mut visited = HashSet::new();
    let mut components = Vec::new();

    for start in nodes {
        if !visited.insert(*start) {
            continue;
        }
        let mut queue = VecDeque::from([*start]);
        let mut component = Vec::new();
        while let Some(node_id) = queue.pop_front() {
            component.push(node_id);
            if let Some(neighbors) = adj.get(node_id) {
                for neighbor_id in neighbors.keys() {
                    let neighbor_id = neighbor_id.as_str();
                    if members.contains(neighbor_id) && visited.insert(neighbor_id) {
                        queue.push_back(neighbor_id);
                    }
                }
            }
        }
        components.push(component);
    }
    components
}

/// Label propagation with a shuffled visiting order per pass.
///
/// Each node adopts the label held by most of its neighbors; among tied
/// labels the one met first in neighbor id order wins.
fn label_propagation(adj: &Adjacency, max_passes: usize, rng: &mut StdRng) -> HashMap<String, usize> {
    let mut order: Vec<&String> = adj.keys().collect();
    let mut labels: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(idx, id)| (id.as_str(), idx))
        .collect();

    for _ in 0..max_passes {
        order.shuffle(rng);
        let mut changed = false;

        for node_id in &order {
            let Some(neighbors) = adj.get(node_id.as_str()) else {
                continue;
            };
            if neighbors.is_empty() {
                continue;
            }

            let mut counts: Vec<(usize, usize)> = Vec::new();
            for neighbor_id in neighbors.keys() {
                let label = labels[neighbor_id.as_str()];
                match counts.iter_mut().find(|(l, _)| *l == label) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((label, 1)),
                }
            }

            let mut best = counts[0];
            for entry in &counts[1..] {
                if entry.1 > best.1 {
                    best = *entry;
                }
            }

            let current = labels[node_id.as_str()];
            if best.0 != current {
                labels.insert(node_id.as_str(), best.0);
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    labels
        .into_iter()
        .map(|(id, label)| (id.to_string(), label))
        .collect()
}

pub struct CommunityDetector<'g> {
    graph: &'g Graph,
    config: CommunityConfig,
}

impl<'g> CommunityDetector<'g> {
    pub fn new(graph: &'g Graph, config: CommunityConfig) -> Self {
        Self { graph, config }
    }

    pub fn detect(&self, options: &CommunityOptions) -> CommunityReport {
        let adj = build_undirected_adj(self.graph, options.node_types.as_deref());
        let max_passes = self.config.max_passes;

        let assignment = match options.algorithm {
            CommunityAlgorithm::Louvain => louvain(&adj, max_passes),
            CommunityAlgorithm::LabelPropagation => {
                let mut rng = match options.seed.or(self.config.seed) {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                label_propagation(&adj, max_passes, &mut rng)
            }
        };

        let min_size = options
            .min_community_size
            .unwrap_or(self.config.min_community_size);

        let mut grouped: BTreeMap<usize, BTreeSet<&str>> = BTreeMap::new();
        for node_id in adj.keys() {
            if let Some(comm) = assignment.get(node_id) {
                grouped.entry(*comm).or_default().insert(node_id);
            }
        }

        let mut groups: Vec<BTreeSet<&str>> = grouped
            .into_values()
            .filter(|members| members.len() >= min_size)
            .collect();
        groups.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.first().cmp(&b.first())));

        let communities: Vec<Community> = groups
            .into_iter()
            .enumerate()
            .map(|(id, members)| self.describe(id, &members, &adj))
            .collect();

        let report = CommunityReport {
            algorithm: options.algorithm,
            modularity: modularity(&adj, &assignment),
            communities,
        };
        debug!(
            "{:?} found {} communities (modularity {:.3})",
            report.algorithm,
            report.communities.len(),
            report.modularity
        );
        report
    }

    fn describe(&self, id: usize, members: &BTreeSet<&str>, adj: &Adjacency) -> Community {
        let mut internal = 0usize;
        let mut incident = 0usize;
        for edge in self.graph.edges() {
            if edge.source == edge.target {
                continue;
            }
            let has_source = members.contains(edge.source.as_str());
            let has_target = members.contains(edge.target.as_str());
            if !adj.contains_key(&edge.source) || !adj.contains_key(&edge.target) {
                continue;
            }
            if has_source && has_target {
                internal += 1;
            }
            if has_source || has_target {
                incident += 1;
            }
        }

        let n = members.len();
        let density = if n < 2 {
            0.0
        } else {
            ratio(internal as f64, (n * (n - 1)) as f64 / 2.0).min(1.0)
        };

        let mut by_degree: Vec<&str> = members.iter().copied().collect();
        by_degree.sort_by(|a, b| {
            self.graph
                .degree(b)
                .cmp(&self.graph.degree(a))
                .then_with(|| a.cmp(b))
        });
        let central_count = ((n as f64) * CENTRAL_FRACTION).ceil().max(1.0) as usize;

        Community {
            id,
            members: members.iter().map(|id| id.to_string()).collect(),
            density,
            cohesion: ratio(internal as f64, incident as f64),
            central_nodes: by_degree
                .into_iter()
                .take(central_count)
                .map(String::from)
                .collect(),
        }
    }
}

/// Store-backed community detection.
pub struct CommunityService {
    store: Arc<GraphStore>,
    config: CommunityConfig,
}

impl CommunityService {
    pub fn new(store: Arc<GraphStore>, config: CommunityConfig) -> Self {
        Self { store, config }
    }

    pub async fn detect_communities(&self, options: &CommunityOptions) -> CommunityReport {
        let graph = self.store.read().await;
        CommunityDetector::new(&graph, self.config.clone()).detect(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelgraph_core::model::{Edge, EdgeKind, Node};

    fn pair_graph() -> Graph {
        let mut graph = Graph::new();
        for id in ["a", "b", "c"] {
            graph.add_node(Node::new(id, NodeKind::User)).unwrap();
        }
        graph
            .add_edge(Edge::new("ab", EdgeKind::Follows, "a", "b", 1.0))
            .unwrap();
        graph
    }

    #[test]
    fn test_modularity_of_singletons_is_negative() {
        let graph = pair_graph();
        let adj = build_undirected_adj(&graph, None);
        let singletons: HashMap<String, usize> = [("a", 0), ("b", 1), ("c", 2)]
            .into_iter()
            .map(|(id, c)| (id.to_string(), c))
            .collect();
        assert!(modularity(&adj, &singletons) < 0.0);

        let merged: HashMap<String, usize> = [("a", 0), ("b", 0), ("c", 2)]
            .into_iter()
            .map(|(id, c)| (id.to_string(), c))
            .collect();
        assert!(modularity(&adj, &merged) > modularity(&adj, &singletons));
    }

    #[test]
    fn test_isolated_node_stays_alone() {
        let graph = pair_graph();
        let adj = build_undirected_adj(&graph, None);
        let assignment = louvain(&adj, 10);
        assert_eq!(assignment["a"], assignment["b"]);
        assert_ne!(assignment["a"], assignment["c"]);
    }

    #[test]
    fn test_node_type_filter_limits_the_view() {
        let mut graph = pair_graph();
        graph.add_node(Node::new("v", NodeKind::Video)).unwrap();
        graph
            .add_edge(Edge::new("av", EdgeKind::Viewed, "a", "v", 1.0))
            .unwrap();
        let adj = build_undirected_adj(&graph, Some(&[NodeKind::User][..]));
        assert_eq!(adj.len(), 3);
        assert_eq!(adj["a"].len(), 1);
    }
}
