use analysis::{CommunityAlgorithm, CommunityDetector, CommunityOptions};
use reelgraph_core::config::CommunityConfig;
use reelgraph_core::model::{Edge, EdgeKind, Node, NodeKind};
use storage::Graph;

fn link(graph: &mut Graph, source: &str, target: &str, weight: f64) {
    graph
        .add_edge(Edge::new(
            format!("{}-{}", source, target),
            EdgeKind::Follows,
            source,
            target,
            weight,
        ))
        .unwrap();
}

fn sample_graph_two_clusters() -> Graph {
    let mut graph = Graph::new();
    for id in ["a1", "a2", "a3", "b1", "b2", "b3"] {
        graph.add_node(Node::new(id, NodeKind::User)).unwrap();
    }

    // Cluster A
    link(&mut graph, "a1", "a2", 1.0);
    link(&mut graph, "a2", "a3", 1.0);
    link(&mut graph, "a1", "a3", 1.0);

    // Cluster B
    link(&mut graph, "b1", "b2", 1.0);
    link(&mut graph, "b2", "b3", 1.0);
    link(&mut graph, "b1", "b3", 1.0);

    // Weak bridge
    link(&mut graph, "a3", "b1", 0.1);
    graph
}

fn seeded(algorithm: CommunityAlgorithm) -> CommunityOptions {
    CommunityOptions {
        algorithm,
        seed: Some(7),
        ..CommunityOptions::default()
    }
}

#[test]
fn test_louvain_detects_both_clusters() {
    let graph = sample_graph_two_clusters();
    let report = CommunityDetector::new(&graph, CommunityConfig::default())
        .detect(&seeded(CommunityAlgorithm::Louvain));

    assert_eq!(report.communities.len(), 2);
    assert_eq!(report.communities[0].members, ["a1", "a2", "a3"]);
    assert_eq!(report.communities[1].members, ["b1", "b2", "b3"]);
    assert!(report.modularity > 0.3);

    let cluster = &report.communities[0];
    assert_eq!(cluster.density, 1.0);
    assert!((cluster.cohesion - 3.0 / 4.0).abs() < 1e-9);
    assert_eq!(cluster.central_nodes, ["a3"]);
}

#[test]
fn test_label_propagation_is_reproducible_with_a_seed() {
    let graph = sample_graph_two_clusters();
    let detector = CommunityDetector::new(&graph, CommunityConfig::default());

    let first = detector.detect(&seeded(CommunityAlgorithm::LabelPropagation));
    let second = detector.detect(&seeded(CommunityAlgorithm::LabelPropagation));
    assert_eq!(first, second);

    for community in &first.communities {
        assert!(community.members.len() >= 3);
        assert!(community.density > 0.0 && community.density <= 1.0);
    }
}

#[test]
fn test_small_communities_are_discarded() {
    let mut graph = sample_graph_two_clusters();
    graph.add_node(Node::new("solo", NodeKind::User)).unwrap();

    let report = CommunityDetector::new(&graph, CommunityConfig::default())
        .detect(&seeded(CommunityAlgorithm::Louvain));
    assert!(report
        .communities
        .iter()
        .all(|community| !community.members.contains(&"solo".to_string())));

    let everything = CommunityOptions {
        min_community_size: Some(1),
        ..seeded(CommunityAlgorithm::Louvain)
    };
    let report = CommunityDetector::new(&graph, CommunityConfig::default()).detect(&everything);
    assert_eq!(report.communities.len(), 3);
}
