use analysis::recommendation::recommend;
use analysis::{CommunityAlgorithm, CommunityDetector, CommunityOptions};
use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use reelgraph_core::config::{CommunityConfig, RecommendationConfig};
use reelgraph_core::model::{Edge, EdgeKind, Node, NodeKind, NodeProperties};
use storage::Graph;

const CATEGORIES: [&str; 5] = ["Comedy", "Music", "Gaming", "Food", "Travel"];

/// 200 users each viewing a sliding band of 20 out of 500 videos.
fn viewing_graph() -> Graph {
    let now = Utc::now();
    let mut graph = Graph::new();
    for v in 0..500 {
        graph
            .add_node(
                Node::new(format!("v{}", v), NodeKind::Video).with_properties(
                    NodeProperties::default().with_category(CATEGORIES[v % CATEGORIES.len()]),
                ),
            )
            .unwrap();
    }
    for u in 0..200 {
        let user = format!("u{}", u);
        graph.add_node(Node::new(user.clone(), NodeKind::User)).unwrap();
        for k in 0..20 {
            let video = format!("v{}", (u * 2 + k) % 500);
            graph
                .add_edge(
                    Edge::new(
                        format!("{}-{}", user, video),
                        EdgeKind::Viewed,
                        user.clone(),
                        video,
                        1.0,
                    )
                    .with_created_at(now - Duration::minutes(k as i64)),
                )
                .unwrap();
        }
    }
    graph
}

/// Ten dense friend circles joined in a ring.
fn social_graph() -> Graph {
    let mut graph = Graph::new();
    for circle in 0..10 {
        let members: Vec<String> = (0..10).map(|i| format!("c{}-{}", circle, i)).collect();
        for id in &members {
            graph.add_node(Node::new(id.clone(), NodeKind::User)).unwrap();
        }
        for (i, a) in members.iter().enumerate() {
            for b in &members[i + 1..] {
                graph
                    .add_edge(Edge::new(format!("{}>{}", a, b), EdgeKind::Follows, a.clone(), b.clone(), 1.0))
                    .unwrap();
            }
        }
    }
    for circle in 0..10 {
        let from = format!("c{}-0", circle);
        let to = format!("c{}-0", (circle + 1) % 10);
        graph
            .add_edge(Edge::new(format!("ring{}", circle), EdgeKind::Follows, from, to, 0.2))
            .unwrap();
    }
    graph
}

pub fn recommendation_benchmark(c: &mut Criterion) {
    let graph = viewing_graph();
    let config = RecommendationConfig::default();
    let now = Utc::now();
    c.bench_function("recommend 10 for one user", |b| {
        b.iter(|| recommend(&graph, black_box("u42"), 10, true, &config, now))
    });
}

pub fn community_benchmark(c: &mut Criterion) {
    let graph = social_graph();
    let detector = CommunityDetector::new(&graph, CommunityConfig::default());
    let louvain = CommunityOptions {
        seed: Some(1),
        ..CommunityOptions::default()
    };
    let propagation = CommunityOptions {
        algorithm: CommunityAlgorithm::LabelPropagation,
        seed: Some(1),
        ..CommunityOptions::default()
    };
    c.bench_function("louvain 100 users", |b| b.iter(|| detector.detect(black_box(&louvain))));
    c.bench_function("label propagation 100 users", |b| {
        b.iter(|| detector.detect(black_box(&propagation)))
    });
}

criterion_group!(benches, recommendation_benchmark, community_benchmark);
criterion_main!(benches);
