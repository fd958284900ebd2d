use analysis::trend::{emerging_trends, segment_users, topic_trends};
use analysis::{EntityType, Timeframe, TrendAnalyzer};
use chrono::{DateTime, Duration, TimeZone, Utc};
use reelgraph_core::config::{SeedConfig, TrendConfig};
use reelgraph_core::interaction::{ContentSnapshot, InteractionAction, UserInteraction};
use reelgraph_core::model::{Edge, EdgeKind, Node, NodeKind, NodeProperties};
use std::sync::Arc;
use storage::{Graph, GraphStore};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap()
}

/// Links `count` fresh videos to `topic`, each edge `age` before `now()`.
fn mentions(graph: &mut Graph, topic: &str, prefix: &str, count: usize, age: Duration) {
    for i in 0..count {
        let video = format!("{}-{}", prefix, i);
        graph.add_node(Node::new(video.clone(), NodeKind::Video)).unwrap();
        graph
            .add_edge(
                Edge::new(format!("{}-edge", video), EdgeKind::RelatedTo, video, topic, 1.0)
                    .with_created_at(now() - age),
            )
            .unwrap();
    }
}

fn topic(graph: &mut Graph, id: &str, name: &str) {
    graph
        .add_node(Node::new(id, NodeKind::Topic).with_properties(NodeProperties::named(name)))
        .unwrap();
}

#[test]
fn test_rising_topic_growth_and_lifespan() {
    let mut graph = Graph::new();
    topic(&mut graph, "topic:science", "Science");
    mentions(&mut graph, "topic:science", "new", 12, Duration::days(2));
    mentions(&mut graph, "topic:science", "old", 3, Duration::days(10));

    let trends = topic_trends(&graph, Timeframe::Week, 5, now());
    assert_eq!(trends.len(), 1);
    let trend = &trends[0];
    assert_eq!(trend.name, "Science");
    assert_eq!(trend.current_count, 12);
    assert_eq!(trend.previous_count, 3);
    assert_eq!(trend.growth, 3.0);
    assert_eq!(trend.strength, 1.0);
    assert_eq!(trend.predicted_lifespan_days, 28);
}

#[test]
fn test_quiet_topics_are_left_out_and_order_is_by_strength() {
    let mut graph = Graph::new();
    topic(&mut graph, "topic:art", "Art");
    topic(&mut graph, "topic:sports", "Sports");
    topic(&mut graph, "topic:health", "Health");
    mentions(&mut graph, "topic:art", "art", 2, Duration::hours(3));
    mentions(&mut graph, "topic:sports", "sports", 6, Duration::hours(3));
    mentions(&mut graph, "topic:health", "health", 4, Duration::days(20));

    let trends = topic_trends(&graph, Timeframe::Week, 5, now());
    let names: Vec<&str> = trends.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["Sports", "Art"]);

    let day = topic_trends(&graph, Timeframe::Day, 1, now());
    assert_eq!(day.len(), 1);
    assert_eq!(day[0].name, "Sports");
}

#[test]
fn test_emerging_prefers_growth_over_volume() {
    let mut graph = Graph::new();
    topic(&mut graph, "topic:steady", "Steady");
    topic(&mut graph, "topic:fresh", "Fresh");
    mentions(&mut graph, "topic:steady", "steady-now", 10, Duration::days(1));
    mentions(&mut graph, "topic:steady", "steady-then", 10, Duration::days(9));
    mentions(&mut graph, "topic:fresh", "fresh-now", 8, Duration::days(1));
    mentions(&mut graph, "topic:fresh", "fresh-then", 2, Duration::days(9));

    let emerging = emerging_trends(&graph, EntityType::Topic, Timeframe::Week, 5, now());
    assert_eq!(emerging.len(), 2);
    assert_eq!(emerging[0].entity_id, "topic:fresh");
    assert_eq!(emerging[0].growth, 3.0);
    // 0.4 * 8/10 + 0.6 * 3/5
    assert!((emerging[0].momentum - 0.68).abs() < 1e-9);
    // 0.4 * 10/10 + 0.6 * 0
    assert!((emerging[1].momentum - 0.4).abs() < 1e-9);
    assert_eq!(emerging[1].growth, 0.0);
}

#[test]
fn test_segments_group_by_dominant_category() {
    let mut graph = Graph::new();
    let videos = [("c1", "Comedy"), ("c2", "Comedy"), ("m1", "Music"), ("g1", "Gaming")];
    for (id, category) in videos {
        graph
            .add_node(
                Node::new(id, NodeKind::Video)
                    .with_properties(NodeProperties::default().with_category(category)),
            )
            .unwrap();
    }
    let histories: [(&str, &[&str]); 4] = [
        ("alice", &["c1", "c2", "m1"]),
        ("bob", &["c1", "m1", "c2"]),
        ("carol", &["m1"]),
        ("dave", &[]),
    ];
    for (user, seen) in histories {
        graph.add_node(Node::new(user, NodeKind::User)).unwrap();
        for (i, video) in seen.iter().enumerate() {
            graph
                .add_edge(
                    Edge::new(format!("{}-{}", user, video), EdgeKind::Viewed, user, *video, 1.0)
                        .with_created_at(now() - Duration::minutes(10 - i as i64)),
                )
                .unwrap();
        }
    }

    let segments = segment_users(&graph, 10);
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].category, "Comedy");
    assert_eq!(segments[0].users, ["alice", "bob"]);
    assert_eq!(segments[0].shared_interests, ["Comedy", "Music"]);
    assert_eq!(segments[1].category, "Music");
    assert_eq!(segments[1].size, 1);

    assert_eq!(segment_users(&graph, 1).len(), 1);
}

#[tokio::test]
async fn test_analyzer_sees_ingested_topics() {
    let store = Arc::new(GraphStore::seeded(SeedConfig::default()).await);
    store
        .process_user_interaction(
            "u1",
            &UserInteraction::new("v1", InteractionAction::View, Utc::now()),
            &ContentSnapshot::new("v1").with_topics(["Science"]),
        )
        .await
        .unwrap();

    let analyzer = TrendAnalyzer::new(store, TrendConfig::default());
    let trends = analyzer
        .analyze_trends(Timeframe::Day, analyzer.default_count())
        .await;
    assert_eq!(trends.len(), 1);
    assert_eq!(trends[0].topic_id, "topic:science");
    assert_eq!(trends[0].growth, 1.0);
}
