use analysis::recommendation::{recommend, similar_users, trending_content};
use analysis::RecommendationEngine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use reelgraph_core::config::{RecommendationConfig, SeedConfig};
use reelgraph_core::interaction::{ContentSnapshot, InteractionAction, UserInteraction};
use reelgraph_core::model::{Edge, EdgeKind, Node, NodeKind, NodeProperties};
use std::sync::Arc;
use storage::{Graph, GraphStore};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn add_video(graph: &mut Graph, id: &str, category: &str) {
    graph
        .add_node(
            Node::new(id, NodeKind::Video)
                .with_properties(NodeProperties::default().with_category(category))
                .with_created_at(now() - Duration::days(2)),
        )
        .unwrap();
}

fn view(graph: &mut Graph, edge_id: &str, user: &str, video: &str, at: DateTime<Utc>) {
    graph
        .add_edge(Edge::new(edge_id, EdgeKind::Viewed, user, video, 1.0).with_created_at(at))
        .unwrap();
}

/// u1 has watched seven Comedy and three Music videos.
fn comedy_fan() -> Graph {
    let mut graph = Graph::new();
    graph.add_node(Node::new("u1", NodeKind::User)).unwrap();
    for i in 0..10 {
        let id = format!("seen{}", i);
        let category = if i < 7 { "Comedy" } else { "Music" };
        add_video(&mut graph, &id, category);
        view(
            &mut graph,
            &format!("e{}", i),
            "u1",
            &id,
            now() - Duration::hours(10 - i as i64),
        );
    }
    add_video(&mut graph, "new-comedy", "Comedy");
    add_video(&mut graph, "new-fitness", "Fitness");
    graph
}

#[test]
fn test_affinity_category_beats_unfamiliar_one() {
    let graph = comedy_fan();
    let ranked = recommend(&graph, "u1", 5, true, &RecommendationConfig::default(), now());

    assert_eq!(ranked.len(), 2);
    let comedy = ranked.iter().find(|r| r.content_id == "new-comedy").unwrap();
    let fitness = ranked.iter().find(|r| r.content_id == "new-fitness").unwrap();

    assert!(comedy.breakdown.content > fitness.breakdown.content);
    assert!((comedy.breakdown.content - 0.35).abs() < 1e-9);
    assert_eq!(fitness.breakdown.content, 0.0);
    assert!(comedy.reasons.iter().any(|r| r.contains("Comedy")));
    assert!(fitness.breakdown.diversity > 0.0);
    assert_eq!(comedy.breakdown.diversity, 0.0);
}

#[test]
fn test_viewed_videos_are_never_recommended() {
    let graph = comedy_fan();
    let ranked = recommend(&graph, "u1", 50, false, &RecommendationConfig::default(), now());
    assert!(ranked.iter().all(|r| !r.content_id.starts_with("seen")));
    assert!(ranked.iter().all(|r| r.reasons.is_empty()));
}

#[test]
fn test_count_limits_and_scores_are_sorted() {
    let graph = comedy_fan();
    let ranked = recommend(&graph, "u1", 1, false, &RecommendationConfig::default(), now());
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].content_id, "new-comedy");
}

#[test]
fn test_shared_viewers_raise_collaborative_score() {
    let mut graph = comedy_fan();
    graph.add_node(Node::new("u2", NodeKind::User)).unwrap();
    for i in 0..5 {
        view(&mut graph, &format!("u2-{}", i), "u2", &format!("seen{}", i), now());
    }
    view(&mut graph, "u2-new", "u2", "new-fitness", now());

    let ranked = recommend(&graph, "u1", 5, false, &RecommendationConfig::default(), now());
    let fitness = ranked.iter().find(|r| r.content_id == "new-fitness").unwrap();
    // |{seen0..seen4}| / |{seen0..seen9, new-fitness}| = 5 / 11
    assert!((fitness.breakdown.collaborative - 0.4 * 5.0 / 11.0).abs() < 1e-9);

    let peers = similar_users(&graph, "u1", 5).unwrap();
    assert_eq!(peers[0].user_id, "u2");
    assert_eq!(peers[0].score, 2.5);
}

#[test]
fn test_trending_content_weights_recent_engagement() {
    let mut graph = comedy_fan();
    graph.add_node(Node::new("u2", NodeKind::User)).unwrap();
    graph
        .add_edge(
            Edge::new("share", EdgeKind::Shared, "u2", "new-fitness", 1.0)
                .with_created_at(now() - Duration::hours(1)),
        )
        .unwrap();

    let trending = trending_content(&graph, 3, 24, now());
    assert_eq!(trending[0].content_id, "new-fitness");
    assert_eq!(trending[0].engagement_count, 1);
}

#[tokio::test]
async fn test_engine_reads_through_the_store() {
    let store = Arc::new(GraphStore::seeded(SeedConfig::default()).await);
    let at = Utc::now() - Duration::hours(1);
    store
        .process_user_interaction(
            "u1",
            &UserInteraction::new("v1", InteractionAction::View, at),
            &ContentSnapshot::new("v1").with_category("Gaming"),
        )
        .await
        .unwrap();
    store
        .process_user_interaction(
            "u2",
            &UserInteraction::new("v2", InteractionAction::View, at),
            &ContentSnapshot::new("v2").with_category("Gaming"),
        )
        .await
        .unwrap();

    let engine = RecommendationEngine::new(store, RecommendationConfig::default());
    let ranked = engine.get_recommendations("u1", 5, true).await;
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].content_id, "v2");
    assert!(ranked[0].score > 0.0);
}
