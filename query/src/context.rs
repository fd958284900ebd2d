//! Generation context assembly.
//!
//! Collects what a downstream content generator needs to know about the
//! current state of the graph:
//! - **Trending topics**: the strongest topics in the requested timeframe
//! - **Preferred categories**: the categories a user views most
//! - **Suggested topics**: the user's own topics first, then trending ones

use analysis::recommendation::video_category;
use analysis::trend::topic_trends;
use analysis::Timeframe;
use chrono::{DateTime, Utc};
use reelgraph_core::model::{EdgeKind, NodeKind};
use serde::{Deserialize, Serialize};
use storage::Graph;

const PREFERRED_CATEGORY_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub timeframe: Timeframe,
    pub trending_topics: Vec<String>,
    pub preferred_categories: Vec<String>,
    pub suggested_topics: Vec<String>,
}

/// Count occurrences, keeping first-seen order for equal counts.
fn ranked(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for name in names {
        match counts.iter_mut().find(|(seen, _)| *seen == name) {
            Some((_, count)) => *count += 1,
            None => counts.push((name, 1)),
        }
    }
    // Stable sort keeps first-seen order among ties.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().map(|(name, _)| name).collect()
}

pub fn build_generation_context(
    graph: &Graph,
    user_id: Option<&str>,
    timeframe: Timeframe,
    count: usize,
    now: DateTime<Utc>,
) -> GenerationContext {
    let trending_topics: Vec<String> = topic_trends(graph, timeframe, count, now)
        .into_iter()
        .map(|trend| trend.name)
        .collect();

    let mut viewed = match user_id {
        Some(user) => graph.outgoing_edges_of_kind(user, EdgeKind::Viewed),
        None => Vec::new(),
    };
    viewed.sort_by_key(|edge| edge.created_at);
    let videos: Vec<_> = viewed
        .iter()
        .filter_map(|edge| graph.get_node(&edge.target))
        .collect();

    let mut preferred_categories =
        ranked(videos.iter().filter_map(|video| video_category(graph, video)));
    preferred_categories.truncate(PREFERRED_CATEGORY_LIMIT);

    let own_topics = ranked(videos.iter().flat_map(|video| {
        graph
            .outgoing_edges_of_kind(&video.id, EdgeKind::RelatedTo)
            .into_iter()
            .filter_map(|edge| graph.get_node(&edge.target))
            .filter(|node| node.kind == NodeKind::Topic)
            .map(|node| node.label().to_string())
            .collect::<Vec<_>>()
    }));

    let mut suggested_topics: Vec<String> = Vec::new();
    for topic in own_topics.into_iter().chain(trending_topics.iter().cloned()) {
        if suggested_topics.len() == count {
            break;
        }
        if !suggested_topics.contains(&topic) {
            suggested_topics.push(topic);
        }
    }

    GenerationContext {
        user_id: user_id.map(str::to_string),
        timeframe,
        trending_topics,
        preferred_categories,
        suggested_topics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelgraph_core::model::{Edge, Node, NodeProperties};

    #[test]
    fn test_ties_keep_first_seen_order() {
        let names = ["b", "a", "a", "b", "c"].map(String::from);
        assert_eq!(ranked(names), ["b", "a", "c"]);
    }

    #[test]
    fn test_anonymous_context_uses_trends_only() {
        let now = Utc::now();
        let mut graph = Graph::new();
        graph
            .add_node(
                Node::new("topic:art", NodeKind::Topic)
                    .with_properties(NodeProperties::named("Art")),
            )
            .unwrap();
        graph.add_node(Node::new("v1", NodeKind::Video)).unwrap();
        graph
            .add_edge(
                Edge::new("e1", EdgeKind::RelatedTo, "v1", "topic:art", 1.0)
                    .with_created_at(now - chrono::Duration::hours(1)),
            )
            .unwrap();

        let context = build_generation_context(&graph, None, Timeframe::Week, 5, now);
        assert_eq!(context.trending_topics, ["Art"]);
        assert!(context.preferred_categories.is_empty());
        assert_eq!(context.suggested_topics, ["Art"]);
    }
}
