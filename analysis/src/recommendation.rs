use crate::error::AnalysisError;
use crate::stats::{desc, jaccard, ratio};
use chrono::{DateTime, Duration, Utc};
use reelgraph_core::config::RecommendationConfig;
use reelgraph_core::model::{EdgeKind, Node, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use storage::{Graph, GraphStore};
use tracing::debug;

const CONTENT_WEIGHT_CATEGORY: f64 = 0.5;
const CONTENT_WEIGHT_CREATOR: f64 = 0.3;
const COLD_START_CONTENT: f64 = 0.5;
const COLLABORATIVE_WEIGHT: f64 = 0.4;
const NO_PEERS_COLLABORATIVE: f64 = 0.3;
const PROXIMITY_WEIGHT: f64 = 0.3;
const NO_PATH_PROXIMITY: f64 = 0.1;
const RECENCY_WEIGHT: f64 = 0.2;
const RECENCY_DECAY_DAYS: f64 = 30.0;
const DIVERSITY_BONUS: f64 = 0.1;
const TRENDING_MIN_VIEWS: usize = 5;
const MAX_REASONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub content: f64,
    pub collaborative: f64,
    pub graph_proximity: f64,
    pub recency: f64,
    pub diversity: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.content + self.collaborative + self.graph_proximity + self.recency + self.diversity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub content_id: String,
    pub title: Option<String>,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarUser {
    pub user_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingContent {
    pub content_id: String,
    pub score: f64,
    pub engagement_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarContent {
    pub content_id: String,
    pub score: f64,
}

/// Category of a video: its own property, else the BELONGS_TO target label.
pub fn video_category(graph: &Graph, video: &Node) -> Option<String> {
    video.properties.category.clone().or_else(|| {
        graph
            .outgoing_edges_of_kind(&video.id, EdgeKind::BelongsTo)
            .first()
            .and_then(|edge| graph.get_node(&edge.target))
            .map(|node| node.label().to_string())
    })
}

/// Creator key of a video: the CREATED edge source, else the creator property.
pub fn video_creator(graph: &Graph, video: &Node) -> Option<String> {
    graph
        .incoming_edges_of_kind(&video.id, EdgeKind::Created)
        .first()
        .map(|edge| edge.source.clone())
        .or_else(|| video.properties.creator.clone())
}

/// What a user has watched, oldest first.
struct ViewHistory<'a> {
    videos: Vec<&'a Node>,
    distinct: HashSet<&'a str>,
    categories: HashMap<String, usize>,
    creators: HashMap<String, usize>,
    recent_categories: HashSet<String>,
}

impl<'a> ViewHistory<'a> {
    fn build(graph: &'a Graph, user_id: &str, recent_window: usize) -> Self {
        let mut edges = graph.outgoing_edges_of_kind(user_id, EdgeKind::Viewed);
        edges.sort_by_key(|edge| edge.created_at);

        let videos: Vec<&Node> = edges
            .iter()
            .filter_map(|edge| graph.get_node(&edge.target))
            .collect();

        let mut categories = HashMap::new();
        let mut creators = HashMap::new();
        for video in &videos {
            if let Some(category) = video_category(graph, video) {
                *categories.entry(category).or_insert(0) += 1;
            }
            if let Some(creator) = video_creator(graph, video) {
                *creators.entry(creator).or_insert(0) += 1;
            }
        }

        let recent_categories = videos
            .iter()
            .rev()
            .take(recent_window)
            .filter_map(|video| video_category(graph, video))
            .collect();

        Self {
            distinct: videos.iter().map(|video| video.id.as_str()).collect(),
            videos,
            categories,
            creators,
            recent_categories,
        }
    }

    fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}

fn viewed_set<'a>(graph: &'a Graph, user_id: &str) -> HashSet<&'a str> {
    graph
        .outgoing_edges_of_kind(user_id, EdgeKind::Viewed)
        .into_iter()
        .map(|edge| edge.target.as_str())
        .collect()
}

fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 86_400_000.0
}

/// Rank every VIDEO the user has not viewed.
///
/// Unknown users are treated as cold-start users with no history.
pub fn recommend(
    graph: &Graph,
    user_id: &str,
    count: usize,
    include_reasons: bool,
    config: &RecommendationConfig,
    now: DateTime<Utc>,
) -> Vec<Recommendation> {
    let history = ViewHistory::build(graph, user_id, config.recent_category_window);
    let total_views = history.videos.len() as f64;

    let mut ranked: Vec<Recommendation> = graph
        .get_nodes_by_type(NodeKind::Video)
        .into_iter()
        .filter(|video| !history.distinct.contains(video.id.as_str()))
        .map(|candidate| {
            let category = video_category(graph, candidate);
            let creator = video_creator(graph, candidate);
            let mut reasons = Vec::new();

            let content = if history.is_empty() {
                COLD_START_CONTENT
            } else {
                let category_hits = category
                    .as_ref()
                    .and_then(|c| history.categories.get(c))
                    .copied()
                    .unwrap_or(0);
                let creator_hits = creator
                    .as_ref()
                    .and_then(|c| history.creators.get(c))
                    .copied()
                    .unwrap_or(0);
                if include_reasons {
                    if let (Some(category), true) = (&category, category_hits > 0) {
                        reasons.push(format!("Matches your interest in {}", category));
                    }
                    if let (Some(creator), true) = (&creator, creator_hits > 0) {
                        let name = graph.get_node(creator).map(Node::label).unwrap_or(creator);
                        reasons.push(format!("From {}, a creator you have watched before", name));
                    }
                }
                ratio(category_hits as f64, total_views) * CONTENT_WEIGHT_CATEGORY
                    + ratio(creator_hits as f64, total_views) * CONTENT_WEIGHT_CREATOR
            };

            let viewers: Vec<&str> = graph
                .incoming_edges_of_kind(&candidate.id, EdgeKind::Viewed)
                .into_iter()
                .map(|edge| edge.source.as_str())
                .filter(|viewer| *viewer != user_id)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let collaborative = if viewers.is_empty() {
                NO_PEERS_COLLABORATIVE
            } else {
                let similarity: f64 = viewers
                    .iter()
                    .map(|viewer| jaccard(&history.distinct, &viewed_set(graph, viewer)))
                    .sum::<f64>()
                    / viewers.len() as f64;
                if include_reasons && similarity > 0.0 {
                    reasons.push("Popular with users who share your taste".to_string());
                }
                similarity * COLLABORATIVE_WEIGHT
            };

            let paths = graph.find_paths(user_id, &candidate.id, config.max_path_depth);
            let graph_proximity = if paths.is_empty() {
                NO_PATH_PROXIMITY
            } else {
                let strength: f64 = paths
                    .iter()
                    .map(|path| {
                        let weight: f64 = path.iter().map(|edge| edge.weight).sum();
                        weight / (path.len() + 1) as f64
                    })
                    .sum::<f64>()
                    / paths.len() as f64;
                strength.min(1.0) * PROXIMITY_WEIGHT
            };

            let age_days = days_between(candidate.created_at, now).max(0.0);
            let recency = (-age_days / RECENCY_DECAY_DAYS).exp() * RECENCY_WEIGHT;

            let is_new_direction = history.is_empty()
                || category
                    .as_ref()
                    .map_or(true, |c| !history.recent_categories.contains(c));
            let diversity = if is_new_direction { DIVERSITY_BONUS } else { 0.0 };

            if include_reasons {
                if is_trending(graph, &candidate.id, now) {
                    reasons.push("Trending right now".to_string());
                }
                if is_new_direction && !history.is_empty() {
                    reasons.push("Something different from what you usually watch".to_string());
                }
                reasons.truncate(MAX_REASONS);
            }

            let breakdown = ScoreBreakdown {
                content,
                collaborative,
                graph_proximity,
                recency,
                diversity,
            };
            Recommendation {
                content_id: candidate.id.clone(),
                title: candidate.properties.title.clone(),
                score: breakdown.total(),
                breakdown,
                reasons,
            }
        })
        .collect();

    // Stable: equal scores keep id order.
    ranked.sort_by(|a, b| desc(a.score, b.score));
    ranked.truncate(count);
    ranked
}

/// At least five views with more than half of them in the last 24 hours.
fn is_trending(graph: &Graph, video_id: &str, now: DateTime<Utc>) -> bool {
    let views = graph.incoming_edges_of_kind(video_id, EdgeKind::Viewed);
    if views.len() < TRENDING_MIN_VIEWS {
        return false;
    }
    let cutoff = now - Duration::hours(24);
    let recent = views.iter().filter(|edge| edge.created_at > cutoff).count();
    recent * 2 > views.len()
}

/// Other users ranked by overlap: shared likes +1, shared views +0.5 and
/// shared follow targets +0.5.
pub fn similar_users(
    graph: &Graph,
    user_id: &str,
    limit: usize,
) -> Result<Vec<SimilarUser>, AnalysisError> {
    if graph.get_node(user_id).map(|node| node.kind) != Some(NodeKind::User) {
        return Err(AnalysisError::UserNotFound(user_id.to_string()));
    }

    let targets = |id: &str, kind: EdgeKind| -> HashSet<String> {
        graph
            .outgoing_edges_of_kind(id, kind)
            .into_iter()
            .map(|edge| edge.target.clone())
            .collect()
    };
    let liked = targets(user_id, EdgeKind::Liked);
    let viewed = targets(user_id, EdgeKind::Viewed);
    let follows = targets(user_id, EdgeKind::Follows);

    let mut scored: Vec<SimilarUser> = graph
        .get_nodes_by_type(NodeKind::User)
        .into_iter()
        .filter(|other| other.id != user_id)
        .map(|other| {
            let shared_likes = targets(&other.id, EdgeKind::Liked).intersection(&liked).count();
            let shared_views = targets(&other.id, EdgeKind::Viewed).intersection(&viewed).count();
            let shared_follows = targets(&other.id, EdgeKind::Follows)
                .intersection(&follows)
                .count();
            SimilarUser {
                user_id: other.id.clone(),
                score: shared_likes as f64 + 0.5 * shared_views as f64 + 0.5 * shared_follows as f64,
            }
        })
        .filter(|candidate| candidate.score > 0.0)
        .collect();

    scored.sort_by(|a, b| desc(a.score, b.score));
    scored.truncate(limit);
    Ok(scored)
}

fn engagement_weight(kind: EdgeKind) -> f64 {
    match kind {
        EdgeKind::Liked => 2.0,
        EdgeKind::CommentedOn => 3.0,
        EdgeKind::Shared => 4.0,
        EdgeKind::Viewed => 0.5,
        _ => 1.0,
    }
}

/// Videos ranked by recent weighted engagement.
///
/// Each user engagement inside the window contributes its kind weight scaled
/// linearly by how recent it is. Older videos are damped by up to a third
/// and busy videos boosted by a tenth per engagement.
pub fn trending_content(
    graph: &Graph,
    limit: usize,
    window_hours: i64,
    now: DateTime<Utc>,
) -> Vec<TrendingContent> {
    let window_hours = window_hours.max(1);
    let cutoff = now - Duration::hours(window_hours);

    let mut trending: Vec<TrendingContent> = graph
        .get_nodes_by_type(NodeKind::Video)
        .into_iter()
        .filter_map(|video| {
            let recent: Vec<_> = graph
                .get_incoming_edges(&video.id)
                .into_iter()
                .filter(|edge| edge.created_at > cutoff && edge.created_at <= now)
                .filter(|edge| {
                    graph
                        .get_node(&edge.source)
                        .is_some_and(|source| source.kind == NodeKind::User)
                })
                .collect();
            if recent.is_empty() {
                return None;
            }

            let weighted: f64 = recent
                .iter()
                .map(|edge| {
                    let age_hours = (now - edge.created_at).num_seconds() as f64 / 3_600.0;
                    let recency = (1.0 - age_hours / window_hours as f64).clamp(0.0, 1.0);
                    engagement_weight(edge.kind) * recency
                })
                .sum();
            let age_penalty = (days_between(video.created_at, now).max(0.0) / 30.0).min(0.5);
            let score = weighted / (1.0 + age_penalty) * (1.0 + recent.len() as f64 / 10.0);

            Some(TrendingContent {
                content_id: video.id.clone(),
                score,
                engagement_count: recent.len(),
            })
        })
        .collect();

    trending.sort_by(|a, b| desc(a.score, b.score));
    trending.truncate(limit);
    trending
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Videos most alike by tags (70%) and title words (30%).
pub fn similar_content(
    graph: &Graph,
    video_id: &str,
    limit: usize,
) -> Result<Vec<SimilarContent>, AnalysisError> {
    let source = graph
        .get_node(video_id)
        .filter(|node| node.kind == NodeKind::Video)
        .ok_or_else(|| AnalysisError::ContentNotFound(video_id.to_string()))?;

    let tags_of = |node: &Node| -> HashSet<String> {
        node.properties.tags.iter().map(|tag| tag.to_lowercase()).collect()
    };
    let title_of = |node: &Node| word_set(node.properties.title.as_deref().unwrap_or_default());

    let source_tags = tags_of(source);
    let source_title = title_of(source);

    let mut similar: Vec<SimilarContent> = graph
        .get_nodes_by_type(NodeKind::Video)
        .into_iter()
        .filter(|other| other.id != video_id)
        .map(|other| SimilarContent {
            content_id: other.id.clone(),
            score: 0.7 * jaccard(&source_tags, &tags_of(other))
                + 0.3 * jaccard(&source_title, &title_of(other)),
        })
        .filter(|candidate| candidate.score > 0.0)
        .collect();

    similar.sort_by(|a, b| desc(a.score, b.score));
    similar.truncate(limit);
    Ok(similar)
}

/// Store-backed recommendation service.
pub struct RecommendationEngine {
    store: Arc<GraphStore>,
    config: RecommendationConfig,
}

impl RecommendationEngine {
    pub fn new(store: Arc<GraphStore>, config: RecommendationConfig) -> Self {
        Self { store, config }
    }

    pub fn default_count(&self) -> usize {
        self.config.default_count
    }

    pub async fn get_recommendations(
        &self,
        user_id: &str,
        count: usize,
        include_reasons: bool,
    ) -> Vec<Recommendation> {
        let graph = self.store.read().await;
        let ranked = recommend(&graph, user_id, count, include_reasons, &self.config, Utc::now());
        debug!("Scored {} recommendations for {}", ranked.len(), user_id);
        ranked
    }

    pub async fn similar_users(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<SimilarUser>, AnalysisError> {
        let graph = self.store.read().await;
        similar_users(&graph, user_id, limit)
    }

    pub async fn trending_content(&self, limit: usize, window_hours: i64) -> Vec<TrendingContent> {
        let graph = self.store.read().await;
        trending_content(&graph, limit, window_hours, Utc::now())
    }

    pub async fn similar_content(
        &self,
        video_id: &str,
        limit: usize,
    ) -> Result<Vec<SimilarContent>, AnalysisError> {
        let graph = self.store.read().await;
        similar_content(&graph, video_id, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reelgraph_core::model::{Edge, NodeProperties};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn video(graph: &mut Graph, id: &str, category: &str) {
        graph
            .add_node(
                Node::new(id, NodeKind::Video)
                    .with_properties(NodeProperties::default().with_category(category))
                    .with_created_at(now()),
            )
            .unwrap();
    }

    #[test]
    fn test_cold_start_user_gets_flat_content_score_and_bonus() {
        let mut graph = Graph::new();
        video(&mut graph, "v1", "Comedy");

        let ranked = recommend(&graph, "nobody", 5, true, &RecommendationConfig::default(), now());
        assert_eq!(ranked.len(), 1);
        let breakdown = ranked[0].breakdown;
        assert_eq!(breakdown.content, COLD_START_CONTENT);
        assert_eq!(breakdown.collaborative, NO_PEERS_COLLABORATIVE);
        assert_eq!(breakdown.graph_proximity, NO_PATH_PROXIMITY);
        assert_eq!(breakdown.diversity, DIVERSITY_BONUS);
        assert!((breakdown.recency - RECENCY_WEIGHT).abs() < 1e-12);
    }

    #[test]
    fn test_future_created_at_does_not_inflate_recency() {
        let mut graph = Graph::new();
        graph
            .add_node(
                Node::new("v1", NodeKind::Video).with_created_at(now() + Duration::days(3)),
            )
            .unwrap();
        let ranked = recommend(&graph, "u1", 5, false, &RecommendationConfig::default(), now());
        assert!(ranked[0].breakdown.recency <= RECENCY_WEIGHT);
    }

    #[test]
    fn test_trending_requires_five_mostly_recent_views() {
        let mut graph = Graph::new();
        video(&mut graph, "v1", "Comedy");
        for i in 0..5 {
            let user = format!("u{}", i);
            graph.add_node(Node::new(user.clone(), NodeKind::User)).unwrap();
            let at = if i < 3 { now() - Duration::hours(2) } else { now() - Duration::days(3) };
            graph
                .add_edge(
                    Edge::new(format!("e{}", i), EdgeKind::Viewed, user, "v1", 1.0)
                        .with_created_at(at),
                )
                .unwrap();
        }
        assert!(is_trending(&graph, "v1", now()));
        assert!(!is_trending(&graph, "v1", now() + Duration::days(2)));
    }

    #[test]
    fn test_similar_content_prefers_shared_tags() {
        let mut graph = Graph::new();
        for (id, title, tags) in [
            ("v1", "cat jumps high", vec!["cats", "funny"]),
            ("v2", "dog runs", vec!["cats", "funny"]),
            ("v3", "cat jumps", vec!["cooking"]),
        ] {
            let mut props = NodeProperties::default();
            props.title = Some(title.to_string());
            props.tags = tags.into_iter().map(String::from).collect();
            graph
                .add_node(Node::new(id, NodeKind::Video).with_properties(props))
                .unwrap();
        }

        let similar = similar_content(&graph, "v1", 5).unwrap();
        assert_eq!(similar[0].content_id, "v2");
        assert_eq!(similar[1].content_id, "v3");
        assert!(similar_content(&graph, "missing", 5).is_err());
    }
}
