use crate::recommendation::video_category;
use crate::stats::desc;
use chrono::{DateTime, Duration, Utc};
use reelgraph_core::config::TrendConfig;
use reelgraph_core::model::{Edge, EdgeKind, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use storage::{Graph, GraphStore};
use tracing::debug;

const STRENGTH_SATURATION: f64 = 10.0;
const GROWTH_CAP: f64 = 5.0;
const SHARED_INTEREST_FRACTION: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Day,
    #[default]
    Week,
    Month,
}

impl Timeframe {
    pub fn window(&self) -> Duration {
        match self {
            Timeframe::Day => Duration::days(1),
            Timeframe::Week => Duration::days(7),
            Timeframe::Month => Duration::days(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    #[default]
    Topic,
    Category,
    Creator,
    Hashtag,
}

impl EntityType {
    fn node_kind(&self) -> Option<NodeKind> {
        match self {
            EntityType::Topic => Some(NodeKind::Topic),
            EntityType::Category => Some(NodeKind::Category),
            EntityType::Creator => Some(NodeKind::Creator),
            EntityType::Hashtag => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicTrend {
    pub topic_id: String,
    pub name: String,
    pub strength: f64,
    pub growth: f64,
    pub current_count: usize,
    pub previous_count: usize,
    pub predicted_lifespan_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergingTrend {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub name: String,
    pub activity: usize,
    pub growth: f64,
    pub momentum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSegment {
    pub category: String,
    pub size: usize,
    pub users: Vec<String>,
    pub shared_interests: Vec<String>,
}

/// Relative change between two adjacent windows. A topic that appears from
/// nothing counts as 100% growth.
pub fn growth_rate(current: usize, previous: usize) -> f64 {
    if previous == 0 {
        if current > 0 {
            1.0
        } else {
            0.0
        }
    } else {
        (current as f64 - previous as f64) / previous as f64
    }
}

pub fn trend_strength(recent: usize) -> f64 {
    (recent as f64 / STRENGTH_SATURATION).min(1.0)
}

pub fn predicted_lifespan_days(strength: f64, growth: f64) -> i64 {
    let mut days = 7;
    if strength > 0.8 {
        days += 14;
    } else if strength > 0.5 {
        days += 7;
    }
    if growth > 1.0 {
        days += 7;
    }
    if growth < 0.0 {
        days = (days - 7).max(1);
    }
    days
}

/// Edge counts in `(now - w, now]` and `(now - 2w, now - w]`.
fn window_counts<'a>(
    edges: impl Iterator<Item = &'a Edge>,
    window: Duration,
    now: DateTime<Utc>,
) -> (usize, usize) {
    let current_start = now - window;
    let previous_start = current_start - window;
    edges.fold((0, 0), |(current, previous), edge| {
        if edge.created_at > current_start && edge.created_at <= now {
            (current + 1, previous)
        } else if edge.created_at > previous_start && edge.created_at <= current_start {
            (current, previous + 1)
        } else {
            (current, previous)
        }
    })
}

/// Topic trends ranked by strength, then growth. Topics with no activity in
/// the current window are left out.
pub fn topic_trends(
    graph: &Graph,
    timeframe: Timeframe,
    count: usize,
    now: DateTime<Utc>,
) -> Vec<TopicTrend> {
    let window = timeframe.window();
    let mut trends: Vec<TopicTrend> = graph
        .get_nodes_by_type(NodeKind::Topic)
        .into_iter()
        .filter_map(|topic| {
            let (current, previous) =
                window_counts(graph.get_incoming_edges(&topic.id).into_iter(), window, now);
            if current == 0 {
                return None;
            }
            let strength = trend_strength(current);
            let growth = growth_rate(current, previous);
            Some(TopicTrend {
                topic_id: topic.id.clone(),
                name: topic.label().to_string(),
                strength,
                growth,
                current_count: current,
                previous_count: previous,
                predicted_lifespan_days: predicted_lifespan_days(strength, growth),
            })
        })
        .collect();

    trends.sort_by(|a, b| desc(a.strength, b.strength).then_with(|| desc(a.growth, b.growth)));
    trends.truncate(count);
    trends
}

/// Entities gaining activity fastest, by momentum.
///
/// Activity counts every incident edge. Hashtags are not modelled as nodes
/// and always yield nothing.
pub fn emerging_trends(
    graph: &Graph,
    entity_type: EntityType,
    timeframe: Timeframe,
    count: usize,
    now: DateTime<Utc>,
) -> Vec<EmergingTrend> {
    let Some(kind) = entity_type.node_kind() else {
        return Vec::new();
    };
    let window = timeframe.window();

    let activity: Vec<(&str, String, usize, f64)> = graph
        .get_nodes_by_type(kind)
        .into_iter()
        .filter_map(|node| {
            let incident = graph
                .get_incoming_edges(&node.id)
                .into_iter()
                .chain(graph.get_outgoing_edges(&node.id));
            let (current, previous) = window_counts(incident, window, now);
            (current > 0).then(|| {
                (
                    node.id.as_str(),
                    node.label().to_string(),
                    current,
                    growth_rate(current, previous),
                )
            })
        })
        .collect();

    let max_activity = activity.iter().map(|(_, _, current, _)| *current).max().unwrap_or(0);
    let mut emerging: Vec<EmergingTrend> = activity
        .into_iter()
        .map(|(id, name, current, growth)| {
            let normalized_activity = if max_activity == 0 {
                0.0
            } else {
                current as f64 / max_activity as f64
            };
            let normalized_growth = growth.clamp(0.0, GROWTH_CAP) / GROWTH_CAP;
            EmergingTrend {
                entity_id: id.to_string(),
                entity_type,
                name,
                activity: current,
                growth,
                momentum: 0.4 * normalized_activity + 0.6 * normalized_growth,
            }
        })
        .collect();

    emerging.sort_by(|a, b| desc(a.momentum, b.momentum));
    emerging.truncate(count);
    emerging
}

/// Group users by the category they view most and describe each group.
pub fn segment_users(graph: &Graph, max_segments: usize) -> Vec<UserSegment> {
    // Per user: viewed categories in first-seen order with counts.
    let mut profiles: Vec<(&str, Vec<(String, usize)>)> = Vec::new();
    for user in graph.get_nodes_by_type(NodeKind::User) {
        let mut views = graph.outgoing_edges_of_kind(&user.id, EdgeKind::Viewed);
        views.sort_by_key(|edge| edge.created_at);

        let mut histogram: Vec<(String, usize)> = Vec::new();
        for edge in views {
            let Some(category) = graph
                .get_node(&edge.target)
                .and_then(|video| video_category(graph, video))
            else {
                continue;
            };
            match histogram.iter_mut().find(|(name, _)| *name == category) {
                Some((_, count)) => *count += 1,
                None => histogram.push((category, 1)),
            }
        }
        if !histogram.is_empty() {
            profiles.push((user.id.as_str(), histogram));
        }
    }

    let mut buckets: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, (_, histogram)) in profiles.iter().enumerate() {
        let mut dominant = &histogram[0];
        for entry in &histogram[1..] {
            if entry.1 > dominant.1 {
                dominant = entry;
            }
        }
        buckets.entry(dominant.0.clone()).or_default().push(idx);
    }

    let mut ranked: Vec<(String, Vec<usize>)> = buckets.into_iter().collect();
    ranked.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(max_segments);

    ranked
        .into_iter()
        .map(|(category, members)| {
            let mut interest_counts: BTreeMap<&str, usize> = BTreeMap::new();
            for idx in &members {
                let seen: BTreeSet<&str> =
                    profiles[*idx].1.iter().map(|(name, _)| name.as_str()).collect();
                for name in seen {
                    *interest_counts.entry(name).or_insert(0) += 1;
                }
            }
            let needed = members.len() as f64 * SHARED_INTEREST_FRACTION;
            let mut shared: Vec<(&str, usize)> = interest_counts
                .into_iter()
                .filter(|(_, count)| *count as f64 >= needed)
                .collect();
            shared.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

            UserSegment {
                category,
                size: members.len(),
                users: members.iter().map(|idx| profiles[*idx].0.to_string()).collect(),
                shared_interests: shared.into_iter().map(|(name, _)| name.to_string()).collect(),
            }
        })
        .collect()
}

/// Store-backed trend and segmentation analysis.
pub struct TrendAnalyzer {
    store: Arc<GraphStore>,
    config: TrendConfig,
}

impl TrendAnalyzer {
    pub fn new(store: Arc<GraphStore>, config: TrendConfig) -> Self {
        Self { store, config }
    }

    pub fn default_count(&self) -> usize {
        self.config.default_count
    }

    pub async fn analyze_trends(&self, timeframe: Timeframe, count: usize) -> Vec<TopicTrend> {
        let graph = self.store.read().await;
        let trends = topic_trends(&graph, timeframe, count, Utc::now());
        debug!("Found {} active topics for {:?}", trends.len(), timeframe);
        trends
    }

    pub async fn detect_emerging(
        &self,
        entity_type: EntityType,
        timeframe: Timeframe,
        count: usize,
    ) -> Vec<EmergingTrend> {
        let graph = self.store.read().await;
        emerging_trends(&graph, entity_type, timeframe, count, Utc::now())
    }

    pub async fn analyze_user_segments(&self) -> Vec<UserSegment> {
        let graph = self.store.read().await;
        segment_users(&graph, self.config.max_segments)
    }
}
