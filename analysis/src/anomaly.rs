use crate::stats::{mean, std_dev, z_score};
use chrono::Timelike;
use reelgraph_core::config::AnomalyConfig;
use reelgraph_core::interaction::InteractionAction;
use reelgraph_core::model::{EdgeKind, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use storage::{Graph, GraphStore};
use tracing::debug;

const ISOLATED_SCORE: f64 = 0.7;
const ISOLATED_CONFIDENCE: f64 = 0.9;
const BRIDGE_SCORE: f64 = 0.8;
const BRIDGE_CONFIDENCE: f64 = 0.6;
const HUB_Z: f64 = 2.0;
const TEMPORAL_Z: f64 = 2.0;
const VIRAL_Z: f64 = 3.0;
const RATE_FACTOR: f64 = 3.0;
const MIN_RAPID_GAP_SECS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyScope {
    Structural,
    Temporal,
    Behavioral,
    Content,
    #[default]
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnomalyKind {
    IsolatedNode,
    HubNode,
    BridgeEdge,
    CreationSpike,
    RapidFire,
    UnusualActionRate,
    ViralContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub scope: AnomalyScope,
    /// Node id, edge id, or `hour:<HH>` for temporal buckets.
    pub subject: String,
    pub score: f64,
    pub confidence: f64,
    pub description: String,
}

/// Expected share of each action in a typical user's history.
fn expected_rate(action: InteractionAction) -> Option<f64> {
    match action {
        InteractionAction::View => Some(0.7),
        InteractionAction::Like => Some(0.2),
        InteractionAction::Comment => Some(0.05),
        InteractionAction::Share => Some(0.03),
        InteractionAction::Follow => Some(0.02),
        InteractionAction::Skip => None,
    }
}

pub struct AnomalyDetector<'g> {
    graph: &'g Graph,
    config: AnomalyConfig,
}

impl<'g> AnomalyDetector<'g> {
    pub fn new(graph: &'g Graph, config: AnomalyConfig) -> Self {
        Self { graph, config }
    }

    /// Run one detector, or all four in order. Only anomalies scoring at or
    /// above the sensitivity threshold are returned.
    pub fn detect(&self, scope: AnomalyScope, sensitivity: Option<f64>) -> Vec<Anomaly> {
        let threshold = sensitivity.unwrap_or(self.config.sensitivity_threshold);
        let found = match scope {
            AnomalyScope::Structural => self.structural(),
            AnomalyScope::Temporal => self.temporal(),
            AnomalyScope::Behavioral => self.behavioral(),
            AnomalyScope::Content => self.content(),
            AnomalyScope::All => {
                let mut all = self.structural();
                all.extend(self.temporal());
                all.extend(self.behavioral());
                all.extend(self.content());
                all
            }
        };
        let kept: Vec<Anomaly> = found
            .into_iter()
            .filter(|anomaly| anomaly.score >= threshold)
            .collect();
        debug!("{:?} anomaly scan kept {} findings", scope, kept.len());
        kept
    }

    fn structural(&self) -> Vec<Anomaly> {
        let mut found = Vec::new();

        let degrees: Vec<(&str, f64)> = self
            .graph
            .nodes()
            .map(|node| (node.id.as_str(), self.graph.degree(&node.id) as f64))
            .collect();
        let values: Vec<f64> = degrees.iter().map(|(_, degree)| *degree).collect();
        let (avg, spread) = (mean(&values), std_dev(&values));

        for (node_id, degree) in &degrees {
            if *degree == 0.0 {
                found.push(Anomaly {
                    kind: AnomalyKind::IsolatedNode,
                    scope: AnomalyScope::Structural,
                    subject: node_id.to_string(),
                    score: ISOLATED_SCORE,
                    confidence: ISOLATED_CONFIDENCE,
                    description: format!("{} has no relationships", node_id),
                });
                continue;
            }
            let z = z_score(*degree, avg, spread);
            if z > HUB_Z {
                found.push(Anomaly {
                    kind: AnomalyKind::HubNode,
                    scope: AnomalyScope::Structural,
                    subject: node_id.to_string(),
                    score: (z / 4.0).min(1.0),
                    confidence: 0.8,
                    description: format!("{} has degree {} (z = {:.2})", node_id, degree, z),
                });
            }
        }

        for edge in self.graph.edges() {
            let (Some(source), Some(target)) =
                (self.graph.get_node(&edge.source), self.graph.get_node(&edge.target))
            else {
                continue;
            };
            if source.kind != target.kind {
                found.push(Anomaly {
                    kind: AnomalyKind::BridgeEdge,
                    scope: AnomalyScope::Structural,
                    subject: edge.id.clone(),
                    score: BRIDGE_SCORE,
                    confidence: BRIDGE_CONFIDENCE,
                    description: format!("{} links {} to {}", edge.kind, source.kind, target.kind),
                });
            }
        }

        found
    }

    fn temporal(&self) -> Vec<Anomaly> {
        let mut buckets = [0.0f64; 24];
        for node in self.graph.nodes() {
            buckets[node.created_at.hour() as usize] += 1.0;
        }
        let (avg, spread) = (mean(&buckets), std_dev(&buckets));

        buckets
            .iter()
            .enumerate()
            .filter_map(|(hour, count)| {
                let z = z_score(*count, avg, spread);
                (z > TEMPORAL_Z).then(|| Anomaly {
                    kind: AnomalyKind::CreationSpike,
                    scope: AnomalyScope::Temporal,
                    subject: format!("hour:{:02}", hour),
                    score: (z / 4.0).min(1.0),
                    confidence: 0.7,
                    description: format!("{} nodes created at {:02}:00 (z = {:.2})", count, hour, z),
                })
            })
            .collect()
    }

    fn behavioral(&self) -> Vec<Anomaly> {
        let mut found = Vec::new();

        for user in self.graph.get_nodes_by_type(NodeKind::User) {
            let history = &user.properties.interactions;
            if history.is_empty() {
                continue;
            }

            let mut times: Vec<_> = history.iter().map(|record| record.timestamp).collect();
            times.sort_unstable();
            let gaps: Vec<f64> = times
                .windows(2)
                .map(|pair| (pair[1] - pair[0]).num_milliseconds() as f64 / 1_000.0)
                .collect();
            if !gaps.is_empty() {
                let cutoff = (mean(&gaps) - 2.0 * std_dev(&gaps)).max(MIN_RAPID_GAP_SECS);
                let rapid = gaps.iter().filter(|gap| **gap < cutoff).count();
                if rapid > 0 {
                    let fraction = rapid as f64 / gaps.len() as f64;
                    found.push(Anomaly {
                        kind: AnomalyKind::RapidFire,
                        scope: AnomalyScope::Behavioral,
                        subject: user.id.clone(),
                        score: (0.5 + 0.5 * fraction).min(1.0),
                        confidence: 0.6,
                        description: format!(
                            "{} of {} interaction gaps under {:.1}s",
                            rapid,
                            gaps.len(),
                            cutoff
                        ),
                    });
                }
            }

            let total = history.len() as f64;
            let mut counts: BTreeMap<InteractionAction, usize> = BTreeMap::new();
            for record in history {
                *counts.entry(record.action).or_insert(0) += 1;
            }
            for (action, count) in counts {
                let Some(expected) = expected_rate(action) else {
                    continue;
                };
                let ratio = (count as f64 / total) / expected;
                if ratio > RATE_FACTOR {
                    found.push(Anomaly {
                        kind: AnomalyKind::UnusualActionRate,
                        scope: AnomalyScope::Behavioral,
                        subject: user.id.clone(),
                        score: (ratio / (2.0 * RATE_FACTOR)).min(1.0),
                        confidence: 0.7,
                        description: format!(
                            "{} rate is {:.1}x the expected share",
                            action, ratio
                        ),
                    });
                }
            }
        }

        found
    }

    fn content(&self) -> Vec<Anomaly> {
        let videos = self.graph.get_nodes_by_type(NodeKind::Video);
        let views: Vec<f64> = videos
            .iter()
            .map(|video| {
                self.graph
                    .incoming_edges_of_kind(&video.id, EdgeKind::Viewed)
                    .len() as f64
            })
            .collect();
        let (avg, spread) = (mean(&views), std_dev(&views));

        videos
            .iter()
            .zip(&views)
            .filter_map(|(video, count)| {
                let z = z_score(*count, avg, spread);
                (z > VIRAL_Z).then(|| Anomaly {
                    kind: AnomalyKind::ViralContent,
                    scope: AnomalyScope::Content,
                    subject: video.id.clone(),
                    score: (z / 5.0).min(1.0),
                    confidence: 0.8,
                    description: format!("{} views against a mean of {:.1}", count, avg),
                })
            })
            .collect()
    }
}

/// Store-backed anomaly detection.
pub struct AnomalyService {
    store: Arc<GraphStore>,
    config: AnomalyConfig,
}

impl AnomalyService {
    pub fn new(store: Arc<GraphStore>, config: AnomalyConfig) -> Self {
        Self { store, config }
    }

    pub async fn detect_anomalies(&self, scope: AnomalyScope, sensitivity: Option<f64>) -> Vec<Anomaly> {
        let graph = self.store.read().await;
        AnomalyDetector::new(&graph, self.config.clone()).detect(scope, sensitivity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use reelgraph_core::interaction::InteractionRecord;
    use reelgraph_core::model::{Edge, Node, NodeProperties};

    #[test]
    fn test_bridge_edges_join_different_kinds() {
        let mut graph = Graph::new();
        graph.add_node(Node::new("u1", NodeKind::User)).unwrap();
        graph.add_node(Node::new("u2", NodeKind::User)).unwrap();
        graph.add_node(Node::new("v1", NodeKind::Video)).unwrap();
        graph.add_edge(Edge::new("f", EdgeKind::Follows, "u1", "u2", 1.0)).unwrap();
        graph.add_edge(Edge::new("w", EdgeKind::Viewed, "u1", "v1", 1.0)).unwrap();

        let found = AnomalyDetector::new(&graph, AnomalyConfig::default())
            .detect(AnomalyScope::Structural, None);
        let bridges: Vec<_> = found
            .iter()
            .filter(|a| a.kind == AnomalyKind::BridgeEdge)
            .collect();
        assert_eq!(bridges.len(), 1);
        assert_eq!(bridges[0].subject, "w");
    }

    #[test]
    fn test_like_heavy_user_has_unusual_rate() {
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap();
        let mut props = NodeProperties::default();
        for i in 0..4 {
            props.interactions.push(InteractionRecord {
                video_id: format!("v{}", i),
                action: InteractionAction::Like,
                duration: None,
                timestamp: start + Duration::minutes(10 * i),
            });
        }
        let mut graph = Graph::new();
        graph
            .add_node(Node::new("u1", NodeKind::User).with_properties(props))
            .unwrap();

        let found = AnomalyDetector::new(&graph, AnomalyConfig::default())
            .detect(AnomalyScope::Behavioral, None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, AnomalyKind::UnusualActionRate);
        assert!(found[0].score > 0.8);
    }

    #[test]
    fn test_threshold_drops_weak_findings() {
        let mut graph = Graph::new();
        graph.add_node(Node::new("lonely", NodeKind::Video)).unwrap();
        let detector = AnomalyDetector::new(&graph, AnomalyConfig::default());
        assert_eq!(detector.detect(AnomalyScope::Structural, None).len(), 1);
        assert!(detector.detect(AnomalyScope::Structural, Some(0.75)).is_empty());
    }
}
