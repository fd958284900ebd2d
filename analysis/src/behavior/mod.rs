//! User behavior mining over session-grouped interaction histories.
//!
//! Every sub-analyzer works on the same [`BehaviorContext`]: the users active
//! in the window, their sessions, and the graph for content lookups. A
//! pattern is reported only when the share of active users that qualify for
//! it reaches `min_pattern_support`.

mod engagement;
mod preference;
mod segment;
pub mod session;
mod social;
mod temporal;

use crate::recommendation::{video_category, video_creator};
use chrono::{DateTime, Duration, Utc};
use reelgraph_core::config::BehaviorConfig;
use serde::{Deserialize, Serialize};
use session::{collect_activity, UserActivity};
use std::collections::BTreeMap;
use std::sync::Arc;
use storage::{Graph, GraphStore};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BehaviorType {
    #[default]
    Engagement,
    ContentPreference,
    Temporal,
    SocialInteraction,
    Segment,
}

impl BehaviorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorType::Engagement => "engagement",
            BehaviorType::ContentPreference => "content-preference",
            BehaviorType::Temporal => "temporal",
            BehaviorType::SocialInteraction => "social-interaction",
            BehaviorType::Segment => "segment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorPattern {
    pub id: String,
    pub kind: BehaviorType,
    pub name: String,
    pub description: String,
    pub support: f64,
    pub confidence: f64,
    pub users: Vec<String>,
    pub metrics: BTreeMap<String, f64>,
}

/// Shared inputs for one behavior run.
pub struct BehaviorContext<'g> {
    pub graph: &'g Graph,
    pub config: &'g BehaviorConfig,
    pub activity: Vec<UserActivity>,
}

impl<'g> BehaviorContext<'g> {
    pub fn new(graph: &'g Graph, config: &'g BehaviorConfig, now: DateTime<Utc>) -> Self {
        let activity = collect_activity(
            graph,
            Duration::days(config.window_days),
            Duration::minutes(config.session_gap_minutes),
            now,
        );
        Self {
            graph,
            config,
            activity,
        }
    }

    pub fn category_of(&self, video_id: &str) -> Option<String> {
        self.graph
            .get_node(video_id)
            .and_then(|video| video_category(self.graph, video))
    }

    pub fn creator_of(&self, video_id: &str) -> Option<String> {
        self.graph
            .get_node(video_id)
            .and_then(|video| video_creator(self.graph, video))
    }

    /// Build a pattern from the qualifying users, or nothing when support is
    /// below the configured minimum.
    pub fn emit(
        &self,
        kind: BehaviorType,
        slug: &str,
        name: impl Into<String>,
        description: impl Into<String>,
        users: Vec<String>,
        metrics: BTreeMap<String, f64>,
    ) -> Option<BehaviorPattern> {
        let population = self.activity.len();
        if population == 0 || users.is_empty() {
            return None;
        }
        let support = users.len() as f64 / population as f64;
        if support < self.config.min_pattern_support {
            return None;
        }
        // Shrinks toward zero for small populations.
        let confidence = support * population as f64 / (population as f64 + 5.0);
        Some(BehaviorPattern {
            id: format!("{}:{}", kind.as_str(), slug),
            kind,
            name: name.into(),
            description: description.into(),
            support,
            confidence,
            users,
            metrics,
        })
    }
}

/// Run one behavior analysis over `graph` as of `now`.
pub fn analyze_behavior(
    graph: &Graph,
    behavior: BehaviorType,
    config: &BehaviorConfig,
    now: DateTime<Utc>,
) -> Vec<BehaviorPattern> {
    let ctx = BehaviorContext::new(graph, config, now);
    let patterns = match behavior {
        BehaviorType::Engagement => engagement::analyze(&ctx),
        BehaviorType::ContentPreference => preference::analyze(&ctx),
        BehaviorType::Temporal => temporal::analyze(&ctx),
        BehaviorType::SocialInteraction => social::analyze(&ctx),
        BehaviorType::Segment => segment::analyze(&ctx),
    };
    debug!(
        "{} analysis over {} active users produced {} patterns",
        behavior.as_str(),
        ctx.activity.len(),
        patterns.len()
    );
    patterns
}

/// Store-backed behavior analysis.
pub struct BehaviorAnalyzer {
    store: Arc<GraphStore>,
    config: BehaviorConfig,
}

impl BehaviorAnalyzer {
    pub fn new(store: Arc<GraphStore>, config: BehaviorConfig) -> Self {
        Self { store, config }
    }

    pub async fn analyze(&self, behavior: BehaviorType) -> Vec<BehaviorPattern> {
        let graph = self.store.read().await;
        analyze_behavior(&graph, behavior, &self.config, Utc::now())
    }
}

pub(crate) fn rate(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Most frequent key; ties go to the key counted first.
pub(crate) fn dominant<K: PartialEq>(keys: impl IntoIterator<Item = K>) -> Option<(K, usize, usize)> {
    let mut counts: Vec<(K, usize)> = Vec::new();
    let mut total = 0;
    for key in keys {
        total += 1;
        match counts.iter_mut().find(|(k, _)| *k == key) {
            Some((_, count)) => *count += 1,
            None => counts.push((key, 1)),
        }
    }
    let mut best: Option<(K, usize)> = None;
    for (key, count) in counts {
        if best.as_ref().map_or(true, |(_, top)| count > *top) {
            best = Some((key, count));
        }
    }
    best.map(|(key, count)| (key, count, total))
}
