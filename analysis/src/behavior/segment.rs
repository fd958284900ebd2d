use super::{dominant, rate, BehaviorContext, BehaviorPattern, BehaviorType};
use reelgraph_core::interaction::InteractionAction;
use reelgraph_core::model::{EdgeKind, NodeKind};
use std::collections::{BTreeMap, BTreeSet};
use storage::store::creator_node_id;
use storage::Graph;

const EXPLORER_CATEGORIES: usize = 5;
const SOCIAL_RATE: f64 = 0.2;
const PASSIVE_RATE: f64 = 0.05;
const NICHE_SHARE: f64 = 0.8;
const NICHE_MIN_VIEWS: usize = 5;

#[derive(Default)]
struct Segments {
    explorers: Vec<String>,
    creators: Vec<String>,
    social: Vec<String>,
    passive: Vec<String>,
    niche: Vec<String>,
}

pub(super) fn analyze(ctx: &BehaviorContext) -> Vec<BehaviorPattern> {
    let mut segments = Segments::default();

    for activity in &ctx.activity {
        let user = activity.user_id.clone();
        let total = activity.interactions.len();

        let categories: Vec<String> = activity
            .interactions
            .iter()
            .filter(|record| record.action == InteractionAction::View)
            .filter_map(|record| ctx.category_of(&record.video_id))
            .collect();
        let distinct: BTreeSet<&str> = categories.iter().map(String::as_str).collect();
        if distinct.len() >= EXPLORER_CATEGORIES {
            segments.explorers.push(user.clone());
        }

        if publishes(ctx.graph, &user) {
            segments.creators.push(user.clone());
        }

        let social = activity
            .interactions
            .iter()
            .filter(|record| record.action.is_social())
            .count();
        if rate(social, total) >= SOCIAL_RATE {
            segments.social.push(user.clone());
        }

        let active = activity
            .interactions
            .iter()
            .filter(|record| !record.action.is_passive())
            .count();
        if rate(active, total) < PASSIVE_RATE {
            segments.passive.push(user.clone());
        }

        if let Some((_, count, views)) = dominant(categories.iter()) {
            if views >= NICHE_MIN_VIEWS && rate(count, views) >= NICHE_SHARE {
                segments.niche.push(user);
            }
        }
    }

    let mut metrics = BTreeMap::new();
    metrics.insert("explorers".to_string(), segments.explorers.len() as f64);
    metrics.insert("creators".to_string(), segments.creators.len() as f64);
    metrics.insert("social".to_string(), segments.social.len() as f64);
    metrics.insert("passive".to_string(), segments.passive.len() as f64);
    metrics.insert("niche".to_string(), segments.niche.len() as f64);

    [
        ("explorers", "Explorers", "Users who sample many categories", segments.explorers),
        ("creators", "Creators", "Users who also publish videos", segments.creators),
        ("social", "Social butterflies", "Users whose activity is mostly social", segments.social),
        ("passive", "Passive viewers", "Users who watch without engaging", segments.passive),
        ("niche", "Niche enthusiasts", "Users devoted to a single category", segments.niche),
    ]
    .into_iter()
    .filter_map(|(slug, name, description, users)| {
        ctx.emit(BehaviorType::Segment, slug, name, description, users, metrics.clone())
    })
    .collect()
}

/// A user publishes when it authored a video directly or when the creator
/// node derived from its id has authored one.
fn publishes(graph: &Graph, user_id: &str) -> bool {
    let authored = |id: &str| !graph.outgoing_edges_of_kind(id, EdgeKind::Created).is_empty();
    if authored(user_id) {
        return true;
    }
    let creator_id = creator_node_id(user_id);
    graph
        .get_node(&creator_id)
        .map_or(false, |node| node.kind == NodeKind::Creator && authored(&creator_id))
}
