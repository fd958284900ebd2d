use super::{rate, BehaviorContext, BehaviorPattern, BehaviorType};
use reelgraph_core::interaction::InteractionAction;
use reelgraph_core::model::{EdgeKind, NodeKind};
use std::collections::{BTreeMap, HashMap, HashSet};

const COMMENTER_RATE: f64 = 0.1;
const SHARER_RATE: f64 = 0.05;
const FOLLOWER_RATE: f64 = 0.05;
const INFLUENCER_FOCUS: f64 = 0.5;

/// Creators followed, directly or through one of their videos, by at least
/// `min_followers` distinct users.
fn influencers(ctx: &BehaviorContext) -> HashSet<String> {
    let mut followers: HashMap<String, HashSet<&str>> = HashMap::new();
    for edge in ctx.graph.get_edges_by_type(EdgeKind::Follows) {
        let Some(target) = ctx.graph.get_node(&edge.target) else {
            continue;
        };
        let creator = match target.kind {
            NodeKind::Creator => Some(target.id.clone()),
            NodeKind::Video => ctx.creator_of(&target.id),
            _ => None,
        };
        if let Some(creator) = creator {
            followers
                .entry(creator)
                .or_default()
                .insert(edge.source.as_str());
        }
    }

    followers
        .into_iter()
        .filter(|(_, users)| users.len() >= ctx.config.influencer_min_followers)
        .map(|(creator, _)| creator)
        .collect()
}

pub(super) fn analyze(ctx: &BehaviorContext) -> Vec<BehaviorPattern> {
    let influencers = influencers(ctx);

    let mut commenters = Vec::new();
    let mut sharers = Vec::new();
    let mut followers = Vec::new();
    let mut focused = Vec::new();
    let mut social_total = 0usize;
    let mut interaction_total = 0usize;

    for activity in &ctx.activity {
        let total = activity.interactions.len();
        let count = |action: InteractionAction| {
            activity
                .interactions
                .iter()
                .filter(|record| record.action == action)
                .count()
        };
        interaction_total += total;
        social_total += activity
            .interactions
            .iter()
            .filter(|record| record.action.is_social())
            .count();

        if rate(count(InteractionAction::Comment), total) >= COMMENTER_RATE {
            commenters.push(activity.user_id.clone());
        }
        if rate(count(InteractionAction::Share), total) >= SHARER_RATE {
            sharers.push(activity.user_id.clone());
        }
        if rate(count(InteractionAction::Follow), total) >= FOLLOWER_RATE {
            followers.push(activity.user_id.clone());
        }

        if !influencers.is_empty() {
            let on_influencers = activity
                .interactions
                .iter()
                .filter(|record| {
                    ctx.creator_of(&record.video_id)
                        .is_some_and(|creator| influencers.contains(&creator))
                })
                .count();
            if rate(on_influencers, total) >= INFLUENCER_FOCUS {
                focused.push(activity.user_id.clone());
            }
        }
    }

    let mut metrics = BTreeMap::new();
    metrics.insert("socialActionRate".to_string(), rate(social_total, interaction_total));
    metrics.insert("influencers".to_string(), influencers.len() as f64);

    [
        ctx.emit(
            BehaviorType::SocialInteraction,
            "commenters",
            "Commenters",
            "Users who regularly join the conversation",
            commenters,
            metrics.clone(),
        ),
        ctx.emit(
            BehaviorType::SocialInteraction,
            "sharers",
            "Sharers",
            "Users who pass videos along to others",
            sharers,
            metrics.clone(),
        ),
        ctx.emit(
            BehaviorType::SocialInteraction,
            "followers",
            "Followers",
            "Users who follow what they watch",
            followers,
            metrics.clone(),
        ),
        ctx.emit(
            BehaviorType::SocialInteraction,
            "influencer-focused",
            "Influencer focused",
            "Users whose activity centers on widely followed creators",
            focused,
            metrics,
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}
