use super::{rate, BehaviorContext, BehaviorPattern, BehaviorType};
use crate::stats::mean;
use reelgraph_core::interaction::InteractionAction;
use std::collections::{BTreeMap, HashMap};

const COMPLETION_FRACTION: f64 = 0.9;
const HIGH_COMPLETION: f64 = 0.7;
const HIGH_INTERACTION: f64 = 0.3;
const REWATCH: f64 = 0.2;

struct EngagementMetrics {
    user_id: String,
    avg_view_duration: f64,
    completion_rate: f64,
    interaction_rate: f64,
    return_rate: f64,
}

fn user_metrics(ctx: &BehaviorContext, activity: &super::UserActivity) -> EngagementMetrics {
    let views: Vec<_> = activity
        .interactions
        .iter()
        .filter(|record| record.action == InteractionAction::View)
        .collect();

    let durations: Vec<f64> = views.iter().filter_map(|record| record.duration).collect();

    let mut measurable = 0;
    let mut completed = 0;
    for record in &views {
        let length = ctx
            .graph
            .get_node(&record.video_id)
            .and_then(|video| video.properties.duration)
            .filter(|length| *length > 0.0);
        if let (Some(length), Some(watched)) = (length, record.duration) {
            measurable += 1;
            if watched >= COMPLETION_FRACTION * length {
                completed += 1;
            }
        }
    }

    let active = activity
        .interactions
        .iter()
        .filter(|record| !record.action.is_passive())
        .count();

    let mut per_video: HashMap<&str, usize> = HashMap::new();
    for record in &views {
        *per_video.entry(record.video_id.as_str()).or_insert(0) += 1;
    }
    let rewatched = per_video.values().filter(|count| **count > 1).count();

    EngagementMetrics {
        user_id: activity.user_id.clone(),
        avg_view_duration: mean(&durations),
        completion_rate: rate(completed, measurable),
        interaction_rate: rate(active, activity.interactions.len()),
        return_rate: rate(rewatched, per_video.len()),
    }
}

pub(super) fn analyze(ctx: &BehaviorContext) -> Vec<BehaviorPattern> {
    let metrics: Vec<EngagementMetrics> = ctx
        .activity
        .iter()
        .map(|activity| user_metrics(ctx, activity))
        .collect();
    if metrics.is_empty() {
        return Vec::new();
    }

    let average = |field: fn(&EngagementMetrics) -> f64| {
        mean(&metrics.iter().map(field).collect::<Vec<_>>())
    };
    let summary: BTreeMap<String, f64> = [
        ("avgViewDuration", average(|m| m.avg_view_duration)),
        ("avgCompletionRate", average(|m| m.completion_rate)),
        ("avgInteractionRate", average(|m| m.interaction_rate)),
        ("avgReturnRate", average(|m| m.return_rate)),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect();

    let qualifying = |test: fn(&EngagementMetrics) -> bool| -> Vec<String> {
        metrics
            .iter()
            .filter(|m| test(m))
            .map(|m| m.user_id.clone())
            .collect()
    };

    [
        ctx.emit(
            BehaviorType::Engagement,
            "high-completion",
            "High completion",
            "Users who finish most of the videos they start",
            qualifying(|m| m.completion_rate >= HIGH_COMPLETION),
            summary.clone(),
        ),
        ctx.emit(
            BehaviorType::Engagement,
            "highly-interactive",
            "Highly interactive",
            "Users who like, comment, share or follow often",
            qualifying(|m| m.interaction_rate >= HIGH_INTERACTION),
            summary.clone(),
        ),
        ctx.emit(
            BehaviorType::Engagement,
            "rewatchers",
            "Re-watchers",
            "Users who come back to videos they already watched",
            qualifying(|m| m.return_rate >= REWATCH),
            summary,
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}
