use super::{dominant, rate, BehaviorContext, BehaviorPattern, BehaviorType};
use reelgraph_core::interaction::InteractionAction;
use std::collections::BTreeMap;
use storage::store::slug;

const CATEGORY_PREFERENCE: f64 = 0.5;
const CREATOR_LOYALTY: f64 = 0.5;
const MIN_LOYALTY_VIEWS: usize = 2;

pub(super) fn analyze(ctx: &BehaviorContext) -> Vec<BehaviorPattern> {
    let mut by_category: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut loyal = Vec::new();
    let mut category_totals: BTreeMap<String, f64> = BTreeMap::new();

    for activity in &ctx.activity {
        let viewed: Vec<&str> = activity
            .interactions
            .iter()
            .filter(|record| record.action == InteractionAction::View)
            .map(|record| record.video_id.as_str())
            .collect();

        let categories: Vec<String> = viewed.iter().filter_map(|id| ctx.category_of(id)).collect();
        for category in &categories {
            *category_totals.entry(category.clone()).or_insert(0.0) += 1.0;
        }
        if let Some((category, count, total)) = dominant(categories) {
            if rate(count, total) >= CATEGORY_PREFERENCE {
                by_category
                    .entry(category)
                    .or_default()
                    .push(activity.user_id.clone());
            }
        }

        let creators = viewed.iter().filter_map(|id| ctx.creator_of(id));
        if let Some((_, count, total)) = dominant(creators) {
            if total >= MIN_LOYALTY_VIEWS && rate(count, total) >= CREATOR_LOYALTY {
                loyal.push(activity.user_id.clone());
            }
        }
    }

    let mut patterns: Vec<BehaviorPattern> = by_category
        .into_iter()
        .filter_map(|(category, users)| {
            let mut metrics = BTreeMap::new();
            metrics.insert(
                "categoryViews".to_string(),
                category_totals.get(&category).copied().unwrap_or(0.0),
            );
            ctx.emit(
                BehaviorType::ContentPreference,
                &format!("prefers-{}", slug(&category)),
                format!("{} fans", category),
                format!("Users who mostly watch {} content", category),
                users,
                metrics,
            )
        })
        .collect();

    let mut loyalty_metrics = BTreeMap::new();
    loyalty_metrics.insert("loyalUsers".to_string(), loyal.len() as f64);
    patterns.extend(ctx.emit(
        BehaviorType::ContentPreference,
        "creator-loyalty",
        "Creator loyalists",
        "Users who keep returning to one creator",
        loyal,
        loyalty_metrics,
    ));

    patterns
}
