use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SeedConfig {
    pub categories: Vec<String>,
    pub topics: Vec<String>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            categories: [
                "Technology",
                "Comedy",
                "Music",
                "Gaming",
                "Education",
                "Fitness",
                "Food",
                "Travel",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            topics: [
                "Technology",
                "Science",
                "Entertainment",
                "Sports",
                "Politics",
                "Health",
                "Environment",
                "Business",
                "Education",
                "Art",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RecommendationConfig {
    pub default_count: usize,
    pub max_path_depth: usize,
    pub recent_category_window: usize,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            default_count: 5,
            max_path_depth: 3,
            recent_category_window: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PatternConfig {
    pub min_support: f64,
    pub max_pattern_size: usize,
    pub max_candidates_per_level: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            min_support: 0.1,
            max_pattern_size: 3,
            max_candidates_per_level: 1_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CommunityConfig {
    pub min_community_size: usize,
    pub max_passes: usize,
    pub seed: Option<u64>,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            min_community_size: 3,
            max_passes: 10,
            seed: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AnomalyConfig {
    pub sensitivity_threshold: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            sensitivity_threshold: 0.5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TrendConfig {
    pub default_count: usize,
    pub max_segments: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            default_count: 5,
            max_segments: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BehaviorConfig {
    pub session_gap_minutes: i64,
    pub window_days: i64,
    pub min_pattern_support: f64,
    pub influencer_min_followers: usize,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            session_gap_minutes: 30,
            window_days: 30,
            min_pattern_support: 0.1,
            influencer_min_followers: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct JobsConfig {
    pub queue_capacity: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self { queue_capacity: 32 }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub seed: SeedConfig,
    pub recommendation: RecommendationConfig,
    pub patterns: PatternConfig,
    pub communities: CommunityConfig,
    pub anomalies: AnomalyConfig,
    pub trends: TrendConfig,
    pub behavior: BehaviorConfig,
    pub jobs: JobsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(Environment::with_prefix("REELGRAPH").separator("__"));

        builder.build()?.try_deserialize()
    }
}
