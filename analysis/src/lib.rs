pub mod anomaly;
pub mod behavior;
pub mod community;
pub mod error;
pub mod pattern;
pub mod recommendation;
pub mod stats;
pub mod trend;

pub use anomaly::{Anomaly, AnomalyDetector, AnomalyKind, AnomalyScope, AnomalyService};
pub use behavior::{BehaviorAnalyzer, BehaviorPattern, BehaviorType};
pub use community::{
    Community, CommunityAlgorithm, CommunityDetector, CommunityOptions, CommunityReport,
    CommunityService,
};
pub use error::AnalysisError;
pub use pattern::{GraphPattern, PatternDetector, PatternKind, PatternOptions, PatternService};
pub use recommendation::{Recommendation, RecommendationEngine};
pub use trend::{EmergingTrend, EntityType, Timeframe, TopicTrend, TrendAnalyzer, UserSegment};
