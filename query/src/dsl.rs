use analysis::{
    AnomalyScope, BehaviorType, CommunityOptions, EntityType, PatternKind, PatternOptions,
    Timeframe,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

const DEFAULT_COUNT: usize = 5;
const MAX_COUNT: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Recommendation,
    Generation,
    Analysis,
    Discovery,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Recommendation => "recommendation",
            QueryType::Generation => "generation",
            QueryType::Analysis => "analysis",
            QueryType::Discovery => "discovery",
        }
    }
}

/// One typed request to the coordinator. `parameters` is interpreted per
/// query type; an absent value behaves like an empty object.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReasoningQuery {
    #[serde(rename = "type")]
    pub kind: QueryType,
    #[serde(default)]
    pub parameters: Value,
}

impl ReasoningQuery {
    pub fn new(kind: QueryType, parameters: Value) -> Self {
        Self { kind, parameters }
    }

    pub fn parse_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationParams {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default = "default_true")]
    pub include_reasons: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub timeframe: Timeframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisType {
    Trends,
    UserSegments,
    Emerging,
    Behavior,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisParams {
    #[serde(rename = "type", default)]
    pub kind: Option<AnalysisType>,
    #[serde(default)]
    pub timeframe: Timeframe,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub entity_type: EntityType,
    #[serde(default)]
    pub behavior_type: BehaviorType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryType {
    Patterns,
    Communities,
    Anomalies,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryParams {
    #[serde(rename = "type", default)]
    pub kind: Option<DiscoveryType>,
    #[serde(default)]
    pub parameters: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternParams {
    #[serde(rename = "type", default)]
    pub kind: PatternKind,
    #[serde(flatten)]
    pub options: PatternOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyParams {
    #[serde(rename = "type", default)]
    pub scope: AnomalyScope,
    #[serde(default, alias = "sensitivity")]
    pub sensitivity_threshold: Option<f64>,
}

pub type CommunityParams = CommunityOptions;

const fn default_count() -> usize {
    DEFAULT_COUNT
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryValidationError {
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("{name} must be {expected}")]
    InvalidParameter {
        name: &'static str,
        expected: &'static str,
    },
    #[error("malformed parameters: {0}")]
    Malformed(String),
}

/// Decode a parameter object, treating `null` as `{}`.
pub fn parse_params<T: DeserializeOwned>(value: &Value) -> Result<T, QueryValidationError> {
    let value = match value {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(value).map_err(|err| QueryValidationError::Malformed(err.to_string()))
}

fn check_count(count: usize) -> Result<(), QueryValidationError> {
    if count == 0 || count > MAX_COUNT {
        return Err(QueryValidationError::InvalidParameter {
            name: "count",
            expected: "between 1 and 1000",
        });
    }
    Ok(())
}

fn check_fraction(name: &'static str, value: Option<f64>) -> Result<(), QueryValidationError> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(QueryValidationError::InvalidParameter {
            name,
            expected: "between 0 and 1",
        }),
        _ => Ok(()),
    }
}

impl RecommendationParams {
    /// The validated user id.
    pub fn validate(&self) -> Result<&str, QueryValidationError> {
        check_count(self.count)?;
        match self.user_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(QueryValidationError::MissingParameter("userId")),
        }
    }
}

impl GenerationParams {
    pub fn validate(&self) -> Result<(), QueryValidationError> {
        check_count(self.count)?;
        if matches!(self.user_id.as_deref(), Some(id) if id.trim().is_empty()) {
            return Err(QueryValidationError::InvalidParameter {
                name: "userId",
                expected: "non-empty when provided",
            });
        }
        Ok(())
    }
}

impl AnalysisParams {
    pub fn validate(&self) -> Result<AnalysisType, QueryValidationError> {
        check_count(self.count)?;
        self.kind.ok_or(QueryValidationError::MissingParameter("type"))
    }
}

impl DiscoveryParams {
    pub fn validate(&self) -> Result<DiscoveryType, QueryValidationError> {
        self.kind.ok_or(QueryValidationError::MissingParameter("type"))
    }
}

impl PatternParams {
    pub fn validate(&self) -> Result<(), QueryValidationError> {
        check_fraction("minSupport", self.options.min_support)?;
        if self.options.max_pattern_size == Some(0) {
            return Err(QueryValidationError::InvalidParameter {
                name: "maxPatternSize",
                expected: "at least 1",
            });
        }
        Ok(())
    }
}

impl AnomalyParams {
    pub fn validate(&self) -> Result<(), QueryValidationError> {
        check_fraction("sensitivityThreshold", self.sensitivity_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recommendation_defaults() {
        let params: RecommendationParams = parse_params(&json!({"userId": "u1"})).unwrap();
        assert_eq!(params.count, 5);
        assert!(params.include_reasons);
        assert_eq!(params.validate().unwrap(), "u1");
    }

    #[test]
    fn test_missing_user_id() {
        let params: RecommendationParams = parse_params(&Value::Null).unwrap();
        assert_eq!(
            params.validate(),
            Err(QueryValidationError::MissingParameter("userId"))
        );
    }

    #[test]
    fn test_analysis_type_names() {
        let params: AnalysisParams =
            parse_params(&json!({"type": "userSegments", "timeframe": "month"})).unwrap();
        assert_eq!(params.validate().unwrap(), AnalysisType::UserSegments);
        assert_eq!(params.timeframe, Timeframe::Month);
        assert_eq!(params.behavior_type, BehaviorType::Engagement);
    }

    #[test]
    fn test_pattern_params_flatten_options() {
        let params: PatternParams =
            parse_params(&json!({"type": "causal", "minSupport": 0.2, "maxPatternSize": 2}))
                .unwrap();
        assert_eq!(params.kind, PatternKind::Causal);
        assert_eq!(params.options.min_support, Some(0.2));
        assert_eq!(params.options.max_pattern_size, Some(2));

        let bad: PatternParams = parse_params(&json!({"minSupport": 1.5})).unwrap();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_unknown_enum_value_is_malformed() {
        let result: Result<AnalysisParams, _> = parse_params(&json!({"type": "weather"}));
        assert!(matches!(result, Err(QueryValidationError::Malformed(_))));
    }
}
