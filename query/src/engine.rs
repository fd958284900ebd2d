use crate::context::{build_generation_context, GenerationContext};
use crate::dsl::{
    parse_params, AnalysisParams, AnalysisType, AnomalyParams, CommunityParams, DiscoveryParams,
    DiscoveryType, GenerationParams, PatternParams, QueryType, QueryValidationError,
    ReasoningQuery, RecommendationParams,
};
use analysis::recommendation::{SimilarContent, SimilarUser, TrendingContent};
use analysis::{
    AnalysisError, AnomalyService, BehaviorAnalyzer, CommunityService, GraphPattern,
    PatternKind, PatternOptions, PatternService, Recommendation, RecommendationEngine, Timeframe,
    TopicTrend, TrendAnalyzer, UserSegment,
};
use chrono::Utc;
use jobs::{Job, JobHandle, JobQueue};
use reelgraph_core::config::AppConfig;
use reelgraph_core::error::{ErrorCode, ReelgraphError};
use reelgraph_core::interaction::{ContentSnapshot, UserInteraction};
use reelgraph_core::metrics::{MetricsCollector, MetricsSnapshot};
use reelgraph_core::model::Edge;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use storage::{GraphError, GraphSnapshot, GraphStore, SnapshotError};
use thiserror::Error;
use tracing::{debug, info, warn};

const TRENDING_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetadata {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_type: Option<QueryType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub results: Vec<Value>,
    pub metadata: QueryMetadata,
    pub execution_time_ms: u64,
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("invalid parameters: {0}")]
    Validation(#[from] QueryValidationError),
    #[error("analysis error: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("result encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("no background job queue is attached")]
    NoJobQueue,
    #[error("job queue error: {0}")]
    JobQueue(String),
}

impl ReelgraphError for QueryError {
    fn error_code(&self) -> ErrorCode {
        match self {
            QueryError::InvalidQuery(_) | QueryError::Validation(_) => ErrorCode::InvalidArgument,
            QueryError::Analysis(err) => err.error_code(),
            QueryError::Graph(err) => err.error_code(),
            QueryError::Snapshot(err) => err.error_code(),
            QueryError::NoJobQueue => ErrorCode::FailedPrecondition,
            QueryError::Encoding(_) | QueryError::JobQueue(_) => ErrorCode::Internal,
        }
    }
}

impl QueryError {
    pub fn to_result(&self, query_type: Option<QueryType>, execution_time_ms: u64) -> QueryResult {
        QueryResult {
            results: Vec::new(),
            metadata: QueryMetadata {
                success: false,
                query_type,
                error: Some(self.to_string()),
                error_code: Some(self.error_code()),
            },
            execution_time_ms,
        }
    }
}

fn to_values<T: Serialize>(items: impl IntoIterator<Item = T>) -> Result<Vec<Value>, QueryError> {
    items
        .into_iter()
        .map(|item| serde_json::to_value(item).map_err(QueryError::from))
        .collect()
}

/// Single entry point for typed queries and direct convenience calls.
///
/// Owns the graph store handle and one instance of every analyzer; all of
/// them share the same `Arc<GraphStore>`.
pub struct ReasoningCoordinator {
    store: Arc<GraphStore>,
    recommendations: RecommendationEngine,
    patterns: PatternService,
    communities: CommunityService,
    anomalies: AnomalyService,
    trends: TrendAnalyzer,
    behavior: BehaviorAnalyzer,
    metrics: MetricsCollector,
    job_queue: Option<Arc<dyn JobQueue>>,
}

impl ReasoningCoordinator {
    pub fn new(store: Arc<GraphStore>, config: AppConfig) -> Self {
        Self {
            recommendations: RecommendationEngine::new(store.clone(), config.recommendation),
            patterns: PatternService::new(store.clone(), config.patterns),
            communities: CommunityService::new(store.clone(), config.communities),
            anomalies: AnomalyService::new(store.clone(), config.anomalies),
            trends: TrendAnalyzer::new(store.clone(), config.trends),
            behavior: BehaviorAnalyzer::new(store.clone(), config.behavior),
            store,
            metrics: MetricsCollector::default(),
            job_queue: None,
        }
    }

    /// Build a coordinator over a freshly seeded store.
    pub async fn bootstrap(config: AppConfig) -> Self {
        let store = Arc::new(GraphStore::seeded(config.seed.clone()).await);
        Self::new(store, config)
    }

    pub fn with_job_queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.job_queue = Some(queue);
        self
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn execute_json(&self, raw: &str) -> QueryResult {
        match ReasoningQuery::parse_json(raw) {
            Ok(query) => self.execute(query).await,
            Err(err) => {
                let err = QueryError::InvalidQuery(err.to_string());
                warn!("Rejected query: {}", err);
                self.metrics.record_query("invalid", 0, false);
                err.to_result(None, 0)
            }
        }
    }

    /// Run one query. Failures are reported in the result metadata and never
    /// returned as errors.
    pub async fn execute(&self, query: ReasoningQuery) -> QueryResult {
        let start = Instant::now();
        let kind = query.kind;
        let outcome = self.dispatch(query).await;
        let elapsed = start.elapsed();
        let execution_time_ms = elapsed.as_millis() as u64;
        self.metrics
            .record_query(kind.as_str(), elapsed.as_micros() as u64, outcome.is_ok());

        match outcome {
            Ok(results) => {
                debug!(
                    "{} query returned {} results in {}ms",
                    kind.as_str(),
                    results.len(),
                    execution_time_ms
                );
                QueryResult {
                    results,
                    metadata: QueryMetadata {
                        success: true,
                        query_type: Some(kind),
                        error: None,
                        error_code: None,
                    },
                    execution_time_ms,
                }
            }
            Err(err) => {
                warn!("{} query failed: {}", kind.as_str(), err);
                err.to_result(Some(kind), execution_time_ms)
            }
        }
    }

    async fn dispatch(&self, query: ReasoningQuery) -> Result<Vec<Value>, QueryError> {
        match query.kind {
            QueryType::Recommendation => self.run_recommendation(&query.parameters).await,
            QueryType::Generation => self.run_generation(&query.parameters).await,
            QueryType::Analysis => self.run_analysis(&query.parameters).await,
            QueryType::Discovery => self.run_discovery(&query.parameters).await,
        }
    }

    async fn run_recommendation(&self, raw: &Value) -> Result<Vec<Value>, QueryError> {
        let params: RecommendationParams = parse_params(raw)?;
        let user_id = params.validate()?;
        let ranked = self
            .recommendations
            .get_recommendations(user_id, params.count, params.include_reasons)
            .await;
        to_values(ranked)
    }

    async fn run_generation(&self, raw: &Value) -> Result<Vec<Value>, QueryError> {
        let params: GenerationParams = parse_params(raw)?;
        params.validate()?;
        let context = self
            .generation_context(params.user_id.as_deref(), params.timeframe, params.count)
            .await;
        to_values([context])
    }

    async fn run_analysis(&self, raw: &Value) -> Result<Vec<Value>, QueryError> {
        let params: AnalysisParams = parse_params(raw)?;
        match params.validate()? {
            AnalysisType::Trends => {
                to_values(self.trends.analyze_trends(params.timeframe, params.count).await)
            }
            AnalysisType::UserSegments => to_values(self.trends.analyze_user_segments().await),
            AnalysisType::Emerging => to_values(
                self.trends
                    .detect_emerging(params.entity_type, params.timeframe, params.count)
                    .await,
            ),
            AnalysisType::Behavior => to_values(self.behavior.analyze(params.behavior_type).await),
        }
    }

    async fn run_discovery(&self, raw: &Value) -> Result<Vec<Value>, QueryError> {
        let params: DiscoveryParams = parse_params(raw)?;
        match params.validate()? {
            DiscoveryType::Patterns => {
                let pattern: PatternParams = parse_params(&params.parameters)?;
                pattern.validate()?;
                to_values(
                    self.patterns
                        .detect_patterns(pattern.kind, &pattern.options)
                        .await,
                )
            }
            DiscoveryType::Communities => {
                let options: CommunityParams = parse_params(&params.parameters)?;
                to_values([self.communities.detect_communities(&options).await])
            }
            DiscoveryType::Anomalies => {
                let anomaly: AnomalyParams = parse_params(&params.parameters)?;
                anomaly.validate()?;
                to_values(
                    self.anomalies
                        .detect_anomalies(anomaly.scope, anomaly.sensitivity_threshold)
                        .await,
                )
            }
        }
    }

    pub async fn process_user_interaction(
        &self,
        user_id: &str,
        interaction: &UserInteraction,
        content: &ContentSnapshot,
    ) -> Result<Edge, QueryError> {
        Ok(self
            .store
            .process_user_interaction(user_id, interaction, content)
            .await?)
    }

    /// Recommendations with reasons; `count` defaults to the configured one.
    pub async fn get_recommendations_for_user(
        &self,
        user_id: &str,
        count: Option<usize>,
    ) -> Vec<Recommendation> {
        let count = count.unwrap_or_else(|| self.recommendations.default_count());
        self.recommendations
            .get_recommendations(user_id, count, true)
            .await
    }

    pub async fn similar_users(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<SimilarUser>, QueryError> {
        Ok(self.recommendations.similar_users(user_id, limit).await?)
    }

    pub async fn trending_content(&self, limit: usize) -> Vec<TrendingContent> {
        self.recommendations
            .trending_content(limit, TRENDING_WINDOW_HOURS)
            .await
    }

    pub async fn similar_content(
        &self,
        video_id: &str,
        limit: usize,
    ) -> Result<Vec<SimilarContent>, QueryError> {
        Ok(self.recommendations.similar_content(video_id, limit).await?)
    }

    pub async fn analyze_trends(&self, timeframe: Timeframe, count: Option<usize>) -> Vec<TopicTrend> {
        let count = count.unwrap_or_else(|| self.trends.default_count());
        self.trends.analyze_trends(timeframe, count).await
    }

    pub async fn analyze_user_segments(&self) -> Vec<UserSegment> {
        self.trends.analyze_user_segments().await
    }

    pub async fn discover_patterns(
        &self,
        kind: PatternKind,
        options: &PatternOptions,
    ) -> Vec<GraphPattern> {
        self.patterns.detect_patterns(kind, options).await
    }

    pub async fn generation_context(
        &self,
        user_id: Option<&str>,
        timeframe: Timeframe,
        count: usize,
    ) -> GenerationContext {
        let graph = self.store.read().await;
        build_generation_context(&graph, user_id, timeframe, count, Utc::now())
    }

    pub async fn export_graph(&self) -> GraphSnapshot {
        self.store.export_graph().await
    }

    pub async fn import_graph(&self, snapshot: GraphSnapshot) -> Result<(), QueryError> {
        self.store.import_graph(snapshot).await?;
        Ok(())
    }

    /// Clear the graph and reseed the category and topic vocabulary.
    pub async fn reset(&self) {
        self.store.initialize().await;
        info!("Graph reset to seed state");
    }

    /// Hand a discovery job to the attached background queue.
    pub async fn schedule_discovery(&self, job: Job) -> Result<JobHandle, QueryError> {
        let queue = self.job_queue.as_ref().ok_or(QueryError::NoJobQueue)?;
        let name = job.name();
        let handle = queue
            .enqueue(job)
            .await
            .map_err(|err| QueryError::JobQueue(err.to_string()))?;
        info!("Scheduled {} job {}", name, handle.id());
        Ok(handle)
    }
}
