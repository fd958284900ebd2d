use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct QueryMetrics {
    pub total_queries: u64,
    pub failed_queries: u64,
    pub by_type: BTreeMap<String, u64>,
    pub latencies: VecDeque<u64>, // microseconds
}

#[derive(Clone)]
pub struct MetricsCollector {
    state: Arc<Mutex<MetricsState>>,
}

struct MetricsState {
    query_metrics: QueryMetrics,
    max_history: usize,
}

impl MetricsCollector {
    pub fn new(max_history: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MetricsState {
                query_metrics: QueryMetrics::default(),
                max_history,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_query(&self, query_type: &str, latency_us: u64, success: bool) {
        let mut state = self.lock();
        let max_history = state.max_history;
        let q = &mut state.query_metrics;
        q.total_queries += 1;
        if !success {
            q.failed_queries += 1;
        }
        *q.by_type.entry(query_type.to_string()).or_insert(0) += 1;
        q.latencies.push_back(latency_us);
        if q.latencies.len() > max_history {
            q.latencies.pop_front();
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.lock();
        let q = &state.query_metrics;

        let mut sorted_latencies: Vec<u64> = q.latencies.iter().copied().collect();
        sorted_latencies.sort_unstable();

        let failure_rate = if q.total_queries > 0 {
            q.failed_queries as f32 / q.total_queries as f32
        } else {
            0.0
        };

        MetricsSnapshot {
            total_queries: q.total_queries,
            failed_queries: q.failed_queries,
            failure_rate,
            by_type: q.by_type.clone(),
            p50: percentile(&sorted_latencies, 50.0),
            p95: percentile(&sorted_latencies, 95.0),
            p99: percentile(&sorted_latencies, 99.0),
            history_count: q.latencies.len(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(1_000)
    }
}

fn percentile(sorted: &[u64], p: f32) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((p / 100.0) * (sorted.len() as f32)).ceil() as usize;
    sorted[idx.saturating_sub(1).min(sorted.len() - 1)]
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub total_queries: u64,
    pub failed_queries: u64,
    pub failure_rate: f32,
    pub by_type: BTreeMap<String, u64>,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub history_count: usize,
}
