use crate::error::JobError;
use crate::queue::{ChannelJobQueue, Job, JobOutcome, Ticket};
use analysis::{AnomalyDetector, CommunityDetector, PatternDetector};
use reelgraph_core::config::AppConfig;
use std::sync::Arc;
use storage::{Graph, GraphStore};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Run one job to completion over a graph copy.
pub fn run_job(graph: &Graph, job: &Job, config: &AppConfig) -> JobOutcome {
    match job {
        Job::DetectCommunities { options } => JobOutcome::Communities(
            CommunityDetector::new(graph, config.communities.clone()).detect(options),
        ),
        Job::DiscoverPatterns { kind, options } => JobOutcome::Patterns(
            PatternDetector::new(graph, config.patterns.clone()).detect(*kind, options),
        ),
        Job::DetectAnomalies {
            scope,
            sensitivity_threshold,
        } => JobOutcome::Anomalies(
            AnomalyDetector::new(graph, config.anomalies.clone())
                .detect(*scope, *sensitivity_threshold),
        ),
    }
}

pub struct Worker {
    receiver: mpsc::Receiver<Ticket>,
    store: Arc<GraphStore>,
    config: AppConfig,
}

impl Worker {
    pub fn new(receiver: mpsc::Receiver<Ticket>, store: Arc<GraphStore>, config: AppConfig) -> Self {
        Self {
            receiver,
            store,
            config,
        }
    }

    /// Start a worker on the current runtime and return the queue feeding it.
    /// The worker stops once every queue handle has been dropped.
    pub fn spawn(store: Arc<GraphStore>, config: AppConfig) -> (ChannelJobQueue, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.jobs.queue_capacity.max(1));
        let worker = Worker::new(receiver, store, config);
        (ChannelJobQueue::new(sender), tokio::spawn(worker.run()))
    }

    pub async fn run(mut self) {
        info!("Worker started");
        while let Some(ticket) = self.receiver.recv().await {
            let Ticket { id, job, reply } = ticket;
            info!("Processing {} job {}", job.name(), id);

            let outcome = self.process(id, job).await;
            if let Err(e) = &outcome {
                error!("Failed to process job {}: {}", id, e);
            }
            if reply.send(outcome).is_err() {
                debug!("Requester for job {} is gone", id);
            }
        }
        info!("Worker stopped");
    }

    async fn process(&self, id: u64, job: Job) -> Result<JobOutcome, JobError> {
        // Writers proceed while the copy is analyzed.
        let graph = self.store.snapshot_graph().await;
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || run_job(&graph, &job, &config))
            .await
            .map_err(|e| JobError::Failed {
                id,
                reason: e.to_string(),
            })
    }
}
