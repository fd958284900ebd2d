use crate::error::JobError;
use analysis::{
    Anomaly, AnomalyScope, CommunityOptions, CommunityReport, GraphPattern, PatternKind,
    PatternOptions,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};

/// Long-running discovery work handed to a [`crate::worker::Worker`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Job {
    DetectCommunities {
        options: CommunityOptions,
    },
    DiscoverPatterns {
        kind: PatternKind,
        options: PatternOptions,
    },
    DetectAnomalies {
        scope: AnomalyScope,
        #[serde(default, rename = "sensitivityThreshold", alias = "sensitivity")]
        sensitivity_threshold: Option<f64>,
    },
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::DetectCommunities { .. } => "communities",
            Job::DiscoverPatterns { .. } => "patterns",
            Job::DetectAnomalies { .. } => "anomalies",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "results", rename_all = "camelCase")]
pub enum JobOutcome {
    Communities(CommunityReport),
    Patterns(Vec<GraphPattern>),
    Anomalies(Vec<Anomaly>),
}

/// A queued job together with the channel its outcome is returned on.
pub struct Ticket {
    pub id: u64,
    pub job: Job,
    pub reply: oneshot::Sender<Result<JobOutcome, JobError>>,
}

/// Receiving side of an enqueued job.
#[derive(Debug)]
pub struct JobHandle {
    id: u64,
    receiver: oneshot::Receiver<Result<JobOutcome, JobError>>,
}

impl JobHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the worker to finish. Fails with [`JobError::Cancelled`] if
    /// the worker went away before replying.
    pub async fn wait(self) -> Result<JobOutcome, JobError> {
        self.receiver.await.map_err(|_| JobError::Cancelled(self.id))?
    }
}

#[async_trait::async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job) -> anyhow::Result<JobHandle>;
}

/// Simple in-memory queue using Tokio channels
pub struct ChannelJobQueue {
    sender: mpsc::Sender<Ticket>,
    next_id: AtomicU64,
}

impl ChannelJobQueue {
    pub fn new(sender: mpsc::Sender<Ticket>) -> Self {
        Self {
            sender,
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait::async_trait]
impl JobQueue for ChannelJobQueue {
    async fn enqueue(&self, job: Job) -> anyhow::Result<JobHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, receiver) = oneshot::channel();
        self.sender
            .send(Ticket { id, job, reply })
            .await
            .map_err(|e| anyhow::anyhow!("Queue send error: {}", e))?;
        Ok(JobHandle { id, receiver })
    }
}
