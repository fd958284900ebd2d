use reelgraph_core::error::{ErrorCode, ReelgraphError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job {0} was dropped before it finished")]
    Cancelled(u64),
    #[error("Job {id} failed: {reason}")]
    Failed { id: u64, reason: String },
}

impl ReelgraphError for JobError {
    fn error_code(&self) -> ErrorCode {
        match self {
            JobError::Cancelled(_) => ErrorCode::FailedPrecondition,
            JobError::Failed { .. } => ErrorCode::Internal,
        }
    }
}
