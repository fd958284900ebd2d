use reelgraph_core::error::{ErrorCode, ReelgraphError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("content not found: {0}")]
    ContentNotFound(String),
    #[error("invalid analysis parameter: {0}")]
    InvalidParameter(String),
    #[error("computation failed: {0}")]
    Computation(String),
}

impl ReelgraphError for AnalysisError {
    fn error_code(&self) -> ErrorCode {
        match self {
            AnalysisError::UserNotFound(_) | AnalysisError::ContentNotFound(_) => {
                ErrorCode::NotFound
            }
            AnalysisError::InvalidParameter(_) => ErrorCode::InvalidArgument,
            AnalysisError::Computation(_) => ErrorCode::Internal,
        }
    }
}
