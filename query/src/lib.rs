pub mod context;
pub mod dsl;
pub mod engine;

pub use context::GenerationContext;
pub use dsl::{QueryType, QueryValidationError, ReasoningQuery};
pub use engine::{QueryError, QueryMetadata, QueryResult, ReasoningCoordinator};
