pub mod error;
pub mod queue;
pub mod worker;

pub use error::JobError;
pub use queue::{ChannelJobQueue, Job, JobHandle, JobOutcome, JobQueue, Ticket};
pub use worker::Worker;
