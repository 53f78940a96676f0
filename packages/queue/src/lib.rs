pub mod entity;
pub mod error;
pub mod queue;

pub use error::QueueError;
pub use queue::{ClaimedJob, DeliveryJob, JobQueue, Lane};
