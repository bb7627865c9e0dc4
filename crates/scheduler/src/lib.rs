pub mod error;
pub mod model;
pub mod pool;
pub mod stats;

pub use error::SchedulerError;
pub use model::{JobOutcome, JobReport, PoolConfig};
pub use pool::WorkerPool;
pub use stats::PoolStats;
