use thiserror::Error;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum SchedulerError {
    #[error("cancelled")]
    Cancelled,
    #[error("job panicked: {0}")]
    Panicked(String),
    #[error("job finished without reporting")]
    Lost,
}
