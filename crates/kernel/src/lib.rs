//! ActHarvest orchestration kernel.
//!
//! Drives an unreliable action oracle to harvest paginated listings, replays
//! backlogs against a job endpoint, and sends one-off outreach requests, all
//! without handling the same identity twice across runs.

pub mod app_settings;
pub mod artifacts;
pub mod backlog;
pub mod connect;
pub mod dispatcher;
pub mod errors;
pub mod extraction;
pub mod output;
pub mod pagination;
pub mod parallel;
pub mod preflight;
pub mod sessions;
pub mod summary;

pub use app_settings::{BackoffRange, Config};
pub use artifacts::{run_stamp, ArtifactWriter};
pub use backlog::{load_backlog, load_persons, BacklogItem, PersonTarget};
pub use connect::{ConnectController, ConnectRun};
pub use dispatcher::{
    DispatchMode, DispatchOutcome, DispatchPolicy, DispatchRun, Dispatcher, HttpJobEndpoint,
    JobEndpoint,
};
pub use errors::KernelError;
pub use extraction::{Extraction, ExtractionEngine, RecordSchema, Strategy};
pub use pagination::{
    PageReport, PaginationController, PaginationRun, PaginationSettings, PaginationState,
    StopReason,
};
pub use parallel::{page_url, PageResult, ParallelController, ParallelRun};
pub use sessions::{
    HarvestScript, OutreachBudgets, OutreachScript, SessionScript, SessionTask, TaskOutcome,
};
pub use summary::RunSummary;
