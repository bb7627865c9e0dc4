//! Session tasks: one scripted conversation with one oracle session.

mod harvest;
mod outreach;
mod runner;
mod task;

pub use harvest::HarvestScript;
pub use outreach::{OutreachBudgets, OutreachScript};
pub use runner::{render_transcript, StepRunner, TranscriptEntry};
pub use task::{
    run_scoped, stop_session, ScriptContext, ScriptOutput, SessionScript, SessionTask,
    TaskOutcome,
};
