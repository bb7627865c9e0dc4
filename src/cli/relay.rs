use std::sync::Arc;

use actharvest_kernel::preflight::require_file;
use actharvest_kernel::{
    load_backlog, DispatchMode, DispatchOutcome, DispatchPolicy, DispatchRun, Dispatcher,
    HttpJobEndpoint, KernelError,
};
use actharvest_state_center::{FileStateStore, StateStore};
use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::cli::context::CliContext;
use crate::cli::output::{emit, CommandReport, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct RelayArgs {
    /// Submit every pending backlog item instead of just the next one
    #[arg(long)]
    pub all: bool,
}

pub async fn cmd_relay(args: RelayArgs, ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let config = ctx.config();
    let settings = &config.dispatch;
    if settings.endpoint_url.trim().is_empty() {
        return Err(KernelError::precondition(
            "dispatch.endpoint_url is not set; configure it or export ACTHARVEST_ENDPOINT_URL",
        )
        .into());
    }
    require_file(&settings.backlog_csv, "backlog CSV")?;
    let backlog = load_backlog(&settings.backlog_csv)?;

    let endpoint = HttpJobEndpoint::new(
        &settings.endpoint_url,
        settings.company_label.clone(),
        settings.request_timeout,
    )
    .context("failed to prepare job endpoint")?;
    let store = FileStateStore::new(config.dispatch_state_path());
    let mut set = store.load();
    let mode = if args.all {
        DispatchMode::Batch
    } else {
        DispatchMode::Single
    };
    info!(
        items = backlog.len(),
        known = set.len(),
        ?mode,
        "replaying backlog"
    );

    let dispatcher = Dispatcher::new(
        Arc::new(endpoint),
        DispatchPolicy {
            success_backoff: settings.success_backoff,
            failure_backoff: settings.failure_backoff,
        },
    );
    let run = dispatcher
        .run(&backlog, mode, &mut set, &store, ctx.cancel_token())
        .await;

    emit(format, &dispatch_report(&run))
}

fn dispatch_report(run: &DispatchRun) -> CommandReport {
    let mut report = CommandReport::new("dispatch", run.summary);
    if run.interrupted {
        report = report.with_terminal("interrupted");
    }
    for attempt in &run.attempts {
        let result = attempt.result();
        let line = match attempt {
            DispatchOutcome::Succeeded(_) => format!("{}: sent", result.target()),
            DispatchOutcome::Failed(_) => format!(
                "{}: failed: {}",
                result.target(),
                result.error().unwrap_or("unknown error")
            ),
        };
        report.detail(line);
    }
    if run.skipped > 0 {
        report.detail(format!("{} already processed", run.skipped));
    }
    if run.persist_failures > 0 {
        report.detail(format!("state persist failures: {}", run.persist_failures));
    }
    report
}
