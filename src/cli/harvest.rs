use actharvest_kernel::output::{write_parallel_outputs, write_sequential_outputs};
use actharvest_kernel::{
    run_stamp, ExtractionEngine, HarvestScript, PaginationController, PaginationRun,
    PaginationSettings, ParallelController, ParallelRun,
};
use actharvest_scheduler::{PoolConfig, WorkerPool};
use actharvest_state_center::{FileStateStore, StateStore};
use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args};
use tracing::{info, warn};

use crate::cli::context::CliContext;
use crate::cli::output::{emit, CommandReport, OutputFormat};

#[derive(Args, Clone, Debug)]
#[command(group(ArgGroup::new("mode").args(["single_page", "all_pages", "parallel"])))]
pub struct HarvestArgs {
    /// Harvest the start page only
    #[arg(long)]
    pub single_page: bool,

    /// Follow pagination on one session until the listing ends (default)
    #[arg(long)]
    pub all_pages: bool,

    /// Harvest known pages concurrently, one session per page
    #[arg(long)]
    pub parallel: bool,

    /// Number of pages to harvest in parallel mode
    #[arg(long, requires = "parallel")]
    pub pages: Option<u32>,

    /// Maximum concurrent sessions in parallel mode
    #[arg(long, requires = "parallel")]
    pub workers: Option<usize>,
}

pub async fn cmd_harvest(args: HarvestArgs, ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let config = ctx.config();
    let page_count = args.pages.unwrap_or(config.harvest.page_count);
    if args.parallel && page_count == 0 {
        bail!("parallel harvest needs a page count; pass --pages or set harvest.page_count");
    }

    let connector = ctx.oracle_connector(config.oracle.harvest_requires_session)?;
    let store = FileStateStore::new(config.harvest_state_path());
    let mut set = store.load();
    info!(
        state = %store.path().display(),
        known = set.len(),
        "loaded harvest state"
    );

    let script = HarvestScript::new(
        ExtractionEngine::new(config.harvest.schema.clone()),
        config.harvest.item_description.clone(),
        config.harvest.settle_delay,
        config.oracle.step_budget,
    );
    let stamp = run_stamp();
    let writer = ctx.output_writer();

    let report = if args.parallel {
        let workers = args.workers.unwrap_or(config.harvest.max_workers).max(1);
        let pool = WorkerPool::new(PoolConfig {
            max_concurrency: workers,
            stagger: config.harvest.stagger,
        });
        let controller = ParallelController::new(
            connector,
            ctx.session_task(),
            script,
            pool,
            config.harvest.page_url_template.clone(),
        );
        let run = controller
            .run(
                (1..=page_count).collect(),
                &mut set,
                &store,
                ctx.cancel_token().clone(),
            )
            .await;
        let mut report = parallel_report(&run);
        report.artifacts =
            write_parallel_outputs(&writer, &stamp, &config.harvest.schema, &set, &run)
                .context("failed to write harvest output")?;
        report
    } else {
        let settings = PaginationSettings {
            start_url: config.harvest.start_url.clone(),
            iteration_ceiling: config.harvest.iteration_ceiling,
            single_page: args.single_page,
            continuation_step_budget: config.oracle.step_budget,
            page_turn_delay: config.harvest.settle_delay,
        };
        let controller = PaginationController::new(
            connector,
            ctx.session_task(),
            script,
            settings,
            config.oracle.instruction_timeout,
        );
        let run = controller.run(&mut set, &store, ctx.cancel_token()).await;
        let mut report = sequential_report(&run);
        report.artifacts =
            write_sequential_outputs(&writer, &stamp, &config.harvest.schema, &set, &run)
                .context("failed to write harvest output")?;
        report
    };

    emit(format, &report)
}

fn sequential_report(run: &PaginationRun) -> CommandReport {
    let mut report = CommandReport::new("harvest", run.summary)
        .with_terminal(format!("{:?}: {:?}", run.terminal, run.reason));
    for page in &run.pages {
        let mut line = format!(
            "page {}: {} new, {} duplicate",
            page.page, page.new_records, page.duplicates
        );
        if let Some(error) = &page.error {
            line.push_str(&format!(", failed: {error}"));
        }
        if let Some(answer) = &page.continuation {
            line.push_str(&format!(", next page? {}", answer.trim()));
        }
        report.detail(line);
    }
    if run.persist_failures > 0 {
        warn!(failures = run.persist_failures, "harvest state was not always persisted");
        report.detail(format!("state persist failures: {}", run.persist_failures));
    }
    report
}

fn parallel_report(run: &ParallelRun) -> CommandReport {
    let mut report = CommandReport::new("harvest --parallel", run.summary);
    for page in &run.pages {
        let line = match page.result.error() {
            None => format!("page {}: {} new", page.page, page.accepted.len()),
            Some(error) => format!("page {}: failed: {error}", page.page),
        };
        report.detail(line);
    }
    if !run.persisted {
        report.detail("state was not persisted");
    }
    report
}
