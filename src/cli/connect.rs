use actharvest_kernel::preflight::require_file;
use actharvest_kernel::{load_persons, ConnectController, OutreachBudgets, OutreachScript};
use actharvest_state_center::{FileStateStore, StateStore};
use anyhow::Result;
use clap::Args;

use crate::cli::context::CliContext;
use crate::cli::output::{emit, CommandReport, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct ConnectArgs {
    /// Only report which profile would be contacted next
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn cmd_connect(args: ConnectArgs, ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let config = ctx.config();
    let settings = &config.outreach;
    require_file(&settings.persons_csv, "persons CSV")?;
    let persons = load_persons(&settings.persons_csv)?;
    let store = FileStateStore::new(config.outreach_state_path());
    let mut set = store.load();

    if args.dry_run {
        let mut report = CommandReport::new("connect --dry-run", Default::default());
        match ConnectController::next_target(&persons, &set) {
            Some(person) => report.detail(format!(
                "next: {} ({})",
                person.person(),
                person.profile_url()
            )),
            None => report.detail("every profile already contacted"),
        }
        return emit(format, &report);
    }

    // Outreach always acts as the logged-in user.
    let connector = ctx.oracle_connector(true)?;
    let script = OutreachScript::new(
        OutreachBudgets {
            captcha: settings.captcha_step_budget,
            check: settings.check_step_budget,
            click: settings.click_step_budget,
        },
        settings.settle_delay,
    );
    let controller = ConnectController::new(connector, ctx.session_task(), script);
    let run = controller
        .run(&persons, &mut set, &store, ctx.cancel_token())
        .await;

    let mut report = CommandReport::new("connect", run.summary);
    match (&run.target, &run.result) {
        (Some(person), Some(result)) => {
            let status = match result.error() {
                None => "request sent".to_string(),
                Some(error) => format!("failed: {error}"),
            };
            report.detail(format!("{} ({}): {status}", person.person(), person.profile_url()));
            report.artifacts = result.artifact_paths().to_vec();
        }
        (Some(person), None) => report.detail(format!("{}: not attempted", person.person())),
        (None, _) => report.detail("every profile already contacted"),
    }
    if run.persist_failed {
        report.detail("state was not persisted");
    }
    emit(format, &report)
}
