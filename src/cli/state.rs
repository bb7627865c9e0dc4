use std::fs;
use std::path::{Path, PathBuf};

use actharvest_state_center::decode_state;
use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::context::CliContext;
use crate::cli::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct StateArgs {
    /// State file to inspect; defaults to every configured state file
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct StateOverview {
    path: PathBuf,
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn cmd_state(args: StateArgs, ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let paths = match args.file {
        Some(path) => vec![path],
        None => {
            let config = ctx.config();
            vec![
                config.harvest_state_path(),
                config.dispatch_state_path(),
                config.outreach_state_path(),
            ]
        }
    };
    let overviews: Vec<StateOverview> = paths.iter().map(|path| inspect(path)).collect();

    match format {
        OutputFormat::Json => {
            let text = serde_json::to_string_pretty(&overviews)
                .context("failed to encode state overview")?;
            println!("{text}");
        }
        OutputFormat::Human => {
            for overview in &overviews {
                println!("{}", render(overview));
            }
        }
    }
    Ok(())
}

fn inspect(path: &Path) -> StateOverview {
    let mut overview = StateOverview {
        path: path.to_path_buf(),
        exists: path.exists(),
        count: None,
        last_updated: None,
        error: None,
    };
    if !overview.exists {
        return overview;
    }
    match fs::read(path) {
        Ok(bytes) => match decode_state(&bytes) {
            Ok(set) => {
                overview.count = Some(set.len());
                overview.last_updated = set.last_updated().map(|at| at.to_rfc3339());
            }
            Err(err) => overview.error = Some(err.to_string()),
        },
        Err(err) => overview.error = Some(err.to_string()),
    }
    overview
}

fn render(overview: &StateOverview) -> String {
    let path = overview.path.display();
    if !overview.exists {
        return format!("{path}: no state yet");
    }
    if let Some(error) = &overview.error {
        return format!("{path}: unreadable ({error})");
    }
    format!(
        "{path}: {} identities, last updated {}",
        overview.count.unwrap_or_default(),
        overview.last_updated.as_deref().unwrap_or("never")
    )
}
