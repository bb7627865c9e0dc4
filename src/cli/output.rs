use std::path::PathBuf;

use actharvest_kernel::RunSummary;
use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// What a command prints when it finishes.
#[derive(Debug, Serialize)]
pub struct CommandReport {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<String>,
    pub summary: RunSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<PathBuf>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>, summary: RunSummary) -> Self {
        Self {
            command: command.into(),
            terminal: None,
            summary,
            details: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    pub fn with_terminal(mut self, terminal: impl Into<String>) -> Self {
        self.terminal = Some(terminal.into());
        self
    }

    pub fn detail(&mut self, line: impl Into<String>) {
        self.details.push(line.into());
    }

    pub fn render_human(&self) -> String {
        let mut text = format!("{} finished", self.command);
        if let Some(terminal) = &self.terminal {
            text.push_str(&format!(" ({terminal})"));
        }
        text.push('\n');
        text.push_str(&format!("  {}\n", self.summary));
        for line in &self.details {
            text.push_str(&format!("  {line}\n"));
        }
        for path in &self.artifacts {
            text.push_str(&format!("  wrote {}\n", path.display()));
        }
        text
    }
}

pub fn emit(format: OutputFormat, report: &CommandReport) -> Result<()> {
    match format {
        OutputFormat::Human => print!("{}", report.render_human()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}
