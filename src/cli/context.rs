use std::path::{Path, PathBuf};
use std::sync::Arc;

use actharvest_kernel::preflight::oracle_config;
use actharvest_kernel::{ArtifactWriter, Config, SessionTask};
use agent_core::{HttpOracleConnector, OracleConnector};
use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;

const TASK_ARTIFACT_DIR: &str = "tasks";

pub struct CliContext {
    config: Arc<Config>,
    config_path: PathBuf,
    cancel: CancellationToken,
}

impl CliContext {
    pub fn new(config: Config, config_path: PathBuf) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run oracle preflight checks and build the HTTP connector. Fails before
    /// any session exists when credentials or the saved login are missing.
    pub fn oracle_connector(&self, require_session: bool) -> Result<Arc<dyn OracleConnector>> {
        let settings = oracle_config(&self.config.oracle, require_session, |key| {
            std::env::var(key).ok()
        })
        .context("oracle preflight failed")?;
        let connector =
            HttpOracleConnector::new(settings).context("failed to build oracle client")?;
        Ok(Arc::new(connector))
    }

    pub fn session_task(&self) -> SessionTask {
        SessionTask::new(
            ArtifactWriter::new(self.config.output_dir.join(TASK_ARTIFACT_DIR)),
            self.config.oracle.instruction_timeout,
        )
    }

    pub fn output_writer(&self) -> ArtifactWriter {
        ArtifactWriter::new(&self.config.output_dir)
    }

    /// Trip the cancellation token on Ctrl-C. In-flight instructions finish;
    /// controllers stop at their next boundary.
    pub fn cancel_on_interrupt(&self) {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; finishing the current step before stopping");
                cancel.cancel();
            }
        });
    }
}
