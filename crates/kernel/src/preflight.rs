//! Startup checks that must pass before any oracle session is opened.

use std::fs;
use std::path::{Path, PathBuf};

use agent_core::HttpOracleConfig;
use tracing::info;

use crate::app_settings::OracleSettings;
use crate::errors::KernelError;

/// Read a required, non-empty environment variable through `lookup`.
pub fn require_env_with<F>(name: &str, lookup: F) -> Result<String, KernelError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            KernelError::precondition(format!(
                "environment variable {name} is not set; export it before running"
            ))
        })
}

/// Follow the session pointer file to a logged-in browser profile directory.
pub fn resolve_session_profile(pointer: &Path) -> Result<PathBuf, KernelError> {
    let content = match fs::read_to_string(pointer) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(KernelError::precondition(format!(
                "no saved login session: {} is missing; create a persistent session first",
                pointer.display()
            )))
        }
        Err(err) => return Err(KernelError::io(pointer, err)),
    };
    let profile = PathBuf::from(content.trim());
    if content.trim().is_empty() {
        return Err(KernelError::precondition(format!(
            "session pointer {} is empty",
            pointer.display()
        )));
    }
    if !profile.is_dir() {
        return Err(KernelError::precondition(format!(
            "browser profile directory {} not found; create a new session",
            profile.display()
        )));
    }
    info!(profile = %profile.display(), "using saved login session");
    Ok(profile)
}

pub fn require_file(path: &Path, what: &str) -> Result<(), KernelError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(KernelError::precondition(format!(
            "{what} {} not found",
            path.display()
        )))
    }
}

/// Validate oracle credentials and build the HTTP client configuration.
pub fn oracle_config<F>(
    settings: &OracleSettings,
    require_session: bool,
    lookup: F,
) -> Result<HttpOracleConfig, KernelError>
where
    F: Fn(&str) -> Option<String>,
{
    let api_key = require_env_with(&settings.api_key_env, lookup)?;
    let user_data_dir = if require_session {
        Some(resolve_session_profile(&settings.session_pointer)?)
    } else {
        None
    };
    Ok(HttpOracleConfig {
        api_base: settings.api_base.clone(),
        api_key: Some(api_key),
        user_data_dir,
        headless: settings.headless,
        request_timeout: settings.instruction_timeout,
    })
}
