use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::KernelError;
use crate::extraction::RecordSchema;

/// Environment variables that override file-based settings.
pub const ENV_OUTPUT_DIR: &str = "ACTHARVEST_OUTPUT_DIR";
pub const ENV_STATE_DIR: &str = "ACTHARVEST_STATE_DIR";
pub const ENV_ENDPOINT_URL: &str = "ACTHARVEST_ENDPOINT_URL";
pub const ENV_ORACLE_BASE: &str = "ACTHARVEST_ORACLE_BASE";

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub output_dir: PathBuf,
    pub state_dir: PathBuf,
    pub oracle: OracleSettings,
    pub harvest: HarvestSettings,
    pub dispatch: DispatchSettings,
    pub outreach: OutreachSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OracleSettings {
    pub api_base: String,
    /// Name of the environment variable holding the oracle API key.
    pub api_key_env: String,
    /// File whose content is the path of a logged-in browser profile.
    pub session_pointer: PathBuf,
    /// Whether harvest runs also need the logged-in profile.
    pub harvest_requires_session: bool,
    pub headless: bool,
    #[serde(with = "duration_text")]
    pub instruction_timeout: Duration,
    pub step_budget: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HarvestSettings {
    pub start_url: String,
    /// Listing URL for parallel mode; `{page}` is replaced by the page number.
    pub page_url_template: String,
    /// Number of pages known up front for parallel mode.
    pub page_count: u32,
    pub iteration_ceiling: u32,
    pub max_workers: usize,
    #[serde(with = "duration_text")]
    pub stagger: Duration,
    /// Pause after opening a session or moving to a new page.
    #[serde(with = "duration_text")]
    pub settle_delay: Duration,
    /// What the listing shows, used in prompts ("hero cards", "member tiles").
    pub item_description: String,
    pub schema: RecordSchema,
    pub state_file: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DispatchSettings {
    pub endpoint_url: String,
    pub backlog_csv: PathBuf,
    pub state_file: String,
    /// Fixed `company_name` sent with every job.
    pub company_label: String,
    #[serde(with = "duration_text")]
    pub request_timeout: Duration,
    pub success_backoff: BackoffRange,
    pub failure_backoff: BackoffRange,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OutreachSettings {
    pub persons_csv: PathBuf,
    pub state_file: String,
    pub captcha_step_budget: u32,
    pub check_step_budget: u32,
    pub click_step_budget: u32,
    #[serde(with = "duration_text")]
    pub settle_delay: Duration,
}

/// Inclusive range a randomized pause is drawn from.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct BackoffRange {
    #[serde(with = "duration_text")]
    pub min: Duration,
    #[serde(with = "duration_text")]
    pub max: Duration,
}

impl BackoffRange {
    pub const fn fixed(value: Duration) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.max.is_zero()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./actharvest-output"),
            state_dir: PathBuf::from("./state"),
            oracle: OracleSettings::default(),
            harvest: HarvestSettings::default(),
            dispatch: DispatchSettings::default(),
            outreach: OutreachSettings::default(),
        }
    }
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:7450/v1".to_string(),
            api_key_env: "ACTHARVEST_ORACLE_API_KEY".to_string(),
            session_pointer: PathBuf::from(".actharvest_user_data_dir"),
            harvest_requires_session: false,
            headless: false,
            instruction_timeout: Duration::from_secs(300),
            step_budget: agent_core::oracle::DEFAULT_STEP_BUDGET,
        }
    }
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            start_url: "https://aws.amazon.com/developer/community/heroes/".to_string(),
            page_url_template: "https://aws.amazon.com/developer/community/heroes/?page={page}"
                .to_string(),
            page_count: 1,
            iteration_ceiling: 20,
            max_workers: 4,
            stagger: Duration::from_secs(2),
            settle_delay: Duration::from_secs(3),
            item_description: "hero cards".to_string(),
            schema: RecordSchema::default(),
            state_file: "harvest_state.json".to_string(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            endpoint_url: "http://127.0.0.1:8000/jobs".to_string(),
            backlog_csv: PathBuf::from("input/backlog.csv"),
            state_file: "dispatch_state.json".to_string(),
            company_label: "AWS Hero".to_string(),
            request_timeout: Duration::from_secs(30),
            success_backoff: BackoffRange {
                min: Duration::from_secs(90),
                max: Duration::from_secs(120),
            },
            failure_backoff: BackoffRange {
                min: Duration::from_secs(90),
                max: Duration::from_secs(120),
            },
        }
    }
}

impl Default for OutreachSettings {
    fn default() -> Self {
        Self {
            persons_csv: PathBuf::from("input/persons.csv"),
            state_file: "outreach_state.json".to_string(),
            captcha_step_budget: 2,
            check_step_budget: 3,
            click_step_budget: 5,
            settle_delay: Duration::from_secs(3),
        }
    }
}

impl Config {
    /// Parse a YAML document; absent keys take their defaults.
    pub fn from_yaml(text: &str) -> Result<Self, KernelError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|err| KernelError::config(err.to_string()))
    }


    /// Apply `ACTHARVEST_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(dir) = value(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(dir) = value(ENV_STATE_DIR) {
            self.state_dir = PathBuf::from(dir);
        }
        if let Some(url) = value(ENV_ENDPOINT_URL) {
            self.dispatch.endpoint_url = url;
        }
        if let Some(base) = value(ENV_ORACLE_BASE) {
            self.oracle.api_base = base;
        }
    }

    pub fn validate(&self) -> Result<(), KernelError> {
        if self.harvest.iteration_ceiling == 0 {
            return Err(KernelError::config("harvest.iteration_ceiling must be at least 1"));
        }
        if self.harvest.max_workers == 0 {
            return Err(KernelError::config("harvest.max_workers must be at least 1"));
        }
        if !self.harvest.page_url_template.contains("{page}") {
            return Err(KernelError::config(
                "harvest.page_url_template must contain a {page} placeholder",
            ));
        }
        self.harvest.schema.validate()?;
        for (name, range) in [
            ("dispatch.success_backoff", &self.dispatch.success_backoff),
            ("dispatch.failure_backoff", &self.dispatch.failure_backoff),
        ] {
            if range.min > range.max {
                return Err(KernelError::config(format!("{name}: min exceeds max")));
            }
        }
        Ok(())
    }

    pub fn harvest_state_path(&self) -> PathBuf {
        self.state_dir.join(&self.harvest.state_file)
    }

    pub fn dispatch_state_path(&self) -> PathBuf {
        self.state_dir.join(&self.dispatch.state_file)
    }

    pub fn outreach_state_path(&self) -> PathBuf {
        self.state_dir.join(&self.outreach.state_file)
    }
}

/// Durations written as human text ("90s", "2m 30s", "500ms").
mod duration_text {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(text.trim()).map_err(serde::de::Error::custom)
    }
}
