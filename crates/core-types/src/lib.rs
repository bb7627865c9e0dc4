use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Shared error type for the ActHarvest crates.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum CoreError {
    #[error("field `{field}` is empty after trimming")]
    EmptyField { field: String },
}

impl CoreError {
    fn empty(field: &str) -> Self {
        Self::EmptyField {
            field: field.to_string(),
        }
    }
}

/// Two-component deduplication key.
///
/// Harvested records use `(name, profile_url)`, backlog items use
/// `(first_name, last_name)`. Components are trimmed on construction and
/// never empty, so equality is plain field equality. Serialized as a
/// two-element array to keep the persisted state file schema stable.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "(String, String)", into = "(String, String)")]
pub struct RecordIdentity {
    primary: String,
    secondary: String,
}

impl RecordIdentity {
    pub fn new(primary: impl AsRef<str>, secondary: impl AsRef<str>) -> Result<Self, CoreError> {
        let primary = primary.as_ref().trim();
        let secondary = secondary.as_ref().trim();
        if primary.is_empty() {
            return Err(CoreError::empty("primary"));
        }
        if secondary.is_empty() {
            return Err(CoreError::empty("secondary"));
        }
        Ok(Self {
            primary: primary.to_string(),
            secondary: secondary.to_string(),
        })
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn secondary(&self) -> &str {
        &self.secondary
    }
}

impl TryFrom<(String, String)> for RecordIdentity {
    type Error = CoreError;

    fn try_from(value: (String, String)) -> Result<Self, Self::Error> {
        Self::new(value.0, value.1)
    }
}

impl From<RecordIdentity> for (String, String) {
    fn from(value: RecordIdentity) -> Self {
        (value.primary, value.secondary)
    }
}

impl fmt::Display for RecordIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.primary, self.secondary)
    }
}

/// A validated record produced by the extraction engine.
///
/// Identity and category are fixed at construction. Later stages may only
/// stamp the optional metadata, and only once.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Record {
    identity: RecordIdentity,
    category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    captured_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn new(identity: RecordIdentity, category: impl AsRef<str>) -> Result<Self, CoreError> {
        let category = category.as_ref().trim();
        if category.is_empty() {
            return Err(CoreError::empty("category"));
        }
        Ok(Self {
            identity,
            category: category.to_string(),
            page_number: None,
            captured_at: None,
        })
    }

    pub fn identity(&self) -> &RecordIdentity {
        &self.identity
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn page_number(&self) -> Option<u32> {
        self.page_number
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.captured_at
    }

    /// Stamps the page the record was found on; an existing stamp wins.
    pub fn with_page_number(mut self, page: u32) -> Self {
        self.page_number.get_or_insert(page);
        self
    }

    /// Stamps the capture time; an existing stamp wins.
    pub fn with_captured_at(mut self, at: DateTime<Utc>) -> Self {
        self.captured_at.get_or_insert(at);
        self
    }
}

/// What a session task or dispatch attempt was aimed at.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TaskTarget {
    Page(u32),
    Item(String),
}

impl TaskTarget {
    pub fn page(&self) -> Option<u32> {
        match self {
            TaskTarget::Page(page) => Some(*page),
            TaskTarget::Item(_) => None,
        }
    }
}

impl fmt::Display for TaskTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskTarget::Page(page) => write!(f, "page {page}"),
            TaskTarget::Item(id) => write!(f, "item {id}"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    /// Readable id used to key artifact files, e.g. `page-003-1f2e3d4c`.
    pub fn for_target(target: &TaskTarget) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        let short = &suffix[..8];
        match target {
            TaskTarget::Page(page) => Self(format!("page-{page:03}-{short}")),
            TaskTarget::Item(_) => Self(format!("item-{short}")),
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Terminal outcome of exactly one session task or dispatch attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskResult {
    task_id: TaskId,
    target: TaskTarget,
    records: Vec<Record>,
    success: bool,
    error: Option<String>,
    artifact_paths: Vec<PathBuf>,
}

impl TaskResult {
    pub fn succeeded(
        task_id: TaskId,
        target: TaskTarget,
        records: Vec<Record>,
        artifact_paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            task_id,
            target,
            records,
            success: true,
            error: None,
            artifact_paths,
        }
    }

    pub fn failed(
        task_id: TaskId,
        target: TaskTarget,
        error: impl Into<String>,
        artifact_paths: Vec<PathBuf>,
    ) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "unspecified failure".to_string();
        }
        Self {
            task_id,
            target,
            records: Vec::new(),
            success: false,
            error: Some(error),
            artifact_paths,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn target(&self) -> &TaskTarget {
        &self.target
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn artifact_paths(&self) -> &[PathBuf] {
        &self.artifact_paths
    }
}
