//! Recovery of structured records from free-text oracle answers.
//!
//! Oracle output usually degenerates to clean JSON, but often carries prose,
//! markdown fences or one object per line. Two strategies are tried in order
//! and the first one that yields a valid candidate wins:
//!
//! 1. parse the whole payload as one JSON value (list or object);
//! 2. scan line by line, splicing list lines back into the queue and cutting
//!    `{ ... }` spans out of any line that holds an object.
//!
//! Every candidate is then validated against a [`RecordSchema`] and
//! deduplicated, first within the batch and then against the
//! [`ProcessedSet`]. Malformed fragments are skipped, never raised.

use std::collections::{HashSet, VecDeque};

use actharvest_core_types::{Record, RecordIdentity};
use actharvest_state_center::ProcessedSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::KernelError;

/// Upper bound on lines examined by the scan strategy, spliced lines included.
const MAX_SCAN_LINES: usize = 10_000;

/// Field names that make up a record in the oracle's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordSchema {
    /// First identity component.
    pub name_field: String,
    /// Second identity component.
    pub url_field: String,
    /// Category label; required but not part of the identity.
    pub category_field: String,
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self {
            name_field: "name".to_string(),
            url_field: "profile_url".to_string(),
            category_field: "subject".to_string(),
        }
    }
}

impl RecordSchema {
    pub fn validate(&self) -> Result<(), KernelError> {
        let fields = [&self.name_field, &self.url_field, &self.category_field];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(KernelError::config("record schema field names must not be empty"));
        }
        let distinct: HashSet<_> = fields.iter().collect();
        if distinct.len() != fields.len() {
            return Err(KernelError::config("record schema field names must be distinct"));
        }
        Ok(())
    }

    /// One example line in the exact shape the extraction prompt asks for.
    pub fn example_line(&self) -> String {
        let mut object = Map::new();
        object.insert(self.name_field.clone(), Value::from("Jane Doe"));
        object.insert(
            self.url_field.clone(),
            Value::from("https://example.com/profiles/jane-doe/"),
        );
        object.insert(self.category_field.clone(), Value::from("Category Label"));
        Value::Object(object).to_string()
    }

    fn field<'a>(&self, object: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
        object
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Build a record from one candidate, or explain why it was rejected.
    fn candidate_to_record(&self, candidate: &Value) -> Result<Record, String> {
        let object = candidate
            .as_object()
            .ok_or_else(|| "candidate is not an object".to_string())?;
        let mut missing = Vec::new();
        let name = self.field(object, &self.name_field);
        let url = self.field(object, &self.url_field);
        let category = self.field(object, &self.category_field);
        if name.is_none() {
            missing.push(self.name_field.as_str());
        }
        if url.is_none() {
            missing.push(self.url_field.as_str());
        }
        if category.is_none() {
            missing.push(self.category_field.as_str());
        }
        match (name, url, category) {
            (Some(name), Some(url), Some(category)) => {
                let identity = RecordIdentity::new(name, url).map_err(|err| err.to_string())?;
                Record::new(identity, category).map_err(|err| err.to_string())
            }
            _ => Err(format!("missing or empty field(s): {}", missing.join(", "))),
        }
    }
}

/// Which strategy produced the accepted candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    WholePayload,
    LineScan,
}

/// Result of extracting one oracle answer.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// New records in the order they appeared.
    pub records: Vec<Record>,
    /// `None` when neither strategy produced a valid candidate.
    pub strategy: Option<Strategy>,
    /// Candidates dropped by validation.
    pub rejected: usize,
    /// Valid candidates dropped as repeats within the batch or already processed.
    pub duplicates: usize,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionEngine {
    schema: RecordSchema,
}

impl ExtractionEngine {
    pub fn new(schema: RecordSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Turn one oracle answer into new, validated records.
    pub fn extract(&self, text: &str, known: &ProcessedSet) -> Extraction {
        let mut extraction = Extraction::default();
        if text.trim().is_empty() {
            return extraction;
        }

        let strategies: [(Strategy, fn(&str) -> Vec<Value>); 2] = [
            (Strategy::WholePayload, whole_payload_candidates),
            (Strategy::LineScan, line_scan_candidates),
        ];
        let mut valid = Vec::new();
        for (strategy, candidates_of) in strategies {
            let mut rejected = 0;
            for candidate in candidates_of(text) {
                match self.schema.candidate_to_record(&candidate) {
                    Ok(record) => valid.push(record),
                    Err(reason) => {
                        debug!(?strategy, %reason, "dropping extraction candidate");
                        rejected += 1;
                    }
                }
            }
            extraction.rejected += rejected;
            if !valid.is_empty() {
                extraction.strategy = Some(strategy);
                break;
            }
        }

        let mut seen = HashSet::new();
        for record in valid {
            if !seen.insert(record.identity().clone()) {
                extraction.duplicates += 1;
                continue;
            }
            if known.contains(record.identity()) {
                debug!(identity = %record.identity(), "skipping already processed record");
                extraction.duplicates += 1;
                continue;
            }
            extraction.records.push(record);
        }
        extraction
    }
}

/// Parse the whole answer as one JSON value.
fn whole_payload_candidates(text: &str) -> Vec<Value> {
    let payload = strip_code_fence(text.trim());
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Array(items)) => items,
        Ok(object @ Value::Object(_)) => vec![object],
        _ => Vec::new(),
    }
}

/// Scan line by line for lists and embedded objects.
fn line_scan_candidates(text: &str) -> Vec<Value> {
    let mut queue: VecDeque<String> = text.lines().map(str::to_string).collect();
    let mut candidates = Vec::new();
    let mut examined = 0usize;

    while let Some(line) = queue.pop_front() {
        examined += 1;
        if examined > MAX_SCAN_LINES {
            debug!(limit = MAX_SCAN_LINES, "line scan limit reached");
            break;
        }
        let line = line.trim();
        if line.starts_with('[') {
            if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(line) {
                for item in items.into_iter().rev() {
                    queue.push_front(item.to_string());
                }
                continue;
            }
        }
        if let Some(span) = object_span(line) {
            match serde_json::from_str::<Value>(span) {
                Ok(value @ Value::Object(_)) => candidates.push(value),
                Ok(_) => {}
                Err(err) => debug!(%err, "unparseable object fragment"),
            }
        }
    }
    candidates
}

/// Substring from the first `{` to the last `}` of a line.
fn object_span(line: &str) -> Option<&str> {
    let start = line.find('{')?;
    let end = line.rfind('}')?;
    (end > start).then(|| &line[start..=end])
}

/// Inner text of a fenced markdown block, or the input unchanged.
fn strip_code_fence(text: &str) -> &str {
    let fence = "```";
    let Some(rest) = text.strip_prefix(fence) else {
        return text;
    };
    let body = rest.trim_start_matches(|c: char| c.is_alphanumeric() || c == '_');
    match body.rfind(fence) {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}
