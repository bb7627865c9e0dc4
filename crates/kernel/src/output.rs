//! Per-run output files for harvest runs.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use actharvest_core_types::{Record, RecordIdentity};
use actharvest_state_center::ProcessedSet;
use chrono::Local;
use serde_json::{Map, Value};

use crate::artifacts::ArtifactWriter;
use crate::errors::KernelError;
use crate::extraction::RecordSchema;
use crate::pagination::PaginationRun;
use crate::parallel::ParallelRun;

/// One output row: the full record when this run saw it, else the bare identity.
fn output_row(
    schema: &RecordSchema,
    identity: &RecordIdentity,
    seen: &HashMap<&RecordIdentity, &Record>,
) -> Value {
    let mut row = Map::new();
    row.insert(schema.name_field.clone(), Value::from(identity.primary()));
    row.insert(schema.url_field.clone(), Value::from(identity.secondary()));
    if let Some(record) = seen.get(identity) {
        row.insert(schema.category_field.clone(), Value::from(record.category()));
        if let Some(page) = record.page_number() {
            row.insert("page_number".to_string(), Value::from(page));
        }
        if let Some(at) = record.captured_at() {
            row.insert("captured_at".to_string(), Value::from(at.to_rfc3339()));
        }
    }
    Value::Object(row)
}

fn rows<'a>(
    schema: &RecordSchema,
    identities: impl IntoIterator<Item = &'a RecordIdentity>,
    records: &[&'a Record],
) -> Vec<Value> {
    let seen: HashMap<&RecordIdentity, &Record> =
        records.iter().map(|r| (r.identity(), *r)).collect();
    identities
        .into_iter()
        .map(|identity| output_row(schema, identity, &seen))
        .collect()
}

/// Writes `records-<stamp>.jsonl` with the whole processed set. A taken name
/// gets a numeric suffix instead of failing the run.
pub fn write_records_file(
    writer: &ArtifactWriter,
    stamp: &str,
    schema: &RecordSchema,
    set: &ProcessedSet,
    new_records: &[&Record],
) -> Result<PathBuf, KernelError> {
    let identities = set.sorted();
    writer.write_jsonl(
        &format!("records-{stamp}.jsonl"),
        rows(schema, identities.iter(), new_records),
    )
}

/// Output of a sequential run: records file plus a readable summary.
pub fn write_sequential_outputs(
    writer: &ArtifactWriter,
    stamp: &str,
    schema: &RecordSchema,
    set: &ProcessedSet,
    run: &PaginationRun,
) -> Result<Vec<PathBuf>, KernelError> {
    let new_records: Vec<&Record> = run.new_records.iter().collect();
    let records = write_records_file(writer, stamp, schema, set, &new_records)?;

    let mut text = String::new();
    let _ = writeln!(text, "Sequential harvest summary");
    let _ = writeln!(text, "Timestamp: {}", Local::now().to_rfc3339());
    let _ = writeln!(text, "Terminal state: {:?} ({:?})", run.terminal, run.reason);
    let _ = writeln!(text, "Pages processed: {}", run.pages.len());
    let _ = writeln!(text, "Summary: {}", run.summary);
    if run.persist_failures > 0 {
        let _ = writeln!(text, "State persist failures: {}", run.persist_failures);
    }
    text.push('\n');
    for page in &run.pages {
        let _ = write!(
            text,
            "Page {}: {} new, {} duplicate",
            page.page, page.new_records, page.duplicates
        );
        if let Some(error) = &page.error {
            let _ = write!(text, ", error: {error}");
        }
        if let Some(answer) = &page.continuation {
            let _ = write!(text, ", continuation: {}", answer.trim());
        }
        text.push('\n');
    }
    append_new_records(&mut text, &new_records);
    let summary = writer.write_next(&format!("run-{stamp}.summary.txt"), text.as_bytes())?;
    Ok(vec![records, summary])
}

/// Output of a parallel run: records file, one file per page, and a summary.
pub fn write_parallel_outputs(
    writer: &ArtifactWriter,
    stamp: &str,
    schema: &RecordSchema,
    set: &ProcessedSet,
    run: &ParallelRun,
) -> Result<Vec<PathBuf>, KernelError> {
    let new_records: Vec<&Record> = run.new_records().collect();
    let mut paths = vec![write_records_file(writer, stamp, schema, set, &new_records)?];

    for page in &run.pages {
        let accepted: Vec<&Record> = page.accepted.iter().collect();
        let identities = page.accepted.iter().map(Record::identity);
        paths.push(writer.write_jsonl(
            &format!("page-{:03}-{stamp}.jsonl", page.page),
            rows(schema, identities, &accepted),
        )?);
    }

    let mut text = String::new();
    let _ = writeln!(text, "Parallel harvest summary");
    let _ = writeln!(text, "Timestamp: {}", Local::now().to_rfc3339());
    let _ = writeln!(text, "Pages: {}", run.pages.len());
    let _ = writeln!(text, "Summary: {}", run.summary);
    let _ = writeln!(text, "State persisted: {}", run.persisted);
    text.push('\n');
    for page in &run.pages {
        match page.result.error() {
            None => {
                let _ = writeln!(text, "Page {}: {} new", page.page, page.accepted.len());
            }
            Some(error) => {
                let _ = writeln!(text, "Page {}: failed: {error}", page.page);
            }
        }
    }
    append_new_records(&mut text, &new_records);
    paths.push(writer.write_next(&format!("run-{stamp}.summary.txt"), text.as_bytes())?);
    Ok(paths)
}

fn append_new_records(text: &mut String, records: &[&Record]) {
    let _ = writeln!(text, "\nNew records this run:");
    for (index, record) in records.iter().enumerate() {
        let _ = writeln!(
            text,
            "{}. {} - {} - {}",
            index + 1,
            record.identity().primary(),
            record.category(),
            record.identity().secondary()
        );
    }
}
