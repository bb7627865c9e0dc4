use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tracing::debug;

use crate::errors::KernelError;

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Writes audit files that are never overwritten.
#[derive(Clone, Debug)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create `name` under the artifact directory. Fails if it already exists.
    pub fn write_once(&self, name: &str, contents: &[u8]) -> Result<PathBuf, KernelError> {
        self.ensure_dir()?;
        let path = self.dir.join(name);
        create_new(&path, contents).map_err(|err| KernelError::io(&path, err))?;
        debug!(path = %path.display(), bytes = contents.len(), "artifact written");
        Ok(path)
    }

    /// Create `name`, or `<stem>-1<ext>`, `<stem>-2<ext>`, ... when it is taken.
    pub fn write_next(&self, name: &str, contents: &[u8]) -> Result<PathBuf, KernelError> {
        self.ensure_dir()?;
        let (stem, ext) = match name.split_once('.') {
            Some((stem, ext)) => (stem, format!(".{ext}")),
            None => (name, String::new()),
        };
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                name.to_string()
            } else {
                format!("{stem}-{attempt}{ext}")
            };
            let path = self.dir.join(candidate);
            match create_new(&path, contents) {
                Ok(()) => {
                    debug!(path = %path.display(), bytes = contents.len(), "artifact written");
                    return Ok(path);
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(KernelError::io(&path, err)),
            }
        }
        Err(KernelError::io(
            self.dir.join(name),
            io::Error::new(ErrorKind::AlreadyExists, "no free artifact name left"),
        ))
    }

    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf, KernelError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_once(name, &bytes)
    }

    /// One JSON document per line, under the first free variant of `name`.
    pub fn write_jsonl<T, I>(&self, name: &str, rows: I) -> Result<PathBuf, KernelError>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        let mut buffer = Vec::new();
        for row in rows {
            serde_json::to_writer(&mut buffer, &row)?;
            buffer.push(b'\n');
        }
        self.write_next(name, &buffer)
    }

    fn ensure_dir(&self) -> Result<(), KernelError> {
        fs::create_dir_all(&self.dir).map_err(|err| KernelError::io(&self.dir, err))
    }
}

fn create_new(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(contents)?;
    file.flush()
}

/// Local date and time used to key per-run output files.
pub fn run_stamp() -> String {
    Local::now().format("%Y%m%d-%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path().join("audit"));
        let path = writer.write_once("task.raw.txt", b"first").unwrap();
        assert!(matches!(
            writer.write_once("task.raw.txt", b"second"),
            Err(KernelError::Io { .. })
        ));
        assert_eq!(fs::read_to_string(path).unwrap(), "first");
    }

    #[test]
    fn jsonl_has_one_row_per_line() {
        let dir = tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        let path = writer
            .write_jsonl("rows.jsonl", [serde_json::json!({"a": 1}), serde_json::json!({"a": 2})])
            .unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn stamp_carries_date_and_time() {
        let stamp = run_stamp();
        let (date, time) = stamp.split_once('-').unwrap();
        assert_eq!(date.len(), 8);
        assert_eq!(time.len(), 6);
        assert!(date.chars().chain(time.chars()).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn taken_names_get_a_numeric_suffix() {
        let dir = tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        let first = writer.write_next("run-101500.summary.txt", b"monday").unwrap();
        let second = writer.write_next("run-101500.summary.txt", b"tuesday").unwrap();
        let third = writer.write_next("run-101500.summary.txt", b"wednesday").unwrap();
        assert!(first.ends_with("run-101500.summary.txt"));
        assert!(second.ends_with("run-101500-1.summary.txt"));
        assert!(third.ends_with("run-101500-2.summary.txt"));
        assert_eq!(fs::read_to_string(first).unwrap(), "monday");
        assert_eq!(fs::read_to_string(second).unwrap(), "tuesday");
    }
}
