use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use actharvest_core_types::RecordIdentity;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::StateError;
use crate::set::ProcessedSet;

/// Load and persist a [`ProcessedSet`].
///
/// `load` never fails: unreadable or corrupt state is reported and treated as
/// an empty set. `persist` writes the whole set and returns only after the
/// data has reached durable storage.
pub trait StateStore: Send + Sync {
    fn load(&self) -> ProcessedSet;
    fn persist(&self, set: &ProcessedSet) -> Result<(), StateError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState<'a> {
    identities: &'a [RecordIdentity],
    last_updated: Option<DateTime<Utc>>,
    count: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawState {
    identities: Vec<(String, String)>,
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    count: Option<usize>,
}

pub fn encode_state(set: &ProcessedSet) -> Result<Vec<u8>, StateError> {
    let identities = set.sorted();
    let payload = PersistedState {
        identities: &identities,
        last_updated: set.last_updated(),
        count: identities.len(),
    };
    Ok(serde_json::to_vec_pretty(&payload)?)
}

pub fn decode_state(bytes: &[u8]) -> Result<ProcessedSet, StateError> {
    let raw: RawState = serde_json::from_slice(bytes)?;
    let mut identities = HashSet::with_capacity(raw.identities.len());
    for (primary, secondary) in raw.identities {
        match RecordIdentity::new(&primary, &secondary) {
            Ok(identity) => {
                identities.insert(identity);
            }
            Err(err) => debug!(%primary, %secondary, %err, "dropping invalid persisted identity"),
        }
    }
    if let Some(count) = raw.count {
        if count != identities.len() {
            warn!(
                recorded = count,
                loaded = identities.len(),
                "state file count does not match its identities"
            );
        }
    }
    Ok(ProcessedSet::from_parts(identities, raw.last_updated))
}

/// JSON state file replaced atomically on every persist.
#[derive(Clone, Debug)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> ProcessedSet {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no prior state; starting fresh");
                return ProcessedSet::new();
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "state file unreadable; starting fresh");
                return ProcessedSet::new();
            }
        };
        match decode_state(&bytes) {
            Ok(set) => {
                info!(path = %self.path.display(), count = set.len(), "loaded prior state");
                set
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "state file corrupt; starting fresh");
                ProcessedSet::new()
            }
        }
    }

    fn persist(&self, set: &ProcessedSet) -> Result<(), StateError> {
        let payload = encode_state(set)?;
        write_atomic(&self.path, &payload).map_err(|source| StateError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), count = set.len(), "state persisted");
        Ok(())
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let written = (|| {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(data)?;
        file.flush()?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
        return written;
    }
    sync_parent(path);
    Ok(())
}

#[cfg(unix)]
fn sync_parent(path: &Path) {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent,
        None => Path::new("."),
    };
    if let Err(err) = fs::File::open(parent).and_then(|dir| dir.sync_all()) {
        debug!(dir = %parent.display(), %err, "directory sync skipped");
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) {}

/// Keeps the encoded state in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    payload: Mutex<Option<Vec<u8>>>,
    persists: AtomicUsize,
    fail_persist: AtomicBool,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_set(set: &ProcessedSet) -> Self {
        let store = Self::new();
        *store.payload.lock() = encode_state(set).ok();
        store
    }

    pub fn with_raw(bytes: impl Into<Vec<u8>>) -> Self {
        let store = Self::new();
        *store.payload.lock() = Some(bytes.into());
        store
    }

    pub fn persist_count(&self) -> usize {
        self.persists.load(Ordering::SeqCst)
    }

    /// Makes subsequent `persist` calls fail until reset.
    pub fn set_fail_persist(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }
}

impl StateStore for InMemoryStateStore {
    fn load(&self) -> ProcessedSet {
        let guard = self.payload.lock();
        match guard.as_deref() {
            None => ProcessedSet::new(),
            Some(bytes) => decode_state(bytes).unwrap_or_else(|err| {
                warn!(%err, "in-memory state corrupt; starting fresh");
                ProcessedSet::new()
            }),
        }
    }

    fn persist(&self, set: &ProcessedSet) -> Result<(), StateError> {
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(StateError::Unavailable("persist disabled".to_string()));
        }
        let payload = encode_state(set)?;
        *self.payload.lock() = Some(payload);
        self.persists.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
