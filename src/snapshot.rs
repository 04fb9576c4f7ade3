use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::SnapshotError;
use crate::models::{BuildupFallback, Signal, SignalEntry, TotalRisk};

const TOTAL_RISK_KEY: &str = "total_risk";
const LAST_UPDATED_KEY: &str = "last_updated";

/// The persisted dashboard document: one entry per signal keyed by name,
/// plus `total_risk` and `last_updated`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub signals: BTreeMap<Signal, SignalEntry>,
    pub total_risk: TotalRisk,
    pub last_updated: Option<String>,
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.signals.len() + 2))?;
        for (signal, entry) in &self.signals {
            map.serialize_entry(signal.as_str(), entry)?;
        }
        map.serialize_entry(TOTAL_RISK_KEY, &self.total_risk)?;
        map.serialize_entry(LAST_UPDATED_KEY, &self.last_updated)?;
        map.end()
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SnapshotError + '_ {
    move |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl Snapshot {
    /// Lenient decode: unknown keys and entries that do not have the expected
    /// shape are skipped one by one instead of failing the document.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut document) = value else {
            warn!("snapshot is not a JSON object, starting fresh");
            return Self::default();
        };

        let total_risk = document
            .remove(TOTAL_RISK_KEY)
            .and_then(|raw| match serde_json::from_value(raw) {
                Ok(total) => Some(total),
                Err(err) => {
                    warn!(error = %err, "discarding malformed total_risk");
                    None
                }
            })
            .unwrap_or_default();
        let last_updated = document
            .remove(LAST_UPDATED_KEY)
            .and_then(|raw| raw.as_str().map(str::to_string));

        let mut signals = BTreeMap::new();
        for (key, raw) in document {
            let Some(signal) = Signal::from_key(&key) else {
                debug!(key = %key, "ignoring unknown snapshot key");
                continue;
            };
            match serde_json::from_value::<SignalEntry>(raw) {
                Ok(entry) => {
                    signals.insert(signal, entry);
                }
                Err(err) => warn!(%signal, error = %err, "discarding malformed signal entry"),
            }
        }

        Self {
            signals,
            total_risk,
            last_updated,
        }
    }

    /// Previous state for a run. A missing, unreadable or corrupt file is an
    /// empty prior state, never an error.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no previous snapshot");
                return Self::default();
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "snapshot unreadable, starting fresh");
                return Self::default();
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Self::from_value(value),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "snapshot corrupt, starting fresh");
                Self::default()
            }
        }
    }

    /// Replace the file at `path` atomically: readers see either the old or
    /// the new document, never a partial one.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(io_error(dir))?;

        let mut file = NamedTempFile::new_in(dir).map_err(io_error(dir))?;
        serde_json::to_writer_pretty(&mut file, self)?;
        file.write_all(b"\n").map_err(io_error(path))?;
        file.as_file().sync_all().map_err(io_error(path))?;
        file.persist(path)?;
        Ok(())
    }
}

/// Last good `raw_data` per signal, carried over from the previous snapshot
/// so a failed fetch can reuse it.
#[derive(Debug, Clone, Default)]
pub struct FallbackCache {
    entries: BTreeMap<Signal, Value>,
}

impl FallbackCache {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut cache = Self::default();
        for (signal, entry) in &snapshot.signals {
            cache.put(*signal, entry.raw_data.clone());
        }
        cache
    }

    pub fn get(&self, signal: Signal) -> Option<&Value> {
        self.entries.get(&signal)
    }

    /// Empty payloads carry nothing worth falling back to and are dropped.
    pub fn put(&mut self, signal: Signal, value: Value) {
        let empty = match &value {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if empty {
            self.entries.remove(&signal);
        } else {
            self.entries.insert(signal, value);
        }
    }

    /// The naval posture a previous buildup run recorded, if it had one.
    pub fn buildup(&self) -> Option<BuildupFallback> {
        let raw = self.get(Signal::Buildup)?;
        match serde_json::from_value::<BuildupFallback>(raw.clone()) {
            Ok(fallback) if fallback.force_posture.is_some() => Some(fallback),
            Ok(_) => None,
            Err(err) => {
                warn!(error = %err, "cached buildup payload unusable");
                None
            }
        }
    }
}

/// Serializes runs against one snapshot with an exclusive advisory lock on
/// `<snapshot>.lock`. The lock belongs to the open file, so the kernel drops
/// it when the holder exits, crashed or not; a leftover lock file on disk
/// blocks nothing.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    file: File,
}

pub fn lock_path(snapshot: &Path) -> PathBuf {
    let mut name = snapshot.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

impl RunLock {
    pub fn acquire(snapshot: &Path) -> Result<Self, SnapshotError> {
        let path = lock_path(snapshot);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }

        let mut file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
        {
            Ok(file) => file,
            Err(source) => return Err(SnapshotError::Io { path, source }),
        };
        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => return Err(SnapshotError::RunInProgress(path)),
            Err(TryLockError::Error(source)) => return Err(SnapshotError::Io { path, source }),
        }

        if let Err(err) = write_holder(&mut file) {
            warn!(path = %path.display(), error = %err, "failed to record run lock holder");
        }
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Current pid, for whoever inspects a held lock.
fn write_holder(file: &mut File) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            warn!(path = %self.path.display(), error = %err, "failed to release run lock");
        }
    }
}
