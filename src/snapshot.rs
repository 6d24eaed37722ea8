//! # Snapshot Writer
//!
//! Publishes the device store as a JSON document:
//!
//! ```json
//! {
//!   "updated": "2025-03-14T12:00:00Z",
//!   "batteries": {
//!     "5": { "timestamp": "...", "slave_id": 5, "soc_pct": 85, ... }
//!   }
//! }
//! ```
//!
//! The document is written to a temporary file next to the destination and
//! renamed over it, so readers see either the previous or the new content.
//! Writes happen at most once per wall-clock second and only once at least
//! one battery has been decoded.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::decoder::{iso8601, Reading, SlaveId};
use crate::error::{SnifferError, SnifferResult};
use crate::store::DeviceStore;

/// Serializable view of the device store at one instant
#[derive(Debug, Serialize)]
pub struct Snapshot<'a> {
    #[serde(serialize_with = "iso8601")]
    pub updated: DateTime<Utc>,
    pub batteries: &'a BTreeMap<SlaveId, Reading>,
}

impl<'a> Snapshot<'a> {
    /// Capture `store` as of `updated`
    pub fn new(store: &'a DeviceStore, updated: DateTime<Utc>) -> Self {
        Self {
            updated,
            batteries: store.readings(),
        }
    }

    /// Render the document as pretty-printed JSON with a trailing newline
    pub fn to_json(&self) -> SnifferResult<Vec<u8>> {
        let mut body = serde_json::to_vec_pretty(self)?;
        body.push(b'\n');
        Ok(body)
    }
}

/// Result of a throttled write attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Snapshot published
    Written,
    /// A write already happened during this second
    Throttled,
    /// No battery decoded yet, nothing to publish
    Empty,
    /// Write attempted and failed; the previous file is untouched
    Failed,
}

/// Replace `path` with `body` through a temporary file in the same directory.
pub fn write_atomic(path: &Path, body: &[u8]) -> SnifferResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| SnifferError::snapshot(path, e))?;

    // Temp files are created 0600; the snapshot is meant for other readers
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o644))
            .map_err(|e| SnifferError::snapshot(path, e))?;
    }

    tmp.write_all(body)
        .and_then(|()| tmp.flush())
        .map_err(|e| SnifferError::snapshot(path, e))?;

    tmp.persist(path)
        .map_err(|e| SnifferError::snapshot(path, e.error))?;
    Ok(())
}

/// Throttled, atomic publisher of the device store
#[derive(Debug)]
pub struct SnapshotWriter {
    path: PathBuf,
    last_second: Option<i64>,
    writes: u64,
    failures: u64,
}

impl SnapshotWriter {
    /// Create a writer targeting `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_second: None,
            writes: 0,
            failures: 0,
        }
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of snapshots published
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Number of failed write attempts
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Write the store unconditionally.
    pub fn write(&self, store: &DeviceStore, now: DateTime<Utc>) -> SnifferResult<()> {
        let body = Snapshot::new(store, now).to_json()?;
        write_atomic(&self.path, &body)
    }

    /// Write the store unless a write already happened this second or
    /// the store is empty.
    ///
    /// A failed attempt still uses up the current second; the next try
    /// happens on the first call in a later second.
    pub fn maybe_write(&mut self, store: &DeviceStore, now: DateTime<Utc>) -> WriteOutcome {
        let second = now.timestamp();
        if self.last_second == Some(second) {
            return WriteOutcome::Throttled;
        }
        if store.is_empty() {
            return WriteOutcome::Empty;
        }

        self.last_second = Some(second);
        self.publish(store, now)
    }

    /// Write the store now, ignoring the throttle. Empty stores are skipped.
    pub fn force_write(&mut self, store: &DeviceStore, now: DateTime<Utc>) -> WriteOutcome {
        if store.is_empty() {
            return WriteOutcome::Empty;
        }
        self.publish(store, now)
    }

    fn publish(&mut self, store: &DeviceStore, now: DateTime<Utc>) -> WriteOutcome {
        match self.write(store, now) {
            Ok(()) => {
                self.writes += 1;
                debug!(
                    "Snapshot written: {} batteries -> {}",
                    store.len(),
                    self.path.display()
                );
                WriteOutcome::Written
            }
            Err(e) => {
                self.failures += 1;
                warn!("Snapshot write failed: {}", e);
                WriteOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NUM_REGISTERS;
    use chrono::{Duration, TimeZone};
    use serde_json::Value;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap()
    }

    fn store_with(entries: &[(SlaveId, u16)]) -> DeviceStore {
        let mut store = DeviceStore::new();
        for &(id, soc) in entries {
            let mut regs = [0u16; NUM_REGISTERS];
            regs[2] = soc;
            regs[3] = 5120;
            store.upsert(Reading::from_registers(id, regs, t0()));
        }
        store
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn test_snapshot_schema() {
        let store = store_with(&[(5, 85), (12, 40)]);
        let body = Snapshot::new(&store, t0()).to_json().unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["updated"], "2025-03-14T12:00:00Z");
        let batteries = json["batteries"].as_object().unwrap();
        assert_eq!(batteries.len(), 2);
        assert_eq!(batteries["5"]["slave_id"], 5);
        assert_eq!(batteries["5"]["soc_pct"], 85);
        assert_eq!(batteries["12"]["voltage_v"], 51.2);
        assert_eq!(batteries["12"]["timestamp"], "2025-03-14T12:00:00Z");
        assert!(body.ends_with(b"}\n"));
    }

    #[test]
    fn test_empty_store_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("battery.json");
        let mut writer = SnapshotWriter::new(&path);

        assert_eq!(
            writer.maybe_write(&DeviceStore::new(), t0()),
            WriteOutcome::Empty
        );
        assert!(!path.exists());
    }

    #[test]
    fn test_throttled_to_one_write_per_second() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("battery.json");
        let mut writer = SnapshotWriter::new(&path);

        let mut store = store_with(&[(1, 50)]);
        assert_eq!(writer.maybe_write(&store, t0()), WriteOutcome::Written);

        store = store_with(&[(1, 51)]);
        let same_second = t0() + Duration::milliseconds(500);
        assert_eq!(
            writer.maybe_write(&store, same_second),
            WriteOutcome::Throttled
        );
        assert_eq!(read_json(&path)["batteries"]["1"]["soc_pct"], 50);

        store = store_with(&[(1, 52)]);
        let next_second = t0() + Duration::seconds(1);
        assert_eq!(writer.maybe_write(&store, next_second), WriteOutcome::Written);
        assert_eq!(read_json(&path)["batteries"]["1"]["soc_pct"], 52);
        assert_eq!(writer.writes(), 2);
    }

    #[test]
    fn test_failure_consumes_the_second() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("battery.json");
        let mut writer = SnapshotWriter::new(&path);
        let store = store_with(&[(1, 50)]);

        assert_eq!(writer.maybe_write(&store, t0()), WriteOutcome::Failed);
        assert_eq!(writer.maybe_write(&store, t0()), WriteOutcome::Throttled);
        assert_eq!(writer.failures(), 1);
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_write_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("battery.json");
        let writer = SnapshotWriter::new(&path);
        writer.write(&store_with(&[(1, 50)]), t0()).unwrap();

        // A non-empty directory in the way of the rename makes the write fail
        let blocked_path = dir.path().join("blocked");
        std::fs::create_dir(&blocked_path).unwrap();
        std::fs::write(blocked_path.join("keep"), b"x").unwrap();
        let blocked = SnapshotWriter::new(&blocked_path);
        assert!(blocked.write(&store_with(&[(1, 99)]), t0()).is_err());

        assert_eq!(read_json(&path)["batteries"]["1"]["soc_pct"], 50);
        assert!(blocked_path.join("keep").exists());
        // No temporary file left behind
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 2);
    }

    #[test]
    fn test_readers_never_see_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("battery.json");
        let writer = SnapshotWriter::new(&path);
        writer.write(&store_with(&[(1, 0)]), t0()).unwrap();

        let reader_path = path.clone();
        let reader = std::thread::spawn(move || {
            for _ in 0..500 {
                let bytes = std::fs::read(&reader_path).unwrap();
                let parsed: Value = serde_json::from_slice(&bytes).unwrap();
                assert!(parsed["batteries"]["1"].is_object());
            }
        });

        for i in 0..200u16 {
            let entries: Vec<(SlaveId, u16)> = (1..=16).map(|id| (id, i % 101)).collect();
            writer.write(&store_with(&entries), t0()).unwrap();
        }
        reader.join().unwrap();
    }
}
