//! Record snapshots saved to and loaded from JSON
//!
//! A snapshot holds the raw records of one collection so a system can be
//! analyzed later or elsewhere. Records may carry unparsed launchd
//! descriptor strings; they are parsed on load.

use crate::error::{LineageError, LineageResult};
use crate::models::ProcessRecord;
use crate::source::{Collection, ProcessRecordSource};
use crate::submitted_by::LaunchdDescriptor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Current snapshot file format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// A saved collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
    pub records: Vec<SnapshotRecord>,
}

/// A record as stored in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    #[serde(flatten)]
    pub record: ProcessRecord,
    /// Raw launchd strings, parsed into the record's launchd fields on load
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launchd: Option<LaunchdDescriptor>,
}

impl Snapshot {
    /// Snapshot of already-parsed records, stamped with the current time
    pub fn new(records: &[ProcessRecord]) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            captured_at: OffsetDateTime::now_utc(),
            records: records
                .iter()
                .cloned()
                .map(|record| SnapshotRecord {
                    record,
                    launchd: None,
                })
                .collect(),
        }
    }

    pub fn load(path: &Path) -> LineageResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| LineageError::SnapshotIo {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot: Snapshot =
            serde_json::from_str(&content).map_err(|source| LineageError::SnapshotFormat {
                path: path.to_path_buf(),
                source,
            })?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(LineageError::SnapshotVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        log::info!(
            "Loaded {} records captured at {} from {}",
            snapshot.records.len(),
            snapshot.captured_at,
            path.display()
        );
        Ok(snapshot)
    }

    pub fn save(&self, path: &Path) -> LineageResult<()> {
        let io_err = |source| LineageError::SnapshotIo {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| io_err(e.into()))?;
        fs::write(path, json).map_err(io_err)?;
        log::info!("Saved {} records to {}", self.records.len(), path.display());
        Ok(())
    }

    /// Records with launchd descriptors folded into their fields
    pub fn into_records(self) -> Vec<ProcessRecord> {
        self.records
            .into_iter()
            .map(|stored| {
                let mut record = stored.record;
                if let Some(descriptor) = stored.launchd {
                    descriptor.parse().apply_to(&mut record);
                }
                record
            })
            .collect()
    }
}

/// Reads records from a snapshot file
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    path: PathBuf,
}

impl SnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ProcessRecordSource for SnapshotSource {
    type Error = LineageError;

    fn collect(&mut self) -> Result<Collection, Self::Error> {
        let records = Snapshot::load(&self.path)?.into_records();
        Ok(Collection::new(records))
    }
}
