/// Leaderboard snapshot storage.
///
/// Each category owns one well-known JSON file in the output directory,
/// replaced wholesale on every run. The previous file is the only state that
/// survives between runs, and only its `{id, rank}` pairs are read back.
///
/// Writes go to a temporary file in the same directory and are renamed into
/// place, so a reader never sees a half-written document.

use crate::analysis::ranking::PreviousRanks;
use crate::model::{HistoryArchive, LeaderboardSnapshot, SnapshotError};
use crate::stations::Category;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File name of the multi-season archive.
pub const HISTORY_FILE: &str = "history.json";

// ---------------------------------------------------------------------------
// Previous snapshot (read side)
// ---------------------------------------------------------------------------

/// The only part of an old snapshot this service cares about.
#[derive(Debug, Deserialize)]
struct PreviousSnapshot {
    #[serde(default)]
    rankings: Vec<PreviousEntry>,
}

#[derive(Debug, Deserialize)]
struct PreviousEntry {
    id: String,
    rank: u32,
}

/// Extracts `{id → rank}` from a snapshot document.
pub fn parse_previous_ranks(text: &str) -> Result<PreviousRanks, serde_json::Error> {
    let snapshot: PreviousSnapshot = serde_json::from_str(text)?;
    Ok(snapshot
        .rankings
        .into_iter()
        .map(|entry| (entry.id, entry.rank))
        .collect())
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, category: Category) -> PathBuf {
        self.dir.join(category.file_name())
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    /// Ranks from the category's current file.
    ///
    /// Never fails: a missing file is a first run, and an unreadable or
    /// corrupt one is logged and treated the same way.
    pub fn read_previous_ranks(&self, category: Category) -> PreviousRanks {
        let path = self.path_for(category);

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No previous {} snapshot at {}, starting fresh", category, path.display());
                return PreviousRanks::new();
            }
            Err(e) => {
                warn!(
                    "Could not read previous {} snapshot {}: {} (ranking without history)",
                    category,
                    path.display(),
                    e
                );
                return PreviousRanks::new();
            }
        };

        match parse_previous_ranks(&text) {
            Ok(ranks) => {
                debug!("Read {} previous ranks from {}", ranks.len(), path.display());
                ranks
            }
            Err(e) => {
                warn!(
                    "Previous {} snapshot {} is corrupt: {} (ranking without history)",
                    category,
                    path.display(),
                    e
                );
                PreviousRanks::new()
            }
        }
    }

    /// Replaces the category's file with `snapshot`.
    pub fn write<F: Serialize>(
        &self,
        category: Category,
        snapshot: &LeaderboardSnapshot<F>,
    ) -> Result<PathBuf, SnapshotError> {
        let path = self.path_for(category);
        write_json_atomic(&path, snapshot)?;
        info!(
            "Wrote {} leaderboard ({} cities) to {}",
            category,
            snapshot.rankings.len(),
            path.display()
        );
        Ok(path)
    }

    /// Replaces the historical archive.
    pub fn write_history(&self, archive: &HistoryArchive) -> Result<PathBuf, SnapshotError> {
        let path = self.history_path();
        write_json_atomic(&path, archive)?;
        info!("Wrote history for {} cities to {}", archive.cities.len(), path.display());
        Ok(path)
    }
}

/// Pretty-prints `value` to a temp file next to `path`, then renames it over
/// `path`. Creates the parent directory when needed.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), SnapshotError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| SnapshotError::CreateDir(dir.clone(), e))?;

    let json = serde_json::to_string_pretty(value)
        .map_err(|e| SnapshotError::Encode(path.to_path_buf(), e))?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| SnapshotError::Write(path.to_path_buf(), e))?;
    tmp.write_all(json.as_bytes())
        .and_then(|_| tmp.write_all(b"\n"))
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| SnapshotError::Write(path.to_path_buf(), e))?;

    tmp.persist(path)
        .map_err(|e| SnapshotError::Persist(path.to_path_buf(), e.error))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
