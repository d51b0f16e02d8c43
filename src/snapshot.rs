//! Snapshot persistence
//!
//! Snapshots and comparison results are stored as pretty-printed JSON files
//! in a flat data directory. Filenames double as storage keys and carry the
//! capture time, so stored artifacts sort and stay human-navigable. Writes
//! replace the whole file; concurrent writers for the same handle are not
//! coordinated and the last one wins.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::client::AccountId;
use crate::diff::ComparisonResult;

/// Timestamp pattern used inside snapshot files and snapshot filenames.
pub const SNAPSHOT_KEY_FORMAT: &str = "%d_%m_%Y_%H_%M";
/// Timestamp pattern used in comparison filenames.
pub const COMPARISON_KEY_FORMAT: &str = "%Y-%m-%d_%H-%M";

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

/// serde adapter for the `DD_MM_YYYY_HH_MM` timestamp strings.
pub(crate) mod key_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::SNAPSHOT_KEY_FORMAT;

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(SNAPSHOT_KEY_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, SNAPSHOT_KEY_FORMAT).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub followers_count: usize,
    pub following_count: usize,
}

/// A timestamped capture of one account's follower and following sets.
/// Immutable once created; identity is `(username, taken_at)`. Comparisons
/// read two snapshots and produce a new [`ComparisonResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub username: String,
    #[serde(rename = "timestamp", with = "key_timestamp")]
    pub taken_at: NaiveDateTime,
    pub followers: BTreeSet<AccountId>,
    pub following: BTreeSet<AccountId>,
    pub stats: SnapshotStats,
}

impl Snapshot {
    pub fn new(
        username: impl Into<String>,
        taken_at: NaiveDateTime,
        followers: BTreeSet<AccountId>,
        following: BTreeSet<AccountId>,
    ) -> Self {
        let stats = SnapshotStats {
            followers_count: followers.len(),
            following_count: following.len(),
        };
        Self {
            username: username.into(),
            taken_at,
            followers,
            following,
            stats,
        }
    }
}

/// One stored snapshot as seen by [`SnapshotStore::list_available`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub path: PathBuf,
    pub captured_at: NaiveDateTime,
    pub display_label: String,
}

/// Flat-directory JSON store for snapshots and comparison results.
pub struct SnapshotStore {
    data_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Write a snapshot as `{username}_{DD_MM_YYYY_HH_MM}.json` and return
    /// the path. The data directory is created on first use.
    pub fn save(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        fs::create_dir_all(&self.data_dir).with_context(|| {
            format!("Failed to create data directory {}", self.data_dir.display())
        })?;

        let filename = format!(
            "{}_{}.json",
            snapshot.username,
            snapshot.taken_at.format(SNAPSHOT_KEY_FORMAT)
        );
        let path = self.data_dir.join(filename);

        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;

        tracing::info!("Saved snapshot to {}", path.display());
        Ok(path)
    }

    /// List stored snapshots for `handle`, most recent first. The capture
    /// time is parsed from the filename; files that don't match the snapshot
    /// naming scheme (including comparison artifacts) are skipped.
    pub fn list_available(&self, handle: &str) -> Result<Vec<SnapshotEntry>> {
        let mut entries = Vec::new();

        let read_dir = match fs::read_dir(&self.data_dir) {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(entries),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Failed to read data directory {}", self.data_dir.display())
                })
            }
        };

        let prefix = format!("{}_", handle);
        for entry in read_dir {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };

            if !name.starts_with(&prefix) || !name.ends_with(".json") {
                continue;
            }

            let stem = &name[prefix.len()..name.len() - ".json".len()];
            if stem.starts_with("comparison_") {
                continue;
            }

            match NaiveDateTime::parse_from_str(stem, SNAPSHOT_KEY_FORMAT) {
                Ok(captured_at) => entries.push(SnapshotEntry {
                    path: entry.path(),
                    captured_at,
                    display_label: captured_at.format(DISPLAY_FORMAT).to_string(),
                }),
                Err(_) => {
                    tracing::warn!("Skipping unrecognized file in data directory: {}", name);
                }
            }
        }

        entries.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
        Ok(entries)
    }

    /// Load a snapshot by path. A missing file is `Ok(None)`; a file that
    /// exists but doesn't parse is an error.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Option<Snapshot>> {
        let path = path.as_ref();

        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read snapshot {}", path.display()))
            }
        };

        let snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed snapshot file {}", path.display()))?;
        Ok(Some(snapshot))
    }

    /// Write a comparison result as
    /// `{handle}_comparison_{YYYY-MM-DD_HH-MM}.json`. The `comparison` infix
    /// keeps the key space disjoint from snapshots.
    pub fn save_comparison(&self, handle: &str, comparison: &ComparisonResult) -> Result<PathBuf> {
        fs::create_dir_all(&self.data_dir).with_context(|| {
            format!("Failed to create data directory {}", self.data_dir.display())
        })?;

        let filename = format!(
            "{}_comparison_{}.json",
            handle,
            comparison.timestamp.format(COMPARISON_KEY_FORMAT)
        );
        let path = self.data_dir.join(filename);

        let json = serde_json::to_string_pretty(comparison)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write comparison {}", path.display()))?;

        tracing::info!("Saved comparison to {}", path.display());
        Ok(path)
    }
}
