//! Bookkeeping records: retention policies, the backup log, and summaries.

use std::{collections::BTreeMap, fmt, path::PathBuf, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, insight::TraitCategory};

/// Retention window applied when no policy row exists.
pub const DEFAULT_RETENTION_DAYS: u32 = 365;

// ─── Retention ───────────────────────────────────────────────────────────────

/// A kind of record governed by a retention policy.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
  Insights,
}

impl DataType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Insights => "insights",
    }
  }
}

impl fmt::Display for DataType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for DataType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "insights" => Ok(Self::Insights),
      other => Err(Error::UnknownDataType(other.to_owned())),
    }
  }
}

/// Maximum age for one data type. One row per data type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
  pub data_type:      DataType,
  pub retention_days: u32,
  pub last_cleanup:   Option<DateTime<Utc>>,
}

/// Outcome of one retention pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionReport {
  /// Rows deleted, per data type. Types with no expired rows map to 0.
  pub deleted: BTreeMap<DataType, usize>,
  pub ran_at:  Option<DateTime<Utc>>,
}

impl RetentionReport {
  pub fn total_deleted(&self) -> usize { self.deleted.values().sum() }
}

// ─── Backups ─────────────────────────────────────────────────────────────────

/// Append-only log entry written once per export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
  pub id:        Uuid,
  pub timestamp: DateTime<Utc>,
  pub file_path: PathBuf,
  /// Size of the file on disk, in bytes.
  pub size:      u64,
  pub encrypted: bool,
}

// ─── Restore ─────────────────────────────────────────────────────────────────

/// How a bulk restore treats existing records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreMode {
  /// Delete every profile (and its insights) before writing.
  Replace,
  /// Upsert on top of existing records.
  Merge,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
  pub profiles_removed: usize,
  pub profiles_written: usize,
  pub insights_written: usize,
}

// ─── Summary ─────────────────────────────────────────────────────────────────

/// Aggregate statistics for display on the privacy dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSummary {
  pub profiles_count:       usize,
  pub insights_count:       usize,
  pub insights_by_category: BTreeMap<TraitCategory, usize>,
  /// Timestamp of the oldest insight, or the time of the query if none exist.
  pub oldest_data:          DateTime<Utc>,
  /// Size of the database file in bytes; zero for in-memory stores.
  pub storage_size:         u64,
  pub retention_days:       u32,
}
