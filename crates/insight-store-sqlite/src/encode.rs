//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps use the fixed-width form from [`insight_core::time`] so string
//! comparison in SQL matches chronological order. UUIDs are stored as
//! hyphenated lowercase strings. Enumerated fields are written as their
//! canonical tokens (`AgeGroup::as_str`, `TraitCategory::as_str`).

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use insight_core::{
  BackupRecord, DataType, Insight, Profile, RetentionPolicy, TraitCategory, time,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { time::format_timestamp(dt) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  time::parse_timestamp(s).ok_or_else(|| Error::DateParse(format!("invalid timestamp: {s:?}")))
}

pub fn decode_category(s: &str) -> Result<TraitCategory> { Ok(s.parse()?) }

/// Wrap a serialization failure raised inside a connection closure.
pub fn json_err(e: serde_json::Error) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e))
}

// ─── Row types (write side) ──────────────────────────────────────────────────

/// Column values for one `profiles` row, with the full entity in `data`.
pub struct ProfileRow {
  pub id:           String,
  pub name:         String,
  pub age:          i64,
  pub age_group:    &'static str,
  pub profile_pic:  String,
  pub created_at:   String,
  pub last_updated: String,
  pub data:         String,
}

impl ProfileRow {
  pub fn encode(p: &Profile) -> serde_json::Result<Self> {
    Ok(Self {
      id:           encode_uuid(p.id),
      name:         p.name.clone(),
      age:          i64::from(p.age),
      age_group:    p.age_group.as_str(),
      profile_pic:  p.profile_pic.clone(),
      created_at:   encode_dt(p.created_at),
      last_updated: encode_dt(p.last_updated),
      data:         serde_json::to_string(p)?,
    })
  }

  pub fn upsert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
    conn.execute(
      "INSERT INTO profiles (
         id, name, age, age_group, profile_pic, created_at, last_updated, data
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
       ON CONFLICT(id) DO UPDATE SET
         name         = excluded.name,
         age          = excluded.age,
         age_group    = excluded.age_group,
         profile_pic  = excluded.profile_pic,
         created_at   = excluded.created_at,
         last_updated = excluded.last_updated,
         data         = excluded.data",
      rusqlite::params![
        self.id,
        self.name,
        self.age,
        self.age_group,
        self.profile_pic,
        self.created_at,
        self.last_updated,
        self.data,
      ],
    )
  }
}

/// Column values for one `insights` row, with the full entity in `data`.
pub struct InsightRow {
  pub id:               String,
  pub user_id:          String,
  pub category:         &'static str,
  pub timestamp:        String,
  pub confidence_score: f64,
  pub data:             String,
}

impl InsightRow {
  pub fn encode(i: &Insight) -> serde_json::Result<Self> {
    Ok(Self {
      id:               encode_uuid(i.id),
      user_id:          encode_uuid(i.user_id),
      category:         i.category.as_str(),
      timestamp:        encode_dt(i.timestamp),
      confidence_score: i.confidence_score,
      data:             serde_json::to_string(i)?,
    })
  }

  pub fn upsert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
    conn.execute(
      "INSERT INTO insights (id, user_id, category, timestamp, confidence_score, data)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6)
       ON CONFLICT(id) DO UPDATE SET
         user_id          = excluded.user_id,
         category         = excluded.category,
         timestamp        = excluded.timestamp,
         confidence_score = excluded.confidence_score,
         data             = excluded.data",
      rusqlite::params![
        self.id,
        self.user_id,
        self.category,
        self.timestamp,
        self.confidence_score,
        self.data,
      ],
    )
  }
}

// ─── Row types (read side) ───────────────────────────────────────────────────

pub fn decode_profile(data: &str) -> Result<Profile> { Ok(serde_json::from_str(data)?) }

pub fn decode_insight(data: &str) -> Result<Insight> { Ok(serde_json::from_str(data)?) }

/// Raw strings read directly from a `backups` row.
pub struct RawBackup {
  pub id:        String,
  pub timestamp: String,
  pub file_path: String,
  pub size:      i64,
  pub encrypted: bool,
}

impl RawBackup {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:        row.get(0)?,
      timestamp: row.get(1)?,
      file_path: row.get(2)?,
      size:      row.get(3)?,
      encrypted: row.get(4)?,
    })
  }

  pub fn into_record(self) -> Result<BackupRecord> {
    Ok(BackupRecord {
      id:        decode_uuid(&self.id)?,
      timestamp: decode_dt(&self.timestamp)?,
      file_path: PathBuf::from(self.file_path),
      size:      u64::try_from(self.size).unwrap_or_default(),
      encrypted: self.encrypted,
    })
  }
}

/// Raw strings read directly from a `retention_policy` row.
pub struct RawPolicy {
  pub data_type:      String,
  pub retention_days: i64,
  pub last_cleanup:   Option<String>,
}

impl RawPolicy {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      data_type:      row.get(0)?,
      retention_days: row.get(1)?,
      last_cleanup:   row.get(2)?,
    })
  }

  pub fn into_policy(self) -> Result<RetentionPolicy> {
    Ok(RetentionPolicy {
      data_type:      self.data_type.parse::<DataType>()?,
      retention_days: u32::try_from(self.retention_days).unwrap_or_default(),
      last_cleanup:   self.last_cleanup.as_deref().map(decode_dt).transpose()?,
    })
  }
}

#[cfg(test)]
mod tests {
  use insight_core::AgeGroup;

  use super::*;

  #[test]
  fn profile_row_uses_canonical_tokens() {
    let p = Profile::new("Ada", 14).unwrap();
    let row = ProfileRow::encode(&p).unwrap();
    assert_eq!(row.age_group, "13-18");
    assert_eq!(decode_profile(&row.data).unwrap(), p);
    assert_eq!(decode_profile(&row.data).unwrap().age_group, AgeGroup::Teen);
  }

  #[test]
  fn encoded_timestamps_sort_chronologically() {
    let earlier = decode_dt("2024-01-01T00:00:00.5Z").unwrap();
    let later = decode_dt("2024-01-01T00:00:00.25+00:00").unwrap() + chrono::Duration::seconds(1);
    assert!(encode_dt(earlier) < encode_dt(later));
  }

  #[test]
  fn unknown_data_type_is_rejected() {
    let raw = RawPolicy {
      data_type:      "photos".into(),
      retention_days: 30,
      last_cleanup:   None,
    };
    assert!(matches!(raw.into_policy(), Err(Error::Core(_))));
  }
}
