//! [`SqliteStore`] — the SQLite implementation of [`RecordStore`].

use std::{
  collections::BTreeMap,
  io,
  path::{Path, PathBuf},
  sync::Arc,
};

use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::OptionalExtension as _;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use insight_core::{
  BackupRecord, DataSummary, DataType, Insight, InsightQuery, Profile, RecordStore,
  RestoreMode, RestoreReport, RetentionPolicy, RetentionReport,
  records::DEFAULT_RETENTION_DAYS, time,
};

use crate::{
  Error, Result,
  encode::{
    InsightRow, ProfileRow, RawBackup, RawPolicy, decode_category, decode_dt,
    decode_insight, decode_profile, encode_dt, encode_uuid, json_err,
  },
  schema::SCHEMA,
};

/// File name used when the caller does not configure one.
pub const DEFAULT_DB_FILE: &str = "child_insight.db";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A record store backed by a single SQLite file.
///
/// Cloning is cheap; clones share one connection. The connection sits behind
/// a lock so [`reset`](RecordStore::reset) can swap in a fresh database while
/// other calls wait.
#[derive(Clone)]
pub struct SqliteStore {
  conn: Arc<RwLock<tokio_rusqlite::Connection>>,
  path: Option<PathBuf>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    let conn = connect(&path).await?;
    debug!(path = %path.display(), "opened record store");
    Ok(Self { conn: Arc::new(RwLock::new(conn)), path: Some(path) })
  }

  /// Open a fresh store that lives only as long as the connection.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = connect_in_memory().await?;
    Ok(Self { conn: Arc::new(RwLock::new(conn)), path: None })
  }

  /// Location of the database file, or `None` for in-memory stores.
  pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

  async fn conn(&self) -> tokio_rusqlite::Connection { self.conn.read().await.clone() }

  async fn delete_expired(&self, data_type: DataType, cutoff: String) -> Result<usize> {
    let deleted = match data_type {
      DataType::Insights => {
        self
          .conn()
          .await
          .call(move |conn| {
            Ok(conn.execute(
              "DELETE FROM insights WHERE timestamp < ?1",
              rusqlite::params![cutoff],
            )?)
          })
          .await?
      }
    };
    Ok(deleted)
  }

  /// Retention pass evaluated at `now`. Rows with a timestamp exactly
  /// `retention_days` before `now` are kept.
  pub(crate) async fn purge_expired(&self, now: DateTime<Utc>) -> Result<RetentionReport> {
    let mut report = RetentionReport { ran_at: Some(now), ..RetentionReport::default() };

    for policy in self.retention_policies().await? {
      let cutoff = TimeDelta::try_days(i64::from(policy.retention_days))
        .and_then(|window| now.checked_sub_signed(window));
      let deleted = match cutoff {
        Some(cutoff) => {
          let deleted = self.delete_expired(policy.data_type, encode_dt(cutoff)).await?;
          if deleted > 0 {
            info!(data_type = %policy.data_type, deleted, %cutoff, "retention purge");
          }
          deleted
        }
        // The window reaches past the earliest representable instant.
        None => {
          debug!(
            data_type = %policy.data_type,
            retention_days = policy.retention_days,
            "retention window unbounded; nothing expires"
          );
          0
        }
      };

      let stamp = encode_dt(now);
      let data_type = policy.data_type.as_str();
      self
        .conn()
        .await
        .call(move |conn| {
          conn.execute(
            "UPDATE retention_policy SET last_cleanup = ?1 WHERE data_type = ?2",
            rusqlite::params![stamp, data_type],
          )?;
          Ok(())
        })
        .await?;

      report.deleted.insert(policy.data_type, deleted);
    }

    Ok(report)
  }

  async fn storage_size(&self) -> u64 {
    let Some(path) = &self.path else { return 0 };
    let mut total = 0;
    for file in [path.clone(), sidecar(path, "-wal")] {
      if let Ok(meta) = tokio::fs::metadata(&file).await {
        total += meta.len();
      }
    }
    total
  }
}

async fn init_schema(conn: &tokio_rusqlite::Connection) -> Result<()> {
  conn
    .call(|conn| {
      conn.execute_batch(SCHEMA)?;
      Ok(())
    })
    .await?;
  Ok(())
}

async fn connect(path: &Path) -> Result<tokio_rusqlite::Connection> {
  let conn = tokio_rusqlite::Connection::open(path).await?;
  init_schema(&conn).await?;
  Ok(conn)
}

async fn connect_in_memory() -> Result<tokio_rusqlite::Connection> {
  let conn = tokio_rusqlite::Connection::open_in_memory().await?;
  init_schema(&conn).await?;
  Ok(conn)
}

/// `foo.db` → `foo.db<suffix>`, the naming SQLite uses for WAL sidecars.
fn sidecar(path: &Path, suffix: &str) -> PathBuf {
  let mut s = path.as_os_str().to_owned();
  s.push(suffix);
  PathBuf::from(s)
}

async fn remove_if_exists(path: &Path) -> io::Result<()> {
  match tokio::fs::remove_file(path).await {
    Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
    _ => Ok(()),
  }
}

async fn remove_db_files(path: &Path) -> io::Result<()> {
  remove_if_exists(&sidecar(path, "-wal")).await?;
  remove_if_exists(&sidecar(path, "-shm")).await?;
  remove_if_exists(path).await
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  type Error = Error;

  // ── Profiles ──────────────────────────────────────────────────────────────

  async fn save_profile(&self, mut profile: Profile) -> Result<Profile> {
    profile.last_updated = time::now().max(profile.last_updated);
    let id_str = encode_uuid(profile.id);

    let stored = self
      .conn()
      .await
      .call(move |conn| {
        let tx = conn.transaction()?;
        // created_at is immutable once the row exists.
        let existing: Option<String> = tx
          .query_row(
            "SELECT created_at FROM profiles WHERE id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        if let Some(created_at) = existing.as_deref().and_then(time::parse_timestamp) {
          profile.created_at = created_at;
        }
        ProfileRow::encode(&profile).map_err(json_err)?.upsert(&tx)?;
        tx.commit()?;
        Ok(profile)
      })
      .await?;

    Ok(stored)
  }

  async fn get_profiles(&self) -> Result<Vec<Profile>> {
    let rows: Vec<String> = self
      .conn()
      .await
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT data FROM profiles ORDER BY name")?;
        let rows = stmt
          .query_map([], |row| row.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows.iter().map(|data| decode_profile(data)).collect()
  }

  async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
    let id_str = encode_uuid(id);

    let row: Option<String> = self
      .conn()
      .await
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT data FROM profiles WHERE id = ?1",
              rusqlite::params![id_str],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    row.as_deref().map(decode_profile).transpose()
  }

  async fn delete_profile(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let (insights, profiles) = self
      .conn()
      .await
      .call(move |conn| {
        let tx = conn.transaction()?;
        let insights = tx.execute(
          "DELETE FROM insights WHERE user_id = ?1",
          rusqlite::params![id_str],
        )?;
        let profiles =
          tx.execute("DELETE FROM profiles WHERE id = ?1", rusqlite::params![id_str])?;
        tx.commit()?;
        Ok((insights, profiles))
      })
      .await?;

    debug!(%id, insights, "deleted profile");
    Ok(profiles > 0)
  }

  // ── Insights ──────────────────────────────────────────────────────────────

  async fn save_insight(&self, insight: Insight) -> Result<()> {
    insight.validate()?;
    let owner = insight.user_id;
    let row = InsightRow::encode(&insight)?;

    let saved = self
      .conn()
      .await
      .call(move |conn| {
        let tx = conn.transaction()?;
        let owner_exists = tx
          .query_row(
            "SELECT 1 FROM profiles WHERE id = ?1",
            rusqlite::params![row.user_id],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !owner_exists {
          return Ok(false);
        }
        row.upsert(&tx)?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !saved {
      return Err(Error::ProfileNotFound(owner));
    }
    Ok(())
  }

  async fn get_insights(&self, query: InsightQuery) -> Result<Vec<Insight>> {
    let user_id = query.user_id.map(encode_uuid);
    let category = query.category.map(|c| c.as_str());
    let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);

    let rows: Vec<String> = self
      .conn()
      .await
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT data FROM insights
           WHERE (?1 IS NULL OR user_id = ?1)
             AND (?2 IS NULL OR category = ?2)
           ORDER BY timestamp DESC
           LIMIT ?3",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_id, category, limit], |row| {
            row.get::<_, String>(0)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows.iter().map(|data| decode_insight(data)).collect()
  }

  async fn delete_insight(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let removed = self
      .conn()
      .await
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM insights WHERE id = ?1", rusqlite::params![id_str])?)
      })
      .await?;

    Ok(removed > 0)
  }

  // ── Retention ─────────────────────────────────────────────────────────────

  async fn apply_retention_policy(&self) -> Result<RetentionReport> {
    self.purge_expired(time::now()).await
  }

  async fn retention_policies(&self) -> Result<Vec<RetentionPolicy>> {
    let raws: Vec<RawPolicy> = self
      .conn()
      .await
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT data_type, retention_days, last_cleanup
           FROM retention_policy ORDER BY data_type",
        )?;
        let rows = stmt
          .query_map([], RawPolicy::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut policies = Vec::with_capacity(raws.len());
    for raw in raws {
      let data_type = raw.data_type.clone();
      match raw.into_policy() {
        Ok(policy) => policies.push(policy),
        Err(Error::Core(e)) => warn!(%data_type, error = %e, "skipping retention policy"),
        Err(e) => return Err(e),
      }
    }
    Ok(policies)
  }

  async fn retention_policy(&self, data_type: DataType) -> Result<Option<RetentionPolicy>> {
    let key = data_type.as_str();

    let raw: Option<RawPolicy> = self
      .conn()
      .await
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT data_type, retention_days, last_cleanup
               FROM retention_policy WHERE data_type = ?1",
              rusqlite::params![key],
              RawPolicy::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPolicy::into_policy).transpose()
  }

  async fn set_retention_days(&self, data_type: DataType, days: u32) -> Result<()> {
    let key = data_type.as_str();

    self
      .conn()
      .await
      .call(move |conn| {
        conn.execute(
          "INSERT INTO retention_policy (data_type, retention_days) VALUES (?1, ?2)
           ON CONFLICT(data_type) DO UPDATE SET retention_days = excluded.retention_days",
          rusqlite::params![key, days],
        )?;
        Ok(())
      })
      .await?;

    info!(%data_type, days, "retention window updated");
    Ok(())
  }

  // ── Settings ──────────────────────────────────────────────────────────────

  async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
    let key = key.to_owned();
    let value = value.to_owned();

    self
      .conn()
      .await
      .call(move |conn| {
        conn.execute(
          "INSERT INTO settings (key, value) VALUES (?1, ?2)
           ON CONFLICT(key) DO UPDATE SET value = excluded.value",
          rusqlite::params![key, value],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_setting(&self, key: &str) -> Result<Option<String>> {
    let key = key.to_owned();

    let value = self
      .conn()
      .await
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT value FROM settings WHERE key = ?1",
              rusqlite::params![key],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(value)
  }

  // ── Backups & summary ─────────────────────────────────────────────────────

  async fn log_backup(&self, path: &Path, size: u64, encrypted: bool) -> Result<BackupRecord> {
    let record = BackupRecord {
      id: Uuid::new_v4(),
      timestamp: time::now(),
      file_path: path.to_path_buf(),
      size,
      encrypted,
    };

    let id_str = encode_uuid(record.id);
    let at_str = encode_dt(record.timestamp);
    let path_str = path.to_string_lossy().into_owned();
    let size_val = i64::try_from(size).unwrap_or(i64::MAX);

    self
      .conn()
      .await
      .call(move |conn| {
        conn.execute(
          "INSERT INTO backups (id, timestamp, file_path, size, encrypted)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, at_str, path_str, size_val, encrypted],
        )?;
        Ok(())
      })
      .await?;

    Ok(record)
  }

  async fn get_backup_history(&self) -> Result<Vec<BackupRecord>> {
    let raws: Vec<RawBackup> = self
      .conn()
      .await
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT id, timestamp, file_path, size, encrypted
           FROM backups ORDER BY timestamp DESC",
        )?;
        let rows = stmt
          .query_map([], RawBackup::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBackup::into_record).collect()
  }

  async fn get_data_summary(&self) -> Result<DataSummary> {
    let (profiles, insights, by_category, oldest, retention) = self
      .conn()
      .await
      .call(|conn| {
        let profiles: i64 =
          conn.query_row("SELECT COUNT(*) FROM profiles", [], |r| r.get(0))?;
        let insights: i64 =
          conn.query_row("SELECT COUNT(*) FROM insights", [], |r| r.get(0))?;

        let mut stmt =
          conn.prepare("SELECT category, COUNT(*) FROM insights GROUP BY category")?;
        let by_category = stmt
          .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let oldest: Option<String> =
          conn.query_row("SELECT MIN(timestamp) FROM insights", [], |r| r.get(0))?;
        let retention: Option<i64> = conn
          .query_row(
            "SELECT retention_days FROM retention_policy WHERE data_type = 'insights'",
            [],
            |r| r.get(0),
          )
          .optional()?;

        Ok((profiles, insights, by_category, oldest, retention))
      })
      .await?;

    let mut insights_by_category = BTreeMap::new();
    for (token, count) in by_category {
      insights_by_category.insert(decode_category(&token)?, usize::try_from(count).unwrap_or(0));
    }

    Ok(DataSummary {
      profiles_count: usize::try_from(profiles).unwrap_or(0),
      insights_count: usize::try_from(insights).unwrap_or(0),
      insights_by_category,
      oldest_data: oldest.as_deref().map(decode_dt).transpose()?.unwrap_or_else(time::now),
      storage_size: self.storage_size().await,
      retention_days: retention
        .and_then(|d| u32::try_from(d).ok())
        .unwrap_or(DEFAULT_RETENTION_DAYS),
    })
  }

  // ── Bulk & lifecycle ──────────────────────────────────────────────────────

  async fn restore(
    &self,
    profiles: Vec<Profile>,
    insights: Vec<Insight>,
    mode: RestoreMode,
  ) -> Result<RestoreReport> {
    for insight in &insights {
      insight.validate()?;
    }
    let profile_rows = profiles
      .iter()
      .map(ProfileRow::encode)
      .collect::<serde_json::Result<Vec<_>>>()?;
    let insight_rows = insights
      .iter()
      .map(InsightRow::encode)
      .collect::<serde_json::Result<Vec<_>>>()?;

    let report = self
      .conn()
      .await
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut report = RestoreReport::default();

        if mode == RestoreMode::Replace {
          tx.execute("DELETE FROM insights", [])?;
          report.profiles_removed = tx.execute("DELETE FROM profiles", [])?;
        }
        for row in &profile_rows {
          row.upsert(&tx)?;
          report.profiles_written += 1;
        }
        for row in &insight_rows {
          row.upsert(&tx)?;
          report.insights_written += 1;
        }

        tx.commit()?;
        Ok(report)
      })
      .await?;

    info!(
      ?mode,
      removed = report.profiles_removed,
      profiles = report.profiles_written,
      insights = report.insights_written,
      "restored records"
    );
    Ok(report)
  }

  async fn close(&self) -> Result<()> {
    self.conn().await.close().await?;
    debug!("record store closed");
    Ok(())
  }

  async fn reset(&self) -> Result<()> {
    let mut guard = self.conn.write().await;

    let Some(path) = self.path.clone() else {
      let fresh = connect_in_memory().await?;
      let old = std::mem::replace(&mut *guard, fresh);
      if let Err(e) = old.close().await {
        warn!(error = %e, "closing discarded in-memory store failed");
      }
      info!("in-memory store reset");
      return Ok(());
    };

    // Build the empty database beside the live one first, so a failure here
    // leaves the current connection untouched.
    let staging = sidecar(&path, ".fresh");
    remove_db_files(&staging).await?;
    let built = async {
      connect(&staging).await?.close().await?;
      remove_if_exists(&sidecar(&staging, "-wal")).await?;
      remove_if_exists(&sidecar(&staging, "-shm")).await?;
      Ok::<_, Error>(())
    }
    .await;
    if let Err(e) = built {
      let _ = remove_db_files(&staging).await;
      return Err(e);
    }

    if let Err(e) = (*guard).clone().close().await {
      let _ = remove_db_files(&staging).await;
      return Err(e.into());
    }

    let swapped = async {
      remove_if_exists(&sidecar(&path, "-wal")).await?;
      remove_if_exists(&sidecar(&path, "-shm")).await?;
      tokio::fs::rename(&staging, &path).await
    }
    .await;
    if let Err(e) = swapped {
      warn!(path = %path.display(), error = %e, "could not replace database, reopening");
      *guard = connect(&path).await?;
      let _ = remove_db_files(&staging).await;
      return Err(e.into());
    }

    *guard = connect(&path).await?;
    info!(path = %path.display(), "record store reset");
    Ok(())
  }
}
