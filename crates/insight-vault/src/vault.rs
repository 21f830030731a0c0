//! Export, import, scheduled backups and factory reset.

use std::{
  collections::HashSet,
  fmt,
  path::{Path, PathBuf},
  sync::Arc,
};

use chrono::{DateTime, Utc};
use insight_core::{InsightQuery, RecordStore, RestoreMode};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result, anonymize, crypto, error::store_err, privacy::PrivacySettings,
  snapshot::Snapshot,
};

/// Insights exported per profile, newest first.
pub const INSIGHTS_PER_PROFILE: usize = 1000;

const BACKUP_PREFIX: &str = "backup_";
const BACKUP_SUFFIX: &str = ".json";

// ─── Options & outcomes ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
  /// Encrypt when set and non-empty.
  pub password:    Option<String>,
  pub anonymize:   bool,
  /// Restrict the export to these profiles; `None` exports all of them.
  pub profile_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
  pub password: Option<String>,
  /// Upsert on top of existing data instead of replacing it.
  pub merge:    bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
  pub path:      PathBuf,
  pub size:      u64,
  pub encrypted: bool,
  pub profiles:  usize,
  pub insights:  usize,
}

impl fmt::Display for ExportOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.encrypted {
      write!(f, "Encrypted data exported to {}", self.path.display())
    } else {
      write!(f, "Data exported to {}", self.path.display())
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
  pub path:             PathBuf,
  pub profiles:         usize,
  pub insights:         usize,
  /// Profiles deleted beforehand; always 0 when merging.
  pub profiles_removed: usize,
}

impl fmt::Display for ImportOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Imported {} profiles and {} insights from {}",
      self.profiles,
      self.insights,
      self.path.display()
    )
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
  pub count:         usize,
  pub total_size:    u64,
  /// File name of the newest `backup_*.json`.
  pub latest_backup: Option<String>,
  pub backup_dir:    PathBuf,
}

// ─── Vault ───────────────────────────────────────────────────────────────────

/// Moves whole datasets in and out of a [`RecordStore`].
///
/// Export, import, scheduled backup and [`delete_all_data`] hold one async
/// mutex, so at most one of them runs at a time per vault.
///
/// [`delete_all_data`]: Self::delete_all_data
pub struct Vault<S> {
  store:      Arc<S>,
  backup_dir: PathBuf,
  lock:       Mutex<()>,
}

impl<S: RecordStore> Vault<S> {
  pub fn new(store: Arc<S>, backup_dir: impl Into<PathBuf>) -> Self {
    Self { store, backup_dir: backup_dir.into(), lock: Mutex::new(()) }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn backup_dir(&self) -> &Path { &self.backup_dir }

  // ── Export ────────────────────────────────────────────────────────────

  pub async fn export(&self, path: &Path, options: ExportOptions) -> Result<ExportOutcome> {
    let _guard = self.lock.lock().await;
    self.export_locked(path, options).await
  }

  async fn export_locked(&self, path: &Path, options: ExportOptions) -> Result<ExportOutcome> {
    let mut profiles = match &options.profile_ids {
      None => self.store.get_profiles().await.map_err(store_err)?,
      Some(ids) => {
        let mut selected = Vec::with_capacity(ids.len());
        for &id in ids {
          match self.store.get_profile(id).await.map_err(store_err)? {
            Some(profile) => selected.push(profile),
            None => debug!(%id, "skipping unknown profile"),
          }
        }
        selected
      }
    };

    let mut insights = Vec::new();
    for profile in &profiles {
      let query = InsightQuery::for_user(profile.id).limit(INSIGHTS_PER_PROFILE);
      insights.extend(self.store.get_insights(query).await.map_err(store_err)?);
    }

    if options.anonymize {
      profiles.iter_mut().for_each(anonymize::anonymize);
    }

    let (profile_count, insight_count) = (profiles.len(), insights.len());
    let json = Snapshot::new(profiles, insights).to_json()?;

    let password = options.password.filter(|p| !p.is_empty());
    let encrypted = password.is_some();
    let bytes = match password {
      // PBKDF2 is CPU-bound; run it on the blocking pool.
      Some(password) => {
        tokio::task::spawn_blocking(move || crypto::seal(&password, json.as_bytes())).await??
      }
      None => json.into_bytes(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, &bytes).await?;
    let size = tokio::fs::metadata(path).await?.len();

    self.store.log_backup(path, size, encrypted).await.map_err(store_err)?;
    info!(
      path = %path.display(),
      size,
      encrypted,
      profiles = profile_count,
      insights = insight_count,
      "export written"
    );

    Ok(ExportOutcome {
      path: path.to_path_buf(),
      size,
      encrypted,
      profiles: profile_count,
      insights: insight_count,
    })
  }

  // ── Import ────────────────────────────────────────────────────────────

  /// Load a snapshot written by [`export`](Self::export).
  ///
  /// The file is decrypted, parsed and validated in full before the store is
  /// touched; the write itself is one [`RecordStore::restore`] call.
  pub async fn import(&self, path: &Path, options: ImportOptions) -> Result<ImportOutcome> {
    let _guard = self.lock.lock().await;

    let bytes = tokio::fs::read(path).await?;
    let text = match String::from_utf8(bytes) {
      Ok(text) => text,
      // Not UTF-8, so this is an encrypted file.
      Err(e) => {
        let sealed = e.into_bytes();
        let password = options.password.filter(|p| !p.is_empty()).ok_or(Error::PasswordRequired)?;
        let plain =
          tokio::task::spawn_blocking(move || crypto::open(&password, &sealed)).await??;
        String::from_utf8(plain).map_err(|_| Error::Crypto)?
      }
    };

    let snapshot = Snapshot::from_json(&text)?;
    debug!(version = %snapshot.version, exported_at = %snapshot.timestamp, "snapshot parsed");

    let mut owners: HashSet<Uuid> = snapshot.profiles.iter().map(|p| p.id).collect();
    let mode = if options.merge {
      let existing = self.store.get_profiles().await.map_err(store_err)?;
      owners.extend(existing.iter().map(|p| p.id));
      RestoreMode::Merge
    } else {
      RestoreMode::Replace
    };
    snapshot.validate(&owners)?;

    let report = self
      .store
      .restore(snapshot.profiles, snapshot.insights, mode)
      .await
      .map_err(store_err)?;
    info!(
      path = %path.display(),
      ?mode,
      profiles = report.profiles_written,
      insights = report.insights_written,
      removed = report.profiles_removed,
      "import applied"
    );

    Ok(ImportOutcome {
      path:             path.to_path_buf(),
      profiles:         report.profiles_written,
      insights:         report.insights_written,
      profiles_removed: report.profiles_removed,
    })
  }

  // ── Backups ───────────────────────────────────────────────────────────

  /// Export everything to `backup_YYYYmmdd_HHMMSS.json` in the backup
  /// directory, using the stored privacy toggles.
  ///
  /// Settings read:
  ///
  /// - `privacy_encrypt_backups`: `"true"` encrypts the file.
  /// - `backup_password`: the encryption password. This key has no
  ///   `privacy_` prefix. When encryption is on but no password is stored the
  ///   backup is written as plaintext and a warning is logged.
  /// - `privacy_anonymize_exports`: `"true"` replaces names with pseudonyms.
  pub async fn scheduled_backup(&self, privacy: &PrivacySettings<S>) -> Result<ExportOutcome> {
    let _guard = self.lock.lock().await;

    tokio::fs::create_dir_all(&self.backup_dir).await?;
    let name = format!("{BACKUP_PREFIX}{}{BACKUP_SUFFIX}", Utc::now().format("%Y%m%d_%H%M%S"));
    let path = self.backup_dir.join(name);

    let password = match (privacy.encrypt_backups().await?, privacy.backup_password().await?) {
      (true, Some(password)) => Some(password),
      (true, None) => {
        warn!("backup encryption is enabled but no backup password is set; writing plaintext");
        None
      }
      (false, _) => None,
    };
    let anonymize = privacy.anonymize_exports().await?;

    self.export_locked(&path, ExportOptions { password, anonymize, profile_ids: None }).await
  }

  /// Whether automatic backups are on and the last one is at least one
  /// cadence interval old.
  pub async fn backup_due(&self, privacy: &PrivacySettings<S>, now: DateTime<Utc>) -> Result<bool> {
    if !privacy.auto_backup().await? {
      return Ok(false);
    }
    let interval = privacy.backup_frequency().await?.interval();
    let history = self.store.get_backup_history().await.map_err(store_err)?;
    Ok(match history.first() {
      None => true,
      Some(last) => now - last.timestamp >= interval,
    })
  }

  pub async fn backup_info(&self) -> Result<BackupInfo> {
    let backup_dir = std::path::absolute(&self.backup_dir)?;
    let mut info = BackupInfo { count: 0, total_size: 0, latest_backup: None, backup_dir };

    let mut entries = match tokio::fs::read_dir(&self.backup_dir).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(info),
      Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
      let name = entry.file_name().to_string_lossy().into_owned();
      if !(name.starts_with(BACKUP_PREFIX) && name.ends_with(BACKUP_SUFFIX)) {
        continue;
      }
      let metadata = entry.metadata().await?;
      if !metadata.is_file() {
        continue;
      }
      info.count += 1;
      info.total_size += metadata.len();
      // Names embed a sortable timestamp.
      if info.latest_backup.as_ref().is_none_or(|latest| name > *latest) {
        info.latest_backup = Some(name);
      }
    }
    Ok(info)
  }

  // ── Reset ─────────────────────────────────────────────────────────────

  /// Factory reset. Either every record is gone and the store is empty and
  /// usable, or an error is returned and the old data is still there.
  pub async fn delete_all_data(&self) -> Result<()> {
    let _guard = self.lock.lock().await;
    self.store.reset().await.map_err(store_err)?;
    info!("all data deleted");
    Ok(())
  }
}
