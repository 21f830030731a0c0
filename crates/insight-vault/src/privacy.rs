//! Typed view over the privacy entries in the generic settings table.
//!
//! Privacy keys are stored with a `privacy_` prefix, so `encrypt_backups`
//! lives in the row `privacy_encrypt_backups`. Booleans are the strings
//! `"true"` / `"false"`; anything else reads as `false`.

use std::{fmt, str::FromStr, sync::Arc};

use chrono::Duration;
use insight_core::{DataType, RecordStore, records::DEFAULT_RETENTION_DAYS};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{Result, anonymize, error::store_err};

pub const PRIVACY_PREFIX: &str = "privacy_";

/// Un-prefixed settings key holding the scheduled-backup password.
pub const BACKUP_PASSWORD_KEY: &str = "backup_password";

pub const ENCRYPT_BACKUPS: &str = "encrypt_backups";
pub const ANONYMIZE_EXPORTS: &str = "anonymize_exports";
pub const AUTO_BACKUP: &str = "auto_backup";
pub const BACKUP_FREQUENCY: &str = "backup_frequency";

// ─── BackupFrequency ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupFrequency {
  Daily,
  #[default]
  Weekly,
  Monthly,
}

impl BackupFrequency {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Daily => "daily",
      Self::Weekly => "weekly",
      Self::Monthly => "monthly",
    }
  }

  /// Minimum gap between two scheduled backups.
  pub fn interval(self) -> Duration {
    match self {
      Self::Daily => Duration::days(1),
      Self::Weekly => Duration::days(7),
      Self::Monthly => Duration::days(30),
    }
  }
}

impl fmt::Display for BackupFrequency {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown backup frequency: {0:?}")]
pub struct UnknownFrequency(pub String);

impl FromStr for BackupFrequency {
  type Err = UnknownFrequency;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "daily" => Ok(Self::Daily),
      "weekly" => Ok(Self::Weekly),
      "monthly" => Ok(Self::Monthly),
      other => Err(UnknownFrequency(other.to_owned())),
    }
  }
}

// ─── PrivacyStatus ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrivacyStatus {
  pub encrypt_backups:   bool,
  pub anonymize_exports: bool,
  pub auto_backup:       bool,
  pub backup_frequency:  BackupFrequency,
  pub retention_days:    u32,
}

// ─── PrivacySettings ─────────────────────────────────────────────────────────

pub struct PrivacySettings<S> {
  store: Arc<S>,
}

impl<S> Clone for PrivacySettings<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: RecordStore> PrivacySettings<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub async fn set_privacy_setting(&self, key: &str, value: &str) -> Result<()> {
    let key = format!("{PRIVACY_PREFIX}{key}");
    self.store.set_setting(&key, value).await.map_err(store_err)
  }

  pub async fn get_privacy_setting(&self, key: &str) -> Result<Option<String>> {
    let key = format!("{PRIVACY_PREFIX}{key}");
    self.store.get_setting(&key).await.map_err(store_err)
  }

  async fn flag(&self, key: &str) -> Result<bool> {
    Ok(self.get_privacy_setting(key).await?.as_deref() == Some("true"))
  }

  async fn set_flag(&self, key: &str, on: bool) -> Result<()> {
    self.set_privacy_setting(key, if on { "true" } else { "false" }).await
  }

  pub async fn encrypt_backups(&self) -> Result<bool> { self.flag(ENCRYPT_BACKUPS).await }

  pub async fn set_encrypt_backups(&self, on: bool) -> Result<()> {
    self.set_flag(ENCRYPT_BACKUPS, on).await
  }

  pub async fn anonymize_exports(&self) -> Result<bool> { self.flag(ANONYMIZE_EXPORTS).await }

  pub async fn set_anonymize_exports(&self, on: bool) -> Result<()> {
    self.set_flag(ANONYMIZE_EXPORTS, on).await
  }

  pub async fn auto_backup(&self) -> Result<bool> { self.flag(AUTO_BACKUP).await }

  pub async fn set_auto_backup(&self, on: bool) -> Result<()> {
    self.set_flag(AUTO_BACKUP, on).await
  }

  /// Stored cadence; an unrecognised value falls back to the default.
  pub async fn backup_frequency(&self) -> Result<BackupFrequency> {
    let Some(raw) = self.get_privacy_setting(BACKUP_FREQUENCY).await? else {
      return Ok(BackupFrequency::default());
    };
    Ok(raw.parse().unwrap_or_else(|e| {
      warn!(error = %e, "ignoring stored backup frequency");
      BackupFrequency::default()
    }))
  }

  pub async fn set_backup_frequency(&self, frequency: BackupFrequency) -> Result<()> {
    self.set_privacy_setting(BACKUP_FREQUENCY, frequency.as_str()).await
  }

  /// Password used by scheduled backups. Empty counts as unset.
  pub async fn backup_password(&self) -> Result<Option<String>> {
    let stored = self.store.get_setting(BACKUP_PASSWORD_KEY).await.map_err(store_err)?;
    Ok(stored.filter(|p| !p.is_empty()))
  }

  pub async fn set_backup_password(&self, password: &str) -> Result<()> {
    self.store.set_setting(BACKUP_PASSWORD_KEY, password).await.map_err(store_err)
  }

  pub async fn set_retention_period(&self, data_type: DataType, days: u32) -> Result<()> {
    self.store.set_retention_days(data_type, days).await.map_err(store_err)
  }

  pub async fn get_retention_period(&self, data_type: DataType) -> Result<u32> {
    let policy = self.store.retention_policy(data_type).await.map_err(store_err)?;
    Ok(policy.map_or(DEFAULT_RETENTION_DAYS, |p| p.retention_days))
  }

  pub async fn get_privacy_status(&self) -> Result<PrivacyStatus> {
    Ok(PrivacyStatus {
      encrypt_backups:   self.encrypt_backups().await?,
      anonymize_exports: self.anonymize_exports().await?,
      auto_backup:       self.auto_backup().await?,
      backup_frequency:  self.backup_frequency().await?,
      retention_days:    self.get_retention_period(DataType::Insights).await?,
    })
  }

  /// Permanently replace a stored profile's name with its pseudonym.
  /// Returns `false` when no such profile exists.
  pub async fn anonymize_profile(&self, id: Uuid) -> Result<bool> {
    let Some(mut profile) = self.store.get_profile(id).await.map_err(store_err)? else {
      return Ok(false);
    };
    anonymize::anonymize(&mut profile);
    self.store.save_profile(profile).await.map_err(store_err)?;
    info!(%id, "profile anonymized");
    Ok(true)
  }
}
