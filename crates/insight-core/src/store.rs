//! The `RecordStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `insight-store-sqlite`).
//! Higher layers (`insight-vault`, `insight-cli`) depend on this abstraction,
//! not on any concrete backend, and receive the store handle explicitly.

use std::{future::Future, path::Path};

use uuid::Uuid;

use crate::{
  insight::{Insight, TraitCategory},
  profile::Profile,
  records::{
    BackupRecord, DataSummary, DataType, RestoreMode, RestoreReport, RetentionPolicy,
    RetentionReport,
  },
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Default cap on the number of insights returned by a query.
pub const DEFAULT_INSIGHT_LIMIT: usize = 100;

/// Parameters for [`RecordStore::get_insights`]. Filters combine with AND.
#[derive(Debug, Clone)]
pub struct InsightQuery {
  pub user_id:  Option<Uuid>,
  pub category: Option<TraitCategory>,
  pub limit:    usize,
}

impl Default for InsightQuery {
  fn default() -> Self { Self { user_id: None, category: None, limit: DEFAULT_INSIGHT_LIMIT } }
}

impl InsightQuery {
  pub fn for_user(user_id: Uuid) -> Self { Self { user_id: Some(user_id), ..Self::default() } }

  pub fn category(mut self, category: TraitCategory) -> Self {
    self.category = Some(category);
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = limit;
    self
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a durable record store backend.
///
/// Every mutating call commits before it returns. No multi-call transactions
/// are exposed; bulk work that must be all-or-nothing (see
/// [`restore`](Self::restore)) is a single call.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait RecordStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Profiles ──────────────────────────────────────────────────────────

  /// Upsert a profile by id, refreshing `last_updated`. Returns the row as
  /// stored.
  fn save_profile(
    &self,
    profile: Profile,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  /// All profiles ordered by name.
  fn get_profiles(&self) -> impl Future<Output = Result<Vec<Profile>, Self::Error>> + Send + '_;

  /// Retrieve a profile by id. Returns `None` if not found.
  fn get_profile(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  /// Delete a profile together with every insight that references it.
  /// Returns whether a profile row was removed.
  fn delete_profile(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Insights ──────────────────────────────────────────────────────────

  /// Validate and upsert an insight by id. The owning profile must exist.
  fn save_insight(
    &self,
    insight: Insight,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Insights matching `query`, newest first.
  fn get_insights(
    &self,
    query: InsightQuery,
  ) -> impl Future<Output = Result<Vec<Insight>, Self::Error>> + Send + '_;

  fn delete_insight(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Retention ─────────────────────────────────────────────────────────

  /// Delete every record older than its data type's retention window and
  /// stamp `last_cleanup`. Each data type is purged by its own statement.
  fn apply_retention_policy(
    &self,
  ) -> impl Future<Output = Result<RetentionReport, Self::Error>> + Send + '_;

  fn retention_policies(
    &self,
  ) -> impl Future<Output = Result<Vec<RetentionPolicy>, Self::Error>> + Send + '_;

  fn retention_policy(
    &self,
    data_type: DataType,
  ) -> impl Future<Output = Result<Option<RetentionPolicy>, Self::Error>> + Send + '_;

  fn set_retention_days(
    &self,
    data_type: DataType,
    days: u32,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Settings ──────────────────────────────────────────────────────────

  fn set_setting<'a>(
    &'a self,
    key: &'a str,
    value: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Returns `None` when the key has never been set.
  fn get_setting<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;

  // ── Backups & summary ─────────────────────────────────────────────────

  /// Append an entry to the backup log.
  fn log_backup<'a>(
    &'a self,
    path: &'a Path,
    size: u64,
    encrypted: bool,
  ) -> impl Future<Output = Result<BackupRecord, Self::Error>> + Send + 'a;

  /// The backup log, newest first.
  fn get_backup_history(
    &self,
  ) -> impl Future<Output = Result<Vec<BackupRecord>, Self::Error>> + Send + '_;

  fn get_data_summary(
    &self,
  ) -> impl Future<Output = Result<DataSummary, Self::Error>> + Send + '_;

  // ── Bulk & lifecycle ──────────────────────────────────────────────────

  /// Write a batch of profiles and insights atomically, preserving their ids
  /// and timestamps. In [`RestoreMode::Replace`] every existing profile and
  /// insight is removed first, inside the same transaction.
  fn restore(
    &self,
    profiles: Vec<Profile>,
    insights: Vec<Insight>,
    mode: RestoreMode,
  ) -> impl Future<Output = Result<RestoreReport, Self::Error>> + Send + '_;

  /// Release the underlying connection. Later calls fail.
  fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Discard all persisted state and continue with a fresh, empty store.
  /// On failure the previous state remains usable.
  fn reset(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
