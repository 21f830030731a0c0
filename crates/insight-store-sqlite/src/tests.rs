//! Integration tests for `SqliteStore` against in-memory and on-disk databases.

use std::{collections::BTreeMap, path::Path};

use chrono::Duration;
use insight_core::{
  AgeGroup, DataType, Insight, InsightQuery, Profile, RecordStore, RestoreMode,
  TraitCategory, time,
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn traits(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
  pairs.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect()
}

fn insight_for(user_id: Uuid, category: TraitCategory) -> Insight {
  Insight::new(user_id, category, traits(&[("adaptability", 0.7)]), 0.9).unwrap()
}

fn aged_insight(user_id: Uuid, days_ago: i64) -> Insight {
  let mut i = insight_for(user_id, TraitCategory::Temperament);
  i.timestamp = time::now() - Duration::days(days_ago);
  i
}

// ─── Profiles ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn save_and_get_profile() {
  let s = store().await;
  let emma = Profile::new("Emma", 4).unwrap();

  let stored = s.save_profile(emma.clone()).await.unwrap();
  assert!(stored.last_updated >= emma.last_updated);

  let fetched = s.get_profile(emma.id).await.unwrap().unwrap();
  assert_eq!(fetched, stored);
  assert_eq!(fetched.age_group, AgeGroup::Toddler);
  assert_eq!(fetched.created_at, emma.created_at);
}

#[tokio::test]
async fn get_profile_missing_returns_none() {
  let s = store().await;
  assert!(s.get_profile(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn save_profile_is_an_upsert() {
  let s = store().await;
  let mut p = s.save_profile(Profile::new("Noah", 8).unwrap()).await.unwrap();
  let first_update = p.last_updated;

  p.name = "Noah B.".into();
  let updated = s.save_profile(p.clone()).await.unwrap();

  let all = s.get_profiles().await.unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].name, "Noah B.");
  assert!(updated.last_updated >= first_update);
}

#[tokio::test]
async fn save_profile_keeps_original_created_at() {
  let s = store().await;
  let p = s.save_profile(Profile::new("Mia", 10).unwrap()).await.unwrap();

  let mut tampered = p.clone();
  tampered.created_at = p.created_at + Duration::days(3);
  let stored = s.save_profile(tampered).await.unwrap();

  assert_eq!(stored.created_at, p.created_at);
  let fetched = s.get_profile(p.id).await.unwrap().unwrap();
  assert_eq!(fetched.created_at, p.created_at);
}

#[tokio::test]
async fn get_profiles_ordered_by_name() {
  let s = store().await;
  for (name, age) in [("Zoe", 3), ("Ava", 12), ("Liam", 15)] {
    s.save_profile(Profile::new(name, age).unwrap()).await.unwrap();
  }

  let names: Vec<_> = s
    .get_profiles()
    .await
    .unwrap()
    .into_iter()
    .map(|p| p.name)
    .collect();
  assert_eq!(names, ["Ava", "Liam", "Zoe"]);
}

#[tokio::test]
async fn delete_profile_cascades_to_insights() {
  let s = store().await;
  let keep = s.save_profile(Profile::new("Keep", 6).unwrap()).await.unwrap();
  let gone = s.save_profile(Profile::new("Gone", 7).unwrap()).await.unwrap();
  s.save_insight(insight_for(keep.id, TraitCategory::BigFive)).await.unwrap();
  let doomed = insight_for(gone.id, TraitCategory::Eq);
  s.save_insight(doomed.clone()).await.unwrap();

  assert!(s.delete_profile(gone.id).await.unwrap());
  assert!(s.get_profile(gone.id).await.unwrap().is_none());
  assert!(s.get_insights(InsightQuery::for_user(gone.id)).await.unwrap().is_empty());
  assert!(!s.delete_insight(doomed.id).await.unwrap());

  assert_eq!(s.get_insights(InsightQuery::default()).await.unwrap().len(), 1);
  assert!(!s.delete_profile(gone.id).await.unwrap());
}

// ─── Insights ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn emma_scenario() {
  let s = store().await;
  let emma = s.save_profile(Profile::new("Emma", 4).unwrap()).await.unwrap();
  assert_eq!(emma.age_group, AgeGroup::Toddler);

  s.save_insight(insight_for(emma.id, TraitCategory::Temperament)).await.unwrap();

  let found = s.get_insights(InsightQuery::for_user(emma.id)).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].traits["adaptability"], 0.7);
  assert_eq!(found[0].category, TraitCategory::Temperament);
}

#[tokio::test]
async fn insight_round_trips_context() {
  let s = store().await;
  let p = s.save_profile(Profile::new("Ella", 9).unwrap()).await.unwrap();
  let insight = insight_for(p.id, TraitCategory::MultipleIntelligence)
    .with_context("source", serde_json::json!("track_behavior"))
    .with_context("observer", serde_json::json!({"role": "parent"}));

  s.save_insight(insight.clone()).await.unwrap();
  let found = s.get_insights(InsightQuery::for_user(p.id)).await.unwrap();
  assert_eq!(found, vec![insight]);
}

#[tokio::test]
async fn save_insight_requires_existing_profile() {
  let s = store().await;
  let orphan = insight_for(Uuid::new_v4(), TraitCategory::Temperament);

  let err = s.save_insight(orphan.clone()).await.unwrap_err();
  assert!(matches!(err, Error::ProfileNotFound(id) if id == orphan.user_id));
  assert!(s.get_insights(InsightQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn save_insight_rejects_out_of_range_scores() {
  let s = store().await;
  let p = s.save_profile(Profile::new("Ivy", 5).unwrap()).await.unwrap();
  let mut bad = insight_for(p.id, TraitCategory::BigFive);
  bad.traits.insert("openness".into(), 1.5);

  let err = s.save_insight(bad).await.unwrap_err();
  assert!(matches!(err, Error::Core(insight_core::Error::ScoreOutOfRange { .. })));
}

#[tokio::test]
async fn save_insight_overwrites_by_id() {
  let s = store().await;
  let p = s.save_profile(Profile::new("Ben", 11).unwrap()).await.unwrap();
  let mut i = insight_for(p.id, TraitCategory::Temperament);
  s.save_insight(i.clone()).await.unwrap();

  i.traits.insert("adaptability".into(), 0.2);
  s.save_insight(i.clone()).await.unwrap();

  let found = s.get_insights(InsightQuery::for_user(p.id)).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].traits["adaptability"], 0.2);
}

#[tokio::test]
async fn get_insights_filters_orders_and_limits() {
  let s = store().await;
  let a = s.save_profile(Profile::new("A", 4).unwrap()).await.unwrap();
  let b = s.save_profile(Profile::new("B", 14).unwrap()).await.unwrap();

  for days_ago in [5, 1, 3] {
    let mut i = aged_insight(a.id, days_ago);
    i.category = TraitCategory::BigFive;
    s.save_insight(i).await.unwrap();
  }
  s.save_insight(aged_insight(a.id, 2)).await.unwrap();
  s.save_insight(aged_insight(b.id, 0)).await.unwrap();

  let a_big_five = s
    .get_insights(InsightQuery::for_user(a.id).category(TraitCategory::BigFive))
    .await
    .unwrap();
  assert_eq!(a_big_five.len(), 3);
  assert!(a_big_five.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

  let temperament = s
    .get_insights(InsightQuery::default().category(TraitCategory::Temperament))
    .await
    .unwrap();
  assert_eq!(temperament.len(), 2);

  let newest = s.get_insights(InsightQuery::default().limit(2)).await.unwrap();
  assert_eq!(newest.len(), 2);
  assert_eq!(newest[0].user_id, b.id);
}

// ─── Retention ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn retention_deletes_only_expired_insights() {
  let s = store().await;
  s.set_retention_days(DataType::Insights, 30).await.unwrap();
  let p = s.save_profile(Profile::new("Ruby", 6).unwrap()).await.unwrap();
  let old = aged_insight(p.id, 40);
  let recent = aged_insight(p.id, 10);
  s.save_insight(old.clone()).await.unwrap();
  s.save_insight(recent.clone()).await.unwrap();

  let report = s.apply_retention_policy().await.unwrap();
  assert_eq!(report.total_deleted(), 1);
  assert_eq!(report.deleted[&DataType::Insights], 1);

  let left = s.get_insights(InsightQuery::default()).await.unwrap();
  assert_eq!(left, vec![recent]);

  let again = s.apply_retention_policy().await.unwrap();
  assert_eq!(again.total_deleted(), 0);
}

#[tokio::test]
async fn retention_keeps_insight_exactly_at_cutoff() {
  let s = store().await;
  s.set_retention_days(DataType::Insights, 30).await.unwrap();
  let p = s.save_profile(Profile::new("Iris", 5).unwrap()).await.unwrap();

  let now = time::now();
  let cutoff = now - Duration::days(30);
  let mut at_cutoff = insight_for(p.id, TraitCategory::Temperament);
  at_cutoff.timestamp = cutoff;
  let mut just_before = insight_for(p.id, TraitCategory::Temperament);
  just_before.timestamp = cutoff - Duration::microseconds(1);
  s.save_insight(at_cutoff.clone()).await.unwrap();
  s.save_insight(just_before.clone()).await.unwrap();

  let report = s.purge_expired(now).await.unwrap();
  assert_eq!(report.total_deleted(), 1);

  let left = s.get_insights(InsightQuery::default()).await.unwrap();
  assert_eq!(left, vec![at_cutoff]);
}

#[tokio::test]
async fn retention_with_huge_window_deletes_nothing() {
  let s = store().await;
  s.set_retention_days(DataType::Insights, 100_000_000).await.unwrap();
  let p = s.save_profile(Profile::new("Otto", 7).unwrap()).await.unwrap();
  let old = aged_insight(p.id, 400);
  s.save_insight(old.clone()).await.unwrap();

  let report = s.apply_retention_policy().await.unwrap();
  assert_eq!(report.total_deleted(), 0);
  assert_eq!(report.deleted[&DataType::Insights], 0);
  assert_eq!(s.get_insights(InsightQuery::default()).await.unwrap(), vec![old]);

  let policy = s.retention_policy(DataType::Insights).await.unwrap().unwrap();
  assert_eq!(policy.retention_days, 100_000_000);
  assert_eq!(policy.last_cleanup, report.ran_at);

  s.set_retention_days(DataType::Insights, u32::MAX).await.unwrap();
  assert_eq!(s.apply_retention_policy().await.unwrap().total_deleted(), 0);
}

#[tokio::test]
async fn retention_stamps_last_cleanup() {
  let s = store().await;
  let before = s.retention_policy(DataType::Insights).await.unwrap().unwrap();
  assert_eq!(before.retention_days, 365);
  assert!(before.last_cleanup.is_none());

  let report = s.apply_retention_policy().await.unwrap();
  let after = s.retention_policy(DataType::Insights).await.unwrap().unwrap();
  assert_eq!(after.last_cleanup, report.ran_at);
}

#[tokio::test]
async fn one_policy_row_per_data_type() {
  let s = store().await;
  s.set_retention_days(DataType::Insights, 90).await.unwrap();
  s.set_retention_days(DataType::Insights, 60).await.unwrap();

  let policies = s.retention_policies().await.unwrap();
  assert_eq!(policies.len(), 1);
  assert_eq!(policies[0].retention_days, 60);
}

// ─── Settings, backups, summary ──────────────────────────────────────────────

#[tokio::test]
async fn settings_round_trip() {
  let s = store().await;
  assert_eq!(s.get_setting("theme").await.unwrap(), None);

  s.set_setting("theme", "dark").await.unwrap();
  s.set_setting("theme", "light").await.unwrap();
  assert_eq!(s.get_setting("theme").await.unwrap().as_deref(), Some("light"));
}

#[tokio::test]
async fn backup_history_is_newest_first() {
  let s = store().await;
  let first = s.log_backup(Path::new("a.json"), 10, false).await.unwrap();
  let second = s.log_backup(Path::new("b.json"), 20, true).await.unwrap();

  let history = s.get_backup_history().await.unwrap();
  assert_eq!(history.len(), 2);
  assert!(history[0].timestamp >= history[1].timestamp);
  assert!(history.contains(&first));
  assert!(history.contains(&second));
}

#[tokio::test]
async fn data_summary_counts() {
  let s = store().await;
  let empty = s.get_data_summary().await.unwrap();
  assert_eq!(empty.profiles_count, 0);
  assert_eq!(empty.insights_count, 0);
  assert_eq!(empty.retention_days, 365);
  assert_eq!(empty.storage_size, 0);

  let p = s.save_profile(Profile::new("Theo", 13).unwrap()).await.unwrap();
  let oldest = aged_insight(p.id, 20);
  s.save_insight(oldest.clone()).await.unwrap();
  s.save_insight(insight_for(p.id, TraitCategory::Temperament)).await.unwrap();
  s.save_insight(insight_for(p.id, TraitCategory::Eq)).await.unwrap();

  let summary = s.get_data_summary().await.unwrap();
  assert_eq!(summary.profiles_count, 1);
  assert_eq!(summary.insights_count, 3);
  assert_eq!(summary.insights_by_category[&TraitCategory::Temperament], 2);
  assert_eq!(summary.insights_by_category[&TraitCategory::Eq], 1);
  assert_eq!(summary.oldest_data, oldest.timestamp);
}

// ─── Restore ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn restore_replace_clears_existing_records() {
  let s = store().await;
  let old = s.save_profile(Profile::new("Old", 9).unwrap()).await.unwrap();
  s.save_insight(insight_for(old.id, TraitCategory::Temperament)).await.unwrap();

  let incoming = Profile::new("New", 3).unwrap();
  let incoming_insight = insight_for(incoming.id, TraitCategory::Eq);
  let report = s
    .restore(vec![incoming.clone()], vec![incoming_insight.clone()], RestoreMode::Replace)
    .await
    .unwrap();

  assert_eq!(report.profiles_removed, 1);
  assert_eq!(s.get_profiles().await.unwrap(), vec![incoming]);
  assert_eq!(s.get_insights(InsightQuery::default()).await.unwrap(), vec![incoming_insight]);
}

#[tokio::test]
async fn restore_is_all_or_nothing() {
  let s = store().await;
  let existing = s.save_profile(Profile::new("Stay", 9).unwrap()).await.unwrap();

  let incoming = Profile::new("Half", 3).unwrap();
  let orphan = insight_for(Uuid::new_v4(), TraitCategory::Eq);
  let result = s.restore(vec![incoming.clone()], vec![orphan], RestoreMode::Replace).await;

  assert!(result.is_err());
  assert_eq!(s.get_profiles().await.unwrap(), vec![existing]);
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn closed_store_reports_closed() {
  let s = store().await;
  s.close().await.unwrap();

  assert!(matches!(s.get_profiles().await, Err(Error::Closed)));
  assert!(matches!(s.set_setting("k", "v").await, Err(Error::Closed)));
}

#[tokio::test]
async fn reset_on_disk_leaves_empty_usable_store() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("child_insight.db");
  let s = SqliteStore::open(&path).await.unwrap();

  let p = s.save_profile(Profile::new("Gone", 5).unwrap()).await.unwrap();
  s.save_insight(insight_for(p.id, TraitCategory::Temperament)).await.unwrap();
  s.set_setting("theme", "dark").await.unwrap();

  s.reset().await.unwrap();

  assert!(s.get_profiles().await.unwrap().is_empty());
  assert_eq!(s.get_setting("theme").await.unwrap(), None);
  assert!(path.exists());
  assert!(!dir.path().join("child_insight.db.fresh").exists());

  let again = s.save_profile(Profile::new("Fresh", 6).unwrap()).await.unwrap();
  assert_eq!(s.get_profiles().await.unwrap(), vec![again]);
}

#[tokio::test]
async fn reset_in_memory() {
  let s = store().await;
  s.save_profile(Profile::new("Temp", 2).unwrap()).await.unwrap();
  s.reset().await.unwrap();
  assert!(s.get_profiles().await.unwrap().is_empty());
}

#[tokio::test]
async fn data_survives_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("child_insight.db");

  let p = {
    let s = SqliteStore::open(&path).await.unwrap();
    let p = s.save_profile(Profile::new("Persist", 16).unwrap()).await.unwrap();
    s.close().await.unwrap();
    p
  };

  let s = SqliteStore::open(&path).await.unwrap();
  assert_eq!(s.get_profile(p.id).await.unwrap(), Some(p));
  assert!(s.get_data_summary().await.unwrap().storage_size > 0);
}
