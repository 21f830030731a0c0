//! Command handlers. Each one prints a short human-readable result.

use std::sync::Arc;

use anyhow::{Context as _, bail};
use chrono::{DateTime, Utc};
use insight_core::{DataType, Insight, InsightQuery, Profile, RecordStore, time};
use insight_store_sqlite::SqliteStore;
use insight_vault::{
  BackupFrequency, ExportOptions, ImportOptions, PrivacySettings, RetentionEngine, Trigger,
  Vault,
};

use crate::{Command, InsightCmd, PrivacyCmd, PrivacyKey, ProfileCmd, RetentionCmd, SettingCmd};

/// Everything a command needs, built once in `main`.
pub struct Context {
  pub store:     Arc<SqliteStore>,
  pub vault:     Vault<SqliteStore>,
  pub privacy:   PrivacySettings<SqliteStore>,
  pub retention: RetentionEngine<SqliteStore>,
}

pub async fn run(ctx: &Context, command: Command) -> anyhow::Result<()> {
  match command {
    Command::Profile(cmd) => profile(ctx, cmd).await,
    Command::Insight(cmd) => insight(ctx, cmd).await,
    Command::Setting(cmd) => setting(ctx, cmd).await,
    Command::Privacy(cmd) => privacy(ctx, cmd).await,
    Command::Retention(cmd) => retention(ctx, cmd).await,
    Command::Export { path, password, anonymize, profile_ids } => {
      let profile_ids = (!profile_ids.is_empty()).then_some(profile_ids);
      let outcome = ctx
        .vault
        .export(&path, ExportOptions { password, anonymize, profile_ids })
        .await
        .context("export failed")?;
      println!("{outcome} ({} profiles, {} insights)", outcome.profiles, outcome.insights);
      Ok(())
    }
    Command::Import { path, password, merge } => {
      let outcome = ctx
        .vault
        .import(&path, ImportOptions { password, merge })
        .await
        .context("import failed")?;
      println!("{outcome}");
      Ok(())
    }
    Command::Backup { if_due } => {
      if if_due && !ctx.vault.backup_due(&ctx.privacy, time::now()).await? {
        println!("No backup due");
        return Ok(());
      }
      let outcome = ctx.vault.scheduled_backup(&ctx.privacy).await.context("backup failed")?;
      println!("{outcome}");
      Ok(())
    }
    Command::History => {
      let history = ctx.store.get_backup_history().await?;
      if history.is_empty() {
        println!("No backups recorded");
      }
      for record in history {
        println!(
          "{}  {:>10} B  {:<9}  {}",
          fmt_dt(record.timestamp),
          record.size,
          if record.encrypted { "encrypted" } else { "plain" },
          record.file_path.display()
        );
      }
      Ok(())
    }
    Command::Summary => {
      let summary = ctx.store.get_data_summary().await?;
      println!("Profiles:       {}", summary.profiles_count);
      println!("Insights:       {}", summary.insights_count);
      for (category, count) in &summary.insights_by_category {
        println!("  {category:<24}{count}");
      }
      println!("Oldest data:    {}", fmt_dt(summary.oldest_data));
      println!("Storage size:   {} B", summary.storage_size);
      println!("Retention:      {} days", summary.retention_days);
      Ok(())
    }
    Command::BackupInfo => {
      let info = ctx.vault.backup_info().await?;
      println!("Directory:      {}", info.backup_dir.display());
      println!("Backups:        {}", info.count);
      println!("Total size:     {} B", info.total_size);
      println!("Latest:         {}", info.latest_backup.as_deref().unwrap_or("-"));
      Ok(())
    }
    Command::Reset { yes } => {
      if !yes {
        bail!("refusing to delete all data without --yes");
      }
      ctx.vault.delete_all_data().await.context("reset failed")?;
      println!("All data deleted");
      Ok(())
    }
  }
}

// ─── Profiles ─────────────────────────────────────────────────────────────────

async fn profile(ctx: &Context, cmd: ProfileCmd) -> anyhow::Result<()> {
  match cmd {
    ProfileCmd::Add { name, age, pic } => {
      let mut profile = Profile::new(name, age)?;
      if let Some(pic) = pic {
        profile.profile_pic = pic;
      }
      let stored = ctx.store.save_profile(profile).await?;
      println!("{}  {}", stored.id, stored.display_name());
    }
    ProfileCmd::List => {
      for p in ctx.store.get_profiles().await? {
        println!("{}  {:<24} {:>3}  {}", p.id, p.name, p.age, p.age_group);
      }
    }
    ProfileCmd::Show { id } => {
      let Some(p) = ctx.store.get_profile(id).await? else {
        bail!("no profile with id {id}");
      };
      println!("{}", serde_json::to_string_pretty(&p)?);
    }
    ProfileCmd::Delete { id } => {
      if ctx.store.delete_profile(id).await? {
        println!("Deleted profile {id}");
      } else {
        bail!("no profile with id {id}");
      }
    }
  }
  Ok(())
}

// ─── Insights ─────────────────────────────────────────────────────────────────

async fn insight(ctx: &Context, cmd: InsightCmd) -> anyhow::Result<()> {
  match cmd {
    InsightCmd::Add { profile, category, traits, confidence, context } => {
      let traits = traits.into_iter().collect();
      let mut insight = Insight::new(profile, category, traits, confidence)?;
      for (key, raw) in context {
        let value = serde_json::from_str::<serde_json::Value>(&raw)
          .unwrap_or(serde_json::Value::String(raw));
        insight = insight.with_context(key, value);
      }
      let id = insight.id;
      ctx.store.save_insight(insight).await?;
      println!("Saved insight {id}");
    }
    InsightCmd::List { profile, category, limit } => {
      let mut query = InsightQuery { user_id: profile, ..InsightQuery::default() }.limit(limit);
      if let Some(category) = category {
        query = query.category(category);
      }
      for i in ctx.store.get_insights(query).await? {
        let traits = i
          .traits
          .iter()
          .map(|(name, score)| format!("{name}={score:.2}"))
          .collect::<Vec<_>>()
          .join(" ");
        println!(
          "{}  {}  {:<22} conf={:.2}  {traits}",
          fmt_dt(i.timestamp),
          i.user_id,
          i.category,
          i.confidence_score
        );
      }
    }
    InsightCmd::Delete { id } => {
      if ctx.store.delete_insight(id).await? {
        println!("Deleted insight {id}");
      } else {
        bail!("no insight with id {id}");
      }
    }
  }
  Ok(())
}

// ─── Settings & privacy ───────────────────────────────────────────────────────

async fn setting(ctx: &Context, cmd: SettingCmd) -> anyhow::Result<()> {
  match cmd {
    SettingCmd::Get { key } => match ctx.store.get_setting(&key).await? {
      Some(value) => println!("{value}"),
      None => bail!("setting {key:?} is not set"),
    },
    SettingCmd::Set { key, value } => ctx.store.set_setting(&key, &value).await?,
  }
  Ok(())
}

async fn privacy(ctx: &Context, cmd: PrivacyCmd) -> anyhow::Result<()> {
  let privacy = &ctx.privacy;
  match cmd {
    PrivacyCmd::Status => {
      let status = privacy.get_privacy_status().await?;
      println!("encrypt_backups:   {}", status.encrypt_backups);
      println!("anonymize_exports: {}", status.anonymize_exports);
      println!("auto_backup:       {}", status.auto_backup);
      println!("backup_frequency:  {}", status.backup_frequency);
      println!("retention_days:    {}", status.retention_days);
    }
    PrivacyCmd::Set { key, value } => {
      let flag = || {
        value.parse::<bool>().with_context(|| format!("expected true or false, got {value:?}"))
      };
      match key {
        PrivacyKey::EncryptBackups => privacy.set_encrypt_backups(flag()?).await?,
        PrivacyKey::AnonymizeExports => privacy.set_anonymize_exports(flag()?).await?,
        PrivacyKey::AutoBackup => privacy.set_auto_backup(flag()?).await?,
        PrivacyKey::BackupFrequency => {
          privacy.set_backup_frequency(value.parse::<BackupFrequency>()?).await?
        }
        PrivacyKey::BackupPassword => privacy.set_backup_password(&value).await?,
      }
      println!("Updated {key:?}");
    }
    PrivacyCmd::Anonymize { id } => {
      if !privacy.anonymize_profile(id).await? {
        bail!("no profile with id {id}");
      }
      println!("Anonymized profile {id}");
    }
  }
  Ok(())
}

// ─── Retention ────────────────────────────────────────────────────────────────

async fn retention(ctx: &Context, cmd: RetentionCmd) -> anyhow::Result<()> {
  match cmd {
    RetentionCmd::Run => {
      let report = ctx.retention.run(Trigger::Interactive).await?;
      println!("Deleted {} expired records", report.total_deleted());
    }
    RetentionCmd::Set { days, data_type } => {
      ctx.privacy.set_retention_period(data_type, days).await?;
      println!("Retention for {data_type} set to {days} days");
    }
    RetentionCmd::Show => {
      for policy in ctx.store.retention_policies().await? {
        let last = policy.last_cleanup.map_or_else(|| "never".to_owned(), fmt_dt);
        println!(
          "{:<10} {:>5} days  last cleanup: {last}",
          policy.data_type, policy.retention_days
        );
      }
      if ctx.store.retention_policy(DataType::Insights).await?.is_none() {
        println!("insights   (default) {} days", insight_core::records::DEFAULT_RETENTION_DAYS);
      }
    }
  }
  Ok(())
}

fn fmt_dt(dt: DateTime<Utc>) -> String { dt.format("%Y-%m-%d %H:%M:%S").to_string() }
