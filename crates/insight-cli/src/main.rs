//! `insight` — command-line front end for the child-insight data store.
//!
//! # Usage
//!
//! ```
//! insight profile add Emma 4
//! insight insight add <profile-id> temperament --trait activity_level=0.8
//! insight export backup.json --password secret
//! insight --config ~/.config/insight/insight.toml backup --if-due
//! ```
//!
//! Configuration comes from `insight.toml` (or `--config`) and `INSIGHT_*`
//! environment variables; see [`settings::AppConfig`].

mod commands;
mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use insight_core::{DataType, RecordStore, TraitCategory};
use insight_store_sqlite::SqliteStore;
use insight_vault::{PrivacySettings, RetentionEngine, Trigger, Vault};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::{commands::Context, settings::AppConfig};

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "insight", version, about = "Local store for child personality insights")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "insight.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Manage child profiles.
  #[command(subcommand)]
  Profile(ProfileCmd),
  /// Record and browse insights.
  #[command(subcommand)]
  Insight(InsightCmd),
  /// Read or write a raw setting.
  #[command(subcommand)]
  Setting(SettingCmd),
  /// Privacy toggles and anonymization.
  #[command(subcommand)]
  Privacy(PrivacyCmd),
  /// Retention policy and cleanup.
  #[command(subcommand)]
  Retention(RetentionCmd),
  /// Export data to a file.
  Export {
    path:        PathBuf,
    /// Encrypt the file with this password.
    #[arg(long, env = "INSIGHT_EXPORT_PASSWORD")]
    password:    Option<String>,
    /// Replace names with pseudonyms.
    #[arg(long)]
    anonymize:   bool,
    /// Only export these profiles.
    #[arg(long = "profile", value_name = "ID")]
    profile_ids: Vec<Uuid>,
  },
  /// Import data from an exported file.
  Import {
    path:     PathBuf,
    /// Password for an encrypted file.
    #[arg(long, env = "INSIGHT_IMPORT_PASSWORD")]
    password: Option<String>,
    /// Keep existing data and upsert on top of it.
    #[arg(long)]
    merge:    bool,
  },
  /// Write a backup to the backup directory.
  Backup {
    /// Only back up when automatic backups are on and one is due.
    #[arg(long)]
    if_due: bool,
  },
  /// List past exports and backups.
  History,
  /// Counts, storage size and retention window.
  Summary,
  /// Files in the backup directory.
  BackupInfo,
  /// Delete every profile, insight and setting.
  Reset {
    /// Confirm the deletion.
    #[arg(long)]
    yes: bool,
  },
}

#[derive(Subcommand, Debug)]
enum ProfileCmd {
  Add {
    name: String,
    age:  u8,
    /// Picture file name.
    #[arg(long)]
    pic:  Option<String>,
  },
  List,
  Show { id: Uuid },
  Delete { id: Uuid },
}

#[derive(Subcommand, Debug)]
enum InsightCmd {
  Add {
    profile:    Uuid,
    category:   TraitCategory,
    /// Trait score as `name=score`, repeatable.
    #[arg(long = "trait", value_name = "NAME=SCORE", value_parser = parse_trait, required = true)]
    traits:     Vec<(String, f64)>,
    #[arg(long, default_value_t = 1.0)]
    confidence: f64,
    /// Context entry as `key=value`; values that parse as JSON are kept as
    /// JSON.
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_pair)]
    context:    Vec<(String, String)>,
  },
  List {
    #[arg(long)]
    profile:  Option<Uuid>,
    #[arg(long)]
    category: Option<TraitCategory>,
    #[arg(long, default_value_t = insight_core::store::DEFAULT_INSIGHT_LIMIT)]
    limit:    usize,
  },
  Delete { id: Uuid },
}

#[derive(Subcommand, Debug)]
enum SettingCmd {
  Get { key: String },
  Set { key: String, value: String },
}

#[derive(Subcommand, Debug)]
enum PrivacyCmd {
  Status,
  Set { key: PrivacyKey, value: String },
  /// Permanently replace a profile's name with its pseudonym.
  Anonymize { id: Uuid },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PrivacyKey {
  EncryptBackups,
  AnonymizeExports,
  AutoBackup,
  BackupFrequency,
  BackupPassword,
}

#[derive(Subcommand, Debug)]
enum RetentionCmd {
  /// Delete expired records now.
  Run,
  Set {
    days:      u32,
    #[arg(long, default_value = "insights")]
    data_type: DataType,
  },
  Show,
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
  let (k, v) = s.split_once('=').ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))?;
  Ok((k.trim().to_owned(), v.trim().to_owned()))
}

fn parse_trait(s: &str) -> Result<(String, f64), String> {
  let (name, score) = parse_pair(s)?;
  let score = score.parse::<f64>().map_err(|e| format!("invalid score for {name}: {e}"))?;
  Ok((name, score))
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = AppConfig::load(&cli.config)?;

  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;
  let store = Arc::new(store);

  let ctx = Context {
    vault:     Vault::new(Arc::clone(&store), cfg.backup_dir.clone()),
    privacy:   PrivacySettings::new(Arc::clone(&store)),
    retention: RetentionEngine::new(Arc::clone(&store)),
    store,
  };

  if let Err(e) = ctx.retention.run(Trigger::Startup).await {
    tracing::warn!(error = %e, "startup retention pass failed");
  }

  let result = commands::run(&ctx, cli.command).await;
  if let Err(e) = ctx.store.close().await {
    tracing::debug!(error = %e, "closing store");
  }
  result
}
