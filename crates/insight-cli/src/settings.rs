//! Layered configuration: optional TOML file, then `INSIGHT_*` environment
//! variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  #[serde(default = "default_backup_dir")]
  pub backup_dir: PathBuf,
}

fn default_store_path() -> PathBuf { PathBuf::from(insight_store_sqlite::DEFAULT_DB_FILE) }

fn default_backup_dir() -> PathBuf { PathBuf::from("backups") }

impl AppConfig {
  /// Read `file` (if it exists) and the environment. Paths have a leading
  /// `~` expanded.
  pub fn load(file: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(file.to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("INSIGHT"))
      .build()
      .with_context(|| format!("failed to read config file {}", file.display()))?;

    let mut cfg: AppConfig =
      settings.try_deserialize().context("failed to deserialise AppConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    cfg.backup_dir = expand_tilde(&cfg.backup_dir);
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn file_values_are_read_and_expanded() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("insight.toml");
    std::fs::write(&file, "store_path = \"~/data/insight.db\"\nbackup_dir = \"/var/backups\"\n")
      .unwrap();

    let cfg = AppConfig::load(&file).unwrap();
    assert!(!cfg.store_path.starts_with("~"));
    assert!(cfg.store_path.ends_with("data/insight.db"));
    assert_eq!(cfg.backup_dir, PathBuf::from("/var/backups"));
  }

  #[test]
  fn paths_without_tilde_are_unchanged() {
    assert_eq!(expand_tilde(Path::new("/tmp/x.db")), PathBuf::from("/tmp/x.db"));
    assert_eq!(expand_tilde(Path::new("rel/x.db")), PathBuf::from("rel/x.db"));
  }
}
