//! Error type for `insight-vault`.
//!
//! Every variant's message is phrased so a collaborator can show it to the
//! user as-is.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("password required for encrypted file")]
  PasswordRequired,

  /// Wrong password, truncated file, or tampered ciphertext. The cases are
  /// deliberately indistinguishable.
  #[error("invalid password or corrupted file")]
  Crypto,

  #[error("encryption failed")]
  Encryption,

  #[error("invalid backup file format: {0}")]
  InvalidFormat(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("background task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

/// Box a backend error; used as `.map_err(store_err)`.
pub(crate) fn store_err<E>(e: E) -> Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  Error::Store(Box::new(e))
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
