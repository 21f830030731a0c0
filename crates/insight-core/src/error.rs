//! Error types for `insight-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("age {0} is outside the supported range 1-18")]
  AgeOutOfRange(u8),

  #[error("age group {group} does not match age {age}")]
  AgeGroupMismatch { age: u8, group: &'static str },

  #[error("unknown age group token: {0:?}")]
  UnknownAgeGroup(String),

  #[error("unknown trait category token: {0:?}")]
  UnknownCategory(String),

  #[error("unknown data type: {0:?}")]
  UnknownDataType(String),

  #[error("trait {name:?} has score {score}, expected a value in [0, 1]")]
  ScoreOutOfRange { name: String, score: f64 },

  #[error("confidence score {0} is outside [0, 1]")]
  ConfidenceOutOfRange(f64),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
