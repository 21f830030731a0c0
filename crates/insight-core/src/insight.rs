//! Insight — one scored observation snapshot for a profile.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, time};

// ─── TraitCategory ───────────────────────────────────────────────────────────

/// The framework a set of trait scores belongs to.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "&'static str", try_from = "String")]
pub enum TraitCategory {
  Temperament,
  MbtiInspired,
  BigFive,
  MultipleIntelligence,
  Eq,
}

impl TraitCategory {
  pub const ALL: [TraitCategory; 5] = [
    Self::Temperament,
    Self::MbtiInspired,
    Self::BigFive,
    Self::MultipleIntelligence,
    Self::Eq,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Temperament => "temperament",
      Self::MbtiInspired => "mbti_inspired",
      Self::BigFive => "big_five",
      Self::MultipleIntelligence => "multiple_intelligence",
      Self::Eq => "emotional_intelligence",
    }
  }
}

impl fmt::Display for TraitCategory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for TraitCategory {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Self::ALL
      .into_iter()
      .find(|c| c.as_str() == s)
      .ok_or_else(|| Error::UnknownCategory(s.to_owned()))
  }
}

impl TryFrom<String> for TraitCategory {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { s.parse() }
}

impl From<TraitCategory> for &'static str {
  fn from(c: TraitCategory) -> Self { c.as_str() }
}

// ─── Insight ─────────────────────────────────────────────────────────────────

/// A timestamped set of trait scores for one profile.
///
/// Insights are never edited in place; saving an insight with an existing id
/// overwrites the stored copy wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
  pub user_id:          Uuid,
  pub category:         TraitCategory,
  /// Trait name to score; every score lies in `[0, 1]`.
  pub traits:           BTreeMap<String, f64>,
  /// Free-form metadata, e.g. which screen produced the observation.
  #[serde(default)]
  pub context:          serde_json::Map<String, serde_json::Value>,
  pub confidence_score: f64,
  #[serde(with = "time::lenient")]
  pub timestamp:        DateTime<Utc>,
  pub id:               Uuid,
}

impl Insight {
  /// Create a validated insight stamped with the current time.
  pub fn new(
    user_id: Uuid,
    category: TraitCategory,
    traits: BTreeMap<String, f64>,
    confidence_score: f64,
  ) -> Result<Self> {
    let insight = Self {
      user_id,
      category,
      traits,
      context: serde_json::Map::new(),
      confidence_score,
      timestamp: time::now(),
      id: Uuid::new_v4(),
    };
    insight.validate()?;
    Ok(insight)
  }

  pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
    self.context.insert(key.into(), value);
    self
  }

  /// Every trait score and the confidence must lie in `[0, 1]`. NaN fails.
  pub fn validate(&self) -> Result<()> {
    if let Some((name, score)) = self.traits.iter().find(|(_, s)| !in_unit_range(**s)) {
      return Err(Error::ScoreOutOfRange { name: name.clone(), score: *score });
    }
    if !in_unit_range(self.confidence_score) {
      return Err(Error::ConfidenceOutOfRange(self.confidence_score));
    }
    Ok(())
  }
}

fn in_unit_range(v: f64) -> bool { (0.0..=1.0).contains(&v) }

#[cfg(test)]
mod tests {
  use super::*;

  fn traits(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect()
  }

  #[test]
  fn category_tokens_round_trip_through_from_str() {
    for c in TraitCategory::ALL {
      assert_eq!(c.as_str().parse::<TraitCategory>().unwrap(), c);
    }
    assert_eq!(TraitCategory::Eq.as_str(), "emotional_intelligence");
    assert!("EQ".parse::<TraitCategory>().is_err());
  }

  #[test]
  fn new_accepts_unit_scores() {
    let i = Insight::new(
      Uuid::new_v4(),
      TraitCategory::Temperament,
      traits(&[("adaptability", 0.7), ("persistence", 0.0), ("mood", 1.0)]),
      0.8,
    )
    .unwrap();
    assert_eq!(i.traits["adaptability"], 0.7);
  }

  #[test]
  fn new_rejects_score_above_one() {
    let err = Insight::new(
      Uuid::new_v4(),
      TraitCategory::BigFive,
      traits(&[("openness", 1.2)]),
      0.5,
    )
    .unwrap_err();
    assert!(matches!(err, Error::ScoreOutOfRange { ref name, .. } if name == "openness"));
  }

  #[test]
  fn new_rejects_nan_confidence() {
    let err = Insight::new(Uuid::new_v4(), TraitCategory::Eq, traits(&[]), f64::NAN)
      .unwrap_err();
    assert!(matches!(err, Error::ConfidenceOutOfRange(_)));
  }

  #[test]
  fn serializes_category_as_token() {
    let i = Insight::new(Uuid::new_v4(), TraitCategory::MbtiInspired, traits(&[]), 0.5)
      .unwrap()
      .with_context("source", serde_json::json!("track_behavior"));
    let v = serde_json::to_value(&i).unwrap();
    assert_eq!(v["category"], "mbti_inspired");
    assert_eq!(v["context"]["source"], "track_behavior");
  }
}
