//! The portable export document.
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "timestamp": "2024-05-01T09:30:00.000000Z",
//!   "profiles": [ ... ],
//!   "insights": [ ... ]
//! }
//! ```
//!
//! Profiles and insights use their ordinary serde representation, so a
//! snapshot is readable without this crate.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use insight_core::{Insight, Profile, time};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

pub const FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
  pub version:   String,
  #[serde(with = "time::lenient")]
  pub timestamp: DateTime<Utc>,
  #[serde(default)]
  pub profiles:  Vec<Profile>,
  #[serde(default)]
  pub insights:  Vec<Insight>,
}

impl Snapshot {
  pub fn new(profiles: Vec<Profile>, insights: Vec<Insight>) -> Self {
    Self { version: FORMAT_VERSION.to_owned(), timestamp: time::now(), profiles, insights }
  }

  pub fn to_json(&self) -> Result<String> { Ok(serde_json::to_string_pretty(self)?) }

  /// Parse a document. Anything that is not a JSON object carrying a
  /// `version` key is [`Error::InvalidFormat`].
  pub fn from_json(text: &str) -> Result<Self> {
    let value: serde_json::Value =
      serde_json::from_str(text).map_err(|e| Error::InvalidFormat(e.to_string()))?;
    if value.get("version").is_none() {
      return Err(Error::InvalidFormat("missing version marker".into()));
    }
    serde_json::from_value(value).map_err(|e| Error::InvalidFormat(e.to_string()))
  }

  /// Check every record before anything is written.
  ///
  /// `owners` holds the profile ids an insight may reference: the
  /// snapshot's own profiles, plus the existing ones when merging.
  pub fn validate(&self, owners: &HashSet<Uuid>) -> Result<()> {
    for profile in &self.profiles {
      profile
        .validate()
        .map_err(|e| Error::InvalidFormat(format!("profile {}: {e}", profile.id)))?;
    }
    for insight in &self.insights {
      insight
        .validate()
        .map_err(|e| Error::InvalidFormat(format!("insight {}: {e}", insight.id)))?;
      if !owners.contains(&insight.user_id) {
        return Err(Error::InvalidFormat(format!(
          "insight {} references unknown profile {}",
          insight.id, insight.user_id
        )));
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use insight_core::TraitCategory;

  use super::*;

  #[test]
  fn missing_version_is_rejected() {
    let err = Snapshot::from_json(r#"{"profiles": [], "insights": []}"#).unwrap_err();
    assert!(matches!(err, Error::InvalidFormat(_)));
  }

  #[test]
  fn malformed_json_is_rejected() {
    assert!(matches!(Snapshot::from_json("not json"), Err(Error::InvalidFormat(_))));
    assert!(matches!(Snapshot::from_json("[1, 2]"), Err(Error::InvalidFormat(_))));
  }

  #[test]
  fn legacy_document_parses() {
    // Naive timestamps and no context field.
    let text = r#"{
      "version": "1.0",
      "timestamp": "2024-03-02T10:15:30.123456",
      "profiles": [{
        "name": "Emma", "age": 4, "age_group": "1-5", "profile_pic": "default.png",
        "id": "6f1c2a1e-8f1b-4c3e-9a47-0a1b2c3d4e5f",
        "created_at": "2024-01-01T08:00:00", "last_updated": "2024-02-01T08:00:00"
      }],
      "insights": [{
        "user_id": "6f1c2a1e-8f1b-4c3e-9a47-0a1b2c3d4e5f",
        "category": "temperament",
        "traits": {"activity_level": 0.8},
        "confidence_score": 0.7,
        "timestamp": "2024-02-10T12:00:00",
        "id": "1d2e3f40-5a6b-4c7d-8e9f-a0b1c2d3e4f5"
      }]
    }"#;
    let snap = Snapshot::from_json(text).unwrap();
    assert_eq!(snap.profiles.len(), 1);
    assert_eq!(snap.insights[0].category, TraitCategory::Temperament);
    assert!(snap.insights[0].context.is_empty());

    let owners = snap.profiles.iter().map(|p| p.id).collect();
    snap.validate(&owners).unwrap();
  }

  #[test]
  fn orphan_insight_fails_validation() {
    let p = Profile::new("Emma", 4).unwrap();
    let traits = BTreeMap::from([("focus".to_owned(), 0.5)]);
    let i = Insight::new(Uuid::new_v4(), TraitCategory::BigFive, traits, 0.9).unwrap();
    let snap = Snapshot::new(vec![p.clone()], vec![i]);

    let owners = HashSet::from([p.id]);
    assert!(matches!(snap.validate(&owners), Err(Error::InvalidFormat(_))));
  }

  #[test]
  fn inconsistent_age_group_fails_validation() {
    let mut p = Profile::new("Ada", 14).unwrap();
    p.age = 3;
    let snap = Snapshot::new(vec![p.clone()], vec![]);
    assert!(matches!(snap.validate(&HashSet::from([p.id])), Err(Error::InvalidFormat(_))));
  }
}
