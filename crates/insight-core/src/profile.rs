//! Profile — a tracked child and its demographic attributes.

use std::{fmt, ops::RangeInclusive, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, time};

/// Picture reference used until the collaborator sets a real one, and after
/// anonymization.
pub const DEFAULT_PROFILE_PIC: &str = "default.png";

// ─── AgeGroup ────────────────────────────────────────────────────────────────

/// Developmental bracket derived from a profile's age.
///
/// Serialized as its canonical token (`"1-5"`, `"6-12"`, `"13-18"`) both in
/// the database and in backup documents.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "&'static str", try_from = "String")]
pub enum AgeGroup {
  Toddler,
  Child,
  Teen,
}

impl AgeGroup {
  pub const ALL: [AgeGroup; 3] = [Self::Toddler, Self::Child, Self::Teen];

  /// The group an age falls into, or `None` outside 1–18.
  pub fn for_age(age: u8) -> Option<Self> {
    Self::ALL.into_iter().find(|g| g.ages().contains(&age))
  }

  pub fn ages(self) -> RangeInclusive<u8> {
    match self {
      Self::Toddler => 1..=5,
      Self::Child => 6..=12,
      Self::Teen => 13..=18,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Toddler => "1-5",
      Self::Child => "6-12",
      Self::Teen => "13-18",
    }
  }
}

impl fmt::Display for AgeGroup {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for AgeGroup {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Self::ALL
      .into_iter()
      .find(|g| g.as_str() == s)
      .ok_or_else(|| Error::UnknownAgeGroup(s.to_owned()))
  }
}

impl TryFrom<String> for AgeGroup {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { s.parse() }
}

impl From<AgeGroup> for &'static str {
  fn from(g: AgeGroup) -> Self { g.as_str() }
}

// ─── Profile ─────────────────────────────────────────────────────────────────

/// A tracked individual.
///
/// `id` and `created_at` never change once assigned. `last_updated` is owned
/// by the store and refreshed on every save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
  pub name:         String,
  pub age:          u8,
  pub age_group:    AgeGroup,
  #[serde(default = "default_profile_pic")]
  pub profile_pic:  String,
  pub id:           Uuid,
  #[serde(with = "time::lenient")]
  pub created_at:   DateTime<Utc>,
  #[serde(with = "time::lenient")]
  pub last_updated: DateTime<Utc>,
}

fn default_profile_pic() -> String { DEFAULT_PROFILE_PIC.to_owned() }

impl Profile {
  /// Create a profile with a fresh id, deriving the age group from `age`.
  pub fn new(name: impl Into<String>, age: u8) -> Result<Self> {
    let age_group = AgeGroup::for_age(age).ok_or(Error::AgeOutOfRange(age))?;
    let now = time::now();
    Ok(Self {
      name: name.into(),
      age,
      age_group,
      profile_pic: default_profile_pic(),
      id: Uuid::new_v4(),
      created_at: now,
      last_updated: now,
    })
  }

  /// Check the age range and that `age_group` agrees with `age`.
  ///
  /// The store itself accepts whatever it is given; this is applied to
  /// untrusted input such as backup documents.
  pub fn validate(&self) -> Result<()> {
    let expected = AgeGroup::for_age(self.age).ok_or(Error::AgeOutOfRange(self.age))?;
    if expected != self.age_group {
      return Err(Error::AgeGroupMismatch {
        age:   self.age,
        group: self.age_group.as_str(),
      });
    }
    Ok(())
  }

  pub fn display_name(&self) -> String { format!("{} (Age {})", self.name, self.age) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn age_group_boundaries() {
    assert_eq!(AgeGroup::for_age(0), None);
    assert_eq!(AgeGroup::for_age(1), Some(AgeGroup::Toddler));
    assert_eq!(AgeGroup::for_age(5), Some(AgeGroup::Toddler));
    assert_eq!(AgeGroup::for_age(6), Some(AgeGroup::Child));
    assert_eq!(AgeGroup::for_age(12), Some(AgeGroup::Child));
    assert_eq!(AgeGroup::for_age(13), Some(AgeGroup::Teen));
    assert_eq!(AgeGroup::for_age(18), Some(AgeGroup::Teen));
    assert_eq!(AgeGroup::for_age(19), None);
  }

  #[test]
  fn new_derives_group() {
    let emma = Profile::new("Emma", 4).unwrap();
    assert_eq!(emma.age_group, AgeGroup::Toddler);
    assert_eq!(emma.profile_pic, DEFAULT_PROFILE_PIC);
    assert_eq!(emma.created_at, emma.last_updated);
  }

  #[test]
  fn new_rejects_out_of_range_age() {
    assert!(matches!(Profile::new("Old", 30), Err(Error::AgeOutOfRange(30))));
  }

  #[test]
  fn age_group_serializes_as_token() {
    let json = serde_json::to_string(&AgeGroup::Child).unwrap();
    assert_eq!(json, "\"6-12\"");
    let back: AgeGroup = serde_json::from_str("\"13-18\"").unwrap();
    assert_eq!(back, AgeGroup::Teen);
    assert!(serde_json::from_str::<AgeGroup>("\"TEEN\"").is_err());
  }

  #[test]
  fn validate_catches_mismatched_group() {
    let mut p = Profile::new("Sam", 9).unwrap();
    assert!(p.validate().is_ok());
    p.age_group = AgeGroup::Teen;
    assert!(matches!(p.validate(), Err(Error::AgeGroupMismatch { age: 9, .. })));
  }

  #[test]
  fn reads_document_without_profile_pic() {
    let json = r#"{
      "name": "Leo", "age": 7, "age_group": "6-12",
      "id": "0b6f4a3e-4d0e-4f57-9b53-3f1c2f7a9e10",
      "created_at": "2024-03-01T10:00:00.000000",
      "last_updated": "2024-03-02T10:00:00.000000"
    }"#;
    let p: Profile = serde_json::from_str(json).unwrap();
    assert_eq!(p.profile_pic, DEFAULT_PROFILE_PIC);
    assert_eq!(p.age_group, AgeGroup::Child);
  }
}
