//! Stable one-way pseudonyms for profile names.

use insight_core::{Profile, profile::DEFAULT_PROFILE_PIC};
use sha2::{Digest, Sha256};

/// `Child_` followed by the first eight hex digits of SHA-256(name).
///
/// The same name always yields the same pseudonym.
pub fn pseudonym(name: &str) -> String {
  let digest = hex::encode(Sha256::digest(name.as_bytes()));
  format!("Child_{}", &digest[..8])
}

/// Replace identifying fields; id, age, group and timestamps are kept.
pub fn anonymize(profile: &mut Profile) {
  profile.name = pseudonym(&profile.name);
  profile.profile_pic = DEFAULT_PROFILE_PIC.to_owned();
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pseudonym_is_stable_and_hides_name() {
    let a = pseudonym("Emma");
    assert_eq!(a, pseudonym("Emma"));
    assert_ne!(a, pseudonym("Emmy"));
    assert!(a.starts_with("Child_"));
    assert_eq!(a.len(), "Child_".len() + 8);
    assert!(!a.contains("Emma"));
  }

  #[test]
  fn pseudonym_matches_sha256_prefix() {
    let digest = hex::encode(Sha256::digest(b"Emma"));
    assert_eq!(pseudonym("Emma"), format!("Child_{}", &digest[..8]));
  }

  #[test]
  fn anonymize_keeps_demographics() {
    let mut p = Profile::new("Emma", 4).unwrap();
    p.profile_pic = "emma.jpg".into();
    let before = p.clone();

    anonymize(&mut p);
    assert_eq!(p.name, pseudonym("Emma"));
    assert_eq!(p.profile_pic, DEFAULT_PROFILE_PIC);
    assert_eq!((p.id, p.age, p.age_group), (before.id, before.age, before.age_group));
    assert_eq!(p.created_at, before.created_at);
  }
}
