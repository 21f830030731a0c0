//! Timestamp helpers shared by every crate that persists or exports records.
//!
//! All timestamps are UTC with microsecond precision. The textual form is
//! fixed-width RFC 3339 (`2024-05-01T09:30:00.000000Z`), so comparing two
//! encoded timestamps as strings gives the same answer as comparing the
//! instants themselves.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};

/// The current instant, truncated to microseconds.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

/// Encode a timestamp in the canonical fixed-width form.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp written either as RFC 3339 or as a naive ISO-8601
/// date-time. Naive values carry no offset and are read as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }
  s.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc())
}

/// Serde adapter for `DateTime<Utc>` fields using the formats above.
pub mod lenient {
  use chrono::{DateTime, Utc};
  use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

  pub fn serialize<S: Serializer>(
    dt: &DateTime<Utc>,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&super::format_timestamp(*dt))
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    super::parse_timestamp(&raw)
      .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw:?}")))
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Timelike};

  use super::*;

  #[test]
  fn now_has_microsecond_precision() {
    assert_eq!(now().nanosecond() % 1_000, 0);
  }

  #[test]
  fn encoded_form_is_fixed_width() {
    let whole = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
    assert_eq!(format_timestamp(whole), "2024-05-01T09:30:00.000000Z");
  }

  #[test]
  fn parses_naive_iso_as_utc() {
    let parsed = parse_timestamp("2024-01-15T08:00:00.250000").unwrap();
    assert_eq!(parsed.hour(), 8);
    assert_eq!(parsed.nanosecond(), 250_000_000);
  }

  #[test]
  fn parses_offset_timestamps() {
    let parsed = parse_timestamp("2024-01-15T10:00:00+02:00").unwrap();
    assert_eq!(parsed.hour(), 8);
  }

  #[test]
  fn rejects_garbage() {
    assert!(parse_timestamp("last tuesday").is_none());
  }
}
