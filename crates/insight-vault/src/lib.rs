//! Data-lifecycle services layered over any [`RecordStore`].
//!
//! - [`Vault`] exports and imports portable snapshots, optionally encrypted
//!   and anonymized, runs scheduled backups and factory resets.
//! - [`RetentionEngine`] purges records older than their retention window.
//! - [`PrivacySettings`] gives typed access to the privacy toggles kept in the
//!   generic settings table.
//!
//! [`RecordStore`]: insight_core::RecordStore

pub mod anonymize;
pub mod crypto;
pub mod error;
pub mod privacy;
pub mod retention;
pub mod snapshot;
pub mod vault;

pub use error::{Error, Result};
pub use privacy::{BackupFrequency, PrivacySettings, PrivacyStatus};
pub use retention::{RetentionEngine, RetentionPhase, Trigger};
pub use snapshot::Snapshot;
pub use vault::{BackupInfo, ExportOptions, ExportOutcome, ImportOptions, ImportOutcome, Vault};
