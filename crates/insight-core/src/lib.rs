//! Core types and trait definitions for the child-insight data store.
//!
//! This crate is deliberately free of database and crypto dependencies.
//! Every other crate depends on it and is written against [`RecordStore`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod insight;
pub mod profile;
pub mod records;
pub mod store;
pub mod time;

pub use error::{Error, Result};
pub use insight::{Insight, TraitCategory};
pub use profile::{AgeGroup, Profile};
pub use records::{
  BackupRecord, DataSummary, DataType, RestoreMode, RestoreReport,
  RetentionPolicy, RetentionReport,
};
pub use store::{InsightQuery, RecordStore};
