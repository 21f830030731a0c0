//! Periodic purge of records older than their retention window.

use std::sync::{Arc, Mutex, PoisonError};

use insight_core::{RecordStore, RetentionReport};
use tracing::{debug, info};

use crate::{Result, error::store_err};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPhase {
  Idle,
  /// Reading the configured policies.
  Scanning,
  /// Deleting expired rows, one statement per data type.
  Deleting,
}

/// Who asked for the pass. Startup runs are logged at debug level only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
  Startup,
  Interactive,
}

pub struct RetentionEngine<S> {
  store: Arc<S>,
  phase: Mutex<RetentionPhase>,
}

impl<S: RecordStore> RetentionEngine<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store, phase: Mutex::new(RetentionPhase::Idle) } }

  pub fn phase(&self) -> RetentionPhase {
    *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn enter(&self, phase: RetentionPhase) {
    *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
  }

  /// Run one pass. The engine is back in [`RetentionPhase::Idle`] when this
  /// returns, whether or not the pass succeeded, and also when the future is
  /// dropped before it completes.
  pub async fn run(&self, trigger: Trigger) -> Result<RetentionReport> {
    self.enter(RetentionPhase::Scanning);
    let result = {
      let _idle = IdleOnDrop(&self.phase);
      self.pass().await
    };

    let report = result?;
    let deleted = report.total_deleted();
    match trigger {
      Trigger::Startup => debug!(deleted, "startup retention pass"),
      Trigger::Interactive => info!(deleted, "retention pass complete"),
    }
    Ok(report)
  }

  async fn pass(&self) -> Result<RetentionReport> {
    let policies = self.store.retention_policies().await.map_err(store_err)?;
    for policy in &policies {
      debug!(
        data_type = %policy.data_type,
        retention_days = policy.retention_days,
        "retention policy"
      );
    }

    self.enter(RetentionPhase::Deleting);
    self.store.apply_retention_policy().await.map_err(store_err)
  }
}

/// Puts the engine back in `Idle` when a pass finishes or is cancelled.
struct IdleOnDrop<'a>(&'a Mutex<RetentionPhase>);

impl Drop for IdleOnDrop<'_> {
  fn drop(&mut self) {
    *self.0.lock().unwrap_or_else(PoisonError::into_inner) = RetentionPhase::Idle;
  }
}
