//! Background job that emails evaluators about overdue assignments.
//!
//! Each sweep gathers never-reminded assignments older than the threshold
//! across every active tenant, drops completed ones, and sends one message
//! per evaluator address. Assignments are stamped only after their message
//! went out, and all stamps land in a single write at the end. A failed send
//! is logged and leaves that group unstamped for the next sweep.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use halo_core::{
  reminder::{compose, group_by_evaluator, select_pending},
  store::SurveyStore,
};
use thiserror::Error;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::mail::Mailer;

#[derive(Debug, Error)]
pub enum ReminderError {
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("threshold {0} does not give a usable cutoff")]
  Threshold(chrono::Duration),
}

impl ReminderError {
  fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }
}

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
  /// Evaluator addresses with at least one pending item.
  pub groups:  usize,
  pub sent:    usize,
  pub failed:  usize,
  /// Assignments whose reminder timestamp was written.
  pub stamped: usize,
}

pub struct ReminderJob<S, M> {
  store:     Arc<S>,
  mailer:    Arc<M>,
  base_url:  String,
  threshold: chrono::Duration,
  period:    Duration,
}

impl<S, M> ReminderJob<S, M>
where
  S: SurveyStore + 'static,
  M: Mailer + 'static,
{
  pub fn new(
    store: Arc<S>,
    mailer: Arc<M>,
    base_url: impl Into<String>,
    threshold: chrono::Duration,
    period: Duration,
  ) -> Self {
    Self { store, mailer, base_url: base_url.into(), threshold, period }
  }

  /// Run [`Self::run`] on the tokio runtime.
  pub fn spawn(self) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move { self.run().await })
  }

  /// Sweep forever. The first sweep runs immediately.
  pub async fn run(&self) {
    info!(
      period = ?self.period,
      threshold_days = self.threshold.num_days(),
      "starting reminder job"
    );

    let mut ticker = interval(self.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      ticker.tick().await;
      match self.sweep(Utc::now()).await {
        Ok(report) => info!(
          groups = report.groups,
          sent = report.sent,
          failed = report.failed,
          stamped = report.stamped,
          "reminder sweep finished"
        ),
        Err(e) => error!(error = %e, "reminder sweep failed"),
      }
    }
  }

  /// One pass, treating `now` as the current time.
  pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, ReminderError> {
    let cutoff = (self.threshold > chrono::Duration::zero())
      .then(|| now.checked_sub_signed(self.threshold))
      .flatten()
      .ok_or(ReminderError::Threshold(self.threshold))?;
    let candidates = self
      .store
      .reminder_candidates(cutoff)
      .await
      .map_err(ReminderError::store)?;
    if candidates.is_empty() {
      debug!(%cutoff, "no overdue assignments");
      return Ok(SweepReport::default());
    }

    let ids = candidates.iter().map(|c| c.assignment_id).collect();
    let completed = self
      .store
      .completed_assignments(ids)
      .await
      .map_err(ReminderError::store)?;

    let batches = group_by_evaluator(select_pending(candidates, &completed));
    let mut report = SweepReport { groups: batches.len(), ..SweepReport::default() };
    let mut to_stamp = Vec::new();

    for batch in &batches {
      let mail = compose(batch, &self.base_url);
      match self.mailer.send(&mail).await {
        Ok(()) => {
          report.sent += 1;
          to_stamp.extend(batch.assignment_ids());
          debug!(evaluator = %batch.email, items = batch.items.len(), "reminder sent");
        }
        Err(e) => {
          report.failed += 1;
          warn!(evaluator = %batch.email, error = %e, "reminder send failed");
        }
      }
    }

    report.stamped = self
      .store
      .mark_reminded(to_stamp, now)
      .await
      .map_err(ReminderError::store)?;
    Ok(report)
  }
}
