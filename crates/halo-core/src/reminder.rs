//! Pending-assignment selection, grouping, and reminder composition.
//!
//! The sweep itself (timer, mail transport, stamping) lives in the server;
//! everything here is pure so it can be tested without a database.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::report::escape_html;

/// An unreminded assignment old enough to remind about, joined with the
/// display data a reminder needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReminder {
  pub assignment_id:   Uuid,
  pub tenant_id:       Uuid,
  pub tenant_slug:     String,
  pub evaluator_id:    Uuid,
  pub evaluator_name:  String,
  pub evaluator_email: String,
  pub subject_name:    String,
  pub survey_title:    String,
  pub created_at:      DateTime<Utc>,
}

/// All pending items for one evaluator address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderBatch {
  /// Normalised (trimmed, lowercase) address; the grouping key.
  pub email: String,
  pub name:  String,
  pub items: Vec<PendingReminder>,
}

impl ReminderBatch {
  pub fn assignment_ids(&self) -> Vec<Uuid> {
    self.items.iter().map(|i| i.assignment_id).collect()
  }
}

/// A rendered email ready for a mail transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMail {
  pub to:      String,
  pub subject: String,
  pub html:    String,
}

fn normalise_email(email: &str) -> String { email.trim().to_lowercase() }

/// Drop candidates that already have a completed submission.
pub fn select_pending(
  candidates: Vec<PendingReminder>,
  completed: &HashSet<Uuid>,
) -> Vec<PendingReminder> {
  candidates
    .into_iter()
    .filter(|c| !completed.contains(&c.assignment_id))
    .collect()
}

/// Group pending items by evaluator email. Batches come out ordered by
/// address; items within a batch keep their oldest-first order.
pub fn group_by_evaluator(pending: Vec<PendingReminder>) -> Vec<ReminderBatch> {
  let mut groups: BTreeMap<String, ReminderBatch> = BTreeMap::new();

  for item in pending {
    let key = normalise_email(&item.evaluator_email);
    if key.is_empty() {
      continue;
    }
    groups
      .entry(key.clone())
      .or_insert_with(|| ReminderBatch {
        email: key,
        name:  item.evaluator_name.clone(),
        items: Vec::new(),
      })
      .items
      .push(item);
  }

  groups
    .into_values()
    .map(|mut batch| {
      batch
        .items
        .sort_by(|a, b| a.created_at.cmp(&b.created_at));
      batch
    })
    .collect()
}

/// Deep link to the survey-filling page for one assignment.
pub fn assignment_link(base_url: &str, item: &PendingReminder) -> String {
  format!(
    "{}/t/{}/assignments/{}",
    base_url.trim_end_matches('/'),
    item.tenant_slug,
    item.assignment_id
  )
}

/// Compose the single consolidated message for a batch.
pub fn compose(batch: &ReminderBatch, base_url: &str) -> OutgoingMail {
  let count = batch.items.len();
  let subject = if count == 1 {
    "Reminder: 1 survey is waiting for you".to_owned()
  } else {
    format!("Reminder: {count} surveys are waiting for you")
  };

  let mut html = String::new();
  html.push_str(&format!("<p>Hello {},</p>\n", escape_html(&batch.name)));
  html.push_str(
    "<p>The following evaluations are still pending. Please take a few \
     minutes to complete them.</p>\n<ul>\n",
  );
  for item in &batch.items {
    html.push_str(&format!(
      "  <li><strong>{}</strong> for {} - <a href=\"{}\">open survey</a></li>\n",
      escape_html(&item.survey_title),
      escape_html(&item.subject_name),
      escape_html(&assignment_link(base_url, item)),
    ));
  }
  html.push_str("</ul>\n<p>Thank you.</p>\n");

  OutgoingMail { to: batch.email.clone(), subject, html }
}
