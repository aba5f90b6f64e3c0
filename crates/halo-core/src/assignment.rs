//! Assignments of surveys to subject-evaluator pairs, and their submissions.
//!
//! An assignment is unique per `(relationship_id, survey_id)`. Rows are never
//! deleted; they are deactivated. `last_reminder_sent_at` is written only by
//! the reminder sweep.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ─── Assignment ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
  pub assignment_id:         Uuid,
  pub tenant_id:             Uuid,
  pub relationship_id:       Uuid,
  pub survey_id:             Uuid,
  pub active:                bool,
  pub created_at:            DateTime<Utc>,
  pub last_reminder_sent_at: Option<DateTime<Utc>>,
}

/// An assignment joined with the names a listing needs and the current
/// submission status, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentDetail {
  #[serde(flatten)]
  pub assignment:        Assignment,
  pub subject_id:        Uuid,
  pub subject_name:      String,
  pub evaluator_id:      Uuid,
  pub evaluator_name:    String,
  pub relationship_type: String,
  pub survey_title:      String,
  pub status:            Option<SubmissionStatus>,
}

/// Input to [`crate::store::SurveyStore::assign`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewAssignment {
  pub relationship_id: Uuid,
  pub survey_id:       Uuid,
}

/// Filters for [`crate::store::SurveyStore::list_assignments`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentQuery {
  pub survey_id:    Option<Uuid>,
  /// Restrict to assignments whose relationship has this evaluator.
  pub evaluator_id: Option<Uuid>,
  #[serde(default)]
  pub active_only:  bool,
}

// ─── Auto-assignment ─────────────────────────────────────────────────────────

/// The relationships that still need a row for a survey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentPlan {
  pub to_assign: Vec<Uuid>,
  pub skipped:   usize,
}

/// Set difference of active pairs against pairs already holding the survey.
///
/// Input order is preserved and repeated IDs in `active_pairs` are planned
/// once, so the plan never yields two rows for the same pair.
pub fn plan_assignments(
  active_pairs: &[Uuid],
  already_assigned: &HashSet<Uuid>,
) -> AssignmentPlan {
  let mut planned = HashSet::new();
  let mut to_assign = Vec::new();
  let mut skipped = 0;

  for pair in active_pairs {
    if already_assigned.contains(pair) {
      skipped += 1;
    } else if planned.insert(*pair) {
      to_assign.push(*pair);
    }
  }

  AssignmentPlan { to_assign, skipped }
}

/// Result of a bulk auto-assign run. Constraint violations on individual
/// rows are reported in `errors` rather than failing the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoAssignOutcome {
  pub survey_id: Uuid,
  pub assigned:  usize,
  pub skipped:   usize,
  pub errors:    Vec<String>,
  pub message:   String,
}

impl AutoAssignOutcome {
  pub fn new(
    survey_id: Uuid,
    total_pairs: usize,
    assigned: usize,
    skipped: usize,
    errors: Vec<String>,
  ) -> Self {
    let message = if total_pairs == 0 {
      "no active subject-evaluator relationships".to_owned()
    } else if assigned == 0 && errors.is_empty() {
      "all relationships already assigned".to_owned()
    } else if errors.is_empty() {
      format!("assigned {assigned}, skipped {skipped}")
    } else {
      format!(
        "assigned {assigned}, skipped {skipped}, {} failed",
        errors.len()
      )
    };
    Self { survey_id, assigned, skipped, errors, message }
  }

  pub fn is_partial(&self) -> bool { !self.errors.is_empty() }
}

// ─── Submissions ─────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubmissionStatus {
  #[default]
  InProgress,
  Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
  pub submission_id: Uuid,
  pub tenant_id:     Uuid,
  pub assignment_id: Uuid,
  pub status:        SubmissionStatus,
  pub answers:       Map<String, Value>,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
  pub completed_at:  Option<DateTime<Utc>>,
}

/// Body of a submission upsert.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionInput {
  #[serde(default)]
  pub status:  SubmissionStatus,
  #[serde(default)]
  pub answers: Map<String, Value>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plan_skips_existing_pairs() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let c = Uuid::new_v4();
    let existing: HashSet<_> = [b].into_iter().collect();

    let plan = plan_assignments(&[a, b, c], &existing);
    assert_eq!(plan.to_assign, vec![a, c]);
    assert_eq!(plan.skipped, 1);
  }

  #[test]
  fn plan_never_repeats_a_pair() {
    let a = Uuid::new_v4();
    let plan = plan_assignments(&[a, a, a], &HashSet::new());
    assert_eq!(plan.to_assign, vec![a]);
  }

  #[test]
  fn plan_empty_input() {
    let plan = plan_assignments(&[], &HashSet::new());
    assert!(plan.to_assign.is_empty());
    assert_eq!(plan.skipped, 0);
  }

  #[test]
  fn outcome_messages() {
    let id = Uuid::new_v4();
    assert_eq!(
      AutoAssignOutcome::new(id, 0, 0, 0, vec![]).message,
      "no active subject-evaluator relationships"
    );
    assert_eq!(
      AutoAssignOutcome::new(id, 3, 0, 3, vec![]).message,
      "all relationships already assigned"
    );
    let partial = AutoAssignOutcome::new(id, 3, 1, 2, vec!["boom".into()]);
    assert!(partial.is_partial());
    assert_eq!(partial.message, "assigned 1, skipped 2, 1 failed");
  }

  #[test]
  fn status_round_trips_through_strum() {
    assert_eq!(SubmissionStatus::Completed.to_string(), "completed");
    assert_eq!(
      "in_progress".parse::<SubmissionStatus>().unwrap(),
      SubmissionStatus::InProgress
    );
  }
}
