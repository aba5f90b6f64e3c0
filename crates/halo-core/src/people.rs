//! Subjects, evaluators, and the relationships that pair them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A person being evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id: Uuid,
  pub tenant_id:  Uuid,
  pub name:       String,
  pub email:      String,
  pub active:     bool,
  pub created_at: DateTime<Utc>,
}

/// A person providing evaluations. Reminder emails are grouped by `email`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluator {
  pub evaluator_id: Uuid,
  pub tenant_id:    Uuid,
  pub name:         String,
  pub email:        String,
  pub active:       bool,
  pub created_at:   DateTime<Utc>,
}

/// Input for creating either a [`Subject`] or an [`Evaluator`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewPerson {
  pub name:  String,
  pub email: String,
}

/// A subject-evaluator pair. Assignments attach surveys to these rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
  pub relationship_id:   Uuid,
  pub tenant_id:         Uuid,
  pub subject_id:        Uuid,
  pub evaluator_id:      Uuid,
  /// Free label such as "peer", "manager" or "self".
  pub relationship_type: String,
  pub active:            bool,
  pub created_at:        DateTime<Utc>,
}

/// Input to [`crate::store::SurveyStore::add_relationship`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewRelationship {
  pub subject_id:        Uuid,
  pub evaluator_id:      Uuid,
  pub relationship_type: String,
}
