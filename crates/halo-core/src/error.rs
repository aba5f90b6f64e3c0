//! Error types for `halo-core`.

use thiserror::Error;
use uuid::Uuid;

/// Coarse classification of a failure, used by the HTTP layer to pick a
/// status code without knowing which backend produced the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  Conflict,
  Invalid,
  Internal,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("tenant not found: {0}")]
  TenantNotFound(String),

  #[error("invalid tenant slug {0:?}")]
  InvalidSlug(String),

  #[error("subject not found: {0}")]
  SubjectNotFound(Uuid),

  #[error("evaluator not found: {0}")]
  EvaluatorNotFound(Uuid),

  #[error("relationship not found: {0}")]
  RelationshipNotFound(Uuid),

  #[error("survey not found: {0}")]
  SurveyNotFound(Uuid),

  #[error("survey {0} is inactive")]
  SurveyInactive(Uuid),

  #[error("assignment not found: {0}")]
  AssignmentNotFound(Uuid),

  #[error("assignment {0} is inactive")]
  AssignmentInactive(Uuid),

  #[error("survey {survey_id} is already assigned to relationship {relationship_id}")]
  DuplicateAssignment { relationship_id: Uuid, survey_id: Uuid },

  #[error("submission for assignment {0} is already completed")]
  SubmissionCompleted(Uuid),

  #[error("template not found: {0}")]
  TemplateNotFound(Uuid),

  #[error("invalid survey schema: {0}")]
  InvalidSchema(String),

  #[error("invalid answers: {0}")]
  InvalidAnswers(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("unknown {kind} {value:?}")]
  UnknownVariant { kind: &'static str, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::TenantNotFound(_)
      | Self::SubjectNotFound(_)
      | Self::EvaluatorNotFound(_)
      | Self::RelationshipNotFound(_)
      | Self::SurveyNotFound(_)
      | Self::AssignmentNotFound(_)
      | Self::TemplateNotFound(_) => ErrorKind::NotFound,
      Self::DuplicateAssignment { .. }
      | Self::SubmissionCompleted(_)
      | Self::Conflict(_) => ErrorKind::Conflict,
      Self::InvalidSlug(_)
      | Self::SurveyInactive(_)
      | Self::AssignmentInactive(_)
      | Self::InvalidSchema(_)
      | Self::InvalidAnswers(_) => ErrorKind::Invalid,
      Self::UnknownVariant { .. } | Self::Serialization(_) => {
        ErrorKind::Internal
      }
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
