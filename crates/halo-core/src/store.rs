//! The `SurveyStore` trait.
//!
//! Implemented by storage backends (e.g. `halo-store-sqlite`). The HTTP layer
//! and the reminder job depend on this abstraction, not on any concrete
//! backend.
//!
//! Every tenant-scoped method takes the tenant ID first and must filter on
//! it: a row belonging to another tenant behaves exactly like a missing row.

use std::{collections::HashSet, future::Future};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  ErrorKind,
  assignment::{
    Assignment, AssignmentDetail, AssignmentQuery, AutoAssignOutcome,
    NewAssignment, Submission, SubmissionInput,
  },
  auth::{NewUser, User},
  people::{Evaluator, NewPerson, NewRelationship, Relationship, Subject},
  reminder::PendingReminder,
  report::{NewTemplate, ReportInputs, ReportTemplate},
  survey::{Survey, SurveyInput},
  tenant::{NewTenant, Tenant},
};

/// Lets callers classify a backend error without knowing its concrete type.
pub trait StoreError {
  fn kind(&self) -> ErrorKind;
}

impl StoreError for crate::Error {
  fn kind(&self) -> ErrorKind { crate::Error::kind(self) }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Halo storage backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait SurveyStore: Send + Sync {
  type Error: std::error::Error + StoreError + Send + Sync + 'static;

  // ── Tenants ───────────────────────────────────────────────────────────

  /// Validates the slug; a taken slug is a conflict.
  fn create_tenant(
    &self,
    input: NewTenant,
  ) -> impl Future<Output = Result<Tenant, Self::Error>> + Send + '_;

  /// Look a tenant up by slug, active or not.
  fn get_tenant_by_slug<'a>(
    &'a self,
    slug: &'a str,
  ) -> impl Future<Output = Result<Option<Tenant>, Self::Error>> + Send + 'a;

  fn list_tenants(
    &self,
  ) -> impl Future<Output = Result<Vec<Tenant>, Self::Error>> + Send + '_;

  fn set_tenant_active(
    &self,
    tenant_id: Uuid,
    active: bool,
  ) -> impl Future<Output = Result<Tenant, Self::Error>> + Send + '_;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Create a login. Email is unique per tenant; `evaluator_id`, if set,
  /// must name an evaluator of the same tenant.
  fn create_user(
    &self,
    tenant_id: Uuid,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Case-insensitive lookup on email.
  fn find_user_by_email<'a>(
    &'a self,
    tenant_id: Uuid,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  // ── People ────────────────────────────────────────────────────────────

  fn add_subject(
    &self,
    tenant_id: Uuid,
    input: NewPerson,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  fn list_subjects(
    &self,
    tenant_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  fn add_evaluator(
    &self,
    tenant_id: Uuid,
    input: NewPerson,
  ) -> impl Future<Output = Result<Evaluator, Self::Error>> + Send + '_;

  fn list_evaluators(
    &self,
    tenant_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Evaluator>, Self::Error>> + Send + '_;

  // ── Relationships ─────────────────────────────────────────────────────

  /// Pair a subject with an evaluator. Both must belong to `tenant_id`; an
  /// existing pair is a conflict.
  fn add_relationship(
    &self,
    tenant_id: Uuid,
    input: NewRelationship,
  ) -> impl Future<Output = Result<Relationship, Self::Error>> + Send + '_;

  fn list_relationships(
    &self,
    tenant_id: Uuid,
    active_only: bool,
  ) -> impl Future<Output = Result<Vec<Relationship>, Self::Error>> + Send + '_;

  fn set_relationship_active(
    &self,
    tenant_id: Uuid,
    relationship_id: Uuid,
    active: bool,
  ) -> impl Future<Output = Result<Relationship, Self::Error>> + Send + '_;

  // ── Surveys ───────────────────────────────────────────────────────────

  /// Validates the schema before writing.
  fn create_survey(
    &self,
    tenant_id: Uuid,
    input: SurveyInput,
  ) -> impl Future<Output = Result<Survey, Self::Error>> + Send + '_;

  fn get_survey(
    &self,
    tenant_id: Uuid,
    survey_id: Uuid,
  ) -> impl Future<Output = Result<Option<Survey>, Self::Error>> + Send + '_;

  fn list_surveys(
    &self,
    tenant_id: Uuid,
    active_only: bool,
  ) -> impl Future<Output = Result<Vec<Survey>, Self::Error>> + Send + '_;

  /// Replace title, description and schema. Validates the schema.
  fn update_survey(
    &self,
    tenant_id: Uuid,
    survey_id: Uuid,
    input: SurveyInput,
  ) -> impl Future<Output = Result<Survey, Self::Error>> + Send + '_;

  fn set_survey_active(
    &self,
    tenant_id: Uuid,
    survey_id: Uuid,
    active: bool,
  ) -> impl Future<Output = Result<Survey, Self::Error>> + Send + '_;

  // ── Assignments ───────────────────────────────────────────────────────

  /// Assign one survey to one pair. A duplicate is a conflict.
  fn assign(
    &self,
    tenant_id: Uuid,
    input: NewAssignment,
  ) -> impl Future<Output = Result<Assignment, Self::Error>> + Send + '_;

  /// Assign `survey_id` to every active pair of the tenant that does not
  /// already hold it, in one transaction.
  ///
  /// Per-row constraint violations are collected into the outcome; only
  /// failures outside the batch (missing survey, I/O) are errors.
  fn auto_assign(
    &self,
    tenant_id: Uuid,
    survey_id: Uuid,
  ) -> impl Future<Output = Result<AutoAssignOutcome, Self::Error>> + Send + '_;

  fn get_assignment(
    &self,
    tenant_id: Uuid,
    assignment_id: Uuid,
  ) -> impl Future<Output = Result<Option<AssignmentDetail>, Self::Error>> + Send + '_;

  fn list_assignments<'a>(
    &'a self,
    tenant_id: Uuid,
    query: &'a AssignmentQuery,
  ) -> impl Future<Output = Result<Vec<AssignmentDetail>, Self::Error>> + Send + 'a;

  fn set_assignment_active(
    &self,
    tenant_id: Uuid,
    assignment_id: Uuid,
    active: bool,
  ) -> impl Future<Output = Result<Assignment, Self::Error>> + Send + '_;

  // ── Submissions ───────────────────────────────────────────────────────

  /// Create or update the single submission for an assignment.
  ///
  /// Fails if the assignment is inactive, if the existing submission is
  /// already completed, or if the answers do not fit the survey schema.
  fn submit(
    &self,
    tenant_id: Uuid,
    assignment_id: Uuid,
    input: SubmissionInput,
  ) -> impl Future<Output = Result<Submission, Self::Error>> + Send + '_;

  fn get_submission(
    &self,
    tenant_id: Uuid,
    assignment_id: Uuid,
  ) -> impl Future<Output = Result<Option<Submission>, Self::Error>> + Send + '_;

  // ── Reminders (cross-tenant; used by the background sweep) ────────────

  /// Active, never-reminded assignments created at or before `cutoff`,
  /// restricted to active tenants, surveys, pairs and evaluators. Ordered
  /// oldest first. Completion is *not* filtered here.
  fn reminder_candidates(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<PendingReminder>, Self::Error>> + Send + '_;

  /// The subset of `assignment_ids` that have a completed submission.
  fn completed_assignments(
    &self,
    assignment_ids: Vec<Uuid>,
  ) -> impl Future<Output = Result<HashSet<Uuid>, Self::Error>> + Send + '_;

  /// Stamp `last_reminder_sent_at = at` on every listed assignment that is
  /// still unstamped, in one transaction. Returns the number stamped.
  fn mark_reminded(
    &self,
    assignment_ids: Vec<Uuid>,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Reports ───────────────────────────────────────────────────────────

  /// Template names are unique per tenant.
  fn create_template(
    &self,
    tenant_id: Uuid,
    input: NewTemplate,
  ) -> impl Future<Output = Result<ReportTemplate, Self::Error>> + Send + '_;

  fn list_templates(
    &self,
    tenant_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ReportTemplate>, Self::Error>> + Send + '_;

  fn get_template(
    &self,
    tenant_id: Uuid,
    template_id: Uuid,
  ) -> impl Future<Output = Result<Option<ReportTemplate>, Self::Error>> + Send + '_;

  /// Gather the data behind a (subject, survey) report.
  fn report_inputs(
    &self,
    tenant_id: Uuid,
    subject_id: Uuid,
    survey_id: Uuid,
  ) -> impl Future<Output = Result<ReportInputs, Self::Error>> + Send + '_;
}
