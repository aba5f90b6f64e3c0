//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that lexical comparison in SQL matches chronological order. UUIDs are
//! stored as hyphenated lowercase strings, booleans as `0`/`1`.

use chrono::{DateTime, SecondsFormat, Utc};
use halo_core::{
  assignment::{Assignment, AssignmentDetail, Submission, SubmissionStatus},
  auth::{Role, User},
  people::{Evaluator, Relationship, Subject},
  reminder::PendingReminder,
  report::ReportTemplate,
  survey::Survey,
  tenant::Tenant,
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

fn decode_enum<T: std::str::FromStr>(kind: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| {
    Error::Core(halo_core::Error::UnknownVariant { kind, value: s.to_owned() })
  })
}

pub fn decode_role(s: &str) -> Result<Role> { decode_enum("role", s) }

pub fn decode_status(s: &str) -> Result<SubmissionStatus> {
  decode_enum("submission status", s)
}

// ─── Column lists ────────────────────────────────────────────────────────────

pub const TENANT_COLS: &str = "tenant_id, slug, name, active, created_at";
pub const SUBJECT_COLS: &str =
  "subject_id, tenant_id, name, email, active, created_at";
pub const EVALUATOR_COLS: &str =
  "evaluator_id, tenant_id, name, email, active, created_at";
pub const USER_COLS: &str = "user_id, tenant_id, email, password_hash, role, \
                             evaluator_id, active, created_at";
pub const RELATIONSHIP_COLS: &str = "relationship_id, tenant_id, subject_id, \
                                     evaluator_id, relationship_type, active, \
                                     created_at";
pub const SURVEY_COLS: &str = "survey_id, tenant_id, title, description, \
                               schema_json, active, created_at, updated_at";
pub const ASSIGNMENT_COLS: &str = "assignment_id, tenant_id, relationship_id, \
                                   survey_id, active, created_at, \
                                   last_reminder_sent_at";
pub const SUBMISSION_COLS: &str = "submission_id, tenant_id, assignment_id, \
                                   status, answers_json, created_at, \
                                   updated_at, completed_at";
pub const TEMPLATE_COLS: &str =
  "template_id, tenant_id, name, body, created_at, updated_at";

/// Assignment columns prefixed with `a.`, followed by the joined display
/// columns, for [`RawAssignmentDetail`].
pub const DETAIL_SELECT: &str = "
  SELECT a.assignment_id, a.tenant_id, a.relationship_id, a.survey_id,
         a.active, a.created_at, a.last_reminder_sent_at,
         s.subject_id, s.name, e.evaluator_id, e.name,
         r.relationship_type, v.title, sub.status
  FROM assignments a
  JOIN relationships r ON r.relationship_id = a.relationship_id
  JOIN subjects      s ON s.subject_id      = r.subject_id
  JOIN evaluators    e ON e.evaluator_id    = r.evaluator_id
  JOIN surveys       v ON v.survey_id       = a.survey_id
  LEFT JOIN submissions sub ON sub.assignment_id = a.assignment_id";

// ─── Raw rows ────────────────────────────────────────────────────────────────

pub struct RawTenant {
  tenant_id:  String,
  slug:       String,
  name:       String,
  active:     bool,
  created_at: String,
}

impl RawTenant {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      tenant_id:  row.get(0)?,
      slug:       row.get(1)?,
      name:       row.get(2)?,
      active:     row.get(3)?,
      created_at: row.get(4)?,
    })
  }

  pub fn into_tenant(self) -> Result<Tenant> {
    Ok(Tenant {
      tenant_id:  decode_uuid(&self.tenant_id)?,
      slug:       self.slug,
      name:       self.name,
      active:     self.active,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Subjects and evaluators share a row shape.
pub struct RawPerson {
  id:         String,
  tenant_id:  String,
  name:       String,
  email:      String,
  active:     bool,
  created_at: String,
}

impl RawPerson {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      tenant_id:  row.get(1)?,
      name:       row.get(2)?,
      email:      row.get(3)?,
      active:     row.get(4)?,
      created_at: row.get(5)?,
    })
  }

  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      subject_id: decode_uuid(&self.id)?,
      tenant_id:  decode_uuid(&self.tenant_id)?,
      name:       self.name,
      email:      self.email,
      active:     self.active,
      created_at: decode_dt(&self.created_at)?,
    })
  }

  pub fn into_evaluator(self) -> Result<Evaluator> {
    Ok(Evaluator {
      evaluator_id: decode_uuid(&self.id)?,
      tenant_id:    decode_uuid(&self.tenant_id)?,
      name:         self.name,
      email:        self.email,
      active:       self.active,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawUser {
  user_id:       String,
  tenant_id:     String,
  email:         String,
  password_hash: String,
  role:          String,
  evaluator_id:  Option<String>,
  active:        bool,
  created_at:    String,
}

impl RawUser {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:       row.get(0)?,
      tenant_id:     row.get(1)?,
      email:         row.get(2)?,
      password_hash: row.get(3)?,
      role:          row.get(4)?,
      evaluator_id:  row.get(5)?,
      active:        row.get(6)?,
      created_at:    row.get(7)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:       decode_uuid(&self.user_id)?,
      tenant_id:     decode_uuid(&self.tenant_id)?,
      email:         self.email,
      password_hash: self.password_hash,
      role:          decode_role(&self.role)?,
      evaluator_id:  decode_opt_uuid(self.evaluator_id)?,
      active:        self.active,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawRelationship {
  relationship_id:   String,
  tenant_id:         String,
  subject_id:        String,
  evaluator_id:      String,
  relationship_type: String,
  active:            bool,
  created_at:        String,
}

impl RawRelationship {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      relationship_id:   row.get(0)?,
      tenant_id:         row.get(1)?,
      subject_id:        row.get(2)?,
      evaluator_id:      row.get(3)?,
      relationship_type: row.get(4)?,
      active:            row.get(5)?,
      created_at:        row.get(6)?,
    })
  }

  pub fn into_relationship(self) -> Result<Relationship> {
    Ok(Relationship {
      relationship_id:   decode_uuid(&self.relationship_id)?,
      tenant_id:         decode_uuid(&self.tenant_id)?,
      subject_id:        decode_uuid(&self.subject_id)?,
      evaluator_id:      decode_uuid(&self.evaluator_id)?,
      relationship_type: self.relationship_type,
      active:            self.active,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawSurvey {
  survey_id:   String,
  tenant_id:   String,
  title:       String,
  description: Option<String>,
  schema_json: String,
  active:      bool,
  created_at:  String,
  updated_at:  String,
}

impl RawSurvey {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      survey_id:   row.get(0)?,
      tenant_id:   row.get(1)?,
      title:       row.get(2)?,
      description: row.get(3)?,
      schema_json: row.get(4)?,
      active:      row.get(5)?,
      created_at:  row.get(6)?,
      updated_at:  row.get(7)?,
    })
  }

  pub fn into_survey(self) -> Result<Survey> {
    Ok(Survey {
      survey_id:   decode_uuid(&self.survey_id)?,
      tenant_id:   decode_uuid(&self.tenant_id)?,
      title:       self.title,
      description: self.description,
      schema:      serde_json::from_str(&self.schema_json)?,
      active:      self.active,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawAssignment {
  assignment_id:         String,
  tenant_id:             String,
  relationship_id:       String,
  survey_id:             String,
  active:                bool,
  created_at:            String,
  last_reminder_sent_at: Option<String>,
}

impl RawAssignment {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      assignment_id:         row.get(0)?,
      tenant_id:             row.get(1)?,
      relationship_id:       row.get(2)?,
      survey_id:             row.get(3)?,
      active:                row.get(4)?,
      created_at:            row.get(5)?,
      last_reminder_sent_at: row.get(6)?,
    })
  }

  pub fn into_assignment(self) -> Result<Assignment> {
    Ok(Assignment {
      assignment_id:         decode_uuid(&self.assignment_id)?,
      tenant_id:             decode_uuid(&self.tenant_id)?,
      relationship_id:       decode_uuid(&self.relationship_id)?,
      survey_id:             decode_uuid(&self.survey_id)?,
      active:                self.active,
      created_at:            decode_dt(&self.created_at)?,
      last_reminder_sent_at: decode_opt_dt(self.last_reminder_sent_at)?,
    })
  }
}

/// A row produced by [`DETAIL_SELECT`].
pub struct RawAssignmentDetail {
  assignment:        RawAssignment,
  subject_id:        String,
  subject_name:      String,
  evaluator_id:      String,
  evaluator_name:    String,
  relationship_type: String,
  survey_title:      String,
  status:            Option<String>,
}

impl RawAssignmentDetail {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      assignment:        RawAssignment::from_row(row)?,
      subject_id:        row.get(7)?,
      subject_name:      row.get(8)?,
      evaluator_id:      row.get(9)?,
      evaluator_name:    row.get(10)?,
      relationship_type: row.get(11)?,
      survey_title:      row.get(12)?,
      status:            row.get(13)?,
    })
  }

  pub fn into_detail(self) -> Result<AssignmentDetail> {
    Ok(AssignmentDetail {
      assignment:        self.assignment.into_assignment()?,
      subject_id:        decode_uuid(&self.subject_id)?,
      subject_name:      self.subject_name,
      evaluator_id:      decode_uuid(&self.evaluator_id)?,
      evaluator_name:    self.evaluator_name,
      relationship_type: self.relationship_type,
      survey_title:      self.survey_title,
      status:            self.status.as_deref().map(decode_status).transpose()?,
    })
  }
}

pub struct RawSubmission {
  submission_id: String,
  tenant_id:     String,
  assignment_id: String,
  status:        String,
  answers_json:  String,
  created_at:    String,
  updated_at:    String,
  completed_at:  Option<String>,
}

impl RawSubmission {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      submission_id: row.get(0)?,
      tenant_id:     row.get(1)?,
      assignment_id: row.get(2)?,
      status:        row.get(3)?,
      answers_json:  row.get(4)?,
      created_at:    row.get(5)?,
      updated_at:    row.get(6)?,
      completed_at:  row.get(7)?,
    })
  }

  pub fn submission_id(&self) -> &str { &self.submission_id }

  pub fn is_completed(&self) -> bool {
    self.status == SubmissionStatus::Completed.to_string()
  }

  pub fn into_submission(self) -> Result<Submission> {
    Ok(Submission {
      submission_id: decode_uuid(&self.submission_id)?,
      tenant_id:     decode_uuid(&self.tenant_id)?,
      assignment_id: decode_uuid(&self.assignment_id)?,
      status:        decode_status(&self.status)?,
      answers:       serde_json::from_str(&self.answers_json)?,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
      completed_at:  decode_opt_dt(self.completed_at)?,
    })
  }
}

pub struct RawTemplate {
  template_id: String,
  tenant_id:   String,
  name:        String,
  body:        String,
  created_at:  String,
  updated_at:  String,
}

impl RawTemplate {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      template_id: row.get(0)?,
      tenant_id:   row.get(1)?,
      name:        row.get(2)?,
      body:        row.get(3)?,
      created_at:  row.get(4)?,
      updated_at:  row.get(5)?,
    })
  }

  pub fn into_template(self) -> Result<ReportTemplate> {
    Ok(ReportTemplate {
      template_id: decode_uuid(&self.template_id)?,
      tenant_id:   decode_uuid(&self.tenant_id)?,
      name:        self.name,
      body:        self.body,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawPendingReminder {
  assignment_id:   String,
  tenant_id:       String,
  tenant_slug:     String,
  evaluator_id:    String,
  evaluator_name:  String,
  evaluator_email: String,
  subject_name:    String,
  survey_title:    String,
  created_at:      String,
}

impl RawPendingReminder {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      assignment_id:   row.get(0)?,
      tenant_id:       row.get(1)?,
      tenant_slug:     row.get(2)?,
      evaluator_id:    row.get(3)?,
      evaluator_name:  row.get(4)?,
      evaluator_email: row.get(5)?,
      subject_name:    row.get(6)?,
      survey_title:    row.get(7)?,
      created_at:      row.get(8)?,
    })
  }

  pub fn into_pending(self) -> Result<PendingReminder> {
    Ok(PendingReminder {
      assignment_id:   decode_uuid(&self.assignment_id)?,
      tenant_id:       decode_uuid(&self.tenant_id)?,
      tenant_slug:     self.tenant_slug,
      evaluator_id:    decode_uuid(&self.evaluator_id)?,
      evaluator_name:  self.evaluator_name,
      evaluator_email: self.evaluator_email,
      subject_name:    self.subject_name,
      survey_title:    self.survey_title,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}
