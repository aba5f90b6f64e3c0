//! [`SqliteStore`]: the SQLite implementation of [`SurveyStore`].

use std::{collections::HashSet, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, Row, types::Value};
use uuid::Uuid;

use halo_core::{
  Error as CoreError,
  assignment::{
    Assignment, AssignmentDetail, AssignmentQuery, AutoAssignOutcome,
    NewAssignment, Submission, SubmissionInput, SubmissionStatus,
    plan_assignments,
  },
  auth::{NewUser, User},
  people::{Evaluator, NewPerson, NewRelationship, Relationship, Subject},
  reminder::PendingReminder,
  report::{CompletedResponse, NewTemplate, ReportInputs, ReportTemplate},
  store::SurveyStore,
  survey::{Survey, SurveyInput},
  tenant::{NewTenant, Tenant, validate_slug},
};

use crate::{
  Error, Result,
  encode::{
    ASSIGNMENT_COLS, DETAIL_SELECT, EVALUATOR_COLS, RELATIONSHIP_COLS,
    RawAssignment, RawAssignmentDetail, RawPendingReminder, RawPerson,
    RawRelationship, RawSubmission, RawSurvey, RawTemplate, RawTenant, RawUser,
    SUBJECT_COLS, SUBMISSION_COLS, SURVEY_COLS, TEMPLATE_COLS, TENANT_COLS,
    USER_COLS, decode_uuid, encode_dt, encode_uuid,
  },
  error::{is_constraint_violation, is_rusqlite_constraint},
  schema::SCHEMA,
};

/// Upper bound on bound parameters per `IN (...)` list.
const IN_CHUNK: usize = 500;

type RowMapper<R> = fn(&Row<'_>) -> rusqlite::Result<R>;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Halo store backed by a single SQLite file.
///
/// Clones share one underlying connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run raw SQL against the connection, for tests that need to rig the
  /// database (triggers, direct updates).
  #[cfg(test)]
  pub(crate) async fn execute_batch(&self, sql: String) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Query helpers ─────────────────────────────────────────────────────────

  async fn query_all<R>(
    &self,
    sql: impl Into<String>,
    params: Vec<Value>,
    map: RowMapper<R>,
  ) -> Result<Vec<R>>
  where
    R: Send + 'static,
  {
    let sql = sql.into();
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), map)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn query_opt<R>(
    &self,
    sql: impl Into<String>,
    params: Vec<Value>,
    map: RowMapper<R>,
  ) -> Result<Option<R>>
  where
    R: Send + 'static,
  {
    let sql = sql.into();
    let row = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params_from_iter(params.iter()), map)
            .optional()?,
        )
      })
      .await?;
    Ok(row)
  }

  async fn exists(&self, sql: &'static str, params: Vec<Value>) -> Result<bool> {
    Ok(self.query_opt(sql, params, |_| Ok(())).await?.is_some())
  }

  /// Run one statement; the raw error is returned so callers can map
  /// constraint violations to domain conflicts.
  async fn execute(
    &self,
    sql: &'static str,
    params: Vec<Value>,
  ) -> std::result::Result<usize, tokio_rusqlite::Error> {
    self
      .conn
      .call(move |conn| {
        Ok(conn.execute(sql, rusqlite::params_from_iter(params.iter()))?)
      })
      .await
  }

  // ── Single-row fetches ────────────────────────────────────────────────────

  async fn get_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>> {
    let raw = self
      .query_opt(
        format!("SELECT {TENANT_COLS} FROM tenants WHERE tenant_id = ?1"),
        vec![encode_uuid(tenant_id).into()],
        RawTenant::from_row,
      )
      .await?;
    raw.map(RawTenant::into_tenant).transpose()
  }

  async fn get_subject(
    &self,
    tenant_id: Uuid,
    subject_id: Uuid,
  ) -> Result<Option<Subject>> {
    let raw = self
      .query_opt(
        format!(
          "SELECT {SUBJECT_COLS} FROM subjects WHERE subject_id = ?1 AND tenant_id = ?2"
        ),
        vec![encode_uuid(subject_id).into(), encode_uuid(tenant_id).into()],
        RawPerson::from_row,
      )
      .await?;
    raw.map(RawPerson::into_subject).transpose()
  }

  async fn get_relationship(
    &self,
    tenant_id: Uuid,
    relationship_id: Uuid,
  ) -> Result<Option<Relationship>> {
    let raw = self
      .query_opt(
        format!(
          "SELECT {RELATIONSHIP_COLS} FROM relationships
           WHERE relationship_id = ?1 AND tenant_id = ?2"
        ),
        vec![encode_uuid(relationship_id).into(), encode_uuid(tenant_id).into()],
        RawRelationship::from_row,
      )
      .await?;
    raw.map(RawRelationship::into_relationship).transpose()
  }

  async fn get_plain_assignment(
    &self,
    tenant_id: Uuid,
    assignment_id: Uuid,
  ) -> Result<Option<Assignment>> {
    let raw = self
      .query_opt(
        format!(
          "SELECT {ASSIGNMENT_COLS} FROM assignments
           WHERE assignment_id = ?1 AND tenant_id = ?2"
        ),
        vec![encode_uuid(assignment_id).into(), encode_uuid(tenant_id).into()],
        RawAssignment::from_row,
      )
      .await?;
    raw.map(RawAssignment::into_assignment).transpose()
  }

  /// Flip the `active` flag on a tenant-scoped row. Returns whether a row
  /// matched.
  async fn set_active(
    &self,
    sql: &'static str,
    tenant_id: Uuid,
    id: Uuid,
    active: bool,
  ) -> Result<bool> {
    let changed = self
      .execute(
        sql,
        vec![active.into(), encode_uuid(id).into(), encode_uuid(tenant_id).into()],
      )
      .await?;
    Ok(changed > 0)
  }
}

/// Map a constraint violation to a domain conflict; pass anything else on.
fn conflict_or_db(e: tokio_rusqlite::Error, message: impl FnOnce() -> String) -> Error {
  if is_constraint_violation(&e) {
    Error::Core(CoreError::Conflict(message()))
  } else {
    Error::Database(e)
  }
}

fn now() -> DateTime<Utc> { Utc::now() }

// ─── SurveyStore impl ────────────────────────────────────────────────────────

impl SurveyStore for SqliteStore {
  type Error = Error;

  // ── Tenants ───────────────────────────────────────────────────────────────

  async fn create_tenant(&self, input: NewTenant) -> Result<Tenant> {
    validate_slug(&input.slug)?;

    let tenant = Tenant {
      tenant_id:  Uuid::new_v4(),
      slug:       input.slug,
      name:       input.name,
      active:     true,
      created_at: now(),
    };

    self
      .execute(
        "INSERT INTO tenants (tenant_id, slug, name, active, created_at)
         VALUES (?1, ?2, ?3, 1, ?4)",
        vec![
          encode_uuid(tenant.tenant_id).into(),
          tenant.slug.clone().into(),
          tenant.name.clone().into(),
          encode_dt(tenant.created_at).into(),
        ],
      )
      .await
      .map_err(|e| {
        conflict_or_db(e, || format!("tenant slug {:?} is taken", tenant.slug))
      })?;

    Ok(tenant)
  }

  async fn get_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>> {
    let raw = self
      .query_opt(
        format!("SELECT {TENANT_COLS} FROM tenants WHERE slug = ?1"),
        vec![slug.to_owned().into()],
        RawTenant::from_row,
      )
      .await?;
    raw.map(RawTenant::into_tenant).transpose()
  }

  async fn list_tenants(&self) -> Result<Vec<Tenant>> {
    let raws = self
      .query_all(
        format!("SELECT {TENANT_COLS} FROM tenants ORDER BY slug"),
        vec![],
        RawTenant::from_row,
      )
      .await?;
    raws.into_iter().map(RawTenant::into_tenant).collect()
  }

  async fn set_tenant_active(&self, tenant_id: Uuid, active: bool) -> Result<Tenant> {
    let changed = self
      .execute(
        "UPDATE tenants SET active = ?1 WHERE tenant_id = ?2",
        vec![active.into(), encode_uuid(tenant_id).into()],
      )
      .await?;
    if changed == 0 {
      return Err(CoreError::TenantNotFound(tenant_id.to_string()).into());
    }
    self
      .get_tenant(tenant_id)
      .await?
      .ok_or_else(|| CoreError::TenantNotFound(tenant_id.to_string()).into())
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, tenant_id: Uuid, input: NewUser) -> Result<User> {
    if let Some(evaluator_id) = input.evaluator_id {
      let found = self
        .exists(
          "SELECT 1 FROM evaluators WHERE evaluator_id = ?1 AND tenant_id = ?2",
          vec![encode_uuid(evaluator_id).into(), encode_uuid(tenant_id).into()],
        )
        .await?;
      if !found {
        return Err(CoreError::EvaluatorNotFound(evaluator_id).into());
      }
    }

    let user = User {
      user_id: Uuid::new_v4(),
      tenant_id,
      email: input.email.trim().to_lowercase(),
      password_hash: input.password_hash,
      role: input.role,
      evaluator_id: input.evaluator_id,
      active: true,
      created_at: now(),
    };

    self
      .execute(
        "INSERT INTO users (user_id, tenant_id, email, password_hash, role,
                            evaluator_id, active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
        vec![
          encode_uuid(user.user_id).into(),
          encode_uuid(tenant_id).into(),
          user.email.clone().into(),
          user.password_hash.clone().into(),
          user.role.to_string().into(),
          user.evaluator_id.map(encode_uuid).into(),
          encode_dt(user.created_at).into(),
        ],
      )
      .await
      .map_err(|e| conflict_or_db(e, || format!("user {} already exists", user.email)))?;

    Ok(user)
  }

  async fn find_user_by_email(&self, tenant_id: Uuid, email: &str) -> Result<Option<User>> {
    let raw = self
      .query_opt(
        format!("SELECT {USER_COLS} FROM users WHERE tenant_id = ?1 AND email = ?2"),
        vec![encode_uuid(tenant_id).into(), email.trim().to_lowercase().into()],
        RawUser::from_row,
      )
      .await?;
    raw.map(RawUser::into_user).transpose()
  }

  // ── People ────────────────────────────────────────────────────────────────

  async fn add_subject(&self, tenant_id: Uuid, input: NewPerson) -> Result<Subject> {
    let subject = Subject {
      subject_id: Uuid::new_v4(),
      tenant_id,
      name: input.name,
      email: input.email,
      active: true,
      created_at: now(),
    };

    self
      .execute(
        "INSERT INTO subjects (subject_id, tenant_id, name, email, active, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5)",
        vec![
          encode_uuid(subject.subject_id).into(),
          encode_uuid(tenant_id).into(),
          subject.name.clone().into(),
          subject.email.clone().into(),
          encode_dt(subject.created_at).into(),
        ],
      )
      .await?;

    Ok(subject)
  }

  async fn list_subjects(&self, tenant_id: Uuid) -> Result<Vec<Subject>> {
    let raws = self
      .query_all(
        format!("SELECT {SUBJECT_COLS} FROM subjects WHERE tenant_id = ?1 ORDER BY name"),
        vec![encode_uuid(tenant_id).into()],
        RawPerson::from_row,
      )
      .await?;
    raws.into_iter().map(RawPerson::into_subject).collect()
  }

  async fn add_evaluator(&self, tenant_id: Uuid, input: NewPerson) -> Result<Evaluator> {
    let evaluator = Evaluator {
      evaluator_id: Uuid::new_v4(),
      tenant_id,
      name: input.name,
      email: input.email,
      active: true,
      created_at: now(),
    };

    self
      .execute(
        "INSERT INTO evaluators (evaluator_id, tenant_id, name, email, active, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5)",
        vec![
          encode_uuid(evaluator.evaluator_id).into(),
          encode_uuid(tenant_id).into(),
          evaluator.name.clone().into(),
          evaluator.email.clone().into(),
          encode_dt(evaluator.created_at).into(),
        ],
      )
      .await?;

    Ok(evaluator)
  }

  async fn list_evaluators(&self, tenant_id: Uuid) -> Result<Vec<Evaluator>> {
    let raws = self
      .query_all(
        format!(
          "SELECT {EVALUATOR_COLS} FROM evaluators WHERE tenant_id = ?1 ORDER BY name"
        ),
        vec![encode_uuid(tenant_id).into()],
        RawPerson::from_row,
      )
      .await?;
    raws.into_iter().map(RawPerson::into_evaluator).collect()
  }

  // ── Relationships ─────────────────────────────────────────────────────────

  async fn add_relationship(
    &self,
    tenant_id: Uuid,
    input: NewRelationship,
  ) -> Result<Relationship> {
    if self.get_subject(tenant_id, input.subject_id).await?.is_none() {
      return Err(CoreError::SubjectNotFound(input.subject_id).into());
    }
    let evaluator_found = self
      .exists(
        "SELECT 1 FROM evaluators WHERE evaluator_id = ?1 AND tenant_id = ?2",
        vec![encode_uuid(input.evaluator_id).into(), encode_uuid(tenant_id).into()],
      )
      .await?;
    if !evaluator_found {
      return Err(CoreError::EvaluatorNotFound(input.evaluator_id).into());
    }

    let relationship = Relationship {
      relationship_id: Uuid::new_v4(),
      tenant_id,
      subject_id: input.subject_id,
      evaluator_id: input.evaluator_id,
      relationship_type: input.relationship_type,
      active: true,
      created_at: now(),
    };

    self
      .execute(
        "INSERT INTO relationships (relationship_id, tenant_id, subject_id,
                                    evaluator_id, relationship_type, active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
        vec![
          encode_uuid(relationship.relationship_id).into(),
          encode_uuid(tenant_id).into(),
          encode_uuid(relationship.subject_id).into(),
          encode_uuid(relationship.evaluator_id).into(),
          relationship.relationship_type.clone().into(),
          encode_dt(relationship.created_at).into(),
        ],
      )
      .await
      .map_err(|e| {
        conflict_or_db(e, || {
          format!(
            "subject {} already has evaluator {}",
            relationship.subject_id, relationship.evaluator_id
          )
        })
      })?;

    Ok(relationship)
  }

  async fn list_relationships(
    &self,
    tenant_id: Uuid,
    active_only: bool,
  ) -> Result<Vec<Relationship>> {
    let filter = if active_only { "AND active = 1" } else { "" };
    let raws = self
      .query_all(
        format!(
          "SELECT {RELATIONSHIP_COLS} FROM relationships
           WHERE tenant_id = ?1 {filter}
           ORDER BY created_at"
        ),
        vec![encode_uuid(tenant_id).into()],
        RawRelationship::from_row,
      )
      .await?;
    raws.into_iter().map(RawRelationship::into_relationship).collect()
  }

  async fn set_relationship_active(
    &self,
    tenant_id: Uuid,
    relationship_id: Uuid,
    active: bool,
  ) -> Result<Relationship> {
    let found = self
      .set_active(
        "UPDATE relationships SET active = ?1 WHERE relationship_id = ?2 AND tenant_id = ?3",
        tenant_id,
        relationship_id,
        active,
      )
      .await?;
    if !found {
      return Err(CoreError::RelationshipNotFound(relationship_id).into());
    }
    self
      .get_relationship(tenant_id, relationship_id)
      .await?
      .ok_or_else(|| CoreError::RelationshipNotFound(relationship_id).into())
  }

  // ── Surveys ───────────────────────────────────────────────────────────────

  async fn create_survey(&self, tenant_id: Uuid, input: SurveyInput) -> Result<Survey> {
    input.schema.validate()?;

    let at = now();
    let survey = Survey {
      survey_id: Uuid::new_v4(),
      tenant_id,
      title: input.title,
      description: input.description,
      schema: input.schema,
      active: true,
      created_at: at,
      updated_at: at,
    };

    self
      .execute(
        "INSERT INTO surveys (survey_id, tenant_id, title, description,
                              schema_json, active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
        vec![
          encode_uuid(survey.survey_id).into(),
          encode_uuid(tenant_id).into(),
          survey.title.clone().into(),
          survey.description.clone().into(),
          serde_json::to_string(&survey.schema)?.into(),
          encode_dt(at).into(),
        ],
      )
      .await?;

    Ok(survey)
  }

  async fn get_survey(&self, tenant_id: Uuid, survey_id: Uuid) -> Result<Option<Survey>> {
    let raw = self
      .query_opt(
        format!("SELECT {SURVEY_COLS} FROM surveys WHERE survey_id = ?1 AND tenant_id = ?2"),
        vec![encode_uuid(survey_id).into(), encode_uuid(tenant_id).into()],
        RawSurvey::from_row,
      )
      .await?;
    raw.map(RawSurvey::into_survey).transpose()
  }

  async fn list_surveys(&self, tenant_id: Uuid, active_only: bool) -> Result<Vec<Survey>> {
    let filter = if active_only { "AND active = 1" } else { "" };
    let raws = self
      .query_all(
        format!(
          "SELECT {SURVEY_COLS} FROM surveys
           WHERE tenant_id = ?1 {filter}
           ORDER BY created_at"
        ),
        vec![encode_uuid(tenant_id).into()],
        RawSurvey::from_row,
      )
      .await?;
    raws.into_iter().map(RawSurvey::into_survey).collect()
  }

  async fn update_survey(
    &self,
    tenant_id: Uuid,
    survey_id: Uuid,
    input: SurveyInput,
  ) -> Result<Survey> {
    input.schema.validate()?;

    let changed = self
      .execute(
        "UPDATE surveys SET title = ?1, description = ?2, schema_json = ?3, updated_at = ?4
         WHERE survey_id = ?5 AND tenant_id = ?6",
        vec![
          input.title.into(),
          input.description.into(),
          serde_json::to_string(&input.schema)?.into(),
          encode_dt(now()).into(),
          encode_uuid(survey_id).into(),
          encode_uuid(tenant_id).into(),
        ],
      )
      .await?;
    if changed == 0 {
      return Err(CoreError::SurveyNotFound(survey_id).into());
    }
    self
      .get_survey(tenant_id, survey_id)
      .await?
      .ok_or_else(|| CoreError::SurveyNotFound(survey_id).into())
  }

  async fn set_survey_active(
    &self,
    tenant_id: Uuid,
    survey_id: Uuid,
    active: bool,
  ) -> Result<Survey> {
    let found = self
      .set_active(
        "UPDATE surveys SET active = ?1 WHERE survey_id = ?2 AND tenant_id = ?3",
        tenant_id,
        survey_id,
        active,
      )
      .await?;
    if !found {
      return Err(CoreError::SurveyNotFound(survey_id).into());
    }
    self
      .get_survey(tenant_id, survey_id)
      .await?
      .ok_or_else(|| CoreError::SurveyNotFound(survey_id).into())
  }

  // ── Assignments ───────────────────────────────────────────────────────────

  async fn assign(&self, tenant_id: Uuid, input: NewAssignment) -> Result<Assignment> {
    let survey = self
      .get_survey(tenant_id, input.survey_id)
      .await?
      .ok_or(CoreError::SurveyNotFound(input.survey_id))?;
    if !survey.active {
      return Err(CoreError::SurveyInactive(survey.survey_id).into());
    }
    if self.get_relationship(tenant_id, input.relationship_id).await?.is_none() {
      return Err(CoreError::RelationshipNotFound(input.relationship_id).into());
    }

    let assignment = Assignment {
      assignment_id: Uuid::new_v4(),
      tenant_id,
      relationship_id: input.relationship_id,
      survey_id: input.survey_id,
      active: true,
      created_at: now(),
      last_reminder_sent_at: None,
    };

    self
      .execute(
        "INSERT INTO assignments (assignment_id, tenant_id, relationship_id,
                                  survey_id, active, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5)",
        vec![
          encode_uuid(assignment.assignment_id).into(),
          encode_uuid(tenant_id).into(),
          encode_uuid(assignment.relationship_id).into(),
          encode_uuid(assignment.survey_id).into(),
          encode_dt(assignment.created_at).into(),
        ],
      )
      .await
      .map_err(|e| {
        if is_constraint_violation(&e) {
          CoreError::DuplicateAssignment {
            relationship_id: assignment.relationship_id,
            survey_id:       assignment.survey_id,
          }
          .into()
        } else {
          Error::Database(e)
        }
      })?;

    Ok(assignment)
  }

  async fn auto_assign(&self, tenant_id: Uuid, survey_id: Uuid) -> Result<AutoAssignOutcome> {
    let survey = self
      .get_survey(tenant_id, survey_id)
      .await?
      .ok_or(CoreError::SurveyNotFound(survey_id))?;
    if !survey.active {
      return Err(CoreError::SurveyInactive(survey_id).into());
    }

    let tenant_str = encode_uuid(tenant_id);
    let survey_str = encode_uuid(survey_id);

    let active_pairs: Vec<Uuid> = self
      .query_all(
        "SELECT r.relationship_id
         FROM relationships r
         JOIN subjects   s ON s.subject_id   = r.subject_id
         JOIN evaluators e ON e.evaluator_id = r.evaluator_id
         WHERE r.tenant_id = ?1
           AND r.active = 1 AND s.active = 1 AND e.active = 1
         ORDER BY r.created_at",
        vec![tenant_str.clone().into()],
        |row| row.get::<_, String>(0),
      )
      .await?
      .iter()
      .map(|s| decode_uuid(s))
      .collect::<Result<_>>()?;

    let existing: HashSet<Uuid> = self
      .query_all(
        "SELECT relationship_id FROM assignments WHERE tenant_id = ?1 AND survey_id = ?2",
        vec![tenant_str.clone().into(), survey_str.clone().into()],
        |row| row.get::<_, String>(0),
      )
      .await?
      .iter()
      .map(|s| decode_uuid(s))
      .collect::<Result<_>>()?;

    let plan = plan_assignments(&active_pairs, &existing);
    if plan.to_assign.is_empty() {
      return Ok(AutoAssignOutcome::new(
        survey_id,
        active_pairs.len(),
        0,
        plan.skipped,
        Vec::new(),
      ));
    }

    let created_at = encode_dt(now());
    let rows: Vec<(String, String)> = plan
      .to_assign
      .iter()
      .map(|pair| (encode_uuid(Uuid::new_v4()), encode_uuid(*pair)))
      .collect();

    let (assigned, errors) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut assigned = 0usize;
        let mut errors = Vec::new();
        {
          let mut stmt = tx.prepare(
            "INSERT INTO assignments (assignment_id, tenant_id, relationship_id,
                                      survey_id, active, created_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)",
          )?;
          for (assignment_id, pair) in &rows {
            match stmt.execute(rusqlite::params![
              assignment_id,
              tenant_str,
              pair,
              survey_str,
              created_at
            ]) {
              Ok(_) => assigned += 1,
              Err(e) if is_rusqlite_constraint(&e) => {
                errors.push(format!("relationship {pair}: {e}"));
              }
              Err(e) => return Err(e.into()),
            }
          }
        }
        tx.commit()?;
        Ok((assigned, errors))
      })
      .await?;

    for error in &errors {
      tracing::warn!(%tenant_id, %survey_id, %error, "auto-assign row rejected");
    }

    let skipped = plan.skipped + errors.len();
    Ok(AutoAssignOutcome::new(survey_id, active_pairs.len(), assigned, skipped, errors))
  }

  async fn get_assignment(
    &self,
    tenant_id: Uuid,
    assignment_id: Uuid,
  ) -> Result<Option<AssignmentDetail>> {
    let raw = self
      .query_opt(
        format!("{DETAIL_SELECT} WHERE a.assignment_id = ?1 AND a.tenant_id = ?2"),
        vec![encode_uuid(assignment_id).into(), encode_uuid(tenant_id).into()],
        RawAssignmentDetail::from_row,
      )
      .await?;
    raw.map(RawAssignmentDetail::into_detail).transpose()
  }

  async fn list_assignments(
    &self,
    tenant_id: Uuid,
    query: &AssignmentQuery,
  ) -> Result<Vec<AssignmentDetail>> {
    let mut conds = vec!["a.tenant_id = ?1".to_owned()];
    let mut params: Vec<Value> = vec![encode_uuid(tenant_id).into()];

    if let Some(survey_id) = query.survey_id {
      params.push(encode_uuid(survey_id).into());
      conds.push(format!("a.survey_id = ?{}", params.len()));
    }
    if let Some(evaluator_id) = query.evaluator_id {
      params.push(encode_uuid(evaluator_id).into());
      conds.push(format!("r.evaluator_id = ?{}", params.len()));
    }
    if query.active_only {
      conds.push("a.active = 1".to_owned());
    }

    let sql = format!(
      "{DETAIL_SELECT} WHERE {} ORDER BY a.created_at",
      conds.join(" AND ")
    );
    let raws = self
      .query_all(sql, params, RawAssignmentDetail::from_row)
      .await?;
    raws.into_iter().map(RawAssignmentDetail::into_detail).collect()
  }

  async fn set_assignment_active(
    &self,
    tenant_id: Uuid,
    assignment_id: Uuid,
    active: bool,
  ) -> Result<Assignment> {
    let found = self
      .set_active(
        "UPDATE assignments SET active = ?1 WHERE assignment_id = ?2 AND tenant_id = ?3",
        tenant_id,
        assignment_id,
        active,
      )
      .await?;
    if !found {
      return Err(CoreError::AssignmentNotFound(assignment_id).into());
    }
    self
      .get_plain_assignment(tenant_id, assignment_id)
      .await?
      .ok_or_else(|| CoreError::AssignmentNotFound(assignment_id).into())
  }

  // ── Submissions ───────────────────────────────────────────────────────────

  async fn submit(
    &self,
    tenant_id: Uuid,
    assignment_id: Uuid,
    input: SubmissionInput,
  ) -> Result<Submission> {
    let assignment = self
      .get_plain_assignment(tenant_id, assignment_id)
      .await?
      .ok_or(CoreError::AssignmentNotFound(assignment_id))?;
    if !assignment.active {
      return Err(CoreError::AssignmentInactive(assignment_id).into());
    }

    let survey = self
      .get_survey(tenant_id, assignment.survey_id)
      .await?
      .ok_or(CoreError::SurveyNotFound(assignment.survey_id))?;
    let completing = input.status == SubmissionStatus::Completed;
    survey.schema.validate_answers(&input.answers, completing)?;

    let status = input.status.to_string();
    let answers_json = serde_json::to_string(&input.answers)?;
    let tenant_str = encode_uuid(tenant_id);
    let assignment_str = encode_uuid(assignment_id);

    // Check and write under one transaction; a completed row is final.
    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let select = format!(
          "SELECT {SUBMISSION_COLS} FROM submissions
           WHERE assignment_id = ?1 AND tenant_id = ?2"
        );
        let existing = tx
          .query_row(
            &select,
            rusqlite::params![assignment_str, tenant_str],
            RawSubmission::from_row,
          )
          .optional()?;

        if existing.as_ref().is_some_and(|raw| raw.is_completed()) {
          return Ok(None);
        }

        let at = encode_dt(now());
        let completed_at = completing.then(|| at.clone());
        match existing {
          Some(prev) => {
            tx.execute(
              "UPDATE submissions
               SET status = ?1, answers_json = ?2, updated_at = ?3, completed_at = ?4
               WHERE submission_id = ?5",
              rusqlite::params![
                status,
                answers_json,
                at,
                completed_at,
                prev.submission_id()
              ],
            )?;
          }
          None => {
            tx.execute(
              "INSERT INTO submissions (submission_id, tenant_id, assignment_id, status,
                                        answers_json, created_at, updated_at, completed_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7)",
              rusqlite::params![
                encode_uuid(Uuid::new_v4()),
                tenant_str,
                assignment_str,
                status,
                answers_json,
                at,
                completed_at
              ],
            )?;
          }
        }

        let row = tx.query_row(
          &select,
          rusqlite::params![assignment_str, tenant_str],
          RawSubmission::from_row,
        )?;
        tx.commit()?;
        Ok(Some(row))
      })
      .await
      .map_err(|e| {
        conflict_or_db(e, || {
          format!("assignment {assignment_id} already has a submission")
        })
      })?;

    match written {
      Some(raw) => raw.into_submission(),
      None => Err(CoreError::SubmissionCompleted(assignment_id).into()),
    }
  }

  async fn get_submission(
    &self,
    tenant_id: Uuid,
    assignment_id: Uuid,
  ) -> Result<Option<Submission>> {
    let raw = self
      .query_opt(
        format!(
          "SELECT {SUBMISSION_COLS} FROM submissions
           WHERE assignment_id = ?1 AND tenant_id = ?2"
        ),
        vec![encode_uuid(assignment_id).into(), encode_uuid(tenant_id).into()],
        RawSubmission::from_row,
      )
      .await?;
    raw.map(RawSubmission::into_submission).transpose()
  }

  // ── Reminders ─────────────────────────────────────────────────────────────

  async fn reminder_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<PendingReminder>> {
    let raws = self
      .query_all(
        "SELECT a.assignment_id, a.tenant_id, t.slug,
                e.evaluator_id, e.name, e.email,
                s.name, v.title, a.created_at
         FROM assignments a
         JOIN tenants       t ON t.tenant_id       = a.tenant_id
         JOIN relationships r ON r.relationship_id = a.relationship_id
         JOIN subjects      s ON s.subject_id      = r.subject_id
         JOIN evaluators    e ON e.evaluator_id    = r.evaluator_id
         JOIN surveys       v ON v.survey_id       = a.survey_id
         WHERE a.active = 1
           AND a.last_reminder_sent_at IS NULL
           AND a.created_at <= ?1
           AND t.active = 1 AND r.active = 1 AND s.active = 1
           AND e.active = 1 AND v.active = 1
         ORDER BY a.created_at",
        vec![encode_dt(cutoff).into()],
        RawPendingReminder::from_row,
      )
      .await?;
    raws.into_iter().map(RawPendingReminder::into_pending).collect()
  }

  async fn completed_assignments(&self, assignment_ids: Vec<Uuid>) -> Result<HashSet<Uuid>> {
    if assignment_ids.is_empty() {
      return Ok(HashSet::new());
    }
    let ids: Vec<String> = assignment_ids.into_iter().map(encode_uuid).collect();

    let found: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut found = Vec::new();
        for chunk in ids.chunks(IN_CHUNK) {
          let placeholders = vec!["?"; chunk.len()].join(", ");
          let sql = format!(
            "SELECT assignment_id FROM submissions
             WHERE status = 'completed' AND assignment_id IN ({placeholders})"
          );
          let mut stmt = conn.prepare(&sql)?;
          let rows = stmt
            .query_map(rusqlite::params_from_iter(chunk.iter()), |row| {
              row.get::<_, String>(0)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          found.extend(rows);
        }
        Ok(found)
      })
      .await?;

    found.iter().map(|s| decode_uuid(s)).collect()
  }

  async fn mark_reminded(&self, assignment_ids: Vec<Uuid>, at: DateTime<Utc>) -> Result<usize> {
    if assignment_ids.is_empty() {
      return Ok(0);
    }
    let ids: Vec<String> = assignment_ids.into_iter().map(encode_uuid).collect();
    let at_str = encode_dt(at);

    let stamped = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut stamped = 0;
        {
          let mut stmt = tx.prepare(
            "UPDATE assignments SET last_reminder_sent_at = ?1
             WHERE assignment_id = ?2 AND last_reminder_sent_at IS NULL",
          )?;
          for id in &ids {
            stamped += stmt.execute(rusqlite::params![at_str, id])?;
          }
        }
        tx.commit()?;
        Ok(stamped)
      })
      .await?;

    Ok(stamped)
  }

  // ── Reports ───────────────────────────────────────────────────────────────

  async fn create_template(
    &self,
    tenant_id: Uuid,
    input: NewTemplate,
  ) -> Result<ReportTemplate> {
    let at = now();
    let template = ReportTemplate {
      template_id: Uuid::new_v4(),
      tenant_id,
      name: input.name,
      body: input.body,
      created_at: at,
      updated_at: at,
    };

    self
      .execute(
        "INSERT INTO report_templates (template_id, tenant_id, name, body,
                                       created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        vec![
          encode_uuid(template.template_id).into(),
          encode_uuid(tenant_id).into(),
          template.name.clone().into(),
          template.body.clone().into(),
          encode_dt(at).into(),
        ],
      )
      .await
      .map_err(|e| conflict_or_db(e, || format!("template {:?} already exists", template.name)))?;

    Ok(template)
  }

  async fn list_templates(&self, tenant_id: Uuid) -> Result<Vec<ReportTemplate>> {
    let raws = self
      .query_all(
        format!(
          "SELECT {TEMPLATE_COLS} FROM report_templates WHERE tenant_id = ?1 ORDER BY name"
        ),
        vec![encode_uuid(tenant_id).into()],
        RawTemplate::from_row,
      )
      .await?;
    raws.into_iter().map(RawTemplate::into_template).collect()
  }

  async fn get_template(
    &self,
    tenant_id: Uuid,
    template_id: Uuid,
  ) -> Result<Option<ReportTemplate>> {
    let raw = self
      .query_opt(
        format!(
          "SELECT {TEMPLATE_COLS} FROM report_templates
           WHERE template_id = ?1 AND tenant_id = ?2"
        ),
        vec![encode_uuid(template_id).into(), encode_uuid(tenant_id).into()],
        RawTemplate::from_row,
      )
      .await?;
    raw.map(RawTemplate::into_template).transpose()
  }

  async fn report_inputs(
    &self,
    tenant_id: Uuid,
    subject_id: Uuid,
    survey_id: Uuid,
  ) -> Result<ReportInputs> {
    let tenant = self
      .get_tenant(tenant_id)
      .await?
      .ok_or_else(|| CoreError::TenantNotFound(tenant_id.to_string()))?;
    let subject = self
      .get_subject(tenant_id, subject_id)
      .await?
      .ok_or(CoreError::SubjectNotFound(subject_id))?;
    let survey = self
      .get_survey(tenant_id, survey_id)
      .await?
      .ok_or(CoreError::SurveyNotFound(survey_id))?;

    let scope: Vec<Value> = vec![
      encode_uuid(tenant_id).into(),
      encode_uuid(subject_id).into(),
      encode_uuid(survey_id).into(),
    ];

    let invited = self
      .query_opt(
        "SELECT COUNT(*) FROM assignments a
         JOIN relationships r ON r.relationship_id = a.relationship_id
         WHERE a.tenant_id = ?1 AND r.subject_id = ?2 AND a.survey_id = ?3
           AND a.active = 1",
        scope.clone(),
        |row| row.get::<_, i64>(0),
      )
      .await?
      .unwrap_or(0);

    let rows = self
      .query_all(
        "SELECT r.relationship_type, sub.answers_json
         FROM submissions sub
         JOIN assignments   a ON a.assignment_id   = sub.assignment_id
         JOIN relationships r ON r.relationship_id = a.relationship_id
         WHERE a.tenant_id = ?1 AND r.subject_id = ?2 AND a.survey_id = ?3
           AND a.active = 1 AND sub.status = 'completed'
         ORDER BY sub.completed_at",
        scope,
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
      )
      .await?;

    let responses = rows
      .into_iter()
      .map(|(relationship_type, answers)| {
        Ok(CompletedResponse {
          relationship_type,
          answers: serde_json::from_str(&answers)?,
        })
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(ReportInputs {
      tenant,
      subject,
      survey,
      invited: usize::try_from(invited).unwrap_or(0),
      responses,
    })
  }
}
