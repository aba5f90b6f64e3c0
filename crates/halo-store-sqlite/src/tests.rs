//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use halo_core::{
  Error as CoreError, ErrorKind,
  assignment::{AssignmentQuery, NewAssignment, SubmissionInput, SubmissionStatus},
  auth::{NewUser, Role},
  people::{NewPerson, NewRelationship},
  store::{StoreError as _, SurveyStore},
  survey::{SurveyInput, SurveySchema},
  tenant::NewTenant,
};
use serde_json::json;
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn schema() -> SurveySchema {
  serde_json::from_value(json!({
    "pages": [{
      "name": "main",
      "elements": [
        { "name": "overall", "title": "Overall", "required": true,
          "kind": "rating", "min": 1, "max": 5 },
        { "name": "notes", "title": "Notes", "kind": "comment" }
      ]
    }]
  }))
  .unwrap()
}

fn survey_input(title: &str) -> SurveyInput {
  SurveyInput { title: title.into(), description: None, schema: schema() }
}

fn person(name: &str) -> NewPerson {
  NewPerson {
    name:  name.into(),
    email: format!("{}@example.com", name.to_lowercase()),
  }
}

async fn tenant(s: &SqliteStore, slug: &str) -> Uuid {
  s.create_tenant(NewTenant { slug: slug.into(), name: slug.to_uppercase() })
    .await
    .unwrap()
    .tenant_id
}

/// A tenant with one subject rated by `evaluators` evaluators, plus a survey.
struct Fixture {
  tenant_id:     Uuid,
  subject_id:    Uuid,
  evaluator_ids: Vec<Uuid>,
  relationships: Vec<Uuid>,
  survey_id:     Uuid,
}

async fn fixture(s: &SqliteStore, slug: &str, evaluators: usize) -> Fixture {
  let tenant_id = tenant(s, slug).await;
  let subject = s.add_subject(tenant_id, person("Bob")).await.unwrap();

  let mut evaluator_ids = Vec::new();
  let mut relationships = Vec::new();
  for i in 0..evaluators {
    let e = s
      .add_evaluator(tenant_id, person(&format!("Eval{i}")))
      .await
      .unwrap();
    let r = s
      .add_relationship(tenant_id, NewRelationship {
        subject_id:        subject.subject_id,
        evaluator_id:      e.evaluator_id,
        relationship_type: if i == 0 { "manager".into() } else { "peer".into() },
      })
      .await
      .unwrap();
    evaluator_ids.push(e.evaluator_id);
    relationships.push(r.relationship_id);
  }

  let survey = s.create_survey(tenant_id, survey_input("Leadership")).await.unwrap();

  Fixture {
    tenant_id,
    subject_id: subject.subject_id,
    evaluator_ids,
    relationships,
    survey_id: survey.survey_id,
  }
}

fn completed(overall: i64) -> SubmissionInput {
  SubmissionInput {
    status:  SubmissionStatus::Completed,
    answers: json!({ "overall": overall }).as_object().unwrap().clone(),
  }
}

fn later() -> chrono::DateTime<Utc> { Utc::now() + Duration::days(1) }

// ─── Tenants ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_resolve_tenant() {
  let s = store().await;
  let id = tenant(&s, "acme").await;

  let found = s.get_tenant_by_slug("acme").await.unwrap().unwrap();
  assert_eq!(found.tenant_id, id);
  assert!(found.active);
  assert!(s.get_tenant_by_slug("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_slug_is_conflict() {
  let s = store().await;
  tenant(&s, "acme").await;
  let err = s
    .create_tenant(NewTenant { slug: "acme".into(), name: "Again".into() })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn invalid_slug_rejected() {
  let s = store().await;
  let err = s
    .create_tenant(NewTenant { slug: "Not Valid".into(), name: "x".into() })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::InvalidSlug(_))));
}

#[tokio::test]
async fn deactivate_tenant() {
  let s = store().await;
  let id = tenant(&s, "acme").await;
  let t = s.set_tenant_active(id, false).await.unwrap();
  assert!(!t.active);
  assert_eq!(s.list_tenants().await.unwrap().len(), 1);

  let err = s.set_tenant_active(Uuid::new_v4(), true).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ─── Isolation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn tenant_rows_are_invisible_elsewhere() {
  let s = store().await;
  let a = fixture(&s, "alpha", 1).await;
  let b = tenant(&s, "beta").await;

  assert!(s.list_subjects(b).await.unwrap().is_empty());
  assert!(s.list_evaluators(b).await.unwrap().is_empty());
  assert!(s.list_relationships(b, false).await.unwrap().is_empty());
  assert!(s.get_survey(b, a.survey_id).await.unwrap().is_none());
  assert!(s.list_surveys(b, false).await.unwrap().is_empty());

  let err = s.auto_assign(b, a.survey_id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::SurveyNotFound(_))));
}

#[tokio::test]
async fn cross_tenant_relationship_rejected() {
  let s = store().await;
  let a = fixture(&s, "alpha", 1).await;
  let b = tenant(&s, "beta").await;
  let e = s.add_evaluator(b, person("Outsider")).await.unwrap();

  let err = s
    .add_relationship(a.tenant_id, NewRelationship {
      subject_id:        a.subject_id,
      evaluator_id:      e.evaluator_id,
      relationship_type: "peer".into(),
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::EvaluatorNotFound(_))));
}

#[tokio::test]
async fn duplicate_relationship_is_conflict() {
  let s = store().await;
  let f = fixture(&s, "acme", 1).await;
  let err = s
    .add_relationship(f.tenant_id, NewRelationship {
      subject_id:        f.subject_id,
      evaluator_id:      f.evaluator_ids[0],
      relationship_type: "peer".into(),
    })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn users_are_found_case_insensitively() {
  let s = store().await;
  let f = fixture(&s, "acme", 1).await;

  let user = s
    .create_user(f.tenant_id, NewUser {
      email:         "Eve@Example.com".into(),
      password_hash: "$argon2id$stub".into(),
      role:          Role::Evaluator,
      evaluator_id:  Some(f.evaluator_ids[0]),
    })
    .await
    .unwrap();
  assert_eq!(user.email, "eve@example.com");

  let found = s
    .find_user_by_email(f.tenant_id, "EVE@example.COM")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found.user_id, user.user_id);
  assert_eq!(found.role, Role::Evaluator);
  assert_eq!(found.evaluator_id, Some(f.evaluator_ids[0]));

  let other = tenant(&s, "other").await;
  assert!(s.find_user_by_email(other, "eve@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_user_and_foreign_evaluator_rejected() {
  let s = store().await;
  let f = fixture(&s, "acme", 1).await;
  let new_user = |evaluator_id| NewUser {
    email: "a@b.c".into(),
    password_hash: "h".into(),
    role: Role::Manager,
    evaluator_id,
  };

  s.create_user(f.tenant_id, new_user(None)).await.unwrap();
  let dup = s.create_user(f.tenant_id, new_user(None)).await.unwrap_err();
  assert_eq!(dup.kind(), ErrorKind::Conflict);

  let other = tenant(&s, "other").await;
  let foreign = s
    .create_user(other, new_user(Some(f.evaluator_ids[0])))
    .await
    .unwrap_err();
  assert!(matches!(foreign, Error::Core(CoreError::EvaluatorNotFound(_))));
}

// ─── Surveys ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn survey_crud() {
  let s = store().await;
  let t = tenant(&s, "acme").await;

  let survey = s.create_survey(t, survey_input("First")).await.unwrap();
  let fetched = s.get_survey(t, survey.survey_id).await.unwrap().unwrap();
  assert_eq!(fetched.schema, schema());

  let updated = s
    .update_survey(t, survey.survey_id, SurveyInput {
      title:       "Renamed".into(),
      description: Some("desc".into()),
      schema:      schema(),
    })
    .await
    .unwrap();
  assert_eq!(updated.title, "Renamed");
  assert_eq!(updated.description.as_deref(), Some("desc"));

  s.set_survey_active(t, survey.survey_id, false).await.unwrap();
  assert!(s.list_surveys(t, true).await.unwrap().is_empty());
  assert_eq!(s.list_surveys(t, false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_schema_rejected() {
  let s = store().await;
  let t = tenant(&s, "acme").await;
  let err = s
    .create_survey(t, SurveyInput {
      title:       "Empty".into(),
      description: None,
      schema:      SurveySchema::default(),
    })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Invalid);
}

// ─── Auto-assignment ─────────────────────────────────────────────────────────

#[tokio::test]
async fn auto_assign_with_no_pairs_succeeds_with_zero() {
  let s = store().await;
  let f = fixture(&s, "acme", 0).await;

  let outcome = s.auto_assign(f.tenant_id, f.survey_id).await.unwrap();
  assert_eq!(outcome.assigned, 0);
  assert_eq!(outcome.skipped, 0);
  assert!(outcome.errors.is_empty());
  assert_eq!(outcome.message, "no active subject-evaluator relationships");
}

#[tokio::test]
async fn auto_assign_never_duplicates() {
  let s = store().await;
  let f = fixture(&s, "acme", 3).await;

  let first = s.auto_assign(f.tenant_id, f.survey_id).await.unwrap();
  assert_eq!(first.assigned, 3);
  assert_eq!(first.skipped, 0);

  let second = s.auto_assign(f.tenant_id, f.survey_id).await.unwrap();
  assert_eq!(second.assigned, 0);
  assert_eq!(second.skipped, 3);
  assert_eq!(second.message, "all relationships already assigned");

  let rows = s
    .list_assignments(f.tenant_id, &AssignmentQuery::default())
    .await
    .unwrap();
  assert_eq!(rows.len(), 3);
  let mut pairs: Vec<_> = rows.iter().map(|d| d.assignment.relationship_id).collect();
  pairs.sort();
  pairs.dedup();
  assert_eq!(pairs.len(), 3);
}

#[tokio::test]
async fn auto_assign_skips_manual_and_inactive_pairs() {
  let s = store().await;
  let f = fixture(&s, "acme", 3).await;

  s.assign(f.tenant_id, NewAssignment {
    relationship_id: f.relationships[0],
    survey_id:       f.survey_id,
  })
  .await
  .unwrap();
  s.set_relationship_active(f.tenant_id, f.relationships[1], false)
    .await
    .unwrap();

  let outcome = s.auto_assign(f.tenant_id, f.survey_id).await.unwrap();
  assert_eq!(outcome.assigned, 1);
  assert_eq!(outcome.skipped, 1);
}

#[tokio::test]
async fn auto_assign_row_failure_is_partial_success() {
  let s = store().await;
  let f = fixture(&s, "acme", 3).await;
  let blocked = f.relationships[1];
  s.execute_batch(format!(
    "CREATE TRIGGER block_pair BEFORE INSERT ON assignments
     WHEN NEW.relationship_id = '{blocked}'
     BEGIN SELECT RAISE(ABORT, 'boom'); END;"
  ))
  .await
  .unwrap();

  let outcome = s.auto_assign(f.tenant_id, f.survey_id).await.unwrap();
  assert_eq!(outcome.assigned, 2);
  assert_eq!(outcome.skipped, 1);
  assert_eq!(outcome.errors.len(), 1);
  assert!(outcome.errors[0].contains(&blocked.to_string()));
  assert!(outcome.is_partial());
  assert_eq!(outcome.message, "assigned 2, skipped 1, 1 failed");

  let rows = s
    .list_assignments(f.tenant_id, &AssignmentQuery::default())
    .await
    .unwrap();
  let mut pairs: Vec<_> = rows.iter().map(|d| d.assignment.relationship_id).collect();
  pairs.sort();
  let mut expected = vec![f.relationships[0], f.relationships[2]];
  expected.sort();
  assert_eq!(pairs, expected);
}

#[tokio::test]
async fn auto_assign_inactive_survey_is_invalid() {
  let s = store().await;
  let f = fixture(&s, "acme", 1).await;
  s.set_survey_active(f.tenant_id, f.survey_id, false).await.unwrap();

  let err = s.auto_assign(f.tenant_id, f.survey_id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::SurveyInactive(_))));
}

#[tokio::test]
async fn manual_duplicate_assignment_is_conflict() {
  let s = store().await;
  let f = fixture(&s, "acme", 1).await;
  let input = || NewAssignment {
    relationship_id: f.relationships[0],
    survey_id:       f.survey_id,
  };

  s.assign(f.tenant_id, input()).await.unwrap();
  let err = s.assign(f.tenant_id, input()).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::DuplicateAssignment { .. })));
}

#[tokio::test]
async fn list_assignments_by_evaluator() {
  let s = store().await;
  let f = fixture(&s, "acme", 2).await;
  s.auto_assign(f.tenant_id, f.survey_id).await.unwrap();

  let mine = s
    .list_assignments(f.tenant_id, &AssignmentQuery {
      evaluator_id: Some(f.evaluator_ids[1]),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(mine.len(), 1);
  assert_eq!(mine[0].evaluator_id, f.evaluator_ids[1]);
  assert_eq!(mine[0].subject_name, "Bob");
  assert_eq!(mine[0].survey_title, "Leadership");
  assert_eq!(mine[0].status, None);
}

// ─── Submissions ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn submission_lifecycle() {
  let s = store().await;
  let f = fixture(&s, "acme", 1).await;
  let a = s
    .assign(f.tenant_id, NewAssignment {
      relationship_id: f.relationships[0],
      survey_id:       f.survey_id,
    })
    .await
    .unwrap();

  let draft = s
    .submit(f.tenant_id, a.assignment_id, SubmissionInput {
      status:  SubmissionStatus::InProgress,
      answers: json!({ "notes": "thinking" }).as_object().unwrap().clone(),
    })
    .await
    .unwrap();
  assert_eq!(draft.status, SubmissionStatus::InProgress);
  assert!(draft.completed_at.is_none());

  let done = s.submit(f.tenant_id, a.assignment_id, completed(4)).await.unwrap();
  assert_eq!(done.submission_id, draft.submission_id);
  assert!(done.completed_at.is_some());

  let stored = s.get_submission(f.tenant_id, a.assignment_id).await.unwrap().unwrap();
  assert_eq!(stored.status, SubmissionStatus::Completed);
  assert_eq!(stored.answers["overall"], json!(4));

  let err = s.submit(f.tenant_id, a.assignment_id, completed(5)).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::SubmissionCompleted(_))));

  let detail = s.get_assignment(f.tenant_id, a.assignment_id).await.unwrap().unwrap();
  assert_eq!(detail.status, Some(SubmissionStatus::Completed));
}

#[tokio::test]
async fn draft_racing_completion_never_reports_a_lost_write() {
  for _ in 0..20 {
    let s = store().await;
    let f = fixture(&s, "acme", 1).await;
    let a = s
      .assign(f.tenant_id, NewAssignment {
        relationship_id: f.relationships[0],
        survey_id:       f.survey_id,
      })
      .await
      .unwrap();
    let draft = || SubmissionInput {
      status:  SubmissionStatus::InProgress,
      answers: json!({ "notes": "still thinking" }).as_object().unwrap().clone(),
    };
    s.submit(f.tenant_id, a.assignment_id, draft()).await.unwrap();

    let (done, late) = tokio::join!(
      s.submit(f.tenant_id, a.assignment_id, completed(4)),
      s.submit(f.tenant_id, a.assignment_id, draft()),
    );
    let done = done.unwrap();
    assert_eq!(done.status, SubmissionStatus::Completed);

    match late {
      // The draft landed first and the completion replaced it.
      Ok(saved) => {
        assert_eq!(saved.status, SubmissionStatus::InProgress);
        assert!(saved.updated_at <= done.updated_at);
      }
      Err(err) => {
        assert!(matches!(err, Error::Core(CoreError::SubmissionCompleted(_))));
        assert_eq!(err.kind(), ErrorKind::Conflict);
      }
    }

    let stored = s.get_submission(f.tenant_id, a.assignment_id).await.unwrap().unwrap();
    assert_eq!(stored, done);
  }
}

#[tokio::test]
async fn submission_rejects_bad_answers_and_inactive_assignments() {
  let s = store().await;
  let f = fixture(&s, "acme", 1).await;
  let a = s
    .assign(f.tenant_id, NewAssignment {
      relationship_id: f.relationships[0],
      survey_id:       f.survey_id,
    })
    .await
    .unwrap();

  let err = s.submit(f.tenant_id, a.assignment_id, completed(42)).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::InvalidAnswers(_))));

  s.set_assignment_active(f.tenant_id, a.assignment_id, false).await.unwrap();
  let err = s.submit(f.tenant_id, a.assignment_id, completed(3)).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::AssignmentInactive(_))));
}

// ─── Reminders ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn young_assignments_are_not_candidates() {
  let s = store().await;
  let f = fixture(&s, "acme", 2).await;
  s.auto_assign(f.tenant_id, f.survey_id).await.unwrap();

  let cutoff = Utc::now() - Duration::days(7);
  assert!(s.reminder_candidates(cutoff).await.unwrap().is_empty());
  assert_eq!(s.reminder_candidates(later()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn reminded_assignments_are_not_candidates_again() {
  let s = store().await;
  let f = fixture(&s, "acme", 2).await;
  s.auto_assign(f.tenant_id, f.survey_id).await.unwrap();

  let candidates = s.reminder_candidates(later()).await.unwrap();
  let first = candidates[0].assignment_id;

  assert_eq!(s.mark_reminded(vec![first], Utc::now()).await.unwrap(), 1);
  // A second stamp on the same row is a no-op.
  assert_eq!(s.mark_reminded(vec![first], Utc::now()).await.unwrap(), 0);

  let remaining = s.reminder_candidates(later()).await.unwrap();
  assert_eq!(remaining.len(), 1);
  assert_ne!(remaining[0].assignment_id, first);

  let stamped = s.get_assignment(f.tenant_id, first).await.unwrap().unwrap();
  assert!(stamped.assignment.last_reminder_sent_at.is_some());
}

#[tokio::test]
async fn completed_set_and_candidate_details() {
  let s = store().await;
  let f = fixture(&s, "acme", 2).await;
  s.auto_assign(f.tenant_id, f.survey_id).await.unwrap();
  let candidates = s.reminder_candidates(later()).await.unwrap();
  let done = candidates[0].assignment_id;
  s.submit(f.tenant_id, done, completed(5)).await.unwrap();

  let ids = candidates.iter().map(|c| c.assignment_id).collect();
  let completed_set = s.completed_assignments(ids).await.unwrap();
  assert_eq!(completed_set.len(), 1);
  assert!(completed_set.contains(&done));

  let c = &candidates[1];
  assert_eq!(c.tenant_slug, "acme");
  assert_eq!(c.subject_name, "Bob");
  assert_eq!(c.survey_title, "Leadership");
  assert!(c.evaluator_email.ends_with("@example.com"));

  assert!(s.completed_assignments(vec![]).await.unwrap().is_empty());
}

#[tokio::test]
async fn inactive_tenant_is_skipped_by_reminders() {
  let s = store().await;
  let f = fixture(&s, "acme", 1).await;
  s.auto_assign(f.tenant_id, f.survey_id).await.unwrap();
  s.set_tenant_active(f.tenant_id, false).await.unwrap();
  assert!(s.reminder_candidates(later()).await.unwrap().is_empty());
}

// ─── Reports ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn report_inputs_gather_completed_responses() {
  let s = store().await;
  let f = fixture(&s, "acme", 3).await;
  s.auto_assign(f.tenant_id, f.survey_id).await.unwrap();
  let rows = s
    .list_assignments(f.tenant_id, &AssignmentQuery::default())
    .await
    .unwrap();
  s.submit(f.tenant_id, rows[0].assignment.assignment_id, completed(3)).await.unwrap();
  s.submit(f.tenant_id, rows[1].assignment.assignment_id, completed(5)).await.unwrap();

  let inputs = s
    .report_inputs(f.tenant_id, f.subject_id, f.survey_id)
    .await
    .unwrap();
  assert_eq!(inputs.invited, 3);
  assert_eq!(inputs.responses.len(), 2);
  assert_eq!(inputs.subject.name, "Bob");
  assert_eq!(inputs.tenant.slug, "acme");
}

#[tokio::test]
async fn templates_are_unique_per_tenant() {
  let s = store().await;
  let a = tenant(&s, "alpha").await;
  let b = tenant(&s, "beta").await;
  let t = || halo_core::report::NewTemplate {
    name: "default".into(),
    body: "<h1>{{subject_name}}</h1>".into(),
  };

  let created = s.create_template(a, t()).await.unwrap();
  s.create_template(b, t()).await.unwrap();
  assert_eq!(s.create_template(a, t()).await.unwrap_err().kind(), ErrorKind::Conflict);

  assert!(s.get_template(b, created.template_id).await.unwrap().is_none());
  assert_eq!(s.list_templates(a).await.unwrap().len(), 1);
}
