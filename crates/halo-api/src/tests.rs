//! Router tests against an in-memory store.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use halo_core::{
  assignment::NewAssignment,
  auth::{Principal, Role},
  people::{NewPerson, NewRelationship},
  report::NewTemplate,
  store::SurveyStore,
  survey::SurveyInput,
  tenant::{NewTenant, Tenant},
};
use halo_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::api_router;

struct World {
  store:      Arc<SqliteStore>,
  app:        Router,
  acme:       Tenant,
  globex:     Tenant,
  subject_id: Uuid,
  /// (evaluator_id, relationship_id) per evaluator.
  pairs:      Vec<(Uuid, Uuid)>,
  survey_id:  Uuid,
}

async fn world() -> World {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let acme = store
    .create_tenant(NewTenant { slug: "acme".into(), name: "Acme".into() })
    .await
    .unwrap();
  let globex = store
    .create_tenant(NewTenant { slug: "globex".into(), name: "Globex".into() })
    .await
    .unwrap();

  let t = acme.tenant_id;
  let subject = store
    .add_subject(t, NewPerson { name: "Bob".into(), email: "bob@acme.test".into() })
    .await
    .unwrap();

  let mut pairs = Vec::new();
  for name in ["Eve", "Mallory"] {
    let e = store
      .add_evaluator(t, NewPerson {
        name:  name.into(),
        email: format!("{}@acme.test", name.to_lowercase()),
      })
      .await
      .unwrap();
    let r = store
      .add_relationship(t, NewRelationship {
        subject_id:        subject.subject_id,
        evaluator_id:      e.evaluator_id,
        relationship_type: "peer".into(),
      })
      .await
      .unwrap();
    pairs.push((e.evaluator_id, r.relationship_id));
  }

  let survey = store
    .create_survey(t, SurveyInput {
      title:       "Leadership".into(),
      description: None,
      schema:      serde_json::from_value(json!({
        "pages": [{ "name": "p1", "elements": [
          { "name": "overall", "title": "Overall", "required": true,
            "kind": "rating", "min": 1, "max": 5 }
        ]}]
      }))
      .unwrap(),
    })
    .await
    .unwrap();

  let app = api_router(store.clone(), Router::new());
  World {
    store,
    app,
    acme,
    globex,
    subject_id: subject.subject_id,
    pairs,
    survey_id: survey.survey_id,
  }
}

fn principal(role: Role, tenant: Option<&Tenant>) -> Principal {
  Principal {
    user_id:      Uuid::new_v4(),
    tenant_id:    tenant.map(|t| t.tenant_id),
    role,
    permissions:  role.permissions(),
    evaluator_id: None,
  }
}

fn evaluator(tenant: &Tenant, evaluator_id: Uuid) -> Principal {
  Principal {
    evaluator_id: Some(evaluator_id),
    ..principal(Role::Evaluator, Some(tenant))
  }
}

async fn call(
  app: &Router,
  method: &str,
  uri: &str,
  who: Option<&Principal>,
  body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
  let mut builder = Request::builder().method(method).uri(uri);
  if body.is_some() {
    builder = builder.header(header::CONTENT_TYPE, "application/json");
  }
  let mut req = builder
    .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
    .unwrap();
  if let Some(p) = who {
    req.extensions_mut().insert(p.clone());
  }
  let resp = app.clone().oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  (status, bytes.to_vec())
}

fn json_of(bytes: &[u8]) -> Value { serde_json::from_slice(bytes).unwrap() }

// ─── Tenant resolution ────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_tenant_is_404() {
  let w = world().await;
  let admin = principal(Role::SuperAdmin, None);
  let (status, body) = call(&w.app, "GET", "/t/nope/subjects", Some(&admin), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(json_of(&body)["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn inactive_tenant_is_404() {
  let w = world().await;
  w.store.set_tenant_active(w.globex.tenant_id, false).await.unwrap();
  let admin = principal(Role::TenantAdmin, Some(&w.globex));
  let (status, _) = call(&w.app, "GET", "/t/globex/subjects", Some(&admin), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_principal_is_401() {
  let w = world().await;
  let req = Request::builder()
    .uri("/t/acme/subjects")
    .body(Body::empty())
    .unwrap();
  let resp = w.app.clone().oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert_eq!(resp.headers()[header::WWW_AUTHENTICATE], "Bearer");
}

#[tokio::test]
async fn foreign_principal_is_403() {
  let w = world().await;
  let outsider = principal(Role::TenantAdmin, Some(&w.globex));
  let (status, _) = call(&w.app, "GET", "/t/acme/subjects", Some(&outsider), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let root = principal(Role::SuperAdmin, None);
  let (status, body) = call(&w.app, "GET", "/t/acme/subjects", Some(&root), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(json_of(&body).as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn data_stays_inside_its_tenant() {
  let w = world().await;
  let globex_admin = principal(Role::TenantAdmin, Some(&w.globex));

  for path in ["subjects", "evaluators", "relationships", "surveys", "assignments"] {
    let (status, body) =
      call(&w.app, "GET", &format!("/t/globex/{path}"), Some(&globex_admin), None).await;
    assert_eq!(status, StatusCode::OK, "{path}");
    assert!(json_of(&body).as_array().unwrap().is_empty(), "{path} leaked");
  }

  let (status, _) = call(
    &w.app,
    "GET",
    &format!("/t/globex/surveys/{}", w.survey_id),
    Some(&globex_admin),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Permissions ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn manager_cannot_manage_people() {
  let w = world().await;
  let manager = principal(Role::Manager, Some(&w.acme));
  let (status, _) = call(
    &w.app,
    "POST",
    "/t/acme/subjects",
    Some(&manager),
    Some(json!({ "name": "Zed", "email": "zed@acme.test" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn tenants_are_super_admin_only() {
  let w = world().await;
  let body = json!({ "slug": "initech", "name": "Initech" });

  let admin = principal(Role::TenantAdmin, Some(&w.acme));
  let (status, _) = call(&w.app, "POST", "/tenants", Some(&admin), Some(body.clone())).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let root = principal(Role::SuperAdmin, None);
  let (status, _) = call(&w.app, "POST", "/tenants", Some(&root), Some(body.clone())).await;
  assert_eq!(status, StatusCode::CREATED);
  let (status, _) = call(&w.app, "POST", "/tenants", Some(&root), Some(body)).await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (_, list) = call(&w.app, "GET", "/tenants", Some(&root), None).await;
  assert_eq!(json_of(&list).as_array().unwrap().len(), 3);
}

// ─── Surveys and assignment ───────────────────────────────────────────────────

#[tokio::test]
async fn invalid_schema_is_422() {
  let w = world().await;
  let admin = principal(Role::TenantAdmin, Some(&w.acme));
  let (status, _) = call(
    &w.app,
    "POST",
    "/t/acme/surveys",
    Some(&admin),
    Some(json!({ "title": "Bad", "schema": { "pages": [] } })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn auto_assign_twice() {
  let w = world().await;
  let manager = principal(Role::Manager, Some(&w.acme));
  let uri = format!("/t/acme/surveys/{}/auto-assign", w.survey_id);

  let (status, body) = call(&w.app, "POST", &uri, Some(&manager), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(json_of(&body)["assigned"], 2);

  let (status, body) = call(&w.app, "POST", &uri, Some(&manager), None).await;
  assert_eq!(status, StatusCode::OK);
  let outcome = json_of(&body);
  assert_eq!(outcome["assigned"], 0);
  assert_eq!(outcome["message"], "all relationships already assigned");
}

#[tokio::test]
async fn manual_duplicate_is_409() {
  let w = world().await;
  let manager = principal(Role::Manager, Some(&w.acme));
  let body = json!({ "relationship_id": w.pairs[0].1, "survey_id": w.survey_id });

  let (status, _) =
    call(&w.app, "POST", "/t/acme/assignments", Some(&manager), Some(body.clone())).await;
  assert_eq!(status, StatusCode::CREATED);
  let (status, _) =
    call(&w.app, "POST", "/t/acme/assignments", Some(&manager), Some(body)).await;
  assert_eq!(status, StatusCode::CONFLICT);
}

// ─── Evaluator flow ───────────────────────────────────────────────────────────

#[tokio::test]
async fn evaluators_only_see_and_submit_their_own() {
  let w = world().await;
  w.store.auto_assign(w.acme.tenant_id, w.survey_id).await.unwrap();
  let (eve_id, _) = w.pairs[0];
  let eve = evaluator(&w.acme, eve_id);

  let (status, body) = call(&w.app, "GET", "/t/acme/assignments", Some(&eve), None).await;
  assert_eq!(status, StatusCode::OK);
  let mine = json_of(&body);
  let mine = mine.as_array().unwrap();
  assert_eq!(mine.len(), 1);
  assert_eq!(mine[0]["evaluator_id"], json!(eve_id));
  let my_id = mine[0]["assignment_id"].as_str().unwrap().to_owned();

  let all = w
    .store
    .list_assignments(w.acme.tenant_id, &Default::default())
    .await
    .unwrap();
  let theirs = all
    .iter()
    .find(|d| d.evaluator_id != eve_id)
    .unwrap()
    .assignment
    .assignment_id;

  let (status, _) =
    call(&w.app, "GET", &format!("/t/acme/assignments/{theirs}"), Some(&eve), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let done = json!({ "status": "completed", "answers": { "overall": 4 } });
  let (status, _) = call(
    &w.app,
    "PUT",
    &format!("/t/acme/assignments/{theirs}/submission"),
    Some(&eve),
    Some(done.clone()),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let submission_uri = format!("/t/acme/assignments/{my_id}/submission");
  let (status, _) = call(
    &w.app,
    "PUT",
    &submission_uri,
    Some(&eve),
    Some(json!({ "status": "completed", "answers": {} })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

  let (status, body) =
    call(&w.app, "PUT", &submission_uri, Some(&eve), Some(done.clone())).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(json_of(&body)["status"], "completed");

  let (status, _) = call(&w.app, "PUT", &submission_uri, Some(&eve), Some(done)).await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, body) = call(&w.app, "GET", &submission_uri, Some(&eve), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(json_of(&body)["answers"]["overall"], 4);
}

// ─── Reports ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rendered_report_is_html() {
  let w = world().await;
  let t = w.acme.tenant_id;
  let a = w
    .store
    .assign(t, NewAssignment { relationship_id: w.pairs[0].1, survey_id: w.survey_id })
    .await
    .unwrap();
  w.store
    .submit(t, a.assignment_id, serde_json::from_value(json!({
      "status": "completed", "answers": { "overall": 5 }
    }))
    .unwrap())
    .await
    .unwrap();
  let template = w
    .store
    .create_template(t, NewTemplate {
      name: "summary".into(),
      body: "<h1>{{subject_name}}</h1><p>{{completed_count}}/{{invited_count}}</p>{{unknown}}"
        .into(),
    })
    .await
    .unwrap();

  let manager = principal(Role::Manager, Some(&w.acme));
  let uri = format!(
    "/t/acme/reports/{}?subject_id={}&survey_id={}",
    template.template_id, w.subject_id, w.survey_id
  );
  let (status, body) = call(&w.app, "GET", &uri, Some(&manager), None).await;
  assert_eq!(status, StatusCode::OK);
  let html = String::from_utf8(body).unwrap();
  assert_eq!(html, "<h1>Bob</h1><p>1/1</p>");

  let eve = evaluator(&w.acme, w.pairs[0].0);
  let (status, _) = call(&w.app, "GET", &uri, Some(&eve), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}
