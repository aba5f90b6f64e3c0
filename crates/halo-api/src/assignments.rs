//! Handlers for `/t/{tenant}/assignments` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/t/{tenant}/assignments` | `?survey_id`, `?evaluator_id`, `?active_only`; evaluators see their own |
//! | `POST` | `/t/{tenant}/assignments` | Body: [`NewAssignment`]; 409 on duplicate |
//! | `GET`  | `/t/{tenant}/assignments/{id}` | Detail incl. submission status |
//! | `POST` | `/t/{tenant}/assignments/{id}/active` | Body: `{"active":false}` |
//! | `GET`  | `/t/{tenant}/assignments/{id}/submission` | 404 until something is saved |
//! | `PUT`  | `/t/{tenant}/assignments/{id}/submission` | Body: [`SubmissionInput`]; own only |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use halo_core::{
  assignment::{
    Assignment, AssignmentDetail, AssignmentQuery, NewAssignment, Submission,
    SubmissionInput,
  },
  auth::Permission,
  store::SurveyStore,
  tenant::Tenant,
};
use uuid::Uuid;

use crate::{
  ActiveBody, caller::Caller, error::ApiError, tenant::TenantContext,
};

/// Fetch an assignment the caller may see. Invisible rows are reported as
/// missing.
async fn visible<S>(
  store: &S,
  tenant: &Tenant,
  caller: &Caller,
  id: Uuid,
) -> Result<AssignmentDetail, ApiError>
where
  S: SurveyStore,
{
  store
    .get_assignment(tenant.tenant_id, id)
    .await
    .map_err(ApiError::store)?
    .filter(|d| caller.can_view(d))
    .ok_or_else(|| ApiError::NotFound(format!("assignment {id} not found")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /t/{tenant}/assignments`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Query(mut query): Query<AssignmentQuery>,
) -> Result<Json<Vec<AssignmentDetail>>, ApiError>
where
  S: SurveyStore,
{
  if !caller.0.has(Permission::AssignSurveys) {
    caller.require(Permission::SubmitSurveys)?;
    let own = caller
      .0
      .evaluator_id
      .ok_or_else(|| ApiError::Forbidden("login is not linked to an evaluator".into()))?;
    query.evaluator_id = Some(own);
  }

  let assignments = store
    .list_assignments(tenant.tenant_id, &query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(assignments))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /t/{tenant}/assignments`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Json(body): Json<NewAssignment>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::AssignSurveys)?;
  let assignment = store
    .assign(tenant.tenant_id, body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(assignment)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /t/{tenant}/assignments/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Path((_, id)): Path<(String, Uuid)>,
) -> Result<Json<AssignmentDetail>, ApiError>
where
  S: SurveyStore,
{
  let detail = visible(store.as_ref(), &tenant, &caller, id).await?;
  Ok(Json(detail))
}

/// `POST /t/{tenant}/assignments/{id}/active`
pub async fn set_active<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Path((_, id)): Path<(String, Uuid)>,
  Json(body): Json<ActiveBody>,
) -> Result<Json<Assignment>, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::AssignSurveys)?;
  let assignment = store
    .set_assignment_active(tenant.tenant_id, id, body.active)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(assignment))
}

// ─── Submission ───────────────────────────────────────────────────────────────

/// `GET /t/{tenant}/assignments/{id}/submission`
pub async fn get_submission<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Path((_, id)): Path<(String, Uuid)>,
) -> Result<Json<Submission>, ApiError>
where
  S: SurveyStore,
{
  visible(store.as_ref(), &tenant, &caller, id).await?;
  let submission = store
    .get_submission(tenant.tenant_id, id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("no submission for assignment {id}")))?;
  Ok(Json(submission))
}

/// `PUT /t/{tenant}/assignments/{id}/submission`
///
/// Only the assigned evaluator may write. A completed submission is final.
pub async fn put_submission<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Path((_, id)): Path<(String, Uuid)>,
  Json(body): Json<SubmissionInput>,
) -> Result<Json<Submission>, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::SubmitSurveys)?;
  let detail = visible(store.as_ref(), &tenant, &caller, id).await?;
  if !caller.owns(&detail) {
    return Err(ApiError::Forbidden(
      "only the assigned evaluator may submit".into(),
    ));
  }

  let submission = store
    .submit(tenant.tenant_id, id, body)
    .await
    .map_err(ApiError::store)?;

  tracing::info!(
    tenant = %tenant.slug,
    assignment_id = %id,
    status = %submission.status,
    "submission saved"
  );
  Ok(Json(submission))
}
