//! Handlers for `/t/{tenant}/surveys` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/t/{tenant}/surveys` | Optional `?active_only=true` |
//! | `POST` | `/t/{tenant}/surveys` | Body: [`SurveyInput`]; schema is validated |
//! | `GET`  | `/t/{tenant}/surveys/{id}` | 404 if not found |
//! | `PUT`  | `/t/{tenant}/surveys/{id}` | Replaces title, description, schema |
//! | `POST` | `/t/{tenant}/surveys/{id}/active` | Body: `{"active":false}` |
//! | `POST` | `/t/{tenant}/surveys/{id}/auto-assign` | Returns [`AutoAssignOutcome`] |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use halo_core::{
  assignment::AutoAssignOutcome,
  auth::Permission,
  store::SurveyStore,
  survey::{Survey, SurveyInput},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  ActiveBody, caller::Caller, error::ApiError, tenant::TenantContext,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub active_only: bool,
}

/// `GET /t/{tenant}/surveys[?active_only=true]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Survey>>, ApiError>
where
  S: SurveyStore,
{
  caller.require_any(&[Permission::ManageSurveys, Permission::AssignSurveys])?;
  let surveys = store
    .list_surveys(tenant.tenant_id, params.active_only)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(surveys))
}

/// `POST /t/{tenant}/surveys`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Json(body): Json<SurveyInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::ManageSurveys)?;
  let survey = store
    .create_survey(tenant.tenant_id, body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(survey)))
}

/// `GET /t/{tenant}/surveys/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Path((_, id)): Path<(String, Uuid)>,
) -> Result<Json<Survey>, ApiError>
where
  S: SurveyStore,
{
  caller.require_any(&[Permission::ManageSurveys, Permission::AssignSurveys])?;
  let survey = store
    .get_survey(tenant.tenant_id, id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("survey {id} not found")))?;
  Ok(Json(survey))
}

/// `PUT /t/{tenant}/surveys/{id}`
pub async fn update<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Path((_, id)): Path<(String, Uuid)>,
  Json(body): Json<SurveyInput>,
) -> Result<Json<Survey>, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::ManageSurveys)?;
  let survey = store
    .update_survey(tenant.tenant_id, id, body)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(survey))
}

/// `POST /t/{tenant}/surveys/{id}/active`
pub async fn set_active<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Path((_, id)): Path<(String, Uuid)>,
  Json(body): Json<ActiveBody>,
) -> Result<Json<Survey>, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::ManageSurveys)?;
  let survey = store
    .set_survey_active(tenant.tenant_id, id, body.active)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(survey))
}

/// `POST /t/{tenant}/surveys/{id}/auto-assign`
///
/// Row-level failures do not fail the request; they are listed in the
/// outcome's `errors`.
pub async fn auto_assign<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Path((_, id)): Path<(String, Uuid)>,
) -> Result<Json<AutoAssignOutcome>, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::AssignSurveys)?;
  let outcome = store
    .auto_assign(tenant.tenant_id, id)
    .await
    .map_err(ApiError::store)?;

  tracing::info!(
    tenant = %tenant.slug,
    survey_id = %id,
    assigned = outcome.assigned,
    skipped = outcome.skipped,
    failed = outcome.errors.len(),
    "auto-assign finished"
  );
  Ok(Json(outcome))
}
