//! Report templates and rendered reports.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/t/{tenant}/templates` | |
//! | `POST` | `/t/{tenant}/templates` | Body: `{"name":"..","body":"<html>.."}` |
//! | `GET`  | `/t/{tenant}/reports?subject_id&survey_id` | Aggregated data as JSON |
//! | `GET`  | `/t/{tenant}/reports/{template_id}?subject_id&survey_id` | `text/html` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::{Html, IntoResponse},
};
use chrono::Utc;
use halo_core::{
  auth::Permission,
  report::{self, NewTemplate, ReportData, ReportTemplate},
  store::SurveyStore,
  tenant::Tenant,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{caller::Caller, error::ApiError, tenant::TenantContext};

// ─── Templates ────────────────────────────────────────────────────────────────

/// `GET /t/{tenant}/templates`
pub async fn list_templates<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
) -> Result<Json<Vec<ReportTemplate>>, ApiError>
where
  S: SurveyStore,
{
  caller.require_any(&[Permission::ManageTemplates, Permission::ViewReports])?;
  let templates = store
    .list_templates(tenant.tenant_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(templates))
}

/// `POST /t/{tenant}/templates`
pub async fn create_template<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Json(body): Json<NewTemplate>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::ManageTemplates)?;
  if body.name.trim().is_empty() {
    return Err(ApiError::BadRequest("template name must not be empty".into()));
  }
  let template = store
    .create_template(tenant.tenant_id, body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(template)))
}

// ─── Reports ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReportParams {
  pub subject_id: Uuid,
  pub survey_id:  Uuid,
}

async fn gather<S>(
  store: &S,
  tenant: &Tenant,
  params: &ReportParams,
) -> Result<ReportData, ApiError>
where
  S: SurveyStore,
{
  let inputs = store
    .report_inputs(tenant.tenant_id, params.subject_id, params.survey_id)
    .await
    .map_err(ApiError::store)?;
  Ok(ReportData::build(&inputs, Utc::now()))
}

/// `GET /t/{tenant}/reports?subject_id=..&survey_id=..`
pub async fn data<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Query(params): Query<ReportParams>,
) -> Result<Json<ReportData>, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::ViewReports)?;
  Ok(Json(gather(store.as_ref(), &tenant, &params).await?))
}

/// `GET /t/{tenant}/reports/{template_id}?subject_id=..&survey_id=..`
pub async fn render<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Path((_, template_id)): Path<(String, Uuid)>,
  Query(params): Query<ReportParams>,
) -> Result<Html<String>, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::ViewReports)?;
  let template = store
    .get_template(tenant.tenant_id, template_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("template {template_id} not found")))?;

  let data = gather(store.as_ref(), &tenant, &params).await?;
  let rendered = report::render(&template.body, &data.placeholders());
  if !rendered.missing.is_empty() {
    tracing::warn!(
      tenant = %tenant.slug,
      template = %template.name,
      missing = ?rendered.missing,
      "template references unknown placeholders"
    );
  }
  Ok(Html(rendered.html))
}
