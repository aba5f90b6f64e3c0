//! Handlers for `/t/{tenant}/subjects`, `/t/{tenant}/evaluators` and
//! `/t/{tenant}/relationships`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use halo_core::{
  auth::Permission,
  people::{Evaluator, NewPerson, NewRelationship, Relationship, Subject},
  store::SurveyStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  ActiveBody, caller::Caller, error::ApiError, tenant::TenantContext,
};

fn check_person(body: &NewPerson) -> Result<(), ApiError> {
  if body.name.trim().is_empty() {
    return Err(ApiError::BadRequest("name must not be empty".into()));
  }
  if !body.email.contains('@') {
    return Err(ApiError::BadRequest(format!("invalid email {:?}", body.email)));
  }
  Ok(())
}

// ─── Subjects ─────────────────────────────────────────────────────────────────

/// `GET /t/{tenant}/subjects`
pub async fn list_subjects<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
) -> Result<Json<Vec<Subject>>, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::ManagePeople)?;
  let subjects = store
    .list_subjects(tenant.tenant_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(subjects))
}

/// `POST /t/{tenant}/subjects`, body: `{"name":"..","email":".."}`
pub async fn create_subject<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Json(body): Json<NewPerson>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::ManagePeople)?;
  check_person(&body)?;
  let subject = store
    .add_subject(tenant.tenant_id, body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(subject)))
}

// ─── Evaluators ───────────────────────────────────────────────────────────────

/// `GET /t/{tenant}/evaluators`
pub async fn list_evaluators<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
) -> Result<Json<Vec<Evaluator>>, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::ManagePeople)?;
  let evaluators = store
    .list_evaluators(tenant.tenant_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(evaluators))
}

/// `POST /t/{tenant}/evaluators`
pub async fn create_evaluator<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Json(body): Json<NewPerson>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::ManagePeople)?;
  check_person(&body)?;
  let evaluator = store
    .add_evaluator(tenant.tenant_id, body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(evaluator)))
}

// ─── Relationships ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct RelationshipParams {
  #[serde(default)]
  pub active_only: bool,
}

/// `GET /t/{tenant}/relationships[?active_only=true]`
pub async fn list_relationships<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Query(params): Query<RelationshipParams>,
) -> Result<Json<Vec<Relationship>>, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::ManagePeople)?;
  let relationships = store
    .list_relationships(tenant.tenant_id, params.active_only)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(relationships))
}

/// `POST /t/{tenant}/relationships`, body: [`NewRelationship`]
pub async fn create_relationship<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Json(body): Json<NewRelationship>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::ManagePeople)?;
  if body.relationship_type.trim().is_empty() {
    return Err(ApiError::BadRequest("relationship_type must not be empty".into()));
  }
  let relationship = store
    .add_relationship(tenant.tenant_id, body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(relationship)))
}

/// `POST /t/{tenant}/relationships/{id}/active`
pub async fn set_relationship_active<S>(
  State(store): State<Arc<S>>,
  TenantContext(tenant): TenantContext,
  caller: Caller,
  Path((_, id)): Path<(String, Uuid)>,
  Json(body): Json<ActiveBody>,
) -> Result<Json<Relationship>, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::ManagePeople)?;
  let relationship = store
    .set_relationship_active(tenant.tenant_id, id, body.active)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(relationship))
}
