//! Handlers for `/tenants` endpoints. Super-admin only.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/tenants` | All tenants, active or not |
//! | `POST` | `/tenants` | Body: `{"slug":"acme","name":"Acme"}`; 201 |
//! | `POST` | `/tenants/{id}/active` | Body: `{"active":false}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use halo_core::{
  auth::Permission,
  store::SurveyStore,
  tenant::{NewTenant, Tenant},
};
use uuid::Uuid;

use crate::{ActiveBody, caller::Caller, error::ApiError};

/// `GET /tenants`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
) -> Result<Json<Vec<Tenant>>, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::ManageTenants)?;
  let tenants = store.list_tenants().await.map_err(ApiError::store)?;
  Ok(Json(tenants))
}

/// `POST /tenants`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Json(body): Json<NewTenant>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::ManageTenants)?;
  let tenant = store.create_tenant(body).await.map_err(ApiError::store)?;
  tracing::info!(tenant = %tenant.slug, "tenant created");
  Ok((StatusCode::CREATED, Json(tenant)))
}

/// `POST /tenants/{id}/active`
pub async fn set_active<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<ActiveBody>,
) -> Result<Json<Tenant>, ApiError>
where
  S: SurveyStore,
{
  caller.require(Permission::ManageTenants)?;
  let tenant = store
    .set_tenant_active(id, body.active)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(tenant = %tenant.slug, active = tenant.active, "tenant status changed");
  Ok(Json(tenant))
}
