//! Tenant resolution for `/t/{tenant}/...` routes.
//!
//! [`resolve`] runs as a route layer: it looks the slug up, rejects unknown
//! or inactive tenants with 404, rejects principals bound to a different
//! tenant with 403, and leaves the [`Tenant`] in request extensions for the
//! [`TenantContext`] extractor.

use std::{collections::HashMap, sync::Arc};

use axum::{
  extract::{FromRequestParts, Path, Request, State},
  http::request::Parts,
  middleware::Next,
  response::Response,
};
use halo_core::{auth::Principal, store::SurveyStore, tenant::Tenant};

use crate::error::ApiError;

/// The tenant named by the request path.
#[derive(Debug, Clone)]
pub struct TenantContext(pub Tenant);

impl<St> FromRequestParts<St> for TenantContext
where
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &St,
  ) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<Tenant>()
      .cloned()
      .map(TenantContext)
      .ok_or_else(|| ApiError::NotFound("tenant not resolved".into()))
  }
}

/// Middleware: resolve `{tenant}` to an active [`Tenant`].
pub async fn resolve<S>(
  State(store): State<Arc<S>>,
  Path(params): Path<HashMap<String, String>>,
  mut req: Request,
  next: Next,
) -> Result<Response, ApiError>
where
  S: SurveyStore + 'static,
{
  let slug = params
    .get("tenant")
    .ok_or_else(|| ApiError::BadRequest("missing tenant in path".into()))?;

  let tenant = store
    .get_tenant_by_slug(slug)
    .await
    .map_err(ApiError::store)?
    .filter(|t| t.active)
    .ok_or_else(|| ApiError::NotFound(format!("tenant {slug} not found")))?;

  if let Some(principal) = req.extensions().get::<Principal>()
    && !principal.can_access_tenant(tenant.tenant_id)
  {
    tracing::warn!(
      tenant = %tenant.slug,
      user_id = %principal.user_id,
      "cross-tenant request rejected"
    );
    return Err(ApiError::Forbidden(format!(
      "not a member of tenant {}",
      tenant.slug
    )));
  }

  req.extensions_mut().insert(tenant);
  Ok(next.run(req).await)
}
