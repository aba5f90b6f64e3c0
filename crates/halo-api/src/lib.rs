//! JSON REST API for Halo.
//!
//! Exposes an axum [`Router`] backed by any [`halo_core::store::SurveyStore`].
//! Token handling, TLS, and transport concerns are the caller's
//! responsibility: whatever authenticates a request must insert a
//! [`halo_core::auth::Principal`] into its extensions before routing.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = halo_api::api_router(store.clone(), login_routes)
//!   .layer(axum::middleware::from_fn_with_state(jwt, authenticate));
//! ```

pub mod assignments;
pub mod caller;
pub mod error;
pub mod people;
pub mod reports;
pub mod surveys;
pub mod tenant;
pub mod tenants;

use std::sync::Arc;

use axum::{
  Router,
  middleware,
  routing::{get, post},
};
use halo_core::store::SurveyStore;
use serde::Deserialize;

pub use caller::Caller;
pub use error::ApiError;
pub use tenant::TenantContext;

/// Body of every `POST .../{id}/active` endpoint.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ActiveBody {
  pub active: bool,
}

/// Build a fully-materialised API router for `store`.
///
/// `tenant_extra` holds additional `/t/{tenant}/...` routes (logins, user
/// management) that need the same tenant resolution; pass `Router::new()`
/// if there are none.
pub fn api_router<S>(store: Arc<S>, tenant_extra: Router<Arc<S>>) -> Router<()>
where
  S: SurveyStore + 'static,
{
  let scoped = Router::new()
    // People
    .route(
      "/t/{tenant}/subjects",
      get(people::list_subjects::<S>).post(people::create_subject::<S>),
    )
    .route(
      "/t/{tenant}/evaluators",
      get(people::list_evaluators::<S>).post(people::create_evaluator::<S>),
    )
    .route(
      "/t/{tenant}/relationships",
      get(people::list_relationships::<S>).post(people::create_relationship::<S>),
    )
    .route(
      "/t/{tenant}/relationships/{id}/active",
      post(people::set_relationship_active::<S>),
    )
    // Surveys
    .route("/t/{tenant}/surveys", get(surveys::list::<S>).post(surveys::create::<S>))
    .route(
      "/t/{tenant}/surveys/{id}",
      get(surveys::get_one::<S>).put(surveys::update::<S>),
    )
    .route("/t/{tenant}/surveys/{id}/active", post(surveys::set_active::<S>))
    .route("/t/{tenant}/surveys/{id}/auto-assign", post(surveys::auto_assign::<S>))
    // Assignments
    .route(
      "/t/{tenant}/assignments",
      get(assignments::list::<S>).post(assignments::create::<S>),
    )
    .route("/t/{tenant}/assignments/{id}", get(assignments::get_one::<S>))
    .route(
      "/t/{tenant}/assignments/{id}/active",
      post(assignments::set_active::<S>),
    )
    .route(
      "/t/{tenant}/assignments/{id}/submission",
      get(assignments::get_submission::<S>).put(assignments::put_submission::<S>),
    )
    // Reports
    .route(
      "/t/{tenant}/templates",
      get(reports::list_templates::<S>).post(reports::create_template::<S>),
    )
    .route("/t/{tenant}/reports", get(reports::data::<S>))
    .route("/t/{tenant}/reports/{id}", get(reports::render::<S>))
    .merge(tenant_extra)
    .route_layer(middleware::from_fn_with_state(
      store.clone(),
      tenant::resolve::<S>,
    ));

  Router::new()
    .route("/tenants", get(tenants::list::<S>).post(tenants::create::<S>))
    .route("/tenants/{id}/active", post(tenants::set_active::<S>))
    .merge(scoped)
    .with_state(store)
}

#[cfg(test)]
mod tests;
