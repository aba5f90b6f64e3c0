//! HTTP server and background jobs for Halo.
//!
//! Wires the JSON API from `halo-api` to a concrete store, adds bearer-token
//! authentication and the login endpoints, and runs the reminder sweep.

pub mod auth;
pub mod config;
pub mod mail;
pub mod reminders;

pub use config::ServerConfig;

use std::sync::Arc;

use axum::{
  Extension, Json, Router,
  middleware,
  routing::{get, post},
};
use halo_core::store::SurveyStore;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use auth::AuthService;

/// Build the complete application router.
pub fn router<S>(store: Arc<S>, auth_service: Arc<AuthService>) -> Router
where
  S: SurveyStore + 'static,
{
  let tenant_auth = Router::new()
    .route("/t/{tenant}/auth/login", post(auth::tenant_login::<S>))
    .route("/t/{tenant}/users", post(auth::create_user::<S>));

  Router::new()
    .route("/health", get(health))
    .route("/auth/login", post(auth::admin_login))
    .merge(halo_api::api_router(store, tenant_auth))
    .layer(middleware::from_fn_with_state(
      auth_service.clone(),
      auth::authenticate,
    ))
    .layer(Extension(auth_service))
    .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }
