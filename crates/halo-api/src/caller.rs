//! The authenticated caller.
//!
//! Token decoding happens outside this crate; whatever authenticates the
//! request inserts a [`Principal`] into request extensions. Handlers take a
//! [`Caller`] and check permissions on it.

use axum::{extract::FromRequestParts, http::request::Parts};
use halo_core::{
  assignment::AssignmentDetail,
  auth::{Permission, Principal},
};

use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct Caller(pub Principal);

impl<St> FromRequestParts<St> for Caller
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
      .get::<Principal>()
      .cloned()
      .map(Caller)
      .ok_or(ApiError::Unauthorized)
  }
}

impl Caller {
  pub fn require(&self, permission: Permission) -> Result<(), ApiError> {
    if self.0.has(permission) {
      Ok(())
    } else {
      Err(ApiError::Forbidden(format!("missing permission {permission}")))
    }
  }

  pub fn require_any(&self, permissions: &[Permission]) -> Result<(), ApiError> {
    match permissions.iter().find(|p| self.0.has(**p)) {
      Some(_) => Ok(()),
      None => Err(ApiError::Forbidden("insufficient permissions".into())),
    }
  }

  /// Whether the caller is the evaluator on `detail`.
  pub fn owns(&self, detail: &AssignmentDetail) -> bool {
    self.0.evaluator_id == Some(detail.evaluator_id)
  }

  /// Read access to an assignment: assigners see all of them, evaluators
  /// only their own.
  pub fn can_view(&self, detail: &AssignmentDetail) -> bool {
    self.0.has(Permission::AssignSurveys)
      || (self.0.has(Permission::SubmitSurveys) && self.owns(detail))
  }
}
