//! Roles, permissions, and the authenticated principal.
//!
//! Roles are coarse; handlers check [`Permission`]s. A token carries both,
//! so a principal's permissions are fixed at issue time.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator as _;
use uuid::Uuid;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
  /// Installation-wide operator; not bound to a tenant.
  SuperAdmin,
  TenantAdmin,
  Manager,
  Evaluator,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Permission {
  ManageTenants,
  ManagePeople,
  ManageSurveys,
  AssignSurveys,
  SubmitSurveys,
  ViewReports,
  ManageTemplates,
}

impl Role {
  pub fn permissions(self) -> BTreeSet<Permission> {
    match self {
      Role::SuperAdmin => Permission::iter().collect(),
      Role::TenantAdmin => Permission::iter()
        .filter(|p| *p != Permission::ManageTenants)
        .collect(),
      Role::Manager => {
        [Permission::AssignSurveys, Permission::ViewReports].into()
      }
      Role::Evaluator => [Permission::SubmitSurveys].into(),
    }
  }
}

/// The authenticated caller, as decoded from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
  pub user_id:      Uuid,
  /// `None` only for super-admins.
  pub tenant_id:    Option<Uuid>,
  pub role:         Role,
  pub permissions:  BTreeSet<Permission>,
  /// Set when the login is bound to an evaluator record.
  pub evaluator_id: Option<Uuid>,
}

impl Principal {
  pub fn has(&self, permission: Permission) -> bool {
    self.permissions.contains(&permission)
  }

  pub fn is_super_admin(&self) -> bool { self.role == Role::SuperAdmin }

  /// Whether the principal may act inside `tenant_id`.
  pub fn can_access_tenant(&self, tenant_id: Uuid) -> bool {
    self.is_super_admin() || self.tenant_id == Some(tenant_id)
  }
}

// ─── Users ───────────────────────────────────────────────────────────────────

/// A tenant login. The password hash never leaves the store layer in API
/// responses; see [`UserView`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
  pub user_id:       Uuid,
  pub tenant_id:     Uuid,
  pub email:         String,
  pub password_hash: String,
  pub role:          Role,
  pub evaluator_id:  Option<Uuid>,
  pub active:        bool,
  pub created_at:    DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
  pub user_id:      Uuid,
  pub tenant_id:    Uuid,
  pub email:        String,
  pub role:         Role,
  pub evaluator_id: Option<Uuid>,
  pub active:       bool,
  pub created_at:   DateTime<Utc>,
}

impl From<User> for UserView {
  fn from(u: User) -> Self {
    Self {
      user_id:      u.user_id,
      tenant_id:    u.tenant_id,
      email:        u.email,
      role:         u.role,
      evaluator_id: u.evaluator_id,
      active:       u.active,
      created_at:   u.created_at,
    }
  }
}

/// Input to [`crate::store::SurveyStore::create_user`]. The caller hashes the
/// password before it reaches the store.
#[derive(Debug, Clone)]
pub struct NewUser {
  pub email:         String,
  pub password_hash: String,
  pub role:          Role,
  pub evaluator_id:  Option<Uuid>,
}
