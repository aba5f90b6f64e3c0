//! Tenants: the isolation boundary every other record hangs off.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// An isolated customer organisation. Resolved from the first path segment
/// after `/t/` on every tenant-scoped request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
  pub tenant_id:  Uuid,
  /// URL prefix; unique across the installation.
  pub slug:       String,
  pub name:       String,
  pub active:     bool,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::SurveyStore::create_tenant`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewTenant {
  pub slug: String,
  pub name: String,
}

/// Lowercase ASCII letters, digits and inner hyphens; 1 to 63 characters.
pub fn validate_slug(slug: &str) -> Result<()> {
  let ok = !slug.is_empty()
    && slug.len() <= 63
    && !slug.starts_with('-')
    && !slug.ends_with('-')
    && slug
      .bytes()
      .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');

  if ok {
    Ok(())
  } else {
    Err(Error::InvalidSlug(slug.to_owned()))
  }
}
