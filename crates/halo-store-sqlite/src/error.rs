//! Error type for `halo-store-sqlite`.

use halo_core::{ErrorKind, store::StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] halo_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

impl StoreError for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::Core(e) => e.kind(),
      Error::Database(e) if is_constraint_violation(e) => ErrorKind::Conflict,
      _ => ErrorKind::Internal,
    }
  }
}

/// Whether a database error is a UNIQUE / CHECK / FOREIGN KEY violation.
pub(crate) fn is_constraint_violation(e: &tokio_rusqlite::Error) -> bool {
  match e {
    tokio_rusqlite::Error::Rusqlite(e) => is_rusqlite_constraint(e),
    _ => false,
  }
}

pub(crate) fn is_rusqlite_constraint(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.code == rusqlite::ErrorCode::ConstraintViolation
  )
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
