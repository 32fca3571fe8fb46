//! Error types for `prestasi-core`.

use thiserror::Error;
use uuid::Uuid;

/// A boxed error raised by a store or file-storage backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("authentication required")]
  Unauthenticated,

  #[error("not allowed: {0}")]
  Unauthorized(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("user {0} has no student profile")]
  OwnerNotFound(Uuid),

  #[error("invalid state: {0}")]
  InvalidState(String),

  #[error("persistence failure: {0}")]
  Persistence(#[source] BoxError),

  #[error("attachment storage failure: {0}")]
  AttachmentStorage(#[source] BoxError),
}

impl Error {
  /// Wrap a store backend error.
  pub fn persistence<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Persistence(Box::new(err))
  }

  /// Wrap a file-storage backend error.
  pub fn attachment_storage<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::AttachmentStorage(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
