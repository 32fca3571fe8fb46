//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use prestasi_core::Error as CoreError;
use thiserror::Error;

use crate::response::WebResponse;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] CoreError),

  /// The request could not be decoded at all (bad JSON, query or multipart).
  #[error("malformed request: {0}")]
  Malformed(String),
}

impl ApiError {
  /// HTTP status and stable machine code for this error.
  pub fn classify(&self) -> (StatusCode, &'static str) {
    match self {
      ApiError::Malformed(_) => (StatusCode::BAD_REQUEST, "validation_error"),
      ApiError::Core(e) => match e {
        CoreError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        CoreError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
        CoreError::Unauthorized(_) => (StatusCode::FORBIDDEN, "unauthorized"),
        CoreError::NotFound(_) | CoreError::OwnerNotFound(_) => {
          (StatusCode::NOT_FOUND, "not_found")
        }
        CoreError::InvalidState(_) => (StatusCode::BAD_REQUEST, "invalid_state"),
        CoreError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "persistence_failure"),
        CoreError::AttachmentStorage(_) => {
          (StatusCode::INTERNAL_SERVER_ERROR, "attachment_storage_failure")
        }
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, code) = self.classify();

    // Backend failures are logged in full; clients only see the category.
    let message = match &self {
      ApiError::Core(CoreError::Persistence(source)) => {
        tracing::error!(error = %source, "persistence failure");
        "internal persistence failure".to_owned()
      }
      ApiError::Core(CoreError::AttachmentStorage(source)) => {
        tracing::error!(error = %source, "attachment storage failure");
        "attachment could not be stored".to_owned()
      }
      other => other.to_string(),
    };

    let mut res = (status, WebResponse::error(code, message)).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    res
  }
}
