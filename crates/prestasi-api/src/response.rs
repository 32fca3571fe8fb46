//! The `{status, data, paging?, errors?}` envelope every response uses.

use axum::{
  Json,
  response::{IntoResponse, Response},
};
use prestasi_core::page::PageMeta;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct WebResponse<T> {
  /// `"success"` or `"error"`.
  pub status: &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data:   Option<T>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub paging: Option<PageMeta>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub errors: Option<ErrorBody>,
}

/// A stable machine code plus a human message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
  pub code:    &'static str,
  pub message: String,
}

impl<T> WebResponse<T> {
  pub fn ok(data: T) -> Self {
    Self { status: "success", data: Some(data), paging: None, errors: None }
  }

  pub fn paged(data: T, paging: PageMeta) -> Self {
    Self { status: "success", data: Some(data), paging: Some(paging), errors: None }
  }
}

impl WebResponse<()> {
  pub fn error(code: &'static str, message: impl Into<String>) -> Self {
    Self {
      status: "error",
      data:   None,
      paging: None,
      errors: Some(ErrorBody { code, message: message.into() }),
    }
  }
}

impl<T: Serialize> IntoResponse for WebResponse<T> {
  fn into_response(self) -> Response { Json(self).into_response() }
}
