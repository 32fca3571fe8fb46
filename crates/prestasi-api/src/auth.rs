//! Bearer-token extractor and the per-endpoint permission guard.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use prestasi_core::{
  Error as CoreError,
  principal::Principal,
  store::{Authenticator, ContentStore, FileStorage, ReferenceStore},
};

use crate::{AppState, error::ApiError};

/// Permission names granted through roles.
pub mod permission {
  pub const CREATE: &str = "achievements:create";
  pub const LIST: &str = "achievements:list";
  pub const DETAIL: &str = "achievements:detail";
  pub const UPDATE: &str = "achievements:update";
  pub const DELETE: &str = "achievements:delete";
  pub const SUBMIT: &str = "achievements:submit";
  pub const VERIFY: &str = "achievements:verify";
  pub const REJECT: &str = "achievements:reject";
  pub const HISTORY: &str = "achievements:history";
  pub const UPLOAD: &str = "achievements:upload";
}

/// The authenticated caller. Present in a handler means the bearer token
/// resolved to a live principal.
pub struct Authenticated(pub Principal);

impl Authenticated {
  /// The principal, if it holds `permission`; `Unauthorized` otherwise.
  pub fn require(&self, permission: &str) -> Result<&Principal, ApiError> {
    if self.0.has_permission(permission) {
      Ok(&self.0)
    } else {
      Err(CoreError::Unauthorized(format!("permission {permission} required")).into())
    }
  }
}

/// The token from an `Authorization: Bearer <token>` header.
pub fn bearer(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(header::AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Bearer ")
    .map(str::trim)
    .filter(|token| !token.is_empty())
}

impl<R, C, F> FromRequestParts<AppState<R, C, F>> for Authenticated
where
  R: ReferenceStore + Authenticator + 'static,
  C: ContentStore + 'static,
  F: FileStorage + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<R, C, F>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer(&parts.headers).ok_or(CoreError::Unauthenticated)?;
    let principal = state
      .workflow
      .references()
      .authenticate(token)
      .await
      .map_err(CoreError::persistence)?
      .ok_or(CoreError::Unauthenticated)?;
    Ok(Authenticated(principal))
  }
}
