//! JSON REST API for Prestasi.
//!
//! Exposes an axum [`Router`] over a [`Workflow`] whose reference store also
//! acts as the bearer-token [`Authenticator`]. Every route lives under
//! `/api/v1`; stored attachments are served under the configured upload
//! prefix.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = prestasi_api::router(AppState::new(workflow, config));
//! axum::serve(listener, app).await?;
//! ```

pub mod achievements;
pub mod auth;
pub mod error;
pub mod response;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  BoxError, Router,
  error_handling::HandleErrorLayer,
  handler::HandlerWithoutStateExt as _,
  http::StatusCode,
  response::{IntoResponse, Response},
  routing::{get, post},
};
use prestasi_core::{
  store::{Authenticator, ContentStore, FileStorage, ReferenceStore},
  workflow::Workflow,
};
use serde::Deserialize;
use tower::{ServiceBuilder, timeout::{TimeoutLayer, error::Elapsed}};
use tower_http::{services::ServeDir, trace::TraceLayer};

pub use error::ApiError;
pub use response::WebResponse;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `PRESTASI_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                 String,
  pub port:                 u16,
  /// Relational reference store.
  pub database_path:        PathBuf,
  /// Document store; may be the same file as `database_path`.
  pub document_path:        PathBuf,
  pub upload_dir:           PathBuf,
  /// URL path under which `upload_dir` is served, e.g. `/uploads`.
  pub upload_url_prefix:    String,
  pub request_timeout_secs: u64,
  pub token_ttl_hours:      i64,
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<R, C, F> {
  pub workflow: Arc<Workflow<R, C, F>>,
  pub config:   Arc<ServerConfig>,
}

impl<R, C, F> AppState<R, C, F> {
  pub fn new(workflow: Workflow<R, C, F>, config: ServerConfig) -> Self {
    Self { workflow: Arc::new(workflow), config: Arc::new(config) }
  }
}

// Manual impl: the store types themselves need not be `Clone`.
impl<R, C, F> Clone for AppState<R, C, F> {
  fn clone(&self) -> Self {
    Self {
      workflow: Arc::clone(&self.workflow),
      config:   Arc::clone(&self.config),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full application router for `state`.
pub fn router<R, C, F>(state: AppState<R, C, F>) -> Router
where
  R: ReferenceStore + Authenticator + 'static,
  C: ContentStore + 'static,
  F: FileStorage + 'static,
{
  let timeout = Duration::from_secs(state.config.request_timeout_secs);
  let uploads =
    ServeDir::new(&state.config.upload_dir).not_found_service(no_route.into_service());
  let upload_prefix = state.config.upload_url_prefix.clone();

  let app = Router::new()
    .nest("/api/v1", api_router(state))
    .nest_service(&upload_prefix, uploads)
    .fallback(no_route);

  with_deadline(app, timeout).layer(TraceLayer::new_for_http())
}

/// Abort requests running longer than `timeout` with a `408` envelope.
pub fn with_deadline(router: Router, timeout: Duration) -> Router {
  router.layer(
    ServiceBuilder::new()
      .layer(HandleErrorLayer::new(middleware_error))
      .layer(TimeoutLayer::new(timeout)),
  )
}

// ── Envelope fallbacks ──

async fn no_route() -> Response {
  (StatusCode::NOT_FOUND, WebResponse::error("not_found", "no such route")).into_response()
}

async fn no_method() -> Response {
  let body = WebResponse::error("method_not_allowed", "method not allowed for this route");
  (StatusCode::METHOD_NOT_ALLOWED, body).into_response()
}

async fn middleware_error(err: BoxError) -> Response {
  if err.is::<Elapsed>() {
    let body = WebResponse::error("request_timeout", "request took too long");
    return (StatusCode::REQUEST_TIMEOUT, body).into_response();
  }
  tracing::error!(error = %err, "middleware failure");
  let body = WebResponse::error("internal_error", "internal server error");
  (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
}

/// The `/achievements` routes alone, without layers or static files.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<R, C, F>(state: AppState<R, C, F>) -> Router<()>
where
  R: ReferenceStore + Authenticator + 'static,
  C: ContentStore + 'static,
  F: FileStorage + 'static,
{
  use achievements as a;

  Router::new()
    .route("/achievements", get(a::list::<R, C, F>).post(a::create::<R, C, F>))
    .route(
      "/achievements/{id}",
      get(a::detail::<R, C, F>)
        .put(a::update::<R, C, F>)
        .delete(a::delete::<R, C, F>),
    )
    .route("/achievements/{id}/submit", post(a::submit::<R, C, F>))
    .route("/achievements/{id}/verify", post(a::verify::<R, C, F>))
    .route("/achievements/{id}/reject", post(a::reject::<R, C, F>))
    .route("/achievements/{id}/history", get(a::history::<R, C, F>))
    .route("/achievements/{id}/attachment", post(a::attachment::<R, C, F>))
    .method_not_allowed_fallback(no_method)
    .with_state(state)
}
