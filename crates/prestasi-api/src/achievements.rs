//! Handlers for `/achievements` endpoints.
//!
//! | Method   | Path | Permission |
//! |----------|------|------------|
//! | `POST`   | `/achievements` | `achievements:create` |
//! | `GET`    | `/achievements` | `achievements:list`; `?page=&limit=` |
//! | `GET`    | `/achievements/{id}` | `achievements:detail` |
//! | `PUT`    | `/achievements/{id}` | `achievements:update` |
//! | `DELETE` | `/achievements/{id}` | `achievements:delete` |
//! | `POST`   | `/achievements/{id}/submit` | `achievements:submit` |
//! | `POST`   | `/achievements/{id}/verify` | `achievements:verify` |
//! | `POST`   | `/achievements/{id}/reject` | `achievements:reject`; body `{"rejection_note": ".."}` |
//! | `GET`    | `/achievements/{id}/history` | `achievements:history` |
//! | `POST`   | `/achievements/{id}/attachment` | `achievements:upload`; multipart field `attachments` |

use axum::{
  Json,
  extract::{
    Multipart, Path, Query, State,
    multipart::MultipartRejection,
    rejection::{JsonRejection, QueryRejection},
  },
  http::StatusCode,
};
use prestasi_core::{
  Error as CoreError,
  content::{AchievementInput, Upload},
  history::HistoryEvent,
  page::{PageMeta, PageRequest},
  reference::{ReferenceRecord, Status},
  store::{Authenticator, ContentStore, FileStorage, ReferenceStore},
  workflow::{AchievementSummary, AchievementView},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState,
  auth::{Authenticated, permission},
  error::ApiError,
  response::WebResponse,
};

/// Multipart field carrying attachment files.
pub const ATTACHMENT_FIELD: &str = "attachments";

type Reply<T> = Result<WebResponse<T>, ApiError>;

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
  Uuid::parse_str(raw)
    .map_err(|_| CoreError::Validation(format!("invalid achievement id: {raw:?}")).into())
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
  payload
    .map(|Json(v)| v)
    .map_err(|e| ApiError::Malformed(e.body_text()))
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub page:  Option<u32>,
  pub limit: Option<u32>,
}

/// `GET /achievements[?page=<n>&limit=<n>]`
pub async fn list<R, C, F>(
  State(state): State<AppState<R, C, F>>,
  auth: Authenticated,
  params: Result<Query<ListParams>, QueryRejection>,
) -> Reply<Vec<AchievementSummary>>
where
  R: ReferenceStore + Authenticator + 'static,
  C: ContentStore + 'static,
  F: FileStorage + 'static,
{
  let principal = auth.require(permission::LIST)?;
  let Query(params) = params.map_err(|e| ApiError::Malformed(e.body_text()))?;
  let request = PageRequest::new(params.page, params.limit);

  let page = state.workflow.find_all(principal, request).await?;
  let meta = PageMeta::new(request, page.total);
  Ok(WebResponse::paged(page.items, meta))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /achievements`
pub async fn create<R, C, F>(
  State(state): State<AppState<R, C, F>>,
  auth: Authenticated,
  payload: Result<Json<AchievementInput>, JsonRejection>,
) -> Result<(StatusCode, WebResponse<AchievementView>), ApiError>
where
  R: ReferenceStore + Authenticator + 'static,
  C: ContentStore + 'static,
  F: FileStorage + 'static,
{
  let principal = auth.require(permission::CREATE)?;
  let input = body(payload)?;
  let view = state.workflow.create(principal, input).await?;
  Ok((StatusCode::CREATED, WebResponse::ok(view)))
}

// ─── Single item ─────────────────────────────────────────────────────────────

/// `GET /achievements/{id}`
pub async fn detail<R, C, F>(
  State(state): State<AppState<R, C, F>>,
  auth: Authenticated,
  Path(id): Path<String>,
) -> Reply<AchievementView>
where
  R: ReferenceStore + Authenticator + 'static,
  C: ContentStore + 'static,
  F: FileStorage + 'static,
{
  let principal = auth.require(permission::DETAIL)?;
  let id = parse_id(&id)?;
  Ok(WebResponse::ok(state.workflow.find_by_id(principal, id).await?))
}

/// `PUT /achievements/{id}`
pub async fn update<R, C, F>(
  State(state): State<AppState<R, C, F>>,
  auth: Authenticated,
  Path(id): Path<String>,
  payload: Result<Json<AchievementInput>, JsonRejection>,
) -> Reply<AchievementView>
where
  R: ReferenceStore + Authenticator + 'static,
  C: ContentStore + 'static,
  F: FileStorage + 'static,
{
  let principal = auth.require(permission::UPDATE)?;
  let id = parse_id(&id)?;
  let input = body(payload)?;
  Ok(WebResponse::ok(state.workflow.update(principal, id, input).await?))
}

#[derive(Debug, Serialize)]
pub struct Deleted {
  pub id:     Uuid,
  pub status: Status,
}

/// `DELETE /achievements/{id}`
pub async fn delete<R, C, F>(
  State(state): State<AppState<R, C, F>>,
  auth: Authenticated,
  Path(id): Path<String>,
) -> Reply<Deleted>
where
  R: ReferenceStore + Authenticator + 'static,
  C: ContentStore + 'static,
  F: FileStorage + 'static,
{
  let principal = auth.require(permission::DELETE)?;
  let id = parse_id(&id)?;
  state.workflow.delete(principal, id).await?;
  Ok(WebResponse::ok(Deleted { id, status: Status::Deleted }))
}

/// `GET /achievements/{id}/history`
pub async fn history<R, C, F>(
  State(state): State<AppState<R, C, F>>,
  auth: Authenticated,
  Path(id): Path<String>,
) -> Reply<Vec<HistoryEvent>>
where
  R: ReferenceStore + Authenticator + 'static,
  C: ContentStore + 'static,
  F: FileStorage + 'static,
{
  let principal = auth.require(permission::HISTORY)?;
  let id = parse_id(&id)?;
  Ok(WebResponse::ok(state.workflow.history(principal, id).await?))
}

// ─── Transitions ─────────────────────────────────────────────────────────────

/// `POST /achievements/{id}/submit`
pub async fn submit<R, C, F>(
  State(state): State<AppState<R, C, F>>,
  auth: Authenticated,
  Path(id): Path<String>,
) -> Reply<ReferenceRecord>
where
  R: ReferenceStore + Authenticator + 'static,
  C: ContentStore + 'static,
  F: FileStorage + 'static,
{
  let principal = auth.require(permission::SUBMIT)?;
  let id = parse_id(&id)?;
  Ok(WebResponse::ok(state.workflow.submit(principal, id).await?))
}

/// `POST /achievements/{id}/verify`
pub async fn verify<R, C, F>(
  State(state): State<AppState<R, C, F>>,
  auth: Authenticated,
  Path(id): Path<String>,
) -> Reply<ReferenceRecord>
where
  R: ReferenceStore + Authenticator + 'static,
  C: ContentStore + 'static,
  F: FileStorage + 'static,
{
  let principal = auth.require(permission::VERIFY)?;
  let id = parse_id(&id)?;
  Ok(WebResponse::ok(state.workflow.verify(principal, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
  #[serde(default)]
  pub rejection_note: String,
}

/// `POST /achievements/{id}/reject`; body: `{"rejection_note":"incomplete"}`
pub async fn reject<R, C, F>(
  State(state): State<AppState<R, C, F>>,
  auth: Authenticated,
  Path(id): Path<String>,
  payload: Result<Json<RejectBody>, JsonRejection>,
) -> Reply<ReferenceRecord>
where
  R: ReferenceStore + Authenticator + 'static,
  C: ContentStore + 'static,
  F: FileStorage + 'static,
{
  let principal = auth.require(permission::REJECT)?;
  let id = parse_id(&id)?;
  let RejectBody { rejection_note } = body(payload)?;
  Ok(WebResponse::ok(state.workflow.reject(principal, id, &rejection_note).await?))
}

// ─── Attachments ─────────────────────────────────────────────────────────────

/// `POST /achievements/{id}/attachment`: multipart, one or more files in
/// the `attachments` field. Other fields are ignored.
pub async fn attachment<R, C, F>(
  State(state): State<AppState<R, C, F>>,
  auth: Authenticated,
  Path(id): Path<String>,
  multipart: Result<Multipart, MultipartRejection>,
) -> Reply<AchievementView>
where
  R: ReferenceStore + Authenticator + 'static,
  C: ContentStore + 'static,
  F: FileStorage + 'static,
{
  let principal = auth.require(permission::UPLOAD)?;
  let id = parse_id(&id)?;
  let mut multipart = multipart.map_err(|e| ApiError::Malformed(e.body_text()))?;

  let mut uploads = Vec::new();
  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| ApiError::Malformed(e.body_text()))?
  {
    if field.name() != Some(ATTACHMENT_FIELD) {
      continue;
    }
    let file_name = field.file_name().unwrap_or("attachment").to_owned();
    let content_type = field
      .content_type()
      .unwrap_or("application/octet-stream")
      .to_owned();
    let data = field
      .bytes()
      .await
      .map_err(|e| ApiError::Malformed(e.body_text()))?;
    uploads.push(Upload { file_name, content_type, data });
  }

  Ok(WebResponse::ok(state.workflow.attach(principal, id, uploads).await?))
}
