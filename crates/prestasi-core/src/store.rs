//! Collaborator traits: the two stores, file storage and the authentication
//! oracle.
//!
//! The traits are implemented by backends (e.g. `prestasi-store-sqlite`).
//! Higher layers depend on these abstractions, not on any concrete backend.
//! The reference store and the content store never share a transaction.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`). Dropping a future
//! abandons the round-trip it represents.

use std::future::Future;

use bytes::Bytes;
use uuid::Uuid;

use crate::{
  content::{AchievementContent, DocumentId, NewContent},
  page::{Page, PageRequest},
  principal::Principal,
  reference::{AchievementReference, NewReference, ReferencePatch, ReferenceRecord, StudentIdentity},
  scope::AccessScope,
};

// ─── Relational reference store ──────────────────────────────────────────────

pub trait ReferenceStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Resolve the student profile belonging to a user, if any.
  fn find_student_by_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<StudentIdentity>, Self::Error>> + Send + '_;

  /// Insert a new draft reference and return it with its generated id.
  fn insert(
    &self,
    input: NewReference,
  ) -> impl Future<Output = Result<AchievementReference, Self::Error>> + Send + '_;

  /// Apply a partial update to a non-deleted row whose status matches
  /// `patch.expected`, if set. Returns the number of rows affected (0 or 1).
  fn patch(
    &self,
    id: Uuid,
    patch: ReferencePatch,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Overwrite the status of a draft or submitted row with
  /// [`Status::Deleted`](crate::reference::Status::Deleted). Returns the
  /// number of rows affected.
  fn soft_delete(&self, id: Uuid) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Fetch one non-deleted row inside `scope`, joined with owner and advisor.
  fn find<'a>(
    &'a self,
    id: Uuid,
    scope: &'a AccessScope,
  ) -> impl Future<Output = Result<Option<ReferenceRecord>, Self::Error>> + Send + 'a;

  /// Fetch one page of non-deleted rows inside `scope`, newest first, along
  /// with the scoped total.
  fn list<'a>(
    &'a self,
    scope: &'a AccessScope,
    page: PageRequest,
  ) -> impl Future<Output = Result<Page<ReferenceRecord>, Self::Error>> + Send + 'a;

  /// Every document id referenced by any row, deleted rows included.
  fn document_ids(&self) -> impl Future<Output = Result<Vec<DocumentId>, Self::Error>> + Send + '_;
}

// ─── Document store ──────────────────────────────────────────────────────────

pub trait ContentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert a document; the store assigns id and timestamps.
  fn insert(
    &self,
    input: NewContent,
  ) -> impl Future<Output = Result<AchievementContent, Self::Error>> + Send + '_;

  /// Replace a document by id, preserving `created_at` and bumping
  /// `updated_at`. Returns `None` if no such document exists.
  fn replace(
    &self,
    content: AchievementContent,
  ) -> impl Future<Output = Result<Option<AchievementContent>, Self::Error>> + Send + '_;

  fn get(
    &self,
    id: DocumentId,
  ) -> impl Future<Output = Result<Option<AchievementContent>, Self::Error>> + Send + '_;

  /// Fetch every document in `ids` in one round-trip. Missing ids are
  /// silently skipped; order is unspecified.
  fn get_many<'a>(
    &'a self,
    ids: &'a [DocumentId],
  ) -> impl Future<Output = Result<Vec<AchievementContent>, Self::Error>> + Send + 'a;

  /// Hard-delete a document. Only compensation and orphan reconciliation
  /// call this. Returns whether a document was removed.
  fn delete(&self, id: DocumentId) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn list_ids(&self) -> impl Future<Output = Result<Vec<DocumentId>, Self::Error>> + Send + '_;
}

// ─── File storage ────────────────────────────────────────────────────────────

pub trait FileStorage: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist `data` under a name derived from `file_name` and return a URL it
  /// can be retrieved from.
  fn put<'a>(
    &'a self,
    file_name: &'a str,
    content_type: &'a str,
    data: Bytes,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;
}

// ─── Authentication oracle ───────────────────────────────────────────────────

pub trait Authenticator: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Resolve a bearer credential. `None` means the credential is unknown or
  /// expired.
  fn authenticate<'a>(
    &'a self,
    credential: &'a str,
  ) -> impl Future<Output = Result<Option<Principal>, Self::Error>> + Send + 'a;
}
