//! The achievement workflow engine.
//!
//! [`Workflow`] orchestrates the relational reference store and the content
//! document store:
//!
//! - creation writes content first, then the reference, deleting the content
//!   again if the reference write fails;
//! - state transitions (`submit`, `verify`, `reject`, `delete`) touch only the
//!   reference row;
//! - reads join reference metadata with content, fetching list content in a
//!   single batched call.
//!
//! Every operation takes the calling [`Principal`] explicitly and resolves
//! references through the caller's [`AccessScope`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  content::{AchievementContent, AchievementInput, Attachment, DocumentId, Upload},
  history::{self, HistoryEvent},
  page::{Page, PageRequest},
  principal::{Principal, Role},
  reference::{
    AchievementReference, LecturerIdentity, NewReference, ReferencePatch, ReferenceRecord,
    Status, StudentIdentity,
  },
  saga,
  scope::AccessScope,
  store::{ContentStore, FileStorage, ReferenceStore},
};

// ─── Views ───────────────────────────────────────────────────────────────────

/// A reference joined with its owner and its content.
#[derive(Debug, Clone, Serialize)]
pub struct AchievementView {
  #[serde(flatten)]
  pub reference: AchievementReference,
  pub student:   StudentIdentity,
  pub content:   AchievementContent,
}

/// A list row: reference metadata with title, type and creation time
/// projected from content. Identities are present as the scope allows.
#[derive(Debug, Clone, Serialize)]
pub struct AchievementSummary {
  pub id:               Uuid,
  pub document_id:      DocumentId,
  pub status:           Status,
  pub title:            String,
  pub achievement_type: String,
  pub created_at:       DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub student:          Option<StudentIdentity>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub lecturer:         Option<LecturerIdentity>,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct Workflow<R, C, F> {
  references: R,
  contents:   C,
  files:      F,
}

impl<R, C, F> Workflow<R, C, F>
where
  R: ReferenceStore,
  C: ContentStore,
  F: FileStorage,
{
  pub fn new(references: R, contents: C, files: F) -> Self {
    Self { references, contents, files }
  }

  pub fn references(&self) -> &R { &self.references }

  pub fn contents(&self) -> &C { &self.contents }

  pub fn files(&self) -> &F { &self.files }

  // ── Create / update / delete ──────────────────────────────────────────

  /// Create a draft owned by the caller's student profile.
  pub async fn create(
    &self,
    principal: &Principal,
    input: AchievementInput,
  ) -> Result<AchievementView> {
    input.validate()?;

    let student = self
      .references
      .find_student_by_user(principal.user_id)
      .await
      .map_err(Error::persistence)?
      .ok_or(Error::OwnerNotFound(principal.user_id))?;

    let content = self
      .contents
      .insert(input.into_new_content(student.student_id))
      .await
      .map_err(Error::persistence)?;
    let document_id = content.id;

    let reference = saga::compensate(
      "create achievement reference",
      async {
        self
          .references
          .insert(NewReference { student_id: student.student_id, document_id })
          .await
          .map_err(Error::persistence)
      },
      || async move { self.contents.delete(document_id).await.map(|_| ()) },
    )
    .await?;

    info!(id = %reference.id, %document_id, student_id = %student.student_id, "achievement created");
    Ok(AchievementView { reference, student, content })
  }

  /// Replace the content fields. Students may only edit drafts; reviewers
  /// may edit at any status.
  pub async fn update(
    &self,
    principal: &Principal,
    id: Uuid,
    input: AchievementInput,
  ) -> Result<AchievementView> {
    input.validate()?;

    let record = self.resolve(principal, id).await?;
    if principal.role == Role::Student && record.reference.status != Status::Draft {
      return Err(Error::InvalidState(format!(
        "achievement {id} is already {}",
        record.reference.status
      )));
    }

    let mut content = self.load_content(&record.reference).await?;
    input.apply_to(&mut content);
    content.student_id = record.reference.student_id;

    let content = self
      .contents
      .replace(content)
      .await
      .map_err(Error::persistence)?
      .ok_or_else(|| missing_content(&record.reference))?;

    info!(%id, "achievement content updated");
    Ok(assemble(record, content))
  }

  /// Soft-delete: the row stays with a deleted status and the content
  /// document is kept.
  pub async fn delete(&self, principal: &Principal, id: Uuid) -> Result<()> {
    let record = self.resolve(principal, id).await?;
    if record.reference.status.is_decided() {
      return Err(Error::InvalidState(format!(
        "achievement {id} is already {}",
        record.reference.status
      )));
    }

    let affected = self
      .references
      .soft_delete(id)
      .await
      .map_err(Error::persistence)?;
    if affected == 0 {
      return Err(self.lost_race(id).await);
    }

    info!(%id, "achievement deleted");
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  pub async fn find_by_id(&self, principal: &Principal, id: Uuid) -> Result<AchievementView> {
    let record = self.resolve(principal, id).await?;
    let content = self.load_content(&record.reference).await?;
    Ok(assemble(record, content))
  }

  /// List the caller's scope one page at a time. Content for the whole page
  /// is fetched with a single batched call.
  pub async fn find_all(
    &self,
    principal: &Principal,
    page: PageRequest,
  ) -> Result<Page<AchievementSummary>> {
    let scope = AccessScope::for_principal(principal);
    if scope.is_nothing() {
      return Ok(Page::empty());
    }

    let rows = self
      .references
      .list(&scope, page)
      .await
      .map_err(Error::persistence)?;
    if rows.items.is_empty() {
      return Ok(Page { items: Vec::new(), total: rows.total });
    }

    let mut ids: Vec<DocumentId> = rows.items.iter().map(|r| r.reference.document_id).collect();
    ids.sort();
    ids.dedup();

    let by_id: HashMap<DocumentId, AchievementContent> = self
      .contents
      .get_many(&ids)
      .await
      .map_err(Error::persistence)?
      .into_iter()
      .map(|c| (c.id, c))
      .collect();

    let items = rows
      .items
      .into_iter()
      .map(|record| summarize(&scope, record, &by_id))
      .collect();

    Ok(Page { items, total: rows.total })
  }

  pub async fn history(&self, principal: &Principal, id: Uuid) -> Result<Vec<HistoryEvent>> {
    let record = self.resolve(principal, id).await?;
    Ok(history::project(&record.reference))
  }

  // ── Transitions ───────────────────────────────────────────────────────

  /// `draft → submitted`. Submitting again is a no-op for `submitted_at`.
  pub async fn submit(&self, principal: &Principal, id: Uuid) -> Result<ReferenceRecord> {
    let record = self.resolve(principal, id).await?;
    match record.reference.status {
      Status::Draft | Status::Submitted => {}
      other => {
        return Err(Error::InvalidState(format!("achievement {id} is already {other}")));
      }
    }

    let now = Utc::now();
    let mut patch = ReferencePatch::at(now);
    patch.status = Some(Status::Submitted);
    if record.reference.submitted_at.is_none() {
      patch.submitted_at = Some(now);
    }

    self.transition(record, patch).await
  }

  /// `submitted → verified`, recording the reviewer.
  pub async fn verify(&self, principal: &Principal, id: Uuid) -> Result<ReferenceRecord> {
    require_reviewer(principal)?;
    let record = self.resolve(principal, id).await?;
    require_submitted(&record.reference)?;

    let now = Utc::now();
    let mut patch = ReferencePatch::at(now);
    patch.status = Some(Status::Verified);
    patch.verified_at = Some(now);
    patch.verified_by = Some(principal.user_id);

    self.transition(record, patch).await
  }

  /// `submitted → rejected`, recording the reviewer and a non-blank note.
  pub async fn reject(
    &self,
    principal: &Principal,
    id: Uuid,
    note: &str,
  ) -> Result<ReferenceRecord> {
    let note = note.trim();
    if note.is_empty() {
      return Err(Error::Validation("rejection note must not be empty".into()));
    }
    require_reviewer(principal)?;
    let record = self.resolve(principal, id).await?;
    require_submitted(&record.reference)?;

    let now = Utc::now();
    let mut patch = ReferencePatch::at(now);
    patch.status = Some(Status::Rejected);
    patch.rejection_note = Some(note.to_owned());
    patch.verified_at = Some(now);
    patch.verified_by = Some(principal.user_id);

    self.transition(record, patch).await
  }

  // ── Attachments ───────────────────────────────────────────────────────

  /// Store each upload and append it to the content's attachment list.
  /// Allowed at any status.
  pub async fn attach(
    &self,
    principal: &Principal,
    id: Uuid,
    uploads: Vec<Upload>,
  ) -> Result<AchievementView> {
    if uploads.is_empty() {
      return Err(Error::Validation("no files uploaded".into()));
    }

    let record = self.resolve(principal, id).await?;
    let mut content = self.load_content(&record.reference).await?;

    let mut stored = Vec::with_capacity(uploads.len());
    for upload in uploads {
      let file_url = self
        .files
        .put(&upload.file_name, &upload.content_type, upload.data)
        .await
        .map_err(Error::attachment_storage)?;
      stored.push(file_url.clone());
      content.attachments.push(Attachment {
        file_name: upload.file_name,
        file_url,
        file_type: upload.content_type,
        uploaded_at: Utc::now(),
      });
    }

    // Files already written stay on disk when the content write fails.
    let replaced = self
      .contents
      .replace(content)
      .await
      .map_err(Error::persistence)
      .and_then(|c| c.ok_or_else(|| missing_content(&record.reference)));
    let content = match replaced {
      Ok(content) => content,
      Err(e) => {
        warn!(%id, files = ?stored, error = %e, "attachment files left unreferenced");
        return Err(e);
      }
    };

    info!(%id, attachments = content.attachments.len(), "attachments stored");
    Ok(assemble(record, content))
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  async fn resolve(&self, principal: &Principal, id: Uuid) -> Result<ReferenceRecord> {
    let scope = AccessScope::for_principal(principal);
    if scope.is_nothing() {
      return Err(not_found(id));
    }
    self
      .references
      .find(id, &scope)
      .await
      .map_err(Error::persistence)?
      .ok_or_else(|| not_found(id))
  }

  async fn load_content(&self, reference: &AchievementReference) -> Result<AchievementContent> {
    self
      .contents
      .get(reference.document_id)
      .await
      .map_err(Error::persistence)?
      .ok_or_else(|| missing_content(reference))
  }

  /// Write `patch` only if the row still has the status it was read with.
  async fn transition(
    &self,
    mut record: ReferenceRecord,
    mut patch: ReferencePatch,
  ) -> Result<ReferenceRecord> {
    let id = record.reference.id;
    let from = record.reference.status;
    patch.expected = Some(from);

    let affected = self
      .references
      .patch(id, patch.clone())
      .await
      .map_err(Error::persistence)?;
    if affected == 0 {
      return Err(self.lost_race(id).await);
    }

    patch.apply(&mut record.reference);
    info!(%id, %from, to = %record.reference.status, "achievement transitioned");
    Ok(record)
  }

  /// Explain a guarded write that touched no row: the row is gone, or another
  /// request moved it to a different status first.
  async fn lost_race(&self, id: Uuid) -> Error {
    match self.references.find(id, &AccessScope::All).await {
      Ok(Some(current)) => {
        warn!(%id, status = %current.reference.status, "concurrent status change");
        Error::InvalidState(format!(
          "achievement {id} is now {}",
          current.reference.status
        ))
      }
      Ok(None) => not_found(id),
      Err(e) => Error::persistence(e),
    }
  }
}

// ─── Free helpers ────────────────────────────────────────────────────────────

fn not_found(id: Uuid) -> Error { Error::NotFound(format!("achievement {id}")) }

fn missing_content(reference: &AchievementReference) -> Error {
  Error::NotFound(format!(
    "content {} of achievement {}",
    reference.document_id, reference.id
  ))
}

fn require_reviewer(principal: &Principal) -> Result<()> {
  if principal.role.is_reviewer() {
    Ok(())
  } else {
    Err(Error::Unauthorized(format!(
      "role {} cannot review achievements",
      principal.role
    )))
  }
}

fn require_submitted(reference: &AchievementReference) -> Result<()> {
  if reference.status == Status::Submitted {
    Ok(())
  } else {
    Err(Error::InvalidState(format!(
      "achievement {} is {}, not submitted",
      reference.id, reference.status
    )))
  }
}

/// The reference row's owner wins over the document's embedded owner.
fn assemble(record: ReferenceRecord, mut content: AchievementContent) -> AchievementView {
  if content.student_id != record.reference.student_id {
    warn!(
      id = %record.reference.id,
      reference_owner = %record.reference.student_id,
      document_owner = %content.student_id,
      "content owner disagrees with reference owner"
    );
    content.student_id = record.reference.student_id;
  }
  AchievementView { reference: record.reference, student: record.student, content }
}

fn summarize(
  scope: &AccessScope,
  record: ReferenceRecord,
  by_id: &HashMap<DocumentId, AchievementContent>,
) -> AchievementSummary {
  let reference = record.reference.clone();
  let (title, achievement_type, created_at) = match by_id.get(&reference.document_id) {
    Some(c) => (c.title.clone(), c.achievement_type.clone(), c.created_at),
    None => {
      warn!(id = %reference.id, document_id = %reference.document_id, "content missing for listed achievement");
      (String::new(), String::new(), reference.created_at)
    }
  };
  let (student, lecturer) = scope.shape(record);

  AchievementSummary {
    id: reference.id,
    document_id: reference.document_id,
    status: reference.status,
    title,
    achievement_type,
    created_at,
    student,
    lecturer,
  }
}
