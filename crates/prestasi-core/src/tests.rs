//! Workflow tests against in-memory fakes of the store traits.

use std::{
  collections::HashMap,
  sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
};

use bytes::Bytes;
use chrono::{Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::{
  Error,
  content::{AchievementContent, AchievementInput, DocumentId, NewContent, Upload},
  history::HistoryAction,
  page::{Page, PageRequest},
  principal::{Principal, Role},
  reconcile,
  reference::{
    AchievementReference, LecturerIdentity, NewReference, PersonSummary, ReferencePatch,
    ReferenceRecord, Status, StudentIdentity,
  },
  scope::AccessScope,
  store::{ContentStore, FileStorage, ReferenceStore},
  workflow::Workflow,
};

// ─── Fakes ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("fake store failure: {0}")]
struct FakeError(&'static str);

#[derive(Default)]
struct MemReferences {
  students:    Mutex<Vec<(StudentIdentity, Option<LecturerIdentity>)>>,
  rows:        Mutex<Vec<AchievementReference>>,
  fail_insert: AtomicBool,
  list_calls:  AtomicUsize,
  /// Status another request commits just before the next guarded write.
  interleave:  Mutex<Option<Status>>,
}

impl MemReferences {
  fn record(&self, row: &AchievementReference) -> Option<ReferenceRecord> {
    let students = self.students.lock().unwrap();
    let (student, advisor) = students
      .iter()
      .find(|(s, _)| s.student_id == row.student_id)?
      .clone();
    Some(ReferenceRecord { reference: row.clone(), student, advisor })
  }

  fn visible(&self, scope: &AccessScope) -> Vec<ReferenceRecord> {
    let rows = self.rows.lock().unwrap().clone();
    let mut out: Vec<ReferenceRecord> = rows
      .iter()
      .filter(|r| r.status != Status::Deleted)
      .filter_map(|r| self.record(r))
      .filter(|r| scope.admits(r))
      .collect();
    out.sort_by(|a, b| b.reference.created_at.cmp(&a.reference.created_at));
    out
  }

  fn interleaved(&self, rows: &mut [AchievementReference], id: Uuid) {
    if let Some(status) = self.interleave.lock().unwrap().take()
      && let Some(row) = rows.iter_mut().find(|r| r.id == id)
    {
      row.status = status;
    }
  }

  fn raw(&self, id: Uuid) -> Option<AchievementReference> {
    self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned()
  }
}

impl ReferenceStore for MemReferences {
  type Error = FakeError;

  async fn find_student_by_user(&self, user_id: Uuid) -> Result<Option<StudentIdentity>, FakeError> {
    Ok(
      self
        .students
        .lock()
        .unwrap()
        .iter()
        .find(|(s, _)| s.person.user_id == user_id)
        .map(|(s, _)| s.clone()),
    )
  }

  async fn insert(&self, input: NewReference) -> Result<AchievementReference, FakeError> {
    if self.fail_insert.load(Ordering::SeqCst) {
      return Err(FakeError("reference insert"));
    }
    let now = Utc::now();
    let row = AchievementReference {
      id:             Uuid::new_v4(),
      student_id:     input.student_id,
      document_id:    input.document_id,
      status:         Status::Draft,
      rejection_note: None,
      submitted_at:   None,
      verified_at:    None,
      verified_by:    None,
      created_at:     now,
      updated_at:     now,
    };
    self.rows.lock().unwrap().push(row.clone());
    Ok(row)
  }

  async fn patch(&self, id: Uuid, patch: ReferencePatch) -> Result<u64, FakeError> {
    let mut rows = self.rows.lock().unwrap();
    self.interleaved(&mut rows, id);
    let current = |r: &AchievementReference| patch.expected.is_none_or(|s| s == r.status);
    match rows
      .iter_mut()
      .find(|r| r.id == id && r.status != Status::Deleted && current(r))
    {
      Some(row) => {
        patch.apply(row);
        Ok(1)
      }
      None => Ok(0),
    }
  }

  async fn soft_delete(&self, id: Uuid) -> Result<u64, FakeError> {
    let mut rows = self.rows.lock().unwrap();
    self.interleaved(&mut rows, id);
    match rows
      .iter_mut()
      .find(|r| r.id == id && matches!(r.status, Status::Draft | Status::Submitted))
    {
      Some(row) => {
        row.status = Status::Deleted;
        Ok(1)
      }
      None => Ok(0),
    }
  }

  async fn find(&self, id: Uuid, scope: &AccessScope) -> Result<Option<ReferenceRecord>, FakeError> {
    Ok(self.visible(scope).into_iter().find(|r| r.reference.id == id))
  }

  async fn list(&self, scope: &AccessScope, page: PageRequest) -> Result<Page<ReferenceRecord>, FakeError> {
    self.list_calls.fetch_add(1, Ordering::SeqCst);
    let all = self.visible(scope);
    let total = all.len() as u64;
    let items = all
      .into_iter()
      .skip(page.offset() as usize)
      .take(page.limit as usize)
      .collect();
    Ok(Page { items, total })
  }

  async fn document_ids(&self) -> Result<Vec<DocumentId>, FakeError> {
    Ok(self.rows.lock().unwrap().iter().map(|r| r.document_id).collect())
  }
}

#[derive(Default)]
struct MemContents {
  docs:           Mutex<HashMap<DocumentId, AchievementContent>>,
  fail_insert:    AtomicBool,
  fail_replace:   AtomicBool,
  get_calls:      AtomicUsize,
  get_many_calls: AtomicUsize,
}

impl ContentStore for MemContents {
  type Error = FakeError;

  async fn insert(&self, input: NewContent) -> Result<AchievementContent, FakeError> {
    if self.fail_insert.load(Ordering::SeqCst) {
      return Err(FakeError("content insert"));
    }
    let now = Utc::now();
    let doc = AchievementContent {
      id:               DocumentId::generate(),
      student_id:       input.student_id,
      achievement_type: input.achievement_type,
      title:            input.title,
      description:      input.description,
      details:          input.details,
      attachments:      Vec::new(),
      tags:             input.tags,
      points:           input.points,
      created_at:       now,
      updated_at:       now,
    };
    self.docs.lock().unwrap().insert(doc.id, doc.clone());
    Ok(doc)
  }

  async fn replace(&self, mut content: AchievementContent) -> Result<Option<AchievementContent>, FakeError> {
    if self.fail_replace.load(Ordering::SeqCst) {
      return Err(FakeError("content replace"));
    }
    let mut docs = self.docs.lock().unwrap();
    let Some(existing) = docs.get(&content.id) else {
      return Ok(None);
    };
    content.created_at = existing.created_at;
    content.updated_at = Utc::now();
    docs.insert(content.id, content.clone());
    Ok(Some(content))
  }

  async fn get(&self, id: DocumentId) -> Result<Option<AchievementContent>, FakeError> {
    self.get_calls.fetch_add(1, Ordering::SeqCst);
    Ok(self.docs.lock().unwrap().get(&id).cloned())
  }

  async fn get_many(&self, ids: &[DocumentId]) -> Result<Vec<AchievementContent>, FakeError> {
    self.get_many_calls.fetch_add(1, Ordering::SeqCst);
    let docs = self.docs.lock().unwrap();
    Ok(ids.iter().filter_map(|id| docs.get(id).cloned()).collect())
  }

  async fn delete(&self, id: DocumentId) -> Result<bool, FakeError> {
    Ok(self.docs.lock().unwrap().remove(&id).is_some())
  }

  async fn list_ids(&self) -> Result<Vec<DocumentId>, FakeError> {
    Ok(self.docs.lock().unwrap().keys().copied().collect())
  }
}

#[derive(Default)]
struct MemFiles {
  stored: Mutex<Vec<String>>,
  fail:   AtomicBool,
}

impl FileStorage for MemFiles {
  type Error = FakeError;

  async fn put(&self, file_name: &str, _content_type: &str, _data: Bytes) -> Result<String, FakeError> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(FakeError("file put"));
    }
    let mut stored = self.stored.lock().unwrap();
    let url = format!("/uploads/achievements/{}_{file_name}", stored.len());
    stored.push(url.clone());
    Ok(url)
  }
}

// ─── Fixture ─────────────────────────────────────────────────────────────────

type Engine = Workflow<MemReferences, MemContents, MemFiles>;

struct Fixture {
  wf:    Engine,
  admin: Principal,
  l1:    Principal,
  l2:    Principal,
  s1:    Principal,
  s2:    Principal,
  s3:    Principal,
}

fn principal(role: Role, name: &str) -> Principal {
  Principal {
    user_id: Uuid::new_v4(),
    username: name.into(),
    role,
    permissions: vec![],
  }
}

fn person(p: &Principal) -> PersonSummary {
  PersonSummary {
    user_id:   p.user_id,
    username:  p.username.clone(),
    full_name: p.username.to_uppercase(),
    email:     format!("{}@example.ac.id", p.username),
  }
}

fn lecturer(p: &Principal) -> LecturerIdentity {
  LecturerIdentity {
    lecturer_id: Uuid::new_v4(),
    person:      person(p),
    department:  "Informatika".into(),
  }
}

fn student(p: &Principal, advisor: Option<&LecturerIdentity>) -> StudentIdentity {
  StudentIdentity {
    student_id:     Uuid::new_v4(),
    person:         person(p),
    student_number: format!("NIM-{}", p.username),
    program_study:  "Teknik Informatika".into(),
    academic_year:  "2022".into(),
    advisor_id:     advisor.map(|a| a.lecturer_id),
  }
}

fn fixture() -> Fixture {
  let admin = principal(Role::Admin, "admin");
  let l1 = principal(Role::Lecturer, "l1");
  let l2 = principal(Role::Lecturer, "l2");
  let s1 = principal(Role::Student, "s1");
  let s2 = principal(Role::Student, "s2");
  let s3 = principal(Role::Student, "s3");

  let lec1 = lecturer(&l1);
  let lec2 = lecturer(&l2);

  let references = MemReferences::default();
  *references.students.lock().unwrap() = vec![
    (student(&s1, Some(&lec1)), Some(lec1.clone())),
    (student(&s2, Some(&lec1)), Some(lec1.clone())),
    (student(&s3, Some(&lec2)), Some(lec2.clone())),
  ];

  Fixture {
    wf: Workflow::new(references, MemContents::default(), MemFiles::default()),
    admin,
    l1,
    l2,
    s1,
    s2,
    s3,
  }
}

fn input(title: &str) -> AchievementInput {
  AchievementInput {
    achievement_type: "competition".into(),
    title:            title.into(),
    description:      "Juara 1".into(),
    details:          Default::default(),
    tags:             vec!["coding".into()],
  }
}

fn ids(page: &Page<crate::workflow::AchievementSummary>) -> Vec<Uuid> {
  let mut ids: Vec<Uuid> = page.items.iter().map(|s| s.id).collect();
  ids.sort();
  ids
}

fn sorted(mut v: Vec<Uuid>) -> Vec<Uuid> {
  v.sort();
  v
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_writes_content_then_draft_reference() {
  let f = fixture();
  let view = f.wf.create(&f.s1, input("Lomba Coding")).await.unwrap();

  assert_eq!(view.reference.status, Status::Draft);
  assert_eq!(view.content.title, "Lomba Coding");
  assert_eq!(view.reference.document_id, view.content.id);
  assert_eq!(view.reference.student_id, view.student.student_id);
  assert_eq!(view.content.student_id, view.student.student_id);
  assert!(view.reference.submitted_at.is_none());

  assert_eq!(f.wf.contents().docs.lock().unwrap().len(), 1);
  assert_eq!(f.wf.references().rows.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn create_without_student_profile_is_owner_not_found() {
  let f = fixture();
  let err = f.wf.create(&f.admin, input("x")).await.unwrap_err();
  assert!(matches!(err, Error::OwnerNotFound(id) if id == f.admin.user_id));
  assert!(f.wf.contents().docs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn create_rejects_missing_fields_before_any_write() {
  let f = fixture();
  let mut bad = input("");
  bad.description = String::new();
  let err = f.wf.create(&f.s1, bad).await.unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
  assert!(f.wf.contents().docs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn content_failure_leaves_no_reference() {
  let f = fixture();
  f.wf.contents().fail_insert.store(true, Ordering::SeqCst);

  let err = f.wf.create(&f.s1, input("x")).await.unwrap_err();
  assert!(matches!(err, Error::Persistence(_)));
  assert!(f.wf.references().rows.lock().unwrap().is_empty());
  assert!(f.wf.contents().docs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn reference_failure_deletes_content() {
  let f = fixture();
  f.wf.references().fail_insert.store(true, Ordering::SeqCst);

  let err = f.wf.create(&f.s1, input("x")).await.unwrap_err();
  assert!(matches!(err, Error::Persistence(_)));
  assert!(f.wf.references().rows.lock().unwrap().is_empty());
  assert!(f.wf.contents().docs.lock().unwrap().is_empty());
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn student_edits_draft_and_keeps_document_identity() {
  let f = fixture();
  let created = f.wf.create(&f.s1, input("Old")).await.unwrap();

  let updated = f
    .wf
    .update(&f.s1, created.reference.id, input("New"))
    .await
    .unwrap();

  assert_eq!(updated.content.title, "New");
  assert_eq!(updated.content.id, created.content.id);
  assert_eq!(updated.content.created_at, created.content.created_at);
  assert_eq!(updated.content.student_id, created.reference.student_id);
}

#[tokio::test]
async fn student_cannot_edit_past_draft() {
  let f = fixture();

  let submitted = f.wf.create(&f.s1, input("a")).await.unwrap().reference.id;
  f.wf.submit(&f.s1, submitted).await.unwrap();

  let verified = f.wf.create(&f.s1, input("b")).await.unwrap().reference.id;
  f.wf.submit(&f.s1, verified).await.unwrap();
  f.wf.verify(&f.l1, verified).await.unwrap();

  let rejected = f.wf.create(&f.s1, input("c")).await.unwrap().reference.id;
  f.wf.submit(&f.s1, rejected).await.unwrap();
  f.wf.reject(&f.l1, rejected, "incomplete").await.unwrap();

  for id in [submitted, verified, rejected] {
    let err = f.wf.update(&f.s1, id, input("edit")).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)), "{id}: {err}");
  }

  let deleted = f.wf.create(&f.s1, input("d")).await.unwrap().reference.id;
  f.wf.delete(&f.s1, deleted).await.unwrap();
  let err = f.wf.update(&f.s1, deleted, input("edit")).await.unwrap_err();
  assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn reviewers_may_edit_any_status() {
  let f = fixture();
  let id = f.wf.create(&f.s1, input("a")).await.unwrap().reference.id;
  f.wf.submit(&f.s1, id).await.unwrap();

  let view = f.wf.update(&f.admin, id, input("fixed typo")).await.unwrap();
  assert_eq!(view.content.title, "fixed typo");
  assert_eq!(view.reference.status, Status::Submitted);
}

#[tokio::test]
async fn document_owner_is_reconciled_to_reference_owner() {
  let f = fixture();
  let created = f.wf.create(&f.s1, input("a")).await.unwrap();
  f.wf
    .contents()
    .docs
    .lock()
    .unwrap()
    .get_mut(&created.content.id)
    .unwrap()
    .student_id = Uuid::new_v4();

  let view = f.wf.find_by_id(&f.s1, created.reference.id).await.unwrap();
  assert_eq!(view.content.student_id, created.reference.student_id);
}

// ─── Delete ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn deleted_achievement_disappears_everywhere() {
  let f = fixture();
  let id = f.wf.create(&f.s1, input("a")).await.unwrap().reference.id;
  f.wf.delete(&f.s1, id).await.unwrap();

  assert!(matches!(f.wf.find_by_id(&f.s1, id).await, Err(Error::NotFound(_))));
  for who in [&f.s1, &f.l1, &f.admin] {
    let page = f.wf.find_all(who, PageRequest::default()).await.unwrap();
    assert!(page.items.iter().all(|s| s.id != id));
  }

  let raw = f.wf.references().raw(id).unwrap();
  assert_eq!(raw.status, Status::Deleted);
  assert!(f.wf.contents().docs.lock().unwrap().contains_key(&raw.document_id));
}

#[tokio::test]
async fn delete_twice_is_not_found() {
  let f = fixture();
  let id = f.wf.create(&f.s1, input("a")).await.unwrap().reference.id;
  f.wf.delete(&f.s1, id).await.unwrap();
  assert!(matches!(f.wf.delete(&f.s1, id).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn decided_achievements_cannot_be_deleted() {
  let f = fixture();
  let id = f.wf.create(&f.s1, input("a")).await.unwrap().reference.id;
  f.wf.submit(&f.s1, id).await.unwrap();
  f.wf.verify(&f.l1, id).await.unwrap();

  assert!(matches!(f.wf.delete(&f.admin, id).await, Err(Error::InvalidState(_))));
}

// ─── Transitions ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn submit_twice_keeps_first_submitted_at() {
  let f = fixture();
  let id = f.wf.create(&f.s1, input("a")).await.unwrap().reference.id;

  let first = f.wf.submit(&f.s1, id).await.unwrap();
  let stamped = first.reference.submitted_at.expect("submitted_at set");

  let second = f.wf.submit(&f.s1, id).await.unwrap();
  assert_eq!(second.reference.status, Status::Submitted);
  assert_eq!(second.reference.submitted_at, Some(stamped));
  assert_eq!(f.wf.references().raw(id).unwrap().submitted_at, Some(stamped));
}

#[tokio::test]
async fn submit_after_decision_is_invalid() {
  let f = fixture();
  let id = f.wf.create(&f.s1, input("a")).await.unwrap().reference.id;
  f.wf.submit(&f.s1, id).await.unwrap();
  f.wf.reject(&f.l1, id, "no evidence").await.unwrap();

  assert!(matches!(f.wf.submit(&f.s1, id).await, Err(Error::InvalidState(_))));
}

#[tokio::test]
async fn verify_requires_submitted_and_a_reviewer() {
  let f = fixture();
  let id = f.wf.create(&f.s1, input("a")).await.unwrap().reference.id;

  assert!(matches!(f.wf.verify(&f.l1, id).await, Err(Error::InvalidState(_))));
  f.wf.submit(&f.s1, id).await.unwrap();
  assert!(matches!(f.wf.verify(&f.s1, id).await, Err(Error::Unauthorized(_))));

  let verified = f.wf.verify(&f.l1, id).await.unwrap();
  assert_eq!(verified.reference.status, Status::Verified);
  assert_eq!(verified.reference.verified_by, Some(f.l1.user_id));
  assert!(verified.reference.verified_at.is_some());
  assert!(verified.reference.rejection_note.is_none());
}

#[tokio::test]
async fn lecturer_cannot_review_other_advisees() {
  let f = fixture();
  let id = f.wf.create(&f.s3, input("a")).await.unwrap().reference.id;
  f.wf.submit(&f.s3, id).await.unwrap();

  assert!(matches!(f.wf.verify(&f.l1, id).await, Err(Error::NotFound(_))));
  f.wf.verify(&f.l2, id).await.unwrap();
}

#[tokio::test]
async fn blank_rejection_note_never_transitions() {
  let f = fixture();
  let id = f.wf.create(&f.s1, input("a")).await.unwrap().reference.id;
  f.wf.submit(&f.s1, id).await.unwrap();

  for note in ["", "   ", "\n\t"] {
    let err = f.wf.reject(&f.l1, id, note).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  let raw = f.wf.references().raw(id).unwrap();
  assert_eq!(raw.status, Status::Submitted);
  assert!(raw.rejection_note.is_none());
  assert!(raw.verified_at.is_none());
}

// ── Concurrent decisions ──

#[tokio::test]
async fn delete_loses_to_a_concurrent_verify() {
  let f = fixture();
  let id = f.wf.create(&f.s1, input("Lomba")).await.unwrap().reference.id;
  f.wf.submit(&f.s1, id).await.unwrap();

  *f.wf.references().interleave.lock().unwrap() = Some(Status::Verified);
  let err = f.wf.delete(&f.s1, id).await.unwrap_err();
  assert!(matches!(err, Error::InvalidState(_)), "{err:?}");
  assert_eq!(f.wf.references().raw(id).unwrap().status, Status::Verified);
}

#[tokio::test]
async fn second_decision_loses_to_the_first() {
  let f = fixture();
  let id = f.wf.create(&f.s1, input("Lomba")).await.unwrap().reference.id;
  f.wf.submit(&f.s1, id).await.unwrap();

  *f.wf.references().interleave.lock().unwrap() = Some(Status::Verified);
  let err = f.wf.reject(&f.l1, id, "incomplete").await.unwrap_err();
  assert!(matches!(err, Error::InvalidState(_)), "{err:?}");

  let row = f.wf.references().raw(id).unwrap();
  assert_eq!(row.status, Status::Verified);
  assert_eq!(row.rejection_note, None);
}

#[tokio::test]
async fn transition_on_a_row_deleted_meanwhile_is_not_found() {
  let f = fixture();
  let id = f.wf.create(&f.s1, input("Lomba")).await.unwrap().reference.id;

  *f.wf.references().interleave.lock().unwrap() = Some(Status::Deleted);
  let err = f.wf.submit(&f.s1, id).await.unwrap_err();
  assert!(matches!(err, Error::NotFound(_)), "{err:?}");
}

// ─── Listing ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_is_scoped_by_role() {
  let f = fixture();
  let a1 = f.wf.create(&f.s1, input("s1-a")).await.unwrap().reference.id;
  let a2 = f.wf.create(&f.s1, input("s1-b")).await.unwrap().reference.id;
  let b1 = f.wf.create(&f.s2, input("s2-a")).await.unwrap().reference.id;
  let c1 = f.wf.create(&f.s3, input("s3-a")).await.unwrap().reference.id;

  let all = PageRequest::default();
  let as_s1 = f.wf.find_all(&f.s1, all).await.unwrap();
  let as_l1 = f.wf.find_all(&f.l1, all).await.unwrap();
  let as_l2 = f.wf.find_all(&f.l2, all).await.unwrap();
  let as_s3 = f.wf.find_all(&f.s3, all).await.unwrap();
  let as_admin = f.wf.find_all(&f.admin, all).await.unwrap();

  assert_eq!(ids(&as_s1), sorted(vec![a1, a2]));
  assert_eq!(ids(&as_l1), sorted(vec![a1, a2, b1]));
  assert_eq!(ids(&as_l2), vec![c1]);
  assert_eq!(ids(&as_s3), vec![c1]);
  assert_eq!(ids(&as_admin), sorted(vec![a1, a2, b1, c1]));
  assert_eq!(as_admin.total, 4);

  assert!(as_s1.items.iter().all(|s| s.student.is_none() && s.lecturer.is_none()));
  assert!(as_l1.items.iter().all(|s| s.student.is_some() && s.lecturer.is_none()));
  assert!(as_admin.items.iter().all(|s| s.student.is_some() && s.lecturer.is_some()));
}

#[tokio::test]
async fn out_of_scope_lookup_is_not_found() {
  let f = fixture();
  let id = f.wf.create(&f.s1, input("mine")).await.unwrap().reference.id;

  assert!(matches!(f.wf.find_by_id(&f.s2, id).await, Err(Error::NotFound(_))));
  assert!(matches!(f.wf.find_by_id(&f.l2, id).await, Err(Error::NotFound(_))));
  assert!(f.wf.find_by_id(&f.l1, id).await.is_ok());
  assert!(f.wf.find_by_id(&f.admin, id).await.is_ok());
}

#[tokio::test]
async fn unknown_role_sees_nothing() {
  let f = fixture();
  let id = f.wf.create(&f.s1, input("a")).await.unwrap().reference.id;
  let dean = principal(Role::Other("dean".into()), "dean");

  let page = f.wf.find_all(&dean, PageRequest::default()).await.unwrap();
  assert!(page.items.is_empty());
  assert_eq!(f.wf.references().list_calls.load(Ordering::SeqCst), 0);
  assert!(matches!(f.wf.find_by_id(&dean, id).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn list_fetches_content_in_one_batch() {
  let f = fixture();
  let first = f.wf.create(&f.s1, input("Lomba Coding")).await.unwrap();
  f.wf.create(&f.s1, input("Hackathon")).await.unwrap();
  f.wf.create(&f.s2, input("Debat")).await.unwrap();

  // A second row pointing at an existing document: N rows, M < N documents.
  f.wf
    .references()
    .insert(NewReference {
      student_id:  first.reference.student_id,
      document_id: first.content.id,
    })
    .await
    .unwrap();

  let page = f.wf.find_all(&f.admin, PageRequest::default()).await.unwrap();
  assert_eq!(page.items.len(), 4);
  assert_eq!(f.wf.contents().get_many_calls.load(Ordering::SeqCst), 1);
  assert_eq!(f.wf.contents().get_calls.load(Ordering::SeqCst), 0);

  let docs = f.wf.contents().docs.lock().unwrap();
  for row in &page.items {
    let doc = &docs[&row.document_id];
    assert_eq!(row.title, doc.title);
    assert_eq!(row.achievement_type, doc.achievement_type);
    assert_eq!(row.created_at, doc.created_at);
  }
}

#[tokio::test]
async fn empty_list_skips_content_fetch() {
  let f = fixture();
  let page = f.wf.find_all(&f.s1, PageRequest::default()).await.unwrap();
  assert!(page.items.is_empty());
  assert_eq!(page.total, 0);
  assert_eq!(f.wf.contents().get_many_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn list_paginates_with_total() {
  let f = fixture();
  for n in 0..5 {
    f.wf.create(&f.s1, input(&format!("a{n}"))).await.unwrap();
  }
  let page = f
    .wf
    .find_all(&f.s1, PageRequest::new(Some(2), Some(2)))
    .await
    .unwrap();
  assert_eq!(page.items.len(), 2);
  assert_eq!(page.total, 5);

  let last = f
    .wf
    .find_all(&f.s1, PageRequest::new(Some(3), Some(2)))
    .await
    .unwrap();
  assert_eq!(last.items.len(), 1);
}

// ─── Attachments ─────────────────────────────────────────────────────────────

fn upload(name: &str) -> Upload {
  Upload {
    file_name:    name.into(),
    content_type: "application/pdf".into(),
    data:         Bytes::from_static(b"%PDF-1.7"),
  }
}

#[tokio::test]
async fn attachments_append_at_any_status() {
  let f = fixture();
  let id = f.wf.create(&f.s1, input("a")).await.unwrap().reference.id;

  let view = f.wf.attach(&f.s1, id, vec![upload("sertifikat.pdf")]).await.unwrap();
  assert_eq!(view.content.attachments.len(), 1);

  f.wf.submit(&f.s1, id).await.unwrap();
  let view = f
    .wf
    .attach(&f.s1, id, vec![upload("foto.jpg"), upload("piagam.pdf")])
    .await
    .unwrap();

  let names: Vec<&str> = view
    .content
    .attachments
    .iter()
    .map(|a| a.file_name.as_str())
    .collect();
  assert_eq!(names, vec!["sertifikat.pdf", "foto.jpg", "piagam.pdf"]);
  assert!(view.content.attachments[0].file_url.ends_with("sertifikat.pdf"));
  assert_eq!(view.content.attachments[0].file_type, "application/pdf");
}

#[tokio::test]
async fn attachment_requires_files() {
  let f = fixture();
  let id = f.wf.create(&f.s1, input("a")).await.unwrap().reference.id;
  assert!(matches!(f.wf.attach(&f.s1, id, vec![]).await, Err(Error::Validation(_))));
}

#[tokio::test]
async fn file_storage_failure_surfaces_and_keeps_content() {
  let f = fixture();
  let created = f.wf.create(&f.s1, input("a")).await.unwrap();
  f.wf.files().fail.store(true, Ordering::SeqCst);

  let err = f
    .wf
    .attach(&f.s1, created.reference.id, vec![upload("x.pdf")])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::AttachmentStorage(_)));
  assert!(f.wf.contents().docs.lock().unwrap()[&created.content.id].attachments.is_empty());
}

#[tokio::test]
async fn content_failure_after_upload_reports_and_leaves_files() {
  let f = fixture();
  let created = f.wf.create(&f.s1, input("a")).await.unwrap();
  f.wf.contents().fail_replace.store(true, Ordering::SeqCst);

  let err = f
    .wf
    .attach(&f.s1, created.reference.id, vec![upload("x.pdf"), upload("y.pdf")])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Persistence(_)));
  assert_eq!(f.wf.files().stored.lock().unwrap().len(), 2);
  assert!(f.wf.contents().docs.lock().unwrap()[&created.content.id].attachments.is_empty());
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

#[tokio::test]
async fn orphan_documents_are_found_and_purged() {
  let f = fixture();
  let kept = f.wf.create(&f.s1, input("kept")).await.unwrap();
  let deleted = f.wf.create(&f.s1, input("deleted")).await.unwrap();
  f.wf.delete(&f.s1, deleted.reference.id).await.unwrap();

  let orphan = f
    .wf
    .contents()
    .insert(input("orphan").into_new_content(kept.student.student_id))
    .await
    .unwrap();

  let found = reconcile::find_orphans(f.wf.references(), f.wf.contents(), Duration::zero())
    .await
    .unwrap();
  assert_eq!(found, vec![orphan.id]);

  let purged = reconcile::purge_orphans(f.wf.references(), f.wf.contents(), Duration::zero())
    .await
    .unwrap();
  assert_eq!(purged, vec![orphan.id]);

  let docs = f.wf.contents().docs.lock().unwrap();
  assert!(docs.contains_key(&kept.content.id));
  assert!(docs.contains_key(&deleted.content.id));
  assert!(!docs.contains_key(&orphan.id));
}

#[tokio::test]
async fn purge_spares_content_of_a_create_in_progress() {
  let f = fixture();
  let student_id = f.wf.references().students.lock().unwrap()[0].0.student_id;
  let grace = Duration::seconds(reconcile::DEFAULT_GRACE_SECS);

  // Content written, reference not yet.
  let content = f
    .wf
    .contents()
    .insert(input("in flight").into_new_content(student_id))
    .await
    .unwrap();

  let purged = reconcile::purge_orphans(f.wf.references(), f.wf.contents(), grace)
    .await
    .unwrap();
  assert!(purged.is_empty());

  let reference = f
    .wf
    .references()
    .insert(NewReference { student_id, document_id: content.id })
    .await
    .unwrap();
  let view = f.wf.find_by_id(&f.s1, reference.id).await.unwrap();
  assert_eq!(view.content.title, "in flight");
}

#[tokio::test]
async fn unreferenced_content_past_grace_is_orphaned() {
  let f = fixture();
  let student_id = f.wf.references().students.lock().unwrap()[0].0.student_id;
  let content = f
    .wf
    .contents()
    .insert(input("stale").into_new_content(student_id))
    .await
    .unwrap();

  let grace = Duration::seconds(reconcile::DEFAULT_GRACE_SECS);
  let found = reconcile::find_orphans(f.wf.references(), f.wf.contents(), grace)
    .await
    .unwrap();
  assert!(found.is_empty());

  // Seen from ten minutes later.
  let found = reconcile::find_orphans(f.wf.references(), f.wf.contents(), -grace)
    .await
    .unwrap();
  assert_eq!(found, vec![content.id]);
}

// ─── End to end ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn draft_submit_reject_history() {
  let f = fixture();

  let created = f.wf.create(&f.s1, input("Lomba Coding")).await.unwrap();
  assert_eq!(created.reference.status, Status::Draft);
  assert_eq!(created.content.title, "Lomba Coding");
  let id = created.reference.id;

  let submitted = f.wf.submit(&f.s1, id).await.unwrap();
  assert_eq!(submitted.reference.status, Status::Submitted);
  assert!(submitted.reference.submitted_at.is_some());

  let rejected = f.wf.reject(&f.l1, id, "incomplete").await.unwrap();
  assert_eq!(rejected.reference.status, Status::Rejected);
  assert_eq!(rejected.reference.rejection_note.as_deref(), Some("incomplete"));
  assert!(rejected.reference.verified_at.is_some());
  assert_eq!(rejected.reference.verified_by, Some(f.l1.user_id));

  let events = f.wf.history(&f.s1, id).await.unwrap();
  let actions: Vec<HistoryAction> = events.iter().map(|e| e.action).collect();
  assert_eq!(actions, vec![
    HistoryAction::Rejected,
    HistoryAction::Submitted,
    HistoryAction::Created,
  ]);
}

#[tokio::test]
async fn deleted_draft_is_not_found() {
  let f = fixture();
  let id = f.wf.create(&f.s2, input("a")).await.unwrap().reference.id;
  f.wf.delete(&f.s2, id).await.unwrap();
  assert!(matches!(f.wf.find_by_id(&f.s2, id).await, Err(Error::NotFound(_))));
  assert!(matches!(f.wf.history(&f.s2, id).await, Err(Error::NotFound(_))));
}
