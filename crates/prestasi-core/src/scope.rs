//! Access scoping: which achievements a principal may see and touch.
//!
//! The scope is derived once per request from the principal and handed to the
//! reference store, which turns it into a query restriction. The same scope is
//! used for listing and for single-item lookups, so an id outside the caller's
//! scope behaves exactly like a missing id.

use uuid::Uuid;

use crate::{
  principal::{Principal, Role},
  reference::{LecturerIdentity, ReferenceRecord, StudentIdentity},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
  /// Every non-deleted reference.
  All,
  /// References owned by students whose advisor is the lecturer with this
  /// user id.
  AdviseesOf(Uuid),
  /// References owned by the student with this user id.
  OwnedBy(Uuid),
  /// Nothing at all. Used for roles this crate does not know.
  Nothing,
}

impl AccessScope {
  pub fn for_principal(principal: &Principal) -> Self {
    match &principal.role {
      Role::Admin => Self::All,
      Role::Lecturer => Self::AdviseesOf(principal.user_id),
      Role::Student => Self::OwnedBy(principal.user_id),
      Role::Other(_) => Self::Nothing,
    }
  }

  pub fn is_nothing(&self) -> bool { matches!(self, Self::Nothing) }

  /// Whether `record` falls inside this scope. Stores may use this directly;
  /// SQL-backed stores express the same rule as a `WHERE` clause.
  pub fn admits(&self, record: &ReferenceRecord) -> bool {
    match self {
      Self::All => true,
      Self::AdviseesOf(lecturer_user) => record
        .advisor
        .as_ref()
        .is_some_and(|a| a.person.user_id == *lecturer_user),
      Self::OwnedBy(student_user) => record.student.person.user_id == *student_user,
      Self::Nothing => false,
    }
  }

  /// The identities a list row may carry under this scope: admins see owner
  /// and advisor, lecturers see the owner, students see neither.
  pub fn shape(
    &self,
    record: ReferenceRecord,
  ) -> (Option<StudentIdentity>, Option<LecturerIdentity>) {
    match self {
      Self::All => (Some(record.student), record.advisor),
      Self::AdviseesOf(_) => (Some(record.student), None),
      Self::OwnedBy(_) | Self::Nothing => (None, None),
    }
  }
}
