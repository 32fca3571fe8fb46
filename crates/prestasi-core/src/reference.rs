//! Achievement references: the relational half of an achievement.
//!
//! A reference row owns workflow status, ownership and review timestamps, and
//! points at exactly one content document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::content::DocumentId;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Workflow status: `draft → submitted → {verified | rejected}`, plus the
/// `deleted` tombstone reachable from draft or submitted.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Status {
  Draft,
  Submitted,
  Verified,
  Rejected,
  Deleted,
}

impl Status {
  /// A reviewer has decided; no further transitions are possible.
  pub fn is_decided(self) -> bool { matches!(self, Self::Verified | Self::Rejected) }
}

// ─── Reference row ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementReference {
  pub id:             Uuid,
  pub student_id:     Uuid,
  pub document_id:    DocumentId,
  pub status:         Status,
  /// Present only when `status` is [`Status::Rejected`].
  #[serde(skip_serializing_if = "Option::is_none")]
  pub rejection_note: Option<String>,
  pub submitted_at:   Option<DateTime<Utc>>,
  /// Set together with `verified_by` when a reviewer verifies or rejects.
  pub verified_at:    Option<DateTime<Utc>>,
  pub verified_by:    Option<Uuid>,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

/// Input to [`ReferenceStore::insert`](crate::store::ReferenceStore::insert).
/// New rows always start as [`Status::Draft`].
#[derive(Debug, Clone)]
pub struct NewReference {
  pub student_id:  Uuid,
  pub document_id: DocumentId,
}

/// A partial update. `None` fields are left untouched; `updated_at` is always
/// written.
#[derive(Debug, Clone)]
pub struct ReferencePatch {
  /// Apply only while the row still has this status.
  pub expected:       Option<Status>,
  pub status:         Option<Status>,
  pub rejection_note: Option<String>,
  pub submitted_at:   Option<DateTime<Utc>>,
  pub verified_at:    Option<DateTime<Utc>>,
  pub verified_by:    Option<Uuid>,
  pub updated_at:     DateTime<Utc>,
}

impl ReferencePatch {
  pub fn at(updated_at: DateTime<Utc>) -> Self {
    Self {
      expected: None,
      status: None,
      rejection_note: None,
      submitted_at: None,
      verified_at: None,
      verified_by: None,
      updated_at,
    }
  }

  /// Apply to an in-memory copy, mirroring what the store wrote.
  pub fn apply(&self, reference: &mut AchievementReference) {
    if let Some(status) = self.status {
      reference.status = status;
    }
    if let Some(note) = &self.rejection_note {
      reference.rejection_note = Some(note.clone());
    }
    if let Some(at) = self.submitted_at {
      reference.submitted_at = Some(at);
    }
    if let Some(at) = self.verified_at {
      reference.verified_at = Some(at);
    }
    if let Some(by) = self.verified_by {
      reference.verified_by = Some(by);
    }
    reference.updated_at = self.updated_at;
  }
}

// ─── Joined identities ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonSummary {
  pub user_id:   Uuid,
  pub username:  String,
  pub full_name: String,
  pub email:     String,
}

/// A student profile joined with its user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentIdentity {
  pub student_id:     Uuid,
  #[serde(flatten)]
  pub person:         PersonSummary,
  /// Institutional student number (NIM).
  pub student_number: String,
  pub program_study:  String,
  pub academic_year:  String,
  pub advisor_id:     Option<Uuid>,
}

/// A lecturer profile joined with its user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LecturerIdentity {
  pub lecturer_id: Uuid,
  #[serde(flatten)]
  pub person:      PersonSummary,
  pub department:  String,
}

/// A reference row joined with its owner and the owner's advisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
  #[serde(flatten)]
  pub reference: AchievementReference,
  pub student:   StudentIdentity,
  pub advisor:   Option<LecturerIdentity>,
}
