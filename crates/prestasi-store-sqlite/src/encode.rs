//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (nanosecond
//! precision, `Z` suffix) so that lexicographic order is chronological.
//! UUIDs are stored as hyphenated lowercase strings and document ids as
//! 24-char lowercase hex.

use chrono::{DateTime, SecondsFormat, Utc};
use prestasi_core::{
  content::{AchievementContent, AchievementDetails, Attachment, DocumentId},
  reference::{
    AchievementReference, LecturerIdentity, PersonSummary, ReferenceRecord, Status,
    StudentIdentity,
  },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Nanos, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── Status / DocumentId ─────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<Status> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown achievement status: {s:?}")))
}

pub fn decode_document_id(s: &str) -> Result<DocumentId> { Ok(s.parse()?) }

// ─── Reference rows ──────────────────────────────────────────────────────────

/// Column list matching [`read_reference`], prefixed with the `a` alias.
pub const REFERENCE_COLUMNS: &str = "a.id, a.student_id, a.document_id, a.status, a.rejection_note,
       a.submitted_at, a.verified_at, a.verified_by, a.created_at, a.updated_at";

/// Raw strings read directly from an `achievement_references` row.
pub struct RawReference {
  pub id:             String,
  pub student_id:     String,
  pub document_id:    String,
  pub status:         String,
  pub rejection_note: Option<String>,
  pub submitted_at:   Option<String>,
  pub verified_at:    Option<String>,
  pub verified_by:    Option<String>,
  pub created_at:     String,
  pub updated_at:     String,
}

pub fn read_reference(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawReference> {
  Ok(RawReference {
    id:             row.get(0)?,
    student_id:     row.get(1)?,
    document_id:    row.get(2)?,
    status:         row.get(3)?,
    rejection_note: row.get(4)?,
    submitted_at:   row.get(5)?,
    verified_at:    row.get(6)?,
    verified_by:    row.get(7)?,
    created_at:     row.get(8)?,
    updated_at:     row.get(9)?,
  })
}

impl RawReference {
  pub fn into_reference(self) -> Result<AchievementReference> {
    Ok(AchievementReference {
      id:             decode_uuid(&self.id)?,
      student_id:     decode_uuid(&self.student_id)?,
      document_id:    decode_document_id(&self.document_id)?,
      status:         decode_status(&self.status)?,
      rejection_note: self.rejection_note,
      submitted_at:   decode_opt_dt(self.submitted_at)?,
      verified_at:    decode_opt_dt(self.verified_at)?,
      verified_by:    decode_opt_uuid(self.verified_by)?,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Identities ──────────────────────────────────────────────────────────────

/// Column list matching [`read_student`].
pub const STUDENT_COLUMNS: &str = "s.student_id, su.user_id, su.username, su.full_name, su.email,
       s.student_number, s.program_study, s.academic_year, s.advisor_id";

pub struct RawStudent {
  pub student_id:     String,
  pub user_id:        String,
  pub username:       String,
  pub full_name:      String,
  pub email:          String,
  pub student_number: String,
  pub program_study:  String,
  pub academic_year:  String,
  pub advisor_id:     Option<String>,
}

pub fn read_student(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<RawStudent> {
  Ok(RawStudent {
    student_id:     row.get(offset)?,
    user_id:        row.get(offset + 1)?,
    username:       row.get(offset + 2)?,
    full_name:      row.get(offset + 3)?,
    email:          row.get(offset + 4)?,
    student_number: row.get(offset + 5)?,
    program_study:  row.get(offset + 6)?,
    academic_year:  row.get(offset + 7)?,
    advisor_id:     row.get(offset + 8)?,
  })
}

impl RawStudent {
  pub fn into_identity(self) -> Result<StudentIdentity> {
    Ok(StudentIdentity {
      student_id:     decode_uuid(&self.student_id)?,
      person:         PersonSummary {
        user_id:   decode_uuid(&self.user_id)?,
        username:  self.username,
        full_name: self.full_name,
        email:     self.email,
      },
      student_number: self.student_number,
      program_study:  self.program_study,
      academic_year:  self.academic_year,
      advisor_id:     decode_opt_uuid(self.advisor_id)?,
    })
  }
}

/// Column list matching [`read_advisor`]. Every column is nullable because the
/// lecturer side is LEFT JOINed.
pub const ADVISOR_COLUMNS: &str = "l.lecturer_id, lu.user_id, lu.username, lu.full_name, lu.email,
       l.department";

pub struct RawAdvisor {
  pub lecturer_id: Option<String>,
  pub user_id:     Option<String>,
  pub username:    Option<String>,
  pub full_name:   Option<String>,
  pub email:       Option<String>,
  pub department:  Option<String>,
}

pub fn read_advisor(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<RawAdvisor> {
  Ok(RawAdvisor {
    lecturer_id: row.get(offset)?,
    user_id:     row.get(offset + 1)?,
    username:    row.get(offset + 2)?,
    full_name:   row.get(offset + 3)?,
    email:       row.get(offset + 4)?,
    department:  row.get(offset + 5)?,
  })
}

impl RawAdvisor {
  pub fn into_identity(self) -> Result<Option<LecturerIdentity>> {
    let (Some(lecturer_id), Some(user_id)) = (self.lecturer_id, self.user_id) else {
      return Ok(None);
    };
    Ok(Some(LecturerIdentity {
      lecturer_id: decode_uuid(&lecturer_id)?,
      person:      PersonSummary {
        user_id:   decode_uuid(&user_id)?,
        username:  self.username.unwrap_or_default(),
        full_name: self.full_name.unwrap_or_default(),
        email:     self.email.unwrap_or_default(),
      },
      department:  self.department.unwrap_or_default(),
    }))
  }
}

/// A reference row joined with owner and advisor.
pub struct RawRecord {
  pub reference: RawReference,
  pub student:   RawStudent,
  pub advisor:   RawAdvisor,
}

pub fn read_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
  Ok(RawRecord {
    reference: read_reference(row)?,
    student:   read_student(row, 10)?,
    advisor:   read_advisor(row, 19)?,
  })
}

impl RawRecord {
  pub fn into_record(self) -> Result<ReferenceRecord> {
    Ok(ReferenceRecord {
      reference: self.reference.into_reference()?,
      student:   self.student.into_identity()?,
      advisor:   self.advisor.into_identity()?,
    })
  }
}

// ─── Documents ───────────────────────────────────────────────────────────────

/// The JSON body of a content document: everything except the fields kept in
/// dedicated columns.
#[derive(Serialize, Deserialize)]
pub struct DocumentBody {
  pub achievement_type: String,
  pub title:            String,
  pub description:      String,
  #[serde(default)]
  pub details:          AchievementDetails,
  #[serde(default)]
  pub attachments:      Vec<Attachment>,
  #[serde(default)]
  pub tags:             Vec<String>,
  #[serde(default)]
  pub points:           i32,
}

pub fn encode_body(content: &AchievementContent) -> Result<String> {
  let body = DocumentBody {
    achievement_type: content.achievement_type.clone(),
    title:            content.title.clone(),
    description:      content.description.clone(),
    details:          content.details.clone(),
    attachments:      content.attachments.clone(),
    tags:             content.tags.clone(),
    points:           content.points,
  };
  Ok(serde_json::to_string(&body)?)
}

pub const DOCUMENT_COLUMNS: &str = "id, student_id, body, created_at, updated_at";

/// Raw strings read directly from an `achievements` document row.
pub struct RawDocument {
  pub id:         String,
  pub student_id: String,
  pub body:       String,
  pub created_at: String,
  pub updated_at: String,
}

pub fn read_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDocument> {
  Ok(RawDocument {
    id:         row.get(0)?,
    student_id: row.get(1)?,
    body:       row.get(2)?,
    created_at: row.get(3)?,
    updated_at: row.get(4)?,
  })
}

impl RawDocument {
  pub fn into_content(self) -> Result<AchievementContent> {
    let body: DocumentBody = serde_json::from_str(&self.body)?;
    Ok(AchievementContent {
      id:               decode_document_id(&self.id)?,
      student_id:       decode_uuid(&self.student_id)?,
      achievement_type: body.achievement_type,
      title:            body.title,
      description:      body.description,
      details:          body.details,
      attachments:      body.attachments,
      tags:             body.tags,
      points:           body.points,
      created_at:       decode_dt(&self.created_at)?,
      updated_at:       decode_dt(&self.updated_at)?,
    })
  }
}
