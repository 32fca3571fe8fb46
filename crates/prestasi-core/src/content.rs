//! Achievement content: the flexible, schema-light half of an achievement.
//!
//! Content documents live in the document store, keyed by a 12-byte
//! [`DocumentId`]. Workflow state is never stored here; see
//! [`reference`](crate::reference).

use std::{
  fmt,
  str::FromStr,
  sync::{
    LazyLock,
    atomic::{AtomicU32, Ordering},
  },
};

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Document id ─────────────────────────────────────────────────────────────

static COUNTER: LazyLock<AtomicU32> =
  LazyLock::new(|| AtomicU32::new(OsRng.next_u32()));

/// Native 12-byte document id: 4-byte big-endian unix seconds, 5 random
/// bytes, 3-byte counter. Exchanged externally as 24 lowercase hex chars.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId([u8; 12]);

impl DocumentId {
  pub fn generate() -> Self {
    let mut bytes = [0u8; 12];
    let secs = Utc::now().timestamp() as u32;
    bytes[..4].copy_from_slice(&secs.to_be_bytes());
    OsRng.fill_bytes(&mut bytes[4..9]);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
    Self(bytes)
  }

  pub fn from_bytes(bytes: [u8; 12]) -> Self { Self(bytes) }

  pub fn as_bytes(&self) -> &[u8; 12] { &self.0 }

  pub fn to_hex(&self) -> String { hex::encode(self.0) }

  /// The creation second embedded in the first four bytes.
  pub fn created_at(&self) -> DateTime<Utc> {
    let [a, b, c, d, ..] = self.0;
    let secs = u32::from_be_bytes([a, b, c, d]);
    DateTime::from_timestamp(i64::from(secs), 0).unwrap_or_default()
  }
}

impl FromStr for DocumentId {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let mut bytes = [0u8; 12];
    hex::decode_to_slice(s, &mut bytes)
      .map_err(|_| Error::Validation(format!("invalid document id: {s:?}")))?;
    Ok(Self(bytes))
  }
}

impl fmt::Display for DocumentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_hex())
  }
}

impl fmt::Debug for DocumentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "DocumentId({})", self.to_hex())
  }
}

impl Serialize for DocumentId {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.to_hex())
  }
}

impl<'de> Deserialize<'de> for DocumentId {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(de::Error::custom)
  }
}

// ─── Details ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionDetails {
  pub name:  String,
  pub level: Option<String>,
  pub rank:  Option<u32>,
  pub medal: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationDetails {
  pub name:       String,
  pub position:   Option<String>,
  pub start_date: Option<NaiveDate>,
  pub end_date:   Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetails {
  pub event_date: Option<NaiveDate>,
  pub location:   Option<String>,
  pub organizer:  Option<String>,
}

/// Structured details. The facets are alternatives; usually only one is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementDetails {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub competition:  Option<CompetitionDetails>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub organization: Option<OrganizationDetails>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub event:        Option<EventDetails>,
}

/// Evidence file attached to an achievement. Bytes live in file storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
  pub file_name:   String,
  pub file_url:    String,
  pub file_type:   String,
  pub uploaded_at: DateTime<Utc>,
}

// ─── Content document ────────────────────────────────────────────────────────

/// A stored content document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementContent {
  pub id:               DocumentId,
  /// Owner as recorded in the document. The reference row's student id is
  /// authoritative when the two disagree.
  pub student_id:       Uuid,
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
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
}

/// Input to [`ContentStore::insert`](crate::store::ContentStore::insert).
/// The store assigns the id and both timestamps.
#[derive(Debug, Clone)]
pub struct NewContent {
  pub student_id:       Uuid,
  pub achievement_type: String,
  pub title:            String,
  pub description:      String,
  pub details:          AchievementDetails,
  pub tags:             Vec<String>,
  pub points:           i32,
}

/// Caller-supplied achievement fields for create and update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AchievementInput {
  #[serde(default)]
  pub achievement_type: String,
  #[serde(default)]
  pub title:            String,
  #[serde(default)]
  pub description:      String,
  #[serde(default)]
  pub details:          AchievementDetails,
  #[serde(default)]
  pub tags:             Vec<String>,
}

impl AchievementInput {
  /// Type, title and description are required; details and tags are not.
  pub fn validate(&self) -> Result<()> {
    let missing: Vec<&str> = [
      ("achievement_type", &self.achievement_type),
      ("title", &self.title),
      ("description", &self.description),
    ]
    .into_iter()
    .filter(|(_, v)| v.trim().is_empty())
    .map(|(name, _)| name)
    .collect();

    if missing.is_empty() {
      Ok(())
    } else {
      Err(Error::Validation(format!("missing required fields: {}", missing.join(", "))))
    }
  }

  pub fn into_new_content(self, student_id: Uuid) -> NewContent {
    NewContent {
      student_id,
      achievement_type: self.achievement_type,
      title: self.title,
      description: self.description,
      details: self.details,
      tags: self.tags,
      points: 0,
    }
  }

  /// Overwrite the editable fields of `content`, keeping id, attachments,
  /// points and creation time.
  pub fn apply_to(self, content: &mut AchievementContent) {
    content.achievement_type = self.achievement_type;
    content.title = self.title;
    content.description = self.description;
    content.details = self.details;
    content.tags = self.tags;
  }
}

/// An uploaded evidence file on its way to file storage.
#[derive(Debug, Clone)]
pub struct Upload {
  pub file_name:    String,
  pub content_type: String,
  pub data:         Bytes,
}
