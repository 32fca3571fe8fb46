//! [`SqliteDocumentStore`]: achievement content documents as JSON rows.

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, params_from_iter};

use prestasi_core::{
  content::{AchievementContent, DocumentId, NewContent},
  store::ContentStore,
};

use crate::{
  Result,
  encode::{
    DOCUMENT_COLUMNS, RawDocument, decode_document_id, decode_dt, encode_body, encode_dt,
    encode_uuid, read_document,
  },
  schema::DOCUMENT_SCHEMA,
};

/// The document store, on its own connection (and usually its own file).
#[derive(Clone)]
pub struct SqliteDocumentStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteDocumentStore {
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(DOCUMENT_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── ContentStore impl ───────────────────────────────────────────────────────

impl ContentStore for SqliteDocumentStore {
  type Error = crate::Error;

  async fn insert(&self, input: NewContent) -> Result<AchievementContent> {
    let now = Utc::now();
    let content = AchievementContent {
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

    let id_str      = content.id.to_hex();
    let student_str = encode_uuid(content.student_id);
    let body        = encode_body(&content)?;
    let at_str      = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO achievements (id, student_id, body, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?4)",
          rusqlite::params![id_str, student_str, body, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(content)
  }

  async fn replace(&self, mut content: AchievementContent) -> Result<Option<AchievementContent>> {
    let now = Utc::now();
    let id_str      = content.id.to_hex();
    let student_str = encode_uuid(content.student_id);
    let body        = encode_body(&content)?;
    let at_str      = encode_dt(now);

    let created: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "UPDATE achievements
               SET student_id = ?1, body = ?2, updated_at = ?3
               WHERE id = ?4
               RETURNING created_at",
              rusqlite::params![student_str, body, at_str, id_str],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    let Some(created) = created else {
      return Ok(None);
    };
    content.created_at = decode_dt(&created)?;
    content.updated_at = now;
    Ok(Some(content))
  }

  async fn get(&self, id: DocumentId) -> Result<Option<AchievementContent>> {
    let id_str = id.to_hex();

    let raw: Option<RawDocument> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {DOCUMENT_COLUMNS} FROM achievements WHERE id = ?1"),
              rusqlite::params![id_str],
              read_document,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDocument::into_content).transpose()
  }

  async fn get_many(&self, ids: &[DocumentId]) -> Result<Vec<AchievementContent>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }

    let keys: Vec<String> = ids.iter().map(DocumentId::to_hex).collect();
    let placeholders = vec!["?"; keys.len()].join(", ");
    let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM achievements WHERE id IN ({placeholders})");

    let raws: Vec<RawDocument> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(keys), read_document)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDocument::into_content).collect()
  }

  async fn delete(&self, id: DocumentId) -> Result<bool> {
    let id_str = id.to_hex();
    let affected = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM achievements WHERE id = ?1", rusqlite::params![id_str])?)
      })
      .await?;
    Ok(affected > 0)
  }

  async fn list_ids(&self) -> Result<Vec<DocumentId>> {
    let raws: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT id FROM achievements ORDER BY id")?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.iter().map(|s| decode_document_id(s)).collect()
  }
}
