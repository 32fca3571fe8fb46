//! [`SqliteReferenceStore`]: the SQLite implementation of [`ReferenceStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, params_from_iter, types::Value};
use uuid::Uuid;

use prestasi_core::{
  content::DocumentId,
  page::{Page, PageRequest},
  reference::{
    AchievementReference, NewReference, ReferencePatch, ReferenceRecord, Status,
    StudentIdentity,
  },
  scope::AccessScope,
  store::ReferenceStore,
};

use crate::{
  Result,
  encode::{
    ADVISOR_COLUMNS, REFERENCE_COLUMNS, RawRecord, RawStudent, STUDENT_COLUMNS,
    decode_document_id, encode_dt, encode_uuid, read_record, read_student,
  },
  schema::REFERENCE_SCHEMA,
};

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Reference rows joined with owner and optional advisor. The `su` and `lu`
/// aliases are what [`scope_filter`] restricts on.
const RECORD_FROM: &str = "FROM achievement_references a
     JOIN students s        ON s.student_id  = a.student_id
     JOIN users su          ON su.user_id    = s.user_id
     LEFT JOIN lecturers l  ON l.lecturer_id = s.advisor_id
     LEFT JOIN users lu     ON lu.user_id    = l.user_id";

const LIVE: &str = "a.status <> 'deleted'";

/// Turn an [`AccessScope`] into a trailing `AND ...` clause and its parameter.
fn scope_filter(scope: &AccessScope) -> (&'static str, Option<Value>) {
  match scope {
    AccessScope::All => ("", None),
    AccessScope::AdviseesOf(user_id) => {
      (" AND lu.user_id = ?", Some(Value::Text(encode_uuid(*user_id))))
    }
    AccessScope::OwnedBy(user_id) => {
      (" AND su.user_id = ?", Some(Value::Text(encode_uuid(*user_id))))
    }
    AccessScope::Nothing => (" AND 0", None),
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// The relational reference store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteReferenceStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteReferenceStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
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
        conn.execute_batch(REFERENCE_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── ReferenceStore impl ─────────────────────────────────────────────────────

impl ReferenceStore for SqliteReferenceStore {
  type Error = crate::Error;

  async fn find_student_by_user(&self, user_id: Uuid) -> Result<Option<StudentIdentity>> {
    let user_str = encode_uuid(user_id);

    let raw: Option<RawStudent> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {STUDENT_COLUMNS}
                 FROM students s
                 JOIN users su ON su.user_id = s.user_id
                 WHERE s.user_id = ?1"
              ),
              rusqlite::params![user_str],
              |row| read_student(row, 0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawStudent::into_identity).transpose()
  }

  async fn insert(&self, input: NewReference) -> Result<AchievementReference> {
    let now = Utc::now();
    let reference = AchievementReference {
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

    let id_str       = encode_uuid(reference.id);
    let student_str  = encode_uuid(reference.student_id);
    let document_str = reference.document_id.to_hex();
    let status_str   = reference.status.to_string();
    let at_str       = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO achievement_references
             (id, student_id, document_id, status, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          rusqlite::params![id_str, student_str, document_str, status_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(reference)
  }

  async fn patch(&self, id: Uuid, patch: ReferencePatch) -> Result<u64> {
    let mut sets: Vec<&'static str> = vec!["updated_at = ?"];
    let mut values: Vec<Value> = vec![Value::Text(encode_dt(patch.updated_at))];

    if let Some(status) = patch.status {
      sets.push("status = ?");
      values.push(Value::Text(status.to_string()));
    }
    if let Some(note) = patch.rejection_note {
      sets.push("rejection_note = ?");
      values.push(Value::Text(note));
    }
    if let Some(at) = patch.submitted_at {
      sets.push("submitted_at = ?");
      values.push(Value::Text(encode_dt(at)));
    }
    if let Some(at) = patch.verified_at {
      sets.push("verified_at = ?");
      values.push(Value::Text(encode_dt(at)));
    }
    if let Some(by) = patch.verified_by {
      sets.push("verified_by = ?");
      values.push(Value::Text(encode_uuid(by)));
    }
    values.push(Value::Text(encode_uuid(id)));

    let guard = match patch.expected {
      Some(expected) => {
        values.push(Value::Text(expected.to_string()));
        " AND status = ?"
      }
      None => "",
    };
    let sql = format!(
      "UPDATE achievement_references SET {} WHERE id = ? AND status <> 'deleted'{guard}",
      sets.join(", ")
    );

    let affected = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, params_from_iter(values))?))
      .await?;
    Ok(affected as u64)
  }

  async fn soft_delete(&self, id: Uuid) -> Result<u64> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(Utc::now());

    let affected = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE achievement_references
           SET status = 'deleted', updated_at = ?1
           WHERE id = ?2 AND status IN ('draft', 'submitted')",
          rusqlite::params![at_str, id_str],
        )?)
      })
      .await?;
    Ok(affected as u64)
  }

  async fn find(&self, id: Uuid, scope: &AccessScope) -> Result<Option<ReferenceRecord>> {
    let (filter, scope_param) = scope_filter(scope);
    let mut values = vec![Value::Text(encode_uuid(id))];
    values.extend(scope_param);

    let sql = format!(
      "SELECT {REFERENCE_COLUMNS}, {STUDENT_COLUMNS}, {ADVISOR_COLUMNS}
       {RECORD_FROM}
       WHERE {LIVE} AND a.id = ?{filter}"
    );

    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, params_from_iter(values), read_record)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  async fn list(&self, scope: &AccessScope, page: PageRequest) -> Result<Page<ReferenceRecord>> {
    let (filter, scope_param) = scope_filter(scope);
    let filter_values: Vec<Value> = scope_param.into_iter().collect();
    let mut page_values = filter_values.clone();
    page_values.push(Value::Integer(i64::from(page.limit)));
    page_values.push(Value::Integer(page.offset() as i64));

    let count_sql = format!("SELECT COUNT(*) {RECORD_FROM} WHERE {LIVE}{filter}");
    let page_sql = format!(
      "SELECT {REFERENCE_COLUMNS}, {STUDENT_COLUMNS}, {ADVISOR_COLUMNS}
       {RECORD_FROM}
       WHERE {LIVE}{filter}
       ORDER BY a.created_at DESC, a.id
       LIMIT ? OFFSET ?"
    );

    let (total, raws): (i64, Vec<RawRecord>) = self
      .conn
      .call(move |conn| {
        let total: i64 =
          conn.query_row(&count_sql, params_from_iter(filter_values), |r| r.get(0))?;

        let mut stmt = conn.prepare(&page_sql)?;
        let rows = stmt
          .query_map(params_from_iter(page_values), read_record)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((total, rows))
      })
      .await?;

    let items = raws
      .into_iter()
      .map(RawRecord::into_record)
      .collect::<Result<_>>()?;

    Ok(Page { items, total: total as u64 })
  }

  async fn document_ids(&self) -> Result<Vec<DocumentId>> {
    let raws: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT DISTINCT document_id FROM achievement_references")?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.iter().map(|s| decode_document_id(s)).collect()
  }
}
