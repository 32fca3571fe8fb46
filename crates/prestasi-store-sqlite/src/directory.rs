//! Users, profiles, role grants and bearer tokens.
//!
//! The seeding methods here provision the directory for tests and operators;
//! they are not a user-management API. [`Authenticator`] resolves a bearer
//! token into a [`Principal`] carrying the role's permission set.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rand_core::{OsRng, RngCore};
use rusqlite::OptionalExtension as _;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use prestasi_core::{
  principal::{Principal, Role},
  store::Authenticator,
};

use crate::{
  Error, Result,
  encode::{decode_uuid, encode_dt, encode_uuid},
  references::SqliteReferenceStore,
};

// ─── Inputs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct NewUser {
  pub username:  String,
  pub full_name: String,
  pub email:     String,
  pub role:      Role,
}

#[derive(Debug, Clone)]
pub struct NewLecturer {
  pub user_id:         Uuid,
  pub lecturer_number: String,
  pub department:      String,
}

#[derive(Debug, Clone)]
pub struct NewStudent {
  pub user_id:        Uuid,
  pub student_number: String,
  pub program_study:  String,
  pub academic_year:  String,
  /// Lecturer id (not user id) of the academic advisor.
  pub advisor_id:     Option<Uuid>,
}

/// A freshly issued bearer token. `token` is shown once and never stored.
#[derive(Debug, Clone)]
pub struct IssuedToken {
  pub token:      String,
  pub user_id:    Uuid,
  pub expires_at: DateTime<Utc>,
}

fn digest(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }

// ─── Seeding ─────────────────────────────────────────────────────────────────

impl SqliteReferenceStore {
  pub async fn insert_user(&self, user: NewUser) -> Result<Uuid> {
    let user_id = Uuid::new_v4();
    let id_str = encode_uuid(user_id);
    let role_str = user.role.as_str().to_owned();
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, username, full_name, email, role, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, user.username, user.full_name, user.email, role_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(user_id)
  }

  pub async fn insert_lecturer(&self, lecturer: NewLecturer) -> Result<Uuid> {
    let lecturer_id = Uuid::new_v4();
    let id_str = encode_uuid(lecturer_id);
    let user_str = encode_uuid(lecturer.user_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO lecturers (lecturer_id, user_id, lecturer_number, department)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, user_str, lecturer.lecturer_number, lecturer.department],
        )?;
        Ok(())
      })
      .await?;

    Ok(lecturer_id)
  }

  pub async fn insert_student(&self, student: NewStudent) -> Result<Uuid> {
    let student_id = Uuid::new_v4();
    let id_str = encode_uuid(student_id);
    let user_str = encode_uuid(student.user_id);
    let advisor_str = student.advisor_id.map(encode_uuid);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO students
             (student_id, user_id, student_number, program_study, academic_year, advisor_id)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            id_str,
            user_str,
            student.student_number,
            student.program_study,
            student.academic_year,
            advisor_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(student_id)
  }

  /// Grant `permission` to `role`, creating the role if needed.
  pub async fn grant(&self, role: &Role, permission: &str) -> Result<()> {
    let role_str = role.as_str().to_owned();
    let permission = permission.to_owned();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("INSERT OR IGNORE INTO roles (name) VALUES (?1)", rusqlite::params![role_str])?;
        tx.execute(
          "INSERT OR IGNORE INTO role_permissions (role, permission) VALUES (?1, ?2)",
          rusqlite::params![role_str, permission],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Issue a bearer token for `username` valid for `ttl`.
  pub async fn issue_token(&self, username: &str, ttl: Duration) -> Result<IssuedToken> {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let token = URL_SAFE_NO_PAD.encode(bytes);

    let now = Utc::now();
    let expires_at = now + ttl;

    let name = username.to_owned();
    let hash = digest(&token);
    let now_str = encode_dt(now);
    let exp_str = encode_dt(expires_at);

    let user_str: Option<String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let user: Option<String> = tx
          .query_row(
            "SELECT user_id FROM users WHERE username = ?1",
            rusqlite::params![name],
            |r| r.get(0),
          )
          .optional()?;
        if let Some(user_id) = &user {
          tx.execute(
            "INSERT INTO api_tokens (token_hash, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![hash, user_id, now_str, exp_str],
          )?;
        }
        tx.commit()?;
        Ok(user)
      })
      .await?;

    let user_id = match user_str {
      Some(s) => decode_uuid(&s)?,
      None => return Err(Error::UserNotFound(username.to_owned())),
    };

    tracing::info!(%username, %expires_at, "api token issued");
    Ok(IssuedToken { token, user_id, expires_at })
  }
}

// ─── Authenticator impl ──────────────────────────────────────────────────────

impl Authenticator for SqliteReferenceStore {
  type Error = Error;

  async fn authenticate(&self, credential: &str) -> Result<Option<Principal>> {
    let hash = digest(credential);
    let now_str = encode_dt(Utc::now());

    let found: Option<(String, String, String, Vec<String>)> = self
      .conn
      .call(move |conn| {
        let user: Option<(String, String, String)> = conn
          .query_row(
            "SELECT u.user_id, u.username, u.role
             FROM api_tokens t
             JOIN users u ON u.user_id = t.user_id
             WHERE t.token_hash = ?1 AND t.expires_at > ?2",
            rusqlite::params![hash, now_str],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
          )
          .optional()?;

        let Some((user_id, username, role)) = user else {
          return Ok(None);
        };

        let mut stmt = conn.prepare(
          "SELECT permission FROM role_permissions WHERE role = ?1 ORDER BY permission",
        )?;
        let permissions = stmt
          .query_map(rusqlite::params![role], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(Some((user_id, username, role, permissions)))
      })
      .await?;

    let Some((user_id, username, role, permissions)) = found else {
      return Ok(None);
    };

    Ok(Some(Principal {
      user_id: decode_uuid(&user_id)?,
      username,
      role: Role::from(role),
      permissions,
    }))
  }
}
