//! The authenticated caller, as established by an [`Authenticator`].
//!
//! [`Authenticator`]: crate::store::Authenticator

use std::{convert::Infallible, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A caller's role. Role names are stored as plain strings; names this
/// crate does not know are kept verbatim in [`Role::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
  Admin,
  Lecturer,
  /// Serialised as `mahasiswa`.
  Student,
  Other(String),
}

impl Role {
  pub fn as_str(&self) -> &str {
    match self {
      Role::Admin => "admin",
      Role::Lecturer => "lecturer",
      Role::Student => "mahasiswa",
      Role::Other(name) => name,
    }
  }

  /// Roles allowed to verify or reject a submission.
  pub fn is_reviewer(&self) -> bool {
    matches!(self, Role::Admin | Role::Lecturer)
  }
}

impl FromStr for Role {
  type Err = Infallible;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(match s {
      "admin" => Role::Admin,
      "lecturer" => Role::Lecturer,
      "mahasiswa" => Role::Student,
      other => Role::Other(other.to_owned()),
    })
  }
}

impl From<String> for Role {
  fn from(s: String) -> Self {
    match s.parse() {
      Ok(role) => role,
      Err(never) => match never {},
    }
  }
}

impl From<Role> for String {
  fn from(role: Role) -> Self { role.as_str().to_owned() }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A verified caller identity. Trusted unconditionally by the workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
  pub user_id:     Uuid,
  pub username:    String,
  pub role:        Role,
  pub permissions: Vec<String>,
}

impl Principal {
  pub fn has_permission(&self, permission: &str) -> bool {
    self.permissions.iter().any(|p| p == permission)
  }
}
