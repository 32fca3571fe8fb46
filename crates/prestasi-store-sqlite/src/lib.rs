//! SQLite backends for Prestasi.
//!
//! [`SqliteReferenceStore`] holds the relational side: users, roles, student
//! and lecturer profiles, API tokens and achievement reference rows.
//! [`SqliteDocumentStore`] holds achievement content as JSON documents. The
//! two are opened on separate connections and never share a transaction.
//!
//! Both wrap [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime.

mod directory;
mod documents;
mod encode;
mod references;
mod schema;

pub mod error;

pub use directory::{IssuedToken, NewLecturer, NewStudent, NewUser};
pub use documents::SqliteDocumentStore;
pub use error::{Error, Result};
pub use references::SqliteReferenceStore;
