//! [`LocalFileStorage`]: attachment files on the local filesystem.

use std::{
  io,
  path::{Path, PathBuf},
};

use bytes::Bytes;
use chrono::Utc;
use prestasi_core::store::FileStorage;
use tokio::{fs, io::AsyncWriteExt as _};

/// Writes each upload to `<dir>/<unix_nanos>_<name>` and returns
/// `<url_prefix>/<unix_nanos>_<name>`.
pub struct LocalFileStorage {
  dir:        PathBuf,
  url_prefix: String,
}

impl LocalFileStorage {
  pub fn new(dir: impl Into<PathBuf>, url_prefix: &str) -> Self {
    Self {
      dir:        dir.into(),
      url_prefix: url_prefix.trim_end_matches('/').to_owned(),
    }
  }

  pub fn dir(&self) -> &Path { &self.dir }
}

/// Reduce a client-supplied name to a single safe path component.
fn sanitise(file_name: &str) -> String {
  let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
  let cleaned: String = base
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
    .collect();
  let cleaned = cleaned.trim_start_matches('.');
  if cleaned.is_empty() { "attachment".to_owned() } else { cleaned.to_owned() }
}

impl FileStorage for LocalFileStorage {
  type Error = io::Error;

  async fn put(&self, file_name: &str, _content_type: &str, data: Bytes) -> io::Result<String> {
    fs::create_dir_all(&self.dir).await?;
    let name = sanitise(file_name);
    let mut stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();

    // Two uploads in the same tick get consecutive stamps.
    let (stored, mut file) = loop {
      let stored = format!("{stamp}_{name}");
      match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(self.dir.join(&stored))
        .await
      {
        Ok(file) => break (stored, file),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => stamp += 1,
        Err(e) => return Err(e),
      }
    };
    file.write_all(&data).await?;
    file.flush().await?;

    tracing::debug!(file = %stored, bytes = data.len(), "attachment written");
    Ok(format!("{}/{stored}", self.url_prefix))
  }
}
