//! prestasi server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `PRESTASI_*` environment variables, opens the reference and document
//! stores, and serves the achievement API over HTTP.
//!
//! # Operator commands
//!
//! ```text
//! prestasi-server issue-token --username budi
//! prestasi-server reconcile            # list orphaned content documents
//! prestasi-server reconcile --delete   # and remove them
//! prestasi-server reconcile --grace-secs 3600
//! ```

mod files;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use prestasi_api::{AppState, ServerConfig};
use prestasi_core::{reconcile, workflow::Workflow};
use prestasi_store_sqlite::{SqliteDocumentStore, SqliteReferenceStore};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::files::LocalFileStorage;

#[derive(Parser)]
#[command(author, version, about = "Student achievement tracking server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API (default).
  Serve,
  /// Issue a bearer token for an existing user and print it.
  IssueToken {
    #[arg(long)]
    username: String,
  },
  /// Find content documents that no achievement reference points at.
  Reconcile {
    /// Delete the orphans instead of only listing them.
    #[arg(long)]
    delete: bool,
    /// Ignore documents younger than this many seconds; a create may still
    /// be writing their reference.
    #[arg(long, default_value_t = reconcile::DEFAULT_GRACE_SECS)]
    grace_secs: i64,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = load_config(cli.config)?;

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(cfg).await,
    Command::IssueToken { username } => issue_token(cfg, &username).await,
    Command::Reconcile { delete, grace_secs } => {
      run_reconcile(cfg, delete, chrono::Duration::seconds(grace_secs)).await
    }
  }
}

fn load_config(path: PathBuf) -> anyhow::Result<ServerConfig> {
  let settings = config::Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080_i64)?
    .set_default("database_path", "prestasi.db")?
    .set_default("document_path", "prestasi-documents.db")?
    .set_default("upload_dir", "uploads")?
    .set_default("upload_url_prefix", "/uploads")?
    .set_default("request_timeout_secs", 30_i64)?
    .set_default("token_ttl_hours", 24_i64)?
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("PRESTASI"))
    .build()
    .context("failed to read config file")?;

  let mut cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  cfg.database_path = expand_tilde(&cfg.database_path);
  cfg.document_path = expand_tilde(&cfg.document_path);
  cfg.upload_dir = expand_tilde(&cfg.upload_dir);
  Ok(cfg)
}

async fn open_stores(
  cfg: &ServerConfig,
) -> anyhow::Result<(SqliteReferenceStore, SqliteDocumentStore)> {
  let references = SqliteReferenceStore::open(&cfg.database_path)
    .await
    .with_context(|| format!("failed to open reference store at {:?}", cfg.database_path))?;
  let documents = SqliteDocumentStore::open(&cfg.document_path)
    .await
    .with_context(|| format!("failed to open document store at {:?}", cfg.document_path))?;
  Ok((references, documents))
}

async fn serve(cfg: ServerConfig) -> anyhow::Result<()> {
  let (references, documents) = open_stores(&cfg).await?;
  let files = LocalFileStorage::new(&cfg.upload_dir, &cfg.upload_url_prefix);
  tracing::info!(dir = ?files.dir(), "storing attachments");

  let address = format!("{}:{}", cfg.host, cfg.port);
  let state = AppState::new(Workflow::new(references, documents, files), cfg);
  let app = prestasi_api::router(state);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

async fn issue_token(cfg: ServerConfig, username: &str) -> anyhow::Result<()> {
  let (references, _) = open_stores(&cfg).await?;
  let issued = references
    .issue_token(username, chrono::Duration::hours(cfg.token_ttl_hours))
    .await
    .with_context(|| format!("failed to issue token for {username}"))?;

  println!("{}", issued.token);
  eprintln!("expires at {}", issued.expires_at.to_rfc3339());
  Ok(())
}

async fn run_reconcile(
  cfg: ServerConfig,
  delete: bool,
  grace: chrono::Duration,
) -> anyhow::Result<()> {
  let (references, documents) = open_stores(&cfg).await?;

  let ids = if delete {
    reconcile::purge_orphans(&references, &documents, grace).await
  } else {
    reconcile::find_orphans(&references, &documents, grace).await
  }
  .context("reconciliation failed")?;

  for id in &ids {
    println!("{id}");
  }
  tracing::info!(count = ids.len(), deleted = delete, "reconciliation finished");
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
