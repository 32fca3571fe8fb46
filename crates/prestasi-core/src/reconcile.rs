//! Offline reconciliation of content documents that no reference points at.
//!
//! Orphans appear when a process dies between the content write and the
//! reference write of a create, or when a compensating delete fails. Nothing
//! here runs implicitly.
//!
//! A create in progress also has content without a reference for a moment,
//! so only documents older than a grace window count as orphans.

use std::collections::HashSet;

use chrono::{Duration, Utc};

use crate::{
  Error, Result,
  content::DocumentId,
  store::{ContentStore, ReferenceStore},
};

/// Minimum age of an unreferenced document before it is treated as orphaned.
pub const DEFAULT_GRACE_SECS: i64 = 600;

/// Document ids present in `contents`, created at least `grace` ago, with no
/// referencing row in `references`. Rows with a deleted status still count
/// as referencing.
pub async fn find_orphans<R, C>(
  references: &R,
  contents: &C,
  grace: Duration,
) -> Result<Vec<DocumentId>>
where
  R: ReferenceStore,
  C: ContentStore,
{
  let cutoff = Utc::now() - grace;

  // Listing content first: a create finishing in between then shows up in
  // the reference ids read afterwards.
  let candidates: Vec<DocumentId> = contents
    .list_ids()
    .await
    .map_err(Error::persistence)?
    .into_iter()
    .filter(|id| id.created_at() <= cutoff)
    .collect();

  let referenced: HashSet<DocumentId> = references
    .document_ids()
    .await
    .map_err(Error::persistence)?
    .into_iter()
    .collect();

  let mut orphans: Vec<DocumentId> = candidates
    .into_iter()
    .filter(|id| !referenced.contains(id))
    .collect();
  orphans.sort();
  Ok(orphans)
}

/// Delete every orphan found by [`find_orphans`]; returns the ids removed.
pub async fn purge_orphans<R, C>(
  references: &R,
  contents: &C,
  grace: Duration,
) -> Result<Vec<DocumentId>>
where
  R: ReferenceStore,
  C: ContentStore,
{
  let orphans = find_orphans(references, contents, grace).await?;
  let mut removed = Vec::with_capacity(orphans.len());
  for id in orphans {
    if contents.delete(id).await.map_err(Error::persistence)? {
      tracing::info!(document_id = %id, "purged orphan content document");
      removed.push(id);
    }
  }
  Ok(removed)
}
