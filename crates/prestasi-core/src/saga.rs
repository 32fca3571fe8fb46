//! Two-step writes across stores that share no transaction.
//!
//! The compensating action is captured before the second write runs. If the
//! write fails the compensation runs once; its own failure is logged and
//! swallowed, and the write's error is returned. A crash between the two steps
//! leaves the first write behind for [`reconcile`](crate::reconcile).

use std::{fmt::Display, future::Future};

/// Run `step`; on failure run `undo` and return the step's error.
pub async fn compensate<T, E, Step, Undo, UndoFut, UndoErr>(
  label: &str,
  step: Step,
  undo: Undo,
) -> Result<T, E>
where
  Step: Future<Output = Result<T, E>>,
  Undo: FnOnce() -> UndoFut,
  UndoFut: Future<Output = Result<(), UndoErr>>,
  UndoErr: Display,
  E: Display,
{
  match step.await {
    Ok(value) => Ok(value),
    Err(err) => {
      tracing::warn!(%label, error = %err, "step failed; compensating");
      if let Err(undo_err) = undo().await {
        tracing::error!(%label, error = %undo_err, "compensation failed; orphan left behind");
      }
      Err(err)
    }
  }
}
