//! Lifecycle timeline derived from a reference row's timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reference::{AchievementReference, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
  Created,
  Submitted,
  Verified,
  Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
  pub action:    HistoryAction,
  pub timestamp: DateTime<Utc>,
}

/// Project `reference` into at most three events, newest first.
///
/// Equal timestamps order by lifecycle position, so a decision always
/// precedes the submission it decided, which precedes creation.
pub fn project(reference: &AchievementReference) -> Vec<HistoryEvent> {
  let mut events = Vec::with_capacity(3);

  events.push(HistoryEvent {
    action:    HistoryAction::Created,
    timestamp: reference.created_at,
  });

  if let Some(at) = reference.submitted_at {
    events.push(HistoryEvent { action: HistoryAction::Submitted, timestamp: at });
  }

  if let Some(at) = reference.verified_at {
    let action = match reference.status {
      Status::Rejected => HistoryAction::Rejected,
      _ => HistoryAction::Verified,
    };
    events.push(HistoryEvent { action, timestamp: at });
  }

  events.sort_by(|a, b| (b.timestamp, b.action).cmp(&(a.timestamp, a.action)));
  events
}
