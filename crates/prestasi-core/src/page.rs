//! Pagination for list operations.

use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// A 1-based page request. Out-of-range values are clamped, not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
  pub page:  u32,
  pub limit: u32,
}

impl PageRequest {
  pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
    Self {
      page:  page.unwrap_or(1).max(1),
      limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
    }
  }

  pub fn offset(&self) -> u64 { u64::from(self.page - 1) * u64::from(self.limit) }
}

impl Default for PageRequest {
  fn default() -> Self { Self::new(None, None) }
}

/// One page of results plus the total number of matching items.
#[derive(Debug, Clone)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub total: u64,
}

impl<T> Page<T> {
  pub fn empty() -> Self { Self { items: Vec::new(), total: 0 } }
}

/// Paging metadata echoed back to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
  pub page:       u32,
  pub size:       u32,
  pub total_item: u64,
  pub total_page: u64,
}

impl PageMeta {
  pub fn new(request: PageRequest, total: u64) -> Self {
    Self {
      page:       request.page,
      size:       request.limit,
      total_item: total,
      total_page: total.div_ceil(u64::from(request.limit)),
    }
  }
}
