//! Core types, store traits and the achievement workflow for Prestasi.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Achievement content lives in a document store and workflow state lives in a
//! relational reference store; [`workflow::Workflow`] keeps the two consistent
//! without a shared transaction.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod content;
pub mod error;
pub mod history;
pub mod page;
pub mod principal;
pub mod reconcile;
pub mod reference;
pub mod saga;
pub mod scope;
pub mod store;
pub mod workflow;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;
