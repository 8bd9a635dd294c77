//! Domain types and logic for answering AFL statistics questions.
//!
//! Everything here is independent of storage, HTTP and the UI: the catalog,
//! intent resolution, the query validator, statistics, chart specs and
//! template narration, plus the traits the outer crates implement.

pub mod catalog;
pub mod config;
pub mod conversation;
pub mod error;
pub mod event;
pub mod executor;
pub mod intent;
pub mod llm;
pub mod narrative;
pub mod query;
pub mod result;
pub mod stats;
pub mod visualization;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Result, StatlineError};
