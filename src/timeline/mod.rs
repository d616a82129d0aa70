//! Causal ordering of pipeline instances.
//!
//! Each scheduled instance becomes a [`TimelineEntry`]. Entries of one
//! pipeline are kept in causal order by [`PipelineTimeline`], which assigns
//! each entry a fractional natural order when it is spliced in. Existing
//! natural orders never change, so instances can be inserted between two
//! persisted ones without renumbering history.

mod entry;
mod service;

pub use entry::{Revision, TimelineEntry};
pub use service::PipelineTimeline;

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for timeline operations.
pub type Result<T> = std::result::Result<T, TimelineError>;

/// Errors raised while ordering pipeline instances.
#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Ordering corruption in pipeline {pipeline} at entry {id}: {message}")]
    OrderingCorruption {
        pipeline: String,
        id: i64,
        message: String,
    },

    #[error("No natural order left for entry {id} of {pipeline} between {previous} and {next}")]
    PrecisionExhausted {
        pipeline: String,
        id: i64,
        previous: f64,
        next: f64,
    },

    #[error("Unknown timeline entry: {0}")]
    UnknownEntry(i64),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StorageError),
}

impl TimelineError {
    /// Corruption means persisted history disagrees with its own ordering
    /// rules and needs an operator.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TimelineError::OrderingCorruption { .. })
    }
}
