//! revorder: material revision consistency and causal timeline ordering.
//!
//! Pipelines consume revisions from materials (version control repositories,
//! upstream pipelines, packages). Each scheduled instance records the set of
//! revisions it consumed and takes a slot in its pipeline's timeline:
//!
//! - [`material`]: modifications, materials, revision sets and change detection
//! - [`timeline`]: timeline entries, the causal comparator and the ordering service
//! - [`storage`]: the repository store seam with in-memory and SQLite backends
//! - [`services`]: the scheduling flow tying the above together

pub mod config;
pub mod material;
pub mod services;
pub mod storage;
pub mod timeline;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use material::{Material, MaterialRevision, MaterialRevisionSet, Modification};
pub use timeline::{PipelineTimeline, TimelineEntry};
