//! SQLite implementations of storage interfaces.

mod timeline_store;

pub use timeline_store::SqliteTimelineStore;
