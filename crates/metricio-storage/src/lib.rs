//! MetricIO Storage Engine - Append-only metric tables
//!
//! This crate implements the on-disk storage for MetricIO including:
//! - Offset-addressed table files with a buffered sequential reader
//! - The fixed-width metric record log
//! - The hash-indexed, deduplicating locator heap
//! - Per-kind tables behind reader/writer locks

pub mod db;
pub mod file;
pub mod locator;
pub mod record;
pub mod table;

// Re-exports
pub use db::Database;
pub use file::{Reader, TableFile, FILE_BUF_SIZE};
pub use locator::{bucket, LocatorHeap, HASH_BUCKETS, INDEX_SIZE};
pub use record::{Record, RECORD_SIZE};
pub use table::{SearchHit, Table};
