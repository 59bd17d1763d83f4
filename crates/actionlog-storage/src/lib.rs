//! Action log storage crate - SQLite persistence, dedup keys, pruning.
//!
//! Provides a WAL-mode SQLite database with migrations, the
//! `ActionRecordStore` abstraction with its SQLite repository, and the
//! time-based garbage collector.

pub mod db;
pub mod dedup;
pub mod gc;
pub mod migrations;
pub mod queries;
pub mod repository;
pub mod store;

pub use db::Database;
pub use dedup::{sanitize_term, DedupKey};
pub use gc::{GarbageCollector, RETENTION_DAYS};
pub use queries::{ActionFilter, DEFAULT_LIMIT, MAX_LIMIT};
pub use repository::ActionRecordRepository;
pub use store::{
    ActionRecordStore, NewActionRecord, TagTaxonomy, META_ACTION_TYPE, META_NODE_ID,
    META_NODE_TYPE, META_REST_BASE, META_STATUS,
};
