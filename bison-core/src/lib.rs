// bison-core/src/lib.rs
//! Bison: an embedded JSON document database
//!
//! Named collections of documents held in memory, persisted as one JSON
//! file per collection under a root directory, queried through a small
//! `$`-operator filter language, with a query-result cache invalidated on
//! every mutation. Single-process, single-threaded; durability is coarse
//! (writes are staged in memory and flushed on demand).

pub mod collection;
pub mod database;
pub mod error;
pub mod logging;
pub mod query;
pub mod query_cache;
pub mod storage;
pub mod update;
pub mod value_utils;

// Public exports
pub use collection::Collection;
pub use database::Bison;
pub use error::{BisonError, Result};
pub use logging::{get_log_level, set_log_level, LogLevel};
pub use query::{matches_filter, validate_filter};
pub use query_cache::{canonical_filter, CacheStats, QueryCache, QueryKey};
pub use storage::FileStorage;
pub use update::{apply_update, parse_update, UpdateOp};
