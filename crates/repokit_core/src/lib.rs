//! Generic entity repositories over SQLite and in-memory stores.
//!
//! One [`CrudRepository`] contract covers save, lookup, listing, paging and
//! deletion for any [`Entity`]; store bindings implement it once for all
//! entity types.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LogSettings, LoggingError};
pub use model::entity::{Entity, EntityId, EntityValidationError};
pub use model::order::{Order, OrderId, OrderStatus};
pub use repo::crud::{CrudRepository, RepoError, RepoResult};
pub use repo::memory_repo::InMemoryRepository;
pub use repo::page::{Direction, Page, PageRequest, Sort, SortOrder};
pub use repo::sqlite_repo::SqliteRepository;
pub use service::order_service::OrderService;

/// Minimal health-check API used by the CLI probe.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
