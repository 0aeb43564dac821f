//! Generic repository contract and its store bindings.
//!
//! # Responsibility
//! - Define one CRUD/pagination surface reusable by any [`Entity`].
//! - Keep storage details (SQL, locking) inside the bindings.
//!
//! # Invariants
//! - Writes run `Entity::validate()` before touching the store.
//! - Lookup absence is `Ok(None)`/`Ok(false)`, never an error.
//! - Arguments are checked before the store is touched.
//!
//! [`Entity`]: crate::model::entity::Entity

pub mod crud;
pub mod memory_repo;
pub mod page;
pub mod sqlite_repo;

use crate::repo::crud::RepoResult;
use crate::repo::page::Sort;
use log::{debug, warn};
use std::time::Instant;

/// Runs one repository operation and emits its outcome event.
pub(crate) fn instrumented<T>(
    operation: &'static str,
    entity: &'static str,
    run: impl FnOnce() -> RepoResult<T>,
) -> RepoResult<T> {
    let started_at = Instant::now();
    let result = run();
    let duration_ms = started_at.elapsed().as_millis();
    match &result {
        Ok(_) => debug!(
            "event=repo_{operation} module=repo status=ok entity={entity} duration_ms={duration_ms}"
        ),
        Err(err) => warn!(
            "event=repo_{operation} module=repo status=error entity={entity} duration_ms={duration_ms} error_code={} error={err}",
            err.code()
        ),
    }
    result
}

/// Event label for a full listing; sorted listings log under their own name.
pub(crate) fn find_all_event(sort: &Sort) -> &'static str {
    if sort.is_unsorted() {
        "find_all"
    } else {
        "find_all_sorted"
    }
}
