//! Repository contract shared by every entity and store.
//!
//! # Invariants
//! - `save_all` and `delete_all_by_id` are all-or-nothing.
//! - `delete_by_id` is idempotent; `delete` requires the entity to exist.
//! - Unsorted listings come back in ascending identifier order.

use crate::db::DbError;
use crate::model::entity::{Entity, EntityValidationError};
use crate::repo::page::{Page, PageRequest, Sort};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository-level error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Backing store failure. Not recoverable locally.
    Storage(DbError),
    /// Malformed caller input, rejected before the store is touched.
    InvalidArgument(String),
    NotFound {
        entity: &'static str,
        id: String,
    },
    Validation(EntityValidationError),
    /// Persisted state that cannot be mapped back to an entity.
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    pub(crate) fn not_found<E: Entity>(id: E::Id) -> Self {
        Self::NotFound {
            entity: E::TABLE,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code used in log events and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Storage(err) if err.is_constraint_violation() => "constraint_violation",
            Self::Storage(_) => "storage_error",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation_failed",
            Self::InvalidData(_) => "invalid_data",
            Self::UninitializedConnection { .. } => "uninitialized_connection",
            Self::MissingRequiredTable(_) | Self::MissingRequiredColumn { .. } => {
                "schema_mismatch"
            }
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "storage error: {err}"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match required {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Storage(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(DbError::Sqlite(value))
    }
}

impl From<EntityValidationError> for RepoError {
    fn from(value: EntityValidationError) -> Self {
        Self::Validation(value)
    }
}

/// CRUD and pagination facade over one entity type.
///
/// Implementations hold no entity state of their own; everything lives in
/// the backing store they are bound to.
pub trait CrudRepository<E: Entity> {
    /// Inserts or updates one entity and returns the persisted copy.
    ///
    /// An entity without identifier receives the next store sequence value.
    /// An entity with an identifier replaces the stored row, or is inserted
    /// under that identifier when no such row exists.
    fn save(&self, entity: &E) -> RepoResult<E>;

    /// Saves every entity in order, or none of them.
    fn save_all(&self, entities: &[E]) -> RepoResult<Vec<E>>;

    fn find_by_id(&self, id: E::Id) -> RepoResult<Option<E>>;

    fn exists_by_id(&self, id: E::Id) -> RepoResult<bool> {
        Ok(self.find_by_id(id)?.is_some())
    }

    /// Reads every entity in ascending identifier order.
    fn find_all(&self) -> RepoResult<Vec<E>> {
        self.find_all_sorted(&Sort::unsorted())
    }

    /// Reads every entity ordered by `sort`, identifier ascending last.
    fn find_all_sorted(&self, sort: &Sort) -> RepoResult<Vec<E>>;

    /// Reads the entities whose identifier is listed. Unknown identifiers
    /// are skipped and duplicates collapse.
    fn find_all_by_id(&self, ids: &[E::Id]) -> RepoResult<Vec<E>>;

    fn find_all_paged(&self, request: &PageRequest) -> RepoResult<Page<E>>;

    fn count(&self) -> RepoResult<u64>;

    /// Removes the entity with `id`. Absent identifiers are not an error.
    fn delete_by_id(&self, id: E::Id) -> RepoResult<()>;

    /// Removes a previously persisted entity.
    ///
    /// # Errors
    /// - `InvalidArgument` when the entity was never assigned an identifier.
    /// - `NotFound` when its identifier is not in the store.
    fn delete(&self, entity: &E) -> RepoResult<()>;

    fn delete_all_by_id(&self, ids: &[E::Id]) -> RepoResult<()>;

    fn delete_all(&self) -> RepoResult<()>;
}

/// Returns the identifier of an entity that is expected to be persisted.
pub(crate) fn require_id<E: Entity>(entity: &E) -> RepoResult<E::Id> {
    entity.id().ok_or_else(|| {
        RepoError::InvalidArgument(format!("{} entity has no identifier", E::TABLE))
    })
}
