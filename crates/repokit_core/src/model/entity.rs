//! Entity contract shared by every repository binding.
//!
//! An implementor describes how one record type maps onto a storage
//! relation: the table, the identifier column, the ordered attribute
//! columns, and the conversion to and from SQLite values. Repositories use
//! only this metadata, so one CRUD implementation serves any entity.

use rusqlite::types::{FromSql, ToSql, Value};
use rusqlite::Row;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;

/// Identifier types a store can assign and persist.
pub trait EntityId:
    Copy + Eq + Ord + Hash + Debug + Display + Send + Sync + ToSql + FromSql + 'static
{
    /// Converts a store sequence value; `None` when it does not fit.
    fn from_sequence(value: i64) -> Option<Self>;

    /// Returns the identifier as a store sequence value.
    fn to_sequence(self) -> i64;
}

impl EntityId for i64 {
    fn from_sequence(value: i64) -> Option<Self> {
        Some(value)
    }

    fn to_sequence(self) -> i64 {
        self
    }
}

impl EntityId for i32 {
    fn from_sequence(value: i64) -> Option<Self> {
        i32::try_from(value).ok()
    }

    fn to_sequence(self) -> i64 {
        i64::from(self)
    }
}

/// A record type persisted in one relation and keyed by `Id`.
pub trait Entity: Clone + Send + Sync + 'static {
    type Id: EntityId;

    /// Storage relation name. Also names the entity in errors and logs.
    const TABLE: &'static str;
    /// Column holding the identifier.
    const ID_COLUMN: &'static str;
    /// Persisted attribute columns, excluding the identifier, in bind order.
    const COLUMNS: &'static [&'static str];

    /// Identifier, or `None` before the first save.
    fn id(&self) -> Option<Self::Id>;

    fn set_id(&mut self, id: Self::Id);

    /// Attribute values aligned with [`Entity::COLUMNS`].
    fn column_values(&self) -> Vec<Value>;

    /// Rebuilds an entity from a row selecting the id column and all
    /// attribute columns by name.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Checks attribute invariants before any write reaches the store.
    fn validate(&self) -> Result<(), EntityValidationError> {
        Ok(())
    }

    /// Returns whether `property` may be used in a sort specification.
    fn is_sortable(property: &str) -> bool {
        property == Self::ID_COLUMN || Self::COLUMNS.contains(&property)
    }

    /// Value of one sortable property, `None` for unknown names.
    fn property_value(&self, property: &str) -> Option<Value> {
        if property == Self::ID_COLUMN {
            return Some(
                self.id()
                    .map_or(Value::Null, |id| Value::Integer(id.to_sequence())),
            );
        }
        let index = Self::COLUMNS.iter().position(|column| *column == property)?;
        self.column_values().into_iter().nth(index)
    }
}

/// Attribute-level invariant violation detected before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityValidationError {
    pub entity: &'static str,
    pub field: &'static str,
    pub message: String,
}

impl EntityValidationError {
    pub fn new(entity: &'static str, field: &'static str, message: impl Into<String>) -> Self {
        Self {
            entity,
            field,
            message: message.into(),
        }
    }
}

impl Display for EntityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}.{}: {}", self.entity, self.field, self.message)
    }
}

impl Error for EntityValidationError {}
