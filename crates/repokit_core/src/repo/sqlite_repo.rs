//! SQLite binding of the generic repository.
//!
//! # Responsibility
//! - Derive every statement from [`Entity`] metadata, so one implementation
//!   serves all entity types.
//! - Refuse connections whose schema does not match the entity.
//!
//! # Invariants
//! - Identifiers in SQL text come only from entity constants; sort
//!   properties are checked against the entity's column list first.
//! - Multi-statement operations run inside a savepoint, so they are
//!   all-or-nothing both standalone and inside a caller transaction.

use crate::db::migrations::{current_version, latest_version};
use crate::db::DbError;
use crate::model::entity::{Entity, EntityId};
use crate::repo::crud::{require_id, CrudRepository, RepoError, RepoResult};
use crate::repo::{find_all_event, instrumented};
use crate::repo::page::{Page, PageRequest, Sort};
use log::warn;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::BTreeSet;
use std::marker::PhantomData;

const WRITE_SCOPE_SAVEPOINT: &str = "repokit_write_scope";
const ID_BATCH_SIZE: usize = 500;

/// Repository over `E` bound to one borrowed SQLite connection.
pub struct SqliteRepository<'conn, E> {
    conn: &'conn Connection,
    _entity: PhantomData<fn() -> E>,
}

impl<'conn, E: Entity> SqliteRepository<'conn, E> {
    /// Binds a repository to a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations have not been applied.
    /// - `MissingRequiredTable`/`MissingRequiredColumn` when the schema does
    ///   not carry the entity's relation.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready::<E>(conn)?;
        Ok(Self {
            conn,
            _entity: PhantomData,
        })
    }

    /// Runs `work` inside a savepoint; any error rolls the whole scope back.
    fn scoped<T>(&self, work: impl FnOnce(&Connection) -> RepoResult<T>) -> RepoResult<T> {
        self.conn
            .execute_batch(&format!("SAVEPOINT {WRITE_SCOPE_SAVEPOINT};"))?;
        match work(self.conn) {
            Ok(value) => {
                self.conn
                    .execute_batch(&format!("RELEASE {WRITE_SCOPE_SAVEPOINT};"))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.conn.execute_batch(&format!(
                    "ROLLBACK TO {WRITE_SCOPE_SAVEPOINT}; RELEASE {WRITE_SCOPE_SAVEPOINT};"
                )) {
                    warn!(
                        "event=repo_rollback module=repo status=error entity={} error={rollback_err}",
                        E::TABLE
                    );
                }
                Err(err)
            }
        }
    }
}

impl<E: Entity> CrudRepository<E> for SqliteRepository<'_, E> {
    fn save(&self, entity: &E) -> RepoResult<E> {
        instrumented("save", E::TABLE, || {
            entity.validate()?;
            save_row(self.conn, entity)
        })
    }

    fn save_all(&self, entities: &[E]) -> RepoResult<Vec<E>> {
        instrumented("save_all", E::TABLE, || {
            for entity in entities {
                entity.validate()?;
            }
            self.scoped(|conn| {
                entities
                    .iter()
                    .map(|entity| save_row(conn, entity))
                    .collect()
            })
        })
    }

    fn find_by_id(&self, id: E::Id) -> RepoResult<Option<E>> {
        instrumented("find_by_id", E::TABLE, || {
            let mut stmt = self.conn.prepare(&format!(
                "{} WHERE {} = ?1;",
                select_sql::<E>(),
                quote(E::ID_COLUMN)
            ))?;
            let mut rows = stmt.query(params![id])?;
            if let Some(row) = rows.next()? {
                return Ok(Some(E::from_row(row)?));
            }
            Ok(None)
        })
    }

    fn exists_by_id(&self, id: E::Id) -> RepoResult<bool> {
        instrumented("exists_by_id", E::TABLE, || {
            let exists: i64 = self.conn.query_row(
                &format!(
                    "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1);",
                    quote(E::TABLE),
                    quote(E::ID_COLUMN)
                ),
                params![id],
                |row| row.get(0),
            )?;
            Ok(exists == 1)
        })
    }

    fn find_all_sorted(&self, sort: &Sort) -> RepoResult<Vec<E>> {
        instrumented(find_all_event(sort), E::TABLE, || {
            sort.validate_for::<E>()?;
            let sql = format!("{} {};", select_sql::<E>(), order_by_sql::<E>(sort));
            query_entities::<E>(self.conn, &sql, Vec::new())
        })
    }

    fn find_all_by_id(&self, ids: &[E::Id]) -> RepoResult<Vec<E>> {
        instrumented("find_all_by_id", E::TABLE, || {
            let unique = ids
                .iter()
                .copied()
                .collect::<BTreeSet<E::Id>>()
                .into_iter()
                .collect::<Vec<_>>();
            let mut found = Vec::with_capacity(unique.len());
            for batch in unique.chunks(ID_BATCH_SIZE) {
                let placeholders = vec!["?"; batch.len()].join(", ");
                let sql = format!(
                    "{} WHERE {} IN ({placeholders}) ORDER BY {} ASC;",
                    select_sql::<E>(),
                    quote(E::ID_COLUMN),
                    quote(E::ID_COLUMN)
                );
                let values = batch
                    .iter()
                    .map(|id| Value::Integer(id.to_sequence()))
                    .collect();
                found.extend(query_entities::<E>(self.conn, &sql, values)?);
            }
            Ok(found)
        })
    }

    fn find_all_paged(&self, request: &PageRequest) -> RepoResult<Page<E>> {
        instrumented("find_all_paged", E::TABLE, || {
            let (offset, limit) = request.validate_for::<E>()?;
            self.scoped(|conn| {
                let total = count_rows::<E>(conn)?;
                let sql = format!(
                    "{} {} LIMIT ?1 OFFSET ?2;",
                    select_sql::<E>(),
                    order_by_sql::<E>(&request.sort)
                );
                let content = query_entities::<E>(
                    conn,
                    &sql,
                    vec![Value::Integer(limit), Value::Integer(offset)],
                )?;
                Ok(Page::new(content, request, total))
            })
        })
    }

    fn count(&self) -> RepoResult<u64> {
        instrumented("count", E::TABLE, || count_rows::<E>(self.conn))
    }

    fn delete_by_id(&self, id: E::Id) -> RepoResult<()> {
        instrumented("delete_by_id", E::TABLE, || {
            delete_row::<E>(self.conn, id)?;
            Ok(())
        })
    }

    fn delete(&self, entity: &E) -> RepoResult<()> {
        instrumented("delete", E::TABLE, || {
            let id = require_id(entity)?;
            if delete_row::<E>(self.conn, id)? == 0 {
                return Err(RepoError::not_found::<E>(id));
            }
            Ok(())
        })
    }

    fn delete_all_by_id(&self, ids: &[E::Id]) -> RepoResult<()> {
        instrumented("delete_all_by_id", E::TABLE, || {
            self.scoped(|conn| {
                for id in ids {
                    delete_row::<E>(conn, *id)?;
                }
                Ok(())
            })
        })
    }

    fn delete_all(&self) -> RepoResult<()> {
        instrumented("delete_all", E::TABLE, || {
            self.conn
                .execute(&format!("DELETE FROM {};", quote(E::TABLE)), [])?;
            Ok(())
        })
    }
}

/// Inserts or upserts one already validated entity.
fn save_row<E: Entity>(conn: &Connection, entity: &E) -> RepoResult<E> {
    let mut values = entity.column_values();
    if values.len() != E::COLUMNS.len() {
        return Err(RepoError::InvalidData(format!(
            "{} produced {} values for {} columns",
            E::TABLE,
            values.len(),
            E::COLUMNS.len()
        )));
    }

    let columns = E::COLUMNS
        .iter()
        .map(|column| quote(column))
        .collect::<Vec<_>>();

    let mut saved = entity.clone();
    match entity.id() {
        None => {
            let placeholders = (1..=columns.len())
                .map(|index| format!("?{index}"))
                .collect::<Vec<_>>()
                .join(", ");
            conn.execute(
                &format!(
                    "INSERT INTO {} ({}) VALUES ({placeholders});",
                    quote(E::TABLE),
                    columns.join(", ")
                ),
                params_from_iter(values),
            )?;
            let rowid = conn.last_insert_rowid();
            let id = E::Id::from_sequence(rowid)
                .ok_or(RepoError::Storage(DbError::SequenceExhausted(E::TABLE)))?;
            saved.set_id(id);
        }
        Some(id) => {
            let placeholders = (1..=columns.len() + 1)
                .map(|index| format!("?{index}"))
                .collect::<Vec<_>>()
                .join(", ");
            let assignments = columns
                .iter()
                .map(|column| format!("{column} = excluded.{column}"))
                .collect::<Vec<_>>()
                .join(", ");
            values.insert(0, Value::Integer(id.to_sequence()));
            conn.execute(
                &format!(
                    "INSERT INTO {table} ({id_column}, {columns}) VALUES ({placeholders})
                     ON CONFLICT({id_column}) DO UPDATE SET {assignments};",
                    table = quote(E::TABLE),
                    id_column = quote(E::ID_COLUMN),
                    columns = columns.join(", "),
                ),
                params_from_iter(values),
            )?;
        }
    }
    Ok(saved)
}

fn delete_row<E: Entity>(conn: &Connection, id: E::Id) -> RepoResult<usize> {
    let changed = conn.execute(
        &format!(
            "DELETE FROM {} WHERE {} = ?1;",
            quote(E::TABLE),
            quote(E::ID_COLUMN)
        ),
        params![id],
    )?;
    Ok(changed)
}

fn count_rows<E: Entity>(conn: &Connection) -> RepoResult<u64> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {};", quote(E::TABLE)),
        [],
        |row| row.get(0),
    )?;
    u64::try_from(count)
        .map_err(|_| RepoError::InvalidData(format!("negative row count {count}")))
}

fn query_entities<E: Entity>(
    conn: &Connection,
    sql: &str,
    values: Vec<Value>,
) -> RepoResult<Vec<E>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(values))?;
    let mut entities = Vec::new();
    while let Some(row) = rows.next()? {
        entities.push(E::from_row(row)?);
    }
    Ok(entities)
}

fn select_sql<E: Entity>() -> String {
    let columns = std::iter::once(E::ID_COLUMN)
        .chain(E::COLUMNS.iter().copied())
        .map(quote)
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {columns} FROM {}", quote(E::TABLE))
}

/// Builds `ORDER BY` for a sort already checked by `Sort::validate_for`.
fn order_by_sql<E: Entity>(sort: &Sort) -> String {
    let mut terms = sort
        .orders()
        .iter()
        .map(|order| format!("{} {}", quote(&order.property), order.direction.as_sql()))
        .collect::<Vec<_>>();
    if !sort
        .orders()
        .iter()
        .any(|order| order.property == E::ID_COLUMN)
    {
        terms.push(format!("{} ASC", quote(E::ID_COLUMN)));
    }
    format!("ORDER BY {}", terms.join(", "))
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn ensure_connection_ready<E: Entity>(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_version(conn)?;
    if actual_version > expected_version {
        return Err(RepoError::Storage(DbError::UnsupportedSchemaVersion {
            db_version: actual_version,
            latest_supported: expected_version,
        }));
    }
    if actual_version < expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, E::TABLE)? {
        return Err(RepoError::MissingRequiredTable(E::TABLE));
    }

    let present = table_columns(conn, E::TABLE)?;
    for column in std::iter::once(E::ID_COLUMN).chain(E::COLUMNS.iter().copied()) {
        if !present.contains(column) {
            return Err(RepoError::MissingRequiredColumn {
                table: E::TABLE,
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> RepoResult<BTreeSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", quote(table)))?;
    let mut rows = stmt.query([])?;
    let mut columns = BTreeSet::new();
    while let Some(row) = rows.next()? {
        columns.insert(row.get::<_, String>(1)?);
    }
    Ok(columns)
}
