//! In-memory binding of the generic repository.
//!
//! Thread-safe through one `RwLock`; clones share the same store. Ordering
//! follows SQLite value ordering so both bindings page identically.

use crate::db::DbError;
use crate::model::entity::{Entity, EntityId};
use crate::repo::crud::{require_id, CrudRepository, RepoError, RepoResult};
use crate::repo::{find_all_event, instrumented};
use crate::repo::page::{Direction, Page, PageRequest, Sort};
use rusqlite::types::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

const STORE_NAME: &str = "in-memory";

struct MemoryState<E: Entity> {
    rows: BTreeMap<E::Id, E>,
    /// Highest sequence value ever assigned or observed. Never decreases.
    last_sequence: i64,
}

/// Repository over `E` backed by a process-local map.
pub struct InMemoryRepository<E: Entity> {
    state: Arc<RwLock<MemoryState<E>>>,
}

impl<E: Entity> InMemoryRepository<E> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState {
                rows: BTreeMap::new(),
                last_sequence: 0,
            })),
        }
    }

    fn read(&self) -> RepoResult<RwLockReadGuard<'_, MemoryState<E>>> {
        self.state
            .read()
            .map_err(|_| RepoError::Storage(DbError::LockPoisoned(STORE_NAME)))
    }

    fn write(&self) -> RepoResult<RwLockWriteGuard<'_, MemoryState<E>>> {
        self.state
            .write()
            .map_err(|_| RepoError::Storage(DbError::LockPoisoned(STORE_NAME)))
    }
}

impl<E: Entity> Default for InMemoryRepository<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> Clone for InMemoryRepository<E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<E: Entity> Debug for InMemoryRepository<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRepository")
            .field("entity", &E::TABLE)
            .finish_non_exhaustive()
    }
}

impl<E: Entity> MemoryState<E> {
    /// Assigns identifiers without mutating the store.
    fn stage(&self, entities: &[E]) -> RepoResult<(Vec<E>, i64)> {
        let mut sequence = self.last_sequence;
        let mut staged = Vec::with_capacity(entities.len());
        for entity in entities {
            let mut entity = entity.clone();
            match entity.id() {
                Some(id) => sequence = sequence.max(id.to_sequence()),
                None => {
                    let id = sequence
                        .checked_add(1)
                        .and_then(E::Id::from_sequence)
                        .ok_or(RepoError::Storage(DbError::SequenceExhausted(E::TABLE)))?;
                    let next = id.to_sequence();
                    entity.set_id(id);
                    sequence = next;
                }
            }
            staged.push(entity);
        }
        Ok((staged, sequence))
    }

    fn commit(&mut self, staged: &[E], sequence: i64) {
        for entity in staged {
            if let Some(id) = entity.id() {
                self.rows.insert(id, entity.clone());
            }
        }
        self.last_sequence = sequence;
    }

    fn sorted(&self, sort: &Sort) -> Vec<E> {
        let mut entities = self.rows.values().cloned().collect::<Vec<_>>();
        if !sort.is_unsorted() {
            entities.sort_by(|left, right| compare_entities(left, right, sort));
        }
        entities
    }
}

impl<E: Entity> CrudRepository<E> for InMemoryRepository<E> {
    fn save(&self, entity: &E) -> RepoResult<E> {
        instrumented("save", E::TABLE, || {
            entity.validate()?;
            let mut state = self.write()?;
            let (mut staged, sequence) = state.stage(std::slice::from_ref(entity))?;
            state.commit(&staged, sequence);
            staged
                .pop()
                .ok_or_else(|| RepoError::InvalidData(format!("{} save staged nothing", E::TABLE)))
        })
    }

    fn save_all(&self, entities: &[E]) -> RepoResult<Vec<E>> {
        instrumented("save_all", E::TABLE, || {
            for entity in entities {
                entity.validate()?;
            }
            let mut state = self.write()?;
            let (staged, sequence) = state.stage(entities)?;
            state.commit(&staged, sequence);
            Ok(staged)
        })
    }

    fn find_by_id(&self, id: E::Id) -> RepoResult<Option<E>> {
        instrumented("find_by_id", E::TABLE, || {
            Ok(self.read()?.rows.get(&id).cloned())
        })
    }

    fn exists_by_id(&self, id: E::Id) -> RepoResult<bool> {
        instrumented("exists_by_id", E::TABLE, || {
            Ok(self.read()?.rows.contains_key(&id))
        })
    }

    fn find_all_sorted(&self, sort: &Sort) -> RepoResult<Vec<E>> {
        instrumented(find_all_event(sort), E::TABLE, || {
            sort.validate_for::<E>()?;
            Ok(self.read()?.sorted(sort))
        })
    }

    fn find_all_by_id(&self, ids: &[E::Id]) -> RepoResult<Vec<E>> {
        instrumented("find_all_by_id", E::TABLE, || {
            let state = self.read()?;
            let mut found = ids
                .iter()
                .filter_map(|id| state.rows.get(id).cloned())
                .collect::<Vec<_>>();
            found.sort_by_key(|entity| entity.id());
            found.dedup_by_key(|entity| entity.id());
            Ok(found)
        })
    }

    fn find_all_paged(&self, request: &PageRequest) -> RepoResult<Page<E>> {
        instrumented("find_all_paged", E::TABLE, || {
            let (offset, limit) = request.validate_for::<E>()?;
            let state = self.read()?;
            let total = state.rows.len() as u64;
            let skip = usize::try_from(offset).unwrap_or(usize::MAX);
            let take = usize::try_from(limit).unwrap_or(usize::MAX);
            let content = state
                .sorted(&request.sort)
                .into_iter()
                .skip(skip)
                .take(take)
                .collect();
            Ok(Page::new(content, request, total))
        })
    }

    fn count(&self) -> RepoResult<u64> {
        instrumented("count", E::TABLE, || Ok(self.read()?.rows.len() as u64))
    }

    fn delete_by_id(&self, id: E::Id) -> RepoResult<()> {
        instrumented("delete_by_id", E::TABLE, || {
            self.write()?.rows.remove(&id);
            Ok(())
        })
    }

    fn delete(&self, entity: &E) -> RepoResult<()> {
        instrumented("delete", E::TABLE, || {
            let id = require_id(entity)?;
            match self.write()?.rows.remove(&id) {
                Some(_) => Ok(()),
                None => Err(RepoError::not_found::<E>(id)),
            }
        })
    }

    fn delete_all_by_id(&self, ids: &[E::Id]) -> RepoResult<()> {
        instrumented("delete_all_by_id", E::TABLE, || {
            let mut state = self.write()?;
            for id in ids {
                state.rows.remove(id);
            }
            Ok(())
        })
    }

    fn delete_all(&self) -> RepoResult<()> {
        instrumented("delete_all", E::TABLE, || {
            self.write()?.rows.clear();
            Ok(())
        })
    }
}

fn compare_entities<E: Entity>(left: &E, right: &E, sort: &Sort) -> Ordering {
    for order in sort.orders() {
        let left_value = left.property_value(&order.property).unwrap_or(Value::Null);
        let right_value = right.property_value(&order.property).unwrap_or(Value::Null);
        let ordering = match order.direction {
            Direction::Asc => compare_values(&left_value, &right_value),
            Direction::Desc => compare_values(&right_value, &left_value),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.id().cmp(&right.id())
}

/// SQLite storage-class ordering: NULL, then numbers, then text, then blobs.
fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
        (Value::Integer(a), Value::Real(b)) => (*a as f64).total_cmp(b),
        (Value::Real(a), Value::Integer(b)) => a.total_cmp(&(*b as f64)),
        (Value::Real(a), Value::Real(b)) => a.total_cmp(b),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
        _ => storage_class_rank(left).cmp(&storage_class_rank(right)),
    }
}

fn storage_class_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Integer(_) | Value::Real(_) => 1,
        Value::Text(_) => 2,
        Value::Blob(_) => 3,
    }
}
