//! Sorting and pagination request/response types.
//!
//! # Invariants
//! - A page request is validated before any store access.
//! - Sort properties must name a column of the target entity.
//! - Results are totally ordered: requested orders first, identifier last.

use crate::model::entity::Entity;
use crate::repo::crud::{RepoError, RepoResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub property: String,
    pub direction: Direction,
}

impl SortOrder {
    pub fn new(property: impl Into<String>, direction: Direction) -> Self {
        Self {
            property: property.into(),
            direction,
        }
    }

    /// Parses `property` or `property,asc|desc`.
    pub fn parse(value: &str) -> RepoResult<Self> {
        let (property, direction) = match value.split_once(',') {
            Some((property, direction)) => {
                let direction = Direction::parse(direction).ok_or_else(|| {
                    RepoError::InvalidArgument(format!(
                        "unsupported sort direction `{}`; expected asc|desc",
                        direction.trim()
                    ))
                })?;
                (property.trim(), direction)
            }
            None => (value.trim(), Direction::Asc),
        };
        if property.is_empty() {
            return Err(RepoError::InvalidArgument(
                "sort property cannot be empty".to_string(),
            ));
        }
        Ok(Self::new(property, direction))
    }
}

/// Ordered list of sort criteria. Empty means identifier order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    orders: Vec<SortOrder>,
}

impl Sort {
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn by(property: impl Into<String>, direction: Direction) -> Self {
        Self::unsorted().and(property, direction)
    }

    pub fn asc(property: impl Into<String>) -> Self {
        Self::by(property, Direction::Asc)
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self::by(property, Direction::Desc)
    }

    /// Appends a lower-priority criterion.
    pub fn and(mut self, property: impl Into<String>, direction: Direction) -> Self {
        self.orders.push(SortOrder::new(property, direction));
        self
    }

    pub fn orders(&self) -> &[SortOrder] {
        &self.orders
    }

    pub fn is_unsorted(&self) -> bool {
        self.orders.is_empty()
    }

    /// Rejects properties `E` does not persist.
    pub fn validate_for<E: Entity>(&self) -> RepoResult<()> {
        match self.orders.iter().find(|order| !E::is_sortable(&order.property)) {
            Some(order) => Err(RepoError::InvalidArgument(format!(
                "unknown sort property `{}` for {}",
                order.property,
                E::TABLE
            ))),
            None => Ok(()),
        }
    }
}

impl FromIterator<SortOrder> for Sort {
    fn from_iter<I: IntoIterator<Item = SortOrder>>(iter: I) -> Self {
        Self {
            orders: iter.into_iter().collect(),
        }
    }
}

/// Zero-based page index, page size and sort specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
    #[serde(default)]
    pub sort: Sort,
}

impl PageRequest {
    pub fn of(page: i64, size: i64) -> Self {
        Self {
            page,
            size,
            sort: Sort::unsorted(),
        }
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    /// Returns `(offset, limit)` for a well-formed request.
    ///
    /// # Errors
    /// - `InvalidArgument` for a negative page, a size below one, or an
    ///   offset that does not fit in `i64`.
    pub fn offset_and_limit(&self) -> RepoResult<(i64, i64)> {
        if self.page < 0 {
            return Err(RepoError::InvalidArgument(format!(
                "page index must not be negative, got {}",
                self.page
            )));
        }
        if self.size < 1 {
            return Err(RepoError::InvalidArgument(format!(
                "page size must be at least 1, got {}",
                self.size
            )));
        }
        let offset = self.page.checked_mul(self.size).ok_or_else(|| {
            RepoError::InvalidArgument(format!(
                "page {} of size {} is out of range",
                self.page, self.size
            ))
        })?;
        Ok((offset, self.size))
    }

    /// Validates paging bounds and sort properties for `E`.
    pub(crate) fn validate_for<E: Entity>(&self) -> RepoResult<(i64, i64)> {
        let bounds = self.offset_and_limit()?;
        self.sort.validate_for::<E>()?;
        Ok(bounds)
    }
}

/// One page of results plus total-count metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<E> {
    pub content: Vec<E>,
    pub page_number: u64,
    pub page_size: u64,
    pub total_elements: u64,
}

impl<E> Page<E> {
    /// Builds a page for an already validated request.
    pub(crate) fn new(content: Vec<E>, request: &PageRequest, total_elements: u64) -> Self {
        Self {
            content,
            page_number: u64::try_from(request.page).unwrap_or_default(),
            page_size: u64::try_from(request.size).unwrap_or(1),
            total_elements,
        }
    }

    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total_elements.div_ceil(self.page_size)
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.page_number.saturating_add(1) < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page_number > 0
    }

    pub fn is_first(&self) -> bool {
        !self.has_previous()
    }

    pub fn is_last(&self) -> bool {
        !self.has_next()
    }

    /// Converts the content while keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(E) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page_number: self.page_number,
            page_size: self.page_size,
            total_elements: self.total_elements,
        }
    }
}
