//! Order domain model.
//!
//! # Invariants
//! - `id` is `None` until the order is first saved; afterwards it never changes.
//! - `quantity` is at least one and `unit_price_cents` is never negative.
//! - `name` is not blank.

use crate::model::entity::{Entity, EntityValidationError};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, Value, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned order key.
pub type OrderId = i64;

/// Order fulfilment state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, not paid yet.
    #[default]
    Pending,
    Paid,
    Shipped,
    /// Withdrawn before shipping.
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "shipped" => Some(Self::Shipped),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Shipped | Self::Cancelled)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct UnknownOrderStatus(String);

impl Display for UnknownOrderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown order status `{}`", self.0)
    }
}

impl Error for UnknownOrderStatus {}

impl FromSql for OrderStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        Self::parse(text)
            .ok_or_else(|| FromSqlError::Other(Box::new(UnknownOrderStatus(text.to_string()))))
    }
}

/// A customer order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Absent until the store assigns one.
    pub id: Option<OrderId>,
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub status: OrderStatus,
}

impl Order {
    /// Creates an unsaved pending order for one unit at zero price.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            quantity: 1,
            unit_price_cents: 0,
            status: OrderStatus::Pending,
        }
    }

    /// Sets a caller-chosen identifier, used by import paths.
    pub fn with_id(mut self, id: OrderId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_unit_price_cents(mut self, unit_price_cents: i64) -> Self {
        self.unit_price_cents = unit_price_cents;
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }

    /// Line total in cents, saturating on overflow.
    pub fn total_cents(&self) -> i64 {
        self.unit_price_cents
            .saturating_mul(i64::from(self.quantity))
    }
}

impl Entity for Order {
    type Id = OrderId;

    const TABLE: &'static str = "orders";
    const ID_COLUMN: &'static str = "id";
    const COLUMNS: &'static [&'static str] = &["name", "quantity", "unit_price_cents", "status"];

    fn id(&self) -> Option<OrderId> {
        self.id
    }

    fn set_id(&mut self, id: OrderId) {
        self.id = Some(id);
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.name.clone()),
            Value::Integer(i64::from(self.quantity)),
            Value::Integer(self.unit_price_cents),
            Value::Text(self.status.as_str().to_string()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get("id")?),
            name: row.get("name")?,
            quantity: row.get("quantity")?,
            unit_price_cents: row.get("unit_price_cents")?,
            status: row.get("status")?,
        })
    }

    fn validate(&self) -> Result<(), EntityValidationError> {
        if self.name.trim().is_empty() {
            return Err(EntityValidationError::new(
                Self::TABLE,
                "name",
                "must not be blank",
            ));
        }
        if self.quantity == 0 {
            return Err(EntityValidationError::new(
                Self::TABLE,
                "quantity",
                "must be at least 1",
            ));
        }
        if self.unit_price_cents < 0 {
            return Err(EntityValidationError::new(
                Self::TABLE,
                "unit_price_cents",
                format!("must not be negative, got {}", self.unit_price_cents),
            ));
        }
        Ok(())
    }
}
