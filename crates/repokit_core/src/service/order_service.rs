//! Order use-case service.
//!
//! # Invariants
//! - Service APIs never bypass repository validation.
//! - Terminal orders (`shipped`, `cancelled`) keep their status.

use crate::model::order::{Order, OrderId, OrderStatus};
use crate::repo::crud::{CrudRepository, RepoError, RepoResult};
use crate::repo::page::{Page, PageRequest};
use log::info;

/// Use-case wrapper over any order repository binding.
pub struct OrderService<R: CrudRepository<Order>> {
    repo: R,
}

impl<R: CrudRepository<Order>> OrderService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Gives access to the underlying repository for plain CRUD calls.
    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Places a new pending order and returns it with its assigned id.
    pub fn place_order(
        &self,
        name: impl Into<String>,
        quantity: u32,
        unit_price_cents: i64,
    ) -> RepoResult<Order> {
        let order = Order::new(name)
            .with_quantity(quantity)
            .with_unit_price_cents(unit_price_cents);
        let saved = self.repo.save(&order)?;
        info!(
            "event=order_placed module=service status=ok id={} quantity={} total_cents={}",
            saved.id.unwrap_or_default(),
            saved.quantity,
            saved.total_cents()
        );
        Ok(saved)
    }

    pub fn get_order(&self, id: OrderId) -> RepoResult<Option<Order>> {
        self.repo.find_by_id(id)
    }

    pub fn list_orders(&self, request: &PageRequest) -> RepoResult<Page<Order>> {
        self.repo.find_all_paged(request)
    }

    /// Moves an order to `status`.
    ///
    /// # Errors
    /// - `NotFound` when no order has `id`.
    /// - `InvalidArgument` when the order is already in a different terminal state.
    pub fn update_status(&self, id: OrderId, status: OrderStatus) -> RepoResult<Order> {
        let mut order = self
            .repo
            .find_by_id(id)?
            .ok_or_else(|| RepoError::not_found::<Order>(id))?;

        if order.status == status {
            return Ok(order);
        }
        if order.status.is_terminal() {
            return Err(RepoError::InvalidArgument(format!(
                "order {id} is {} and cannot become {status}",
                order.status
            )));
        }

        let previous = order.status;
        order.status = status;
        let saved = self.repo.save(&order)?;
        info!("event=order_status module=service status=ok id={id} from={previous} to={status}");
        Ok(saved)
    }

    /// Removes an order. Removing an unknown id succeeds.
    pub fn remove_order(&self, id: OrderId) -> RepoResult<()> {
        self.repo.delete_by_id(id)
    }

    pub fn order_count(&self) -> RepoResult<u64> {
        self.repo.count()
    }
}
