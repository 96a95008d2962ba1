//! Order service providing the public API for order operations.

use common::{OrderId, OrderStatus};
use store::{Order, OrderQuery, OrderWithItems, Page, PageRequest, Store};

use crate::error::OrderError;
use crate::identity::Identity;

/// Service for placing and managing orders.
///
/// Every mutating operation runs in its own store transaction. Reservation
/// lives in `reservation.rs`, confirm and cancel in `lifecycle.rs`.
pub struct OrderService<S: Store> {
    pub(super) store: S,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an order with its items.
    ///
    /// Orders owned by someone else are reported as not found unless the
    /// caller is an administrator.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn get_order(
        &self,
        actor: &Identity,
        order_id: OrderId,
    ) -> Result<OrderWithItems, OrderError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| OrderError::order_not_found(order_id))?;

        if !actor.can_manage(&order.order) {
            return Err(OrderError::order_not_found(order_id));
        }

        Ok(order)
    }

    /// Lists order headers, newest ids last.
    ///
    /// Customers only see their own orders; administrators see all of them.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn list_orders(
        &self,
        actor: &Identity,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Page<Order>, OrderError> {
        let mut query = OrderQuery::new().page(page);
        if !actor.is_admin() {
            query = query.customer(actor.id);
        }
        if let Some(status) = status {
            query = query.status(status);
        }

        Ok(self.store.list_orders(query).await?)
    }
}

impl<S: Store + Clone> Clone for OrderService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}
