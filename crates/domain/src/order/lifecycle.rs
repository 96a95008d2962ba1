//! Order state transitions after placement.

use std::collections::BTreeMap;

use common::{OrderId, OrderStatus, ProductId};
use store::{Order, Store, Transaction};

use super::OrderService;
use crate::error::OrderError;
use crate::identity::Identity;
use crate::unit_of_work;

impl<S: Store> OrderService<S> {
    /// Confirms a pending order. Administrators only; stock is untouched.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn confirm_order(
        &self,
        actor: &Identity,
        order_id: OrderId,
    ) -> Result<Order, OrderError> {
        if !actor.is_admin() {
            return Err(OrderError::Forbidden(
                "only administrators can confirm orders".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let outcome = confirm_in(&mut tx, order_id).await;
        let order = unit_of_work::finish(tx, outcome).await?;

        metrics::counter!("orders_confirmed_total").increment(1);
        tracing::info!(order_id = %order.id, "order confirmed");
        Ok(order)
    }

    /// Cancels an order and returns its reserved stock.
    ///
    /// Allowed for the owning customer and for administrators, from both
    /// `PENDING` and `CONFIRMED`.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn cancel_order(
        &self,
        actor: &Identity,
        order_id: OrderId,
    ) -> Result<Order, OrderError> {
        let mut tx = self.store.begin().await?;
        let outcome = cancel_in(&mut tx, actor, order_id).await;
        let order = unit_of_work::finish(tx, outcome).await?;

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(order_id = %order.id, "order cancelled");
        Ok(order)
    }
}

async fn confirm_in<Tx: Transaction>(tx: &mut Tx, order_id: OrderId) -> Result<Order, OrderError> {
    let mut order = tx
        .lock_order(order_id)
        .await?
        .ok_or_else(|| OrderError::order_not_found(order_id))?;

    if !order.status.can_confirm() {
        let reason = match order.status {
            OrderStatus::Cancelled => "cancelled order cannot be confirmed",
            _ => "order already confirmed",
        };
        return Err(OrderError::InvalidState(reason.to_string()));
    }

    tx.set_order_status(order_id, OrderStatus::Confirmed).await?;
    order.status = OrderStatus::Confirmed;
    Ok(order)
}

async fn cancel_in<Tx: Transaction>(
    tx: &mut Tx,
    actor: &Identity,
    order_id: OrderId,
) -> Result<Order, OrderError> {
    let mut order = tx
        .lock_order(order_id)
        .await?
        .ok_or_else(|| OrderError::order_not_found(order_id))?;

    if !actor.can_manage(&order) {
        return Err(OrderError::Forbidden(format!(
            "order {order_id} belongs to another customer"
        )));
    }

    if !order.status.can_cancel() {
        return Err(OrderError::InvalidState(
            "order already cancelled".to_string(),
        ));
    }

    let mut restored: BTreeMap<ProductId, i32> = BTreeMap::new();
    for item in tx.order_items(order_id).await? {
        *restored.entry(item.product_id).or_default() += item.quantity;
    }

    let ids: Vec<ProductId> = restored.keys().copied().collect();
    let products = tx.lock_products(&ids).await?;
    if let Some(missing) = ids.iter().find(|id| products.iter().all(|p| p.id != **id)) {
        return Err(OrderError::product_not_found(*missing));
    }

    for mut product in products {
        product.stock_quantity = product
            .stock_quantity
            .checked_add(restored[&product.id])
            .ok_or_else(|| {
                OrderError::InvalidState(format!(
                    "restoring stock would overflow product {}",
                    product.id
                ))
            })?;
        tx.update_product(&product).await?;
    }

    tx.set_order_status(order_id, OrderStatus::Cancelled).await?;
    order.status = OrderStatus::Cancelled;
    Ok(order)
}
