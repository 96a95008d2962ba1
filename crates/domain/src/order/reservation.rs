//! Inventory reservation: turning a [`PlaceOrder`] into a committed order.

use std::collections::BTreeMap;
use std::time::Instant;

use common::{Money, ProductId};
use store::{NewOrderItem, OrderWithItems, Product, Store, Transaction};

use super::{OrderService, PlaceOrder};
use crate::error::OrderError;
use crate::unit_of_work;

impl<S: Store> OrderService<S> {
    /// Places an order, reserving stock for every line.
    ///
    /// All product rows are locked in ascending id order before any line is
    /// checked. Either every line is reserved and the order committed, or
    /// nothing is written at all.
    #[tracing::instrument(skip(self, cmd), fields(customer_id = %cmd.customer_id, lines = cmd.lines.len()))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<OrderWithItems, OrderError> {
        let started = Instant::now();

        let result = self.reserve(&cmd).await;

        metrics::histogram!("order_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        match &result {
            Ok(placed) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(
                    order_id = %placed.order.id,
                    total = %placed.order.total_amount,
                    "order placed"
                );
            }
            Err(err) => {
                metrics::counter!("order_placement_failures_total", "reason" => err.kind())
                    .increment(1);
                tracing::warn!(error = %err, "order placement failed");
            }
        }

        result
    }

    async fn reserve(&self, cmd: &PlaceOrder) -> Result<OrderWithItems, OrderError> {
        cmd.validate()?;

        let mut tx = self.store.begin().await?;
        let outcome = reserve_in(&mut tx, cmd).await;
        unit_of_work::finish(tx, outcome).await
    }
}

async fn reserve_in<Tx: Transaction>(
    tx: &mut Tx,
    cmd: &PlaceOrder,
) -> Result<OrderWithItems, OrderError> {
    let mut order = tx.insert_order(cmd.customer_id).await?;

    let mut products: BTreeMap<ProductId, Product> = tx
        .lock_products(&cmd.product_ids())
        .await?
        .into_iter()
        .map(|product| (product.id, product))
        .collect();

    let mut items = Vec::with_capacity(cmd.lines.len());
    let mut total = Money::zero();

    for line in &cmd.lines {
        let product = products
            .get_mut(&line.product_id)
            .ok_or_else(|| OrderError::product_not_found(line.product_id))?;

        if !product.is_active {
            return Err(OrderError::InvalidState(format!(
                "product {} is not active",
                product.id
            )));
        }

        if product.stock_quantity < line.quantity {
            return Err(OrderError::InsufficientStock {
                product_id: product.id,
                requested: line.quantity,
                available: product.stock_quantity,
            });
        }

        total = product
            .price
            .checked_times(line.quantity)
            .and_then(|line_total| total.checked_add(line_total))
            .ok_or_else(|| {
                OrderError::Validation("order total exceeds the supported amount".to_string())
            })?;
        product.stock_quantity -= line.quantity;

        let item = tx
            .insert_order_item(NewOrderItem {
                order_id: order.id,
                product_id: product.id,
                quantity: line.quantity,
                price_at_purchase: product.price,
            })
            .await?;
        items.push(item);
    }

    for product in products.values() {
        tx.update_product(product).await?;
    }

    tx.set_order_total(order.id, total).await?;
    order.total_amount = total;

    Ok(OrderWithItems { order, items })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::CustomerId;
    use store::{InMemoryStore, NewProduct};

    async fn seeded(stock: &[(i64, i32)]) -> (OrderService<InMemoryStore>, Vec<ProductId>) {
        let store = InMemoryStore::new();
        let mut ids = Vec::new();
        for (cents, stock) in stock {
            let product = store
                .insert_product(NewProduct::new("Item", Money::from_cents(*cents), *stock))
                .await
                .unwrap();
            ids.push(product.id);
        }
        (OrderService::new(store), ids)
    }

    async fn stock_of(service: &OrderService<InMemoryStore>, id: ProductId) -> i32 {
        service
            .store()
            .get_product(id)
            .await
            .unwrap()
            .unwrap()
            .stock_quantity
    }

    #[tokio::test]
    async fn reserves_stock_and_records_total() {
        let (service, ids) = seeded(&[(1000, 5), (500, 2)]).await;

        let placed = service
            .place_order(
                PlaceOrder::new(CustomerId::new(1), vec![])
                    .line(ids[0], 3)
                    .line(ids[1], 1),
            )
            .await
            .unwrap();

        assert_eq!(placed.order.total_amount, Money::from_cents(3500));
        assert_eq!(placed.items.len(), 2);
        assert_eq!(placed.items[0].product_id, ids[0]);
        assert_eq!(stock_of(&service, ids[0]).await, 2);
        assert_eq!(stock_of(&service, ids[1]).await, 1);
    }

    #[tokio::test]
    async fn insufficient_stock_on_a_later_line_rolls_back_everything() {
        let (service, ids) = seeded(&[(1000, 5), (500, 2)]).await;

        let err = service
            .place_order(
                PlaceOrder::new(CustomerId::new(1), vec![])
                    .line(ids[0], 3)
                    .line(ids[1], 3),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrderError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            }
        ));
        assert_eq!(stock_of(&service, ids[0]).await, 5);
        assert_eq!(service.store().order_count().await, 0);
        assert_eq!(service.store().order_item_count().await, 0);
    }

    #[tokio::test]
    async fn duplicate_lines_draw_from_the_same_stock() {
        let (service, ids) = seeded(&[(100, 4)]).await;

        let err = service
            .place_order(
                PlaceOrder::new(CustomerId::new(1), vec![])
                    .line(ids[0], 3)
                    .line(ids[0], 2),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::InsufficientStock { available: 1, .. }
        ));

        let placed = service
            .place_order(
                PlaceOrder::new(CustomerId::new(1), vec![])
                    .line(ids[0], 3)
                    .line(ids[0], 1),
            )
            .await
            .unwrap();
        assert_eq!(placed.items.len(), 2);
        assert_eq!(stock_of(&service, ids[0]).await, 0);
    }

    #[tokio::test]
    async fn oversized_total_is_rejected_without_writes() {
        let huge = i64::MAX / 2 + 1;
        let (service, ids) = seeded(&[(huge, 5), (huge, 5)]).await;

        let err = service
            .place_order(PlaceOrder::new(CustomerId::new(1), vec![]).line(ids[0], 2))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));

        let err = service
            .place_order(
                PlaceOrder::new(CustomerId::new(1), vec![])
                    .line(ids[0], 1)
                    .line(ids[1], 1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));

        assert_eq!(stock_of(&service, ids[0]).await, 5);
        assert_eq!(stock_of(&service, ids[1]).await, 5);
        assert_eq!(service.store().order_count().await, 0);
        assert_eq!(service.store().order_item_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let (service, _) = seeded(&[(100, 4)]).await;

        let err = service
            .place_order(PlaceOrder::new(CustomerId::new(1), vec![]).line(ProductId::new(42), 1))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::NotFound { id: 42, .. }));
        assert_eq!(service.store().order_count().await, 0);
    }

    #[tokio::test]
    async fn validation_runs_before_any_write() {
        let (service, ids) = seeded(&[(100, 4)]).await;

        let err = service
            .place_order(PlaceOrder::new(CustomerId::new(1), vec![]).line(ids[0], -1))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::Validation(_)));
        assert_eq!(service.store().order_count().await, 0);
    }
}
