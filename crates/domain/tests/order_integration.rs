//! Integration tests for order placement and the order lifecycle.
//!
//! These tests run the services against the in-memory store, which takes
//! real row locks, so the concurrency properties are exercised as well.

use std::time::Duration;

use domain::{
    CatalogService, CustomerId, Identity, Money, NewProduct, OrderError, OrderService,
    OrderStatus, PageRequest, PlaceOrder, Product, ProductId, ProductUpdate,
};
use futures_util::future::join_all;
use store::{InMemoryStore, Store, Transaction};

const ADMIN: Identity = Identity {
    id: CustomerId::new(1000),
    role: domain::Role::Admin,
};

fn customer(id: i64) -> Identity {
    Identity::customer(CustomerId::new(id))
}

/// Helper to create services sharing one store
fn create_services(
    store: InMemoryStore,
) -> (OrderService<InMemoryStore>, CatalogService<InMemoryStore>) {
    (OrderService::new(store.clone()), CatalogService::new(store))
}

async fn add_product(
    catalog: &CatalogService<InMemoryStore>,
    name: &str,
    cents: i64,
    stock: i32,
) -> Product {
    catalog
        .create_product(&ADMIN, NewProduct::new(name, Money::from_cents(cents), stock))
        .await
        .unwrap()
}

async fn stock_of(catalog: &CatalogService<InMemoryStore>, id: ProductId) -> i32 {
    catalog.get_product(id).await.unwrap().stock_quantity
}

mod order_lifecycle {
    use super::*;

    #[tokio::test]
    async fn place_confirm_cancel_restores_stock() {
        let (orders, catalog) = create_services(InMemoryStore::new());
        let p = add_product(&catalog, "P", 1000, 5).await;

        // Place order
        let placed = orders
            .place_order(PlaceOrder::new(CustomerId::new(1), vec![]).line(p.id, 3))
            .await
            .unwrap();
        assert_eq!(placed.order.status, OrderStatus::Pending);
        assert_eq!(placed.order.total_amount, Money::from_dollars(30));
        assert_eq!(stock_of(&catalog, p.id).await, 2);

        // Confirm order
        let confirmed = orders.confirm_order(&ADMIN, placed.order.id).await.unwrap();
        assert_eq!(confirmed.status, OrderStatus::Confirmed);
        assert_eq!(stock_of(&catalog, p.id).await, 2);

        // Cancel confirmed order
        let cancelled = orders.cancel_order(&ADMIN, placed.order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&catalog, p.id).await, 5);
    }

    #[tokio::test]
    async fn multi_product_round_trip_restores_every_product() {
        let (orders, catalog) = create_services(InMemoryStore::new());
        let a = add_product(&catalog, "A", 250, 10).await;
        let b = add_product(&catalog, "B", 100, 4).await;
        let c = add_product(&catalog, "C", 999, 1).await;

        let placed = orders
            .place_order(
                PlaceOrder::new(CustomerId::new(7), vec![])
                    .line(c.id, 1)
                    .line(a.id, 6)
                    .line(b.id, 4)
                    .line(a.id, 2),
            )
            .await
            .unwrap();
        assert_eq!(placed.order.total_amount, placed.items_total());
        assert_eq!(
            placed.order.total_amount,
            Money::from_cents(999 + 6 * 250 + 4 * 100 + 2 * 250)
        );
        assert_eq!(stock_of(&catalog, a.id).await, 2);
        assert_eq!(stock_of(&catalog, b.id).await, 0);
        assert_eq!(stock_of(&catalog, c.id).await, 0);

        orders
            .cancel_order(&customer(7), placed.order.id)
            .await
            .unwrap();
        assert_eq!(stock_of(&catalog, a.id).await, 10);
        assert_eq!(stock_of(&catalog, b.id).await, 4);
        assert_eq!(stock_of(&catalog, c.id).await, 1);
    }

    #[tokio::test]
    async fn items_are_returned_in_request_order() {
        let (orders, catalog) = create_services(InMemoryStore::new());
        let a = add_product(&catalog, "A", 100, 5).await;
        let b = add_product(&catalog, "B", 100, 5).await;

        let placed = orders
            .place_order(
                PlaceOrder::new(CustomerId::new(1), vec![])
                    .line(b.id, 1)
                    .line(a.id, 2),
            )
            .await
            .unwrap();

        let loaded = orders
            .get_order(&customer(1), placed.order.id)
            .await
            .unwrap();
        let products: Vec<ProductId> = loaded.items.iter().map(|i| i.product_id).collect();
        assert_eq!(products, vec![b.id, a.id]);
        assert_eq!(loaded, placed);
    }
}

mod terminality {
    use super::*;

    #[tokio::test]
    async fn confirm_succeeds_once() {
        let (orders, catalog) = create_services(InMemoryStore::new());
        let p = add_product(&catalog, "P", 1000, 5).await;
        let placed = orders
            .place_order(PlaceOrder::new(CustomerId::new(1), vec![]).line(p.id, 1))
            .await
            .unwrap();

        orders.confirm_order(&ADMIN, placed.order.id).await.unwrap();
        let err = orders
            .confirm_order(&ADMIN, placed.order.id)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidState(_)));
    }

    #[tokio::test]
    async fn cancel_succeeds_once_and_restores_once() {
        let (orders, catalog) = create_services(InMemoryStore::new());
        let p = add_product(&catalog, "P", 1000, 5).await;
        let placed = orders
            .place_order(PlaceOrder::new(CustomerId::new(1), vec![]).line(p.id, 2))
            .await
            .unwrap();

        orders
            .cancel_order(&customer(1), placed.order.id)
            .await
            .unwrap();
        let err = orders
            .cancel_order(&customer(1), placed.order.id)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid state: order already cancelled");
        assert_eq!(stock_of(&catalog, p.id).await, 5);
    }

    #[tokio::test]
    async fn cancelled_order_cannot_be_confirmed() {
        let (orders, catalog) = create_services(InMemoryStore::new());
        let p = add_product(&catalog, "P", 1000, 5).await;
        let placed = orders
            .place_order(PlaceOrder::new(CustomerId::new(1), vec![]).line(p.id, 1))
            .await
            .unwrap();
        orders.cancel_order(&ADMIN, placed.order.id).await.unwrap();

        let err = orders
            .confirm_order(&ADMIN, placed.order.id)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid state: cancelled order cannot be confirmed"
        );
    }
}

mod authorization {
    use super::*;

    #[tokio::test]
    async fn other_customer_cannot_cancel_but_admin_can() {
        let (orders, catalog) = create_services(InMemoryStore::new());
        let p = add_product(&catalog, "P", 1000, 5).await;
        let placed = orders
            .place_order(PlaceOrder::new(CustomerId::new(1), vec![]).line(p.id, 1))
            .await
            .unwrap();

        let err = orders
            .cancel_order(&customer(2), placed.order.id)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Forbidden(_)));

        let order = orders.cancel_order(&ADMIN, placed.order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn foreign_orders_are_hidden_from_customers() {
        let (orders, catalog) = create_services(InMemoryStore::new());
        let p = add_product(&catalog, "P", 1000, 5).await;
        let placed = orders
            .place_order(PlaceOrder::new(CustomerId::new(1), vec![]).line(p.id, 1))
            .await
            .unwrap();

        let err = orders
            .get_order(&customer(2), placed.order.id)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::NotFound { .. }));
        assert!(orders.get_order(&ADMIN, placed.order.id).await.is_ok());
    }

    #[tokio::test]
    async fn list_orders_scopes_customers_to_their_own() {
        let (orders, catalog) = create_services(InMemoryStore::new());
        let p = add_product(&catalog, "P", 100, 50).await;
        for owner in [1, 2, 1, 1] {
            orders
                .place_order(PlaceOrder::new(CustomerId::new(owner), vec![]).line(p.id, 1))
                .await
                .unwrap();
        }
        let first = orders
            .list_orders(&customer(1), None, PageRequest::new(1, 10).unwrap())
            .await
            .unwrap();
        orders
            .confirm_order(&ADMIN, first.items[0].id)
            .await
            .unwrap();

        let mine = orders
            .list_orders(&customer(1), None, PageRequest::new(1, 2).unwrap())
            .await
            .unwrap();
        assert_eq!(mine.total, 3);
        assert_eq!(mine.pages, 2);
        assert_eq!(mine.items.len(), 2);
        assert!(mine.items.iter().all(|o| o.customer_id == CustomerId::new(1)));

        let pending = orders
            .list_orders(
                &customer(1),
                Some(OrderStatus::Pending),
                PageRequest::new(1, 10).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(pending.total, 2);

        let all = orders
            .list_orders(&ADMIN, None, PageRequest::new(1, 10).unwrap())
            .await
            .unwrap();
        assert_eq!(all.total, 4);
    }
}

mod atomicity {
    use super::*;

    #[tokio::test]
    async fn failure_on_any_line_leaves_no_trace() {
        let store = InMemoryStore::new();
        let (orders, catalog) = create_services(store.clone());
        let a = add_product(&catalog, "A", 100, 5).await;
        let b = add_product(&catalog, "B", 100, 1).await;

        let err = orders
            .place_order(
                PlaceOrder::new(CustomerId::new(1), vec![])
                    .line(a.id, 5)
                    .line(b.id, 2),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::InsufficientStock { product_id, .. } if product_id == b.id));
        assert_eq!(stock_of(&catalog, a.id).await, 5);
        assert_eq!(stock_of(&catalog, b.id).await, 1);
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.order_item_count().await, 0);
    }

    #[tokio::test]
    async fn inactive_product_is_invalid_state() {
        let store = InMemoryStore::new();
        let (orders, catalog) = create_services(store.clone());
        let a = add_product(&catalog, "A", 100, 5).await;
        let b = add_product(&catalog, "B", 100, 5).await;
        catalog
            .update_product(
                &ADMIN,
                b.id,
                ProductUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = orders
            .place_order(
                PlaceOrder::new(CustomerId::new(1), vec![])
                    .line(a.id, 1)
                    .line(b.id, 1),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::InvalidState(_)));
        assert_eq!(stock_of(&catalog, a.id).await, 5);
        assert_eq!(store.order_count().await, 0);
    }
}

mod price_freezing {
    use super::*;

    #[tokio::test]
    async fn price_change_does_not_touch_existing_items() {
        let (orders, catalog) = create_services(InMemoryStore::new());
        let p = add_product(&catalog, "P", 1000, 5).await;
        let placed = orders
            .place_order(PlaceOrder::new(CustomerId::new(1), vec![]).line(p.id, 2))
            .await
            .unwrap();

        catalog
            .update_product(
                &ADMIN,
                p.id,
                ProductUpdate {
                    price: Some(Money::from_cents(2500)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let loaded = orders.get_order(&ADMIN, placed.order.id).await.unwrap();
        assert_eq!(loaded.items[0].price_at_purchase, Money::from_cents(1000));
        assert_eq!(loaded.order.total_amount, Money::from_cents(2000));
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn two_buyers_for_the_last_units() {
        let (orders, catalog) = create_services(InMemoryStore::new());
        let q = add_product(&catalog, "Q", 500, 2).await;
        let product_id = q.id;

        let attempts = (1..=2).map(|buyer| {
            let orders = orders.clone();
            tokio::spawn(async move {
                orders
                    .place_order(PlaceOrder::new(CustomerId::new(buyer), vec![]).line(product_id, 2))
                    .await
            })
        });
        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(OrderError::InsufficientStock { available: 0, .. })
        )));
        assert_eq!(stock_of(&catalog, q.id).await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_placements_never_oversell() {
        let (orders, catalog) = create_services(InMemoryStore::new());
        let p = add_product(&catalog, "P", 100, 25).await;
        let product_id = p.id;

        let attempts = (0..40).map(|i: i32| {
            let orders = orders.clone();
            let quantity = (i % 3) + 1;
            tokio::spawn(async move {
                orders
                    .place_order(
                        PlaceOrder::new(CustomerId::new(i64::from(i)), vec![])
                            .line(product_id, quantity),
                    )
                    .await
                    .map(|placed| placed.items[0].quantity)
            })
        });

        let reserved: i32 = join_all(attempts)
            .await
            .into_iter()
            .filter_map(|joined| joined.unwrap().ok())
            .sum();

        assert!(reserved <= 25);
        assert_eq!(stock_of(&catalog, p.id).await, 25 - reserved);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn opposing_line_orders_do_not_deadlock() {
        let store = InMemoryStore::new().with_lock_timeout(Duration::from_secs(2));
        let (orders, catalog) = create_services(store);
        let a = add_product(&catalog, "A", 100, 100).await;
        let b = add_product(&catalog, "B", 100, 100).await;

        let attempts = (0..20).map(|i| {
            let orders = orders.clone();
            let cmd = if i % 2 == 0 {
                PlaceOrder::new(CustomerId::new(1), vec![]).line(a.id, 1).line(b.id, 1)
            } else {
                PlaceOrder::new(CustomerId::new(2), vec![]).line(b.id, 1).line(a.id, 1)
            };
            tokio::spawn(async move { orders.place_order(cmd).await })
        });

        for joined in join_all(attempts).await {
            joined.unwrap().unwrap();
        }
        assert_eq!(stock_of(&catalog, a.id).await, 80);
        assert_eq!(stock_of(&catalog, b.id).await, 80);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_cancellations_restore_stock_once() {
        let (orders, catalog) = create_services(InMemoryStore::new());
        let p = add_product(&catalog, "P", 100, 10).await;
        let placed = orders
            .place_order(PlaceOrder::new(CustomerId::new(1), vec![]).line(p.id, 4))
            .await
            .unwrap();

        let attempts = (0..5).map(|_| {
            let orders = orders.clone();
            let order_id = placed.order.id;
            tokio::spawn(async move { orders.cancel_order(&ADMIN, order_id).await })
        });
        let succeeded = join_all(attempts)
            .await
            .into_iter()
            .filter(|joined| matches!(joined, Ok(Ok(_))))
            .count();

        assert_eq!(succeeded, 1);
        assert_eq!(stock_of(&catalog, p.id).await, 10);
    }

    #[tokio::test]
    async fn lock_timeout_is_a_retryable_conflict() {
        let store = InMemoryStore::new().with_lock_timeout(Duration::from_millis(50));
        let (orders, catalog) = create_services(store.clone());
        let p = add_product(&catalog, "P", 100, 10).await;

        let mut holder = store.begin().await.unwrap();
        holder.lock_products(&[p.id]).await.unwrap();

        let err = orders
            .place_order(PlaceOrder::new(CustomerId::new(1), vec![]).line(p.id, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Conflict(_)));
        assert!(err.is_retryable());
        assert_eq!(store.order_count().await, 0);

        holder.rollback().await.unwrap();

        // Retry after the holder is gone succeeds.
        orders
            .place_order(PlaceOrder::new(CustomerId::new(1), vec![]).line(p.id, 1))
            .await
            .unwrap();
        assert_eq!(stock_of(&catalog, p.id).await, 9);
    }
}
