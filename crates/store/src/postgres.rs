use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};

use crate::{
    CustomerId, Money, NewOrderItem, NewProduct, Order, OrderId, OrderItem, OrderItemId,
    OrderQuery, OrderStatus, OrderWithItems, Page, PageRequest, Product, ProductId, Result,
    StoreError,
    store::{self, DEFAULT_LOCK_TIMEOUT, Store, Transaction},
};

const PRODUCT_COLUMNS: &str = "id, name, price_cents, stock_quantity, is_active, created_at";
const ORDER_COLUMNS: &str = "id, customer_id, status, total_cents, created_at";
const ORDER_ITEM_COLUMNS: &str = "id, order_id, product_id, quantity, price_at_purchase_cents";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Sets the `lock_timeout` applied to every transaction.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock_quantity: row.try_get("stock_quantity")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: OrderId::new(row.try_get("id")?),
        customer_id: CustomerId::new(row.try_get("customer_id")?),
        status: status
            .parse()
            .map_err(|e: common::ParseOrderStatusError| StoreError::InvalidRow(e.to_string()))?,
        total_amount: Money::from_cents(row.try_get("total_cents")?),
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_order_item(row: PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: OrderItemId::new(row.try_get("id")?),
        order_id: OrderId::new(row.try_get("order_id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        quantity: row.try_get("quantity")?,
        price_at_purchase: Money::from_cents(row.try_get("price_at_purchase_cents")?),
    })
}

fn page_bounds(page: PageRequest) -> (i64, i64) {
    (
        i64::from(page.limit()),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        let mut tx = self.pool.begin().await?;

        // SET does not take bind parameters; the value is an integer we format.
        // PostgreSQL treats 0 as no timeout.
        let millis = self.lock_timeout.as_millis().max(1);
        sqlx::query(&format!("SET LOCAL lock_timeout = '{millis}ms'"))
            .execute(&mut *tx)
            .await?;

        Ok(PostgresTransaction { tx })
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(&format!(
            "INSERT INTO products (name, price_cents, stock_quantity) VALUES ($1, $2, $3) RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(product.stock_quantity)
        .fetch_one(&self.pool)
        .await?;

        row_to_product(row)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_product).transpose()
    }

    async fn list_products(&self, page: PageRequest) -> Result<Page<Product>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        let (limit, offset) = page_bounds(page);
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id ASC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let products = rows
            .into_iter()
            .map(row_to_product)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(products, total.max(0) as u64, page))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderWithItems>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order = row_to_order(row)?;

        let items = sqlx::query(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id ASC"
        ))
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(row_to_order_item)
        .collect::<Result<Vec<_>>>()?;

        Ok(Some(OrderWithItems { order, items }))
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<Page<Order>> {
        let mut filter = String::from(" WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic filter
        if query.customer_id.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND customer_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND status = ${param_count}"));
        }

        let count_sql = format!("SELECT COUNT(*) FROM orders{filter}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(customer_id) = query.customer_id {
            count_query = count_query.bind(customer_id.as_i64());
        }
        if let Some(status) = query.status {
            count_query = count_query.bind(status.as_str());
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let select_sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders{filter} ORDER BY id ASC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );
        let mut select_query = sqlx::query(&select_sql);
        if let Some(customer_id) = query.customer_id {
            select_query = select_query.bind(customer_id.as_i64());
        }
        if let Some(status) = query.status {
            select_query = select_query.bind(status.as_str());
        }
        let (limit, offset) = page_bounds(query.page);
        let rows = select_query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let orders = rows
            .into_iter()
            .map(row_to_order)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(orders, total.max(0) as u64, query.page))
    }
}

/// Transaction over a [`PostgresStore`].
///
/// Wraps a `sqlx` transaction, which rolls back when dropped uncommitted.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE");

        // One statement per row so the acquisition order is exactly ascending.
        let mut locked = Vec::with_capacity(ids.len());
        for id in store::lock_sequence(ids) {
            let row = sqlx::query(&sql)
                .bind(id.as_i64())
                .fetch_optional(&mut *self.tx)
                .await?;
            if let Some(row) = row {
                locked.push(row_to_product(row)?);
            }
        }
        Ok(locked)
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_order).transpose()
    }

    async fn insert_order(&mut self, customer_id: CustomerId) -> Result<Order> {
        let row = sqlx::query(&format!(
            "INSERT INTO orders (customer_id, status, total_cents) VALUES ($1, $2, 0) RETURNING {ORDER_COLUMNS}"
        ))
        .bind(customer_id.as_i64())
        .bind(OrderStatus::Pending.as_str())
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_order(row)
    }

    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO order_items (order_id, product_id, quantity, price_at_purchase_cents)
            VALUES ($1, $2, $3, $4)
            RETURNING {ORDER_ITEM_COLUMNS}
            "#
        ))
        .bind(item.order_id.as_i64())
        .bind(item.product_id.as_i64())
        .bind(item.quantity)
        .bind(item.price_at_purchase.cents())
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_order_item(row)
    }

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        sqlx::query(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id ASC"
        ))
        .bind(order_id.as_i64())
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(row_to_order_item)
        .collect()
    }

    async fn update_product(&mut self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE products
            SET name = $2, price_cents = $3, stock_quantity = $4, is_active = $5
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_i64())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(product.stock_quantity)
        .bind(product.is_active)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn set_order_total(&mut self, id: OrderId, total: Money) -> Result<()> {
        sqlx::query("UPDATE orders SET total_cents = $2 WHERE id = $1")
            .bind(id.as_i64())
            .bind(total.cents())
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()> {
        sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id.as_i64())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
