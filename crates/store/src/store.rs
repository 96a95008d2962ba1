use std::time::Duration;

use async_trait::async_trait;
use common::{CustomerId, Money, OrderId, OrderStatus, ProductId};

use crate::{
    NewOrderItem, NewProduct, Order, OrderItem, OrderQuery, OrderWithItems, Page, PageRequest,
    Product, Result,
};

/// How long a transaction waits for a row lock before failing with
/// [`StoreError::Conflict`](crate::StoreError::Conflict).
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Core trait for catalog and order storage.
///
/// Single-statement reads and catalog inserts run directly against the store.
/// Everything that mutates stock or order status goes through a
/// [`Transaction`] obtained from [`Store::begin`].
#[async_trait]
pub trait Store: Send + Sync {
    /// The transaction handle type.
    type Tx: Transaction;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Inserts a new, active product.
    async fn insert_product(&self, product: NewProduct) -> Result<Product>;

    /// Reads the committed state of a product.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Lists products ordered by id.
    async fn list_products(&self, page: PageRequest) -> Result<Page<Product>>;

    /// Reads an order and its items.
    async fn get_order(&self, id: OrderId) -> Result<Option<OrderWithItems>>;

    /// Lists order headers matching the query, ordered by id.
    async fn list_orders(&self, query: OrderQuery) -> Result<Page<Order>>;
}

/// A unit of work against the store.
///
/// Row locks taken through a transaction are held until it ends. Dropping a
/// transaction without calling [`Transaction::commit`] rolls it back and
/// releases its locks.
#[async_trait]
pub trait Transaction: Send {
    /// Takes an exclusive lock on each listed product, in ascending id order,
    /// and returns the products that exist, sorted by id.
    ///
    /// Duplicate ids are locked once. Blocks while another transaction holds
    /// one of the rows; gives up with `Conflict` after the lock timeout.
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Takes an exclusive lock on an order row and returns it, if it exists.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Inserts a `PENDING` order with a zero total.
    async fn insert_order(&mut self, customer_id: CustomerId) -> Result<Order>;

    /// Inserts an order line.
    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem>;

    /// Returns the lines of an order in insertion order.
    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>>;

    /// Writes back every mutable field of a product locked by this transaction.
    async fn update_product(&mut self, product: &Product) -> Result<()>;

    /// Sets the total of an order written or locked by this transaction.
    async fn set_order_total(&mut self, id: OrderId, total: Money) -> Result<()>;

    /// Sets the status of an order locked by this transaction.
    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()>;

    /// Publishes every change and releases all locks.
    async fn commit(self) -> Result<()>;

    /// Discards every change and releases all locks.
    async fn rollback(self) -> Result<()>;
}

/// Returns the distinct ids in ascending order, the order locks are taken in.
pub(crate) fn lock_sequence(ids: &[ProductId]) -> Vec<ProductId> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}
