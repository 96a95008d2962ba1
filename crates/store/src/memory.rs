use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard, RwLock};

use crate::{
    CustomerId, Money, NewOrderItem, NewProduct, Order, OrderId, OrderItem, OrderItemId,
    OrderQuery, OrderStatus, OrderWithItems, Page, PageRequest, Product, ProductId, Result,
    StoreError,
    store::{self, DEFAULT_LOCK_TIMEOUT, Store, Transaction},
};

/// Key of a lockable row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Product(ProductId),
    Order(OrderId),
}

impl std::fmt::Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowKey::Product(id) => write!(f, "product {id}"),
            RowKey::Order(id) => write!(f, "order {id}"),
        }
    }
}

/// Committed rows plus the id sequences.
#[derive(Debug, Default)]
struct Tables {
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
    items: BTreeMap<OrderItemId, OrderItem>,
    product_seq: i64,
    order_seq: i64,
    item_seq: i64,
}

impl Tables {
    fn next_product_id(&mut self) -> ProductId {
        self.product_seq += 1;
        ProductId::new(self.product_seq)
    }

    // Sequences are not rolled back, matching BIGSERIAL.
    fn next_order_id(&mut self) -> OrderId {
        self.order_seq += 1;
        OrderId::new(self.order_seq)
    }

    fn next_item_id(&mut self) -> OrderItemId {
        self.item_seq += 1;
        OrderItemId::new(self.item_seq)
    }

    fn items_of(&self, order_id: OrderId) -> impl Iterator<Item = &OrderItem> {
        self.items.values().filter(move |i| i.order_id == order_id)
    }
}

/// One async mutex per row, created on first use.
#[derive(Debug, Clone, Default)]
struct RowLocks(Arc<Mutex<HashMap<RowKey, Arc<RowMutex<()>>>>>);

impl RowLocks {
    fn row(&self, key: RowKey) -> Arc<RowMutex<()>> {
        let mut rows = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        rows.entry(key).or_default().clone()
    }

    /// Removes the entries of `keys` that no transaction holds or waits on.
    fn prune(&self, keys: impl IntoIterator<Item = RowKey>) {
        let mut rows = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            if rows.get(&key).is_some_and(|row| Arc::strong_count(row) == 1) {
                rows.remove(&key);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Row locks owned by one transaction. Dropping releases them and prunes
/// their entries from the shared [`RowLocks`] map.
struct HeldLocks {
    locks: RowLocks,
    guards: HashMap<RowKey, OwnedMutexGuard<()>>,
}

impl HeldLocks {
    fn new(locks: RowLocks) -> Self {
        Self {
            locks,
            guards: HashMap::new(),
        }
    }

    fn contains(&self, key: &RowKey) -> bool {
        self.guards.contains_key(key)
    }
}

impl Drop for HeldLocks {
    fn drop(&mut self) {
        let keys: Vec<RowKey> = self.guards.drain().map(|(key, _guard)| key).collect();
        self.locks.prune(keys);
    }
}

/// In-memory store with real row locking.
///
/// Each transaction buffers its writes and applies them atomically on commit,
/// so other transactions only ever see committed state. Row locks are async
/// mutexes held by the transaction until it commits, rolls back or is dropped.
#[derive(Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    locks: RowLocks,
    lock_timeout: Duration,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            tables: Arc::default(),
            locks: RowLocks::default(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Sets how long a transaction waits for a row lock.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns the number of committed order lines.
    pub async fn order_item_count(&self) -> usize {
        self.tables.read().await.items.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        Ok(InMemoryTransaction {
            tables: self.tables.clone(),
            lock_timeout: self.lock_timeout,
            held: HeldLocks::new(self.locks.clone()),
            products: BTreeMap::new(),
            orders: BTreeMap::new(),
            inserted_orders: HashSet::new(),
            items: Vec::new(),
        })
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        if product.stock_quantity < 0 || product.price.is_negative() {
            return Err(StoreError::Constraint(
                "price and stock must not be negative".to_string(),
            ));
        }

        let mut tables = self.tables.write().await;
        let product = Product {
            id: tables.next_product_id(),
            name: product.name,
            price: product.price,
            stock_quantity: product.stock_quantity,
            is_active: true,
            created_at: Utc::now(),
        };
        tables.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self, page: PageRequest) -> Result<Page<Product>> {
        let tables = self.tables.read().await;
        let products = tables
            .products
            .values()
            .skip(skip(page))
            .take(page.limit() as usize)
            .cloned()
            .collect();
        Ok(Page::new(products, tables.products.len() as u64, page))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderWithItems>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.get(&id).map(|order| OrderWithItems {
            order: order.clone(),
            items: tables.items_of(id).cloned().collect(),
        }))
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<Page<Order>> {
        let tables = self.tables.read().await;
        let matching: Vec<&Order> = tables
            .orders
            .values()
            .filter(|o| {
                if let Some(customer_id) = query.customer_id
                    && o.customer_id != customer_id
                {
                    return false;
                }
                if let Some(status) = query.status
                    && o.status != status
                {
                    return false;
                }
                true
            })
            .collect();

        let total = matching.len() as u64;
        let orders = matching
            .into_iter()
            .skip(skip(query.page))
            .take(query.page.limit() as usize)
            .cloned()
            .collect();
        Ok(Page::new(orders, total, query.page))
    }
}

fn skip(page: PageRequest) -> usize {
    usize::try_from(page.offset()).unwrap_or(usize::MAX)
}

/// Transaction over an [`InMemoryStore`].
pub struct InMemoryTransaction {
    tables: Arc<RwLock<Tables>>,
    lock_timeout: Duration,
    held: HeldLocks,
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
    inserted_orders: HashSet<OrderId>,
    items: Vec<OrderItem>,
}

impl InMemoryTransaction {
    async fn acquire(&mut self, key: RowKey) -> Result<()> {
        if self.held.contains(&key) {
            return Ok(());
        }

        let row = self.held.locks.row(key);
        let Ok(guard) = tokio::time::timeout(self.lock_timeout, row.lock_owned()).await else {
            self.held.locks.prune([key]);
            tracing::debug!(%key, "row lock wait timed out");
            return Err(StoreError::Conflict(format!(
                "timed out waiting for lock on {key}"
            )));
        };
        self.held.guards.insert(key, guard);
        Ok(())
    }

    async fn read_product(&self, id: ProductId) -> Option<Product> {
        match self.products.get(&id) {
            Some(product) => Some(product.clone()),
            None => self.tables.read().await.products.get(&id).cloned(),
        }
    }

    async fn read_order(&self, id: OrderId) -> Option<Order> {
        match self.orders.get(&id) {
            Some(order) => Some(order.clone()),
            None => self.tables.read().await.orders.get(&id).cloned(),
        }
    }

    fn ensure_order_writable(&self, id: OrderId) -> Result<()> {
        if self.inserted_orders.contains(&id) || self.held.contains(&RowKey::Order(id)) {
            Ok(())
        } else {
            Err(StoreError::Unlocked {
                table: "orders",
                id: id.as_i64(),
            })
        }
    }

    async fn locked_order(&self, id: OrderId) -> Result<Order> {
        self.ensure_order_writable(id)?;
        self.read_order(id)
            .await
            .ok_or_else(|| StoreError::ReferentialIntegrity(format!("order {id} does not exist")))
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let mut locked = Vec::with_capacity(ids.len());
        for id in store::lock_sequence(ids) {
            self.acquire(RowKey::Product(id)).await?;
            if let Some(product) = self.read_product(id).await {
                locked.push(product);
            }
        }
        Ok(locked)
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.acquire(RowKey::Order(id)).await?;
        Ok(self.read_order(id).await)
    }

    async fn insert_order(&mut self, customer_id: CustomerId) -> Result<Order> {
        let id = self.tables.write().await.next_order_id();
        let order = Order {
            id,
            customer_id,
            status: OrderStatus::Pending,
            total_amount: Money::zero(),
            created_at: Utc::now(),
        };
        self.orders.insert(id, order.clone());
        self.inserted_orders.insert(id);
        Ok(order)
    }

    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem> {
        if item.quantity <= 0 {
            return Err(StoreError::Constraint(format!(
                "order item quantity must be positive, got {}",
                item.quantity
            )));
        }
        self.locked_order(item.order_id).await?;
        if self.read_product(item.product_id).await.is_none() {
            return Err(StoreError::ReferentialIntegrity(format!(
                "product {} does not exist",
                item.product_id
            )));
        }

        let item = OrderItem {
            id: self.tables.write().await.next_item_id(),
            order_id: item.order_id,
            product_id: item.product_id,
            quantity: item.quantity,
            price_at_purchase: item.price_at_purchase,
        };
        self.items.push(item.clone());
        Ok(item)
    }

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let mut items: Vec<OrderItem> = self
            .tables
            .read()
            .await
            .items_of(order_id)
            .cloned()
            .collect();
        items.extend(
            self.items
                .iter()
                .filter(|i| i.order_id == order_id)
                .cloned(),
        );
        items.sort_by_key(|i| i.id);
        Ok(items)
    }

    async fn update_product(&mut self, product: &Product) -> Result<()> {
        if !self.held.contains(&RowKey::Product(product.id)) {
            return Err(StoreError::Unlocked {
                table: "products",
                id: product.id.as_i64(),
            });
        }
        if product.stock_quantity < 0 || product.price.is_negative() {
            return Err(StoreError::Constraint(format!(
                "product {} would have negative price or stock",
                product.id
            )));
        }
        self.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn set_order_total(&mut self, id: OrderId, total: Money) -> Result<()> {
        let mut order = self.locked_order(id).await?;
        order.total_amount = total;
        self.orders.insert(id, order);
        Ok(())
    }

    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()> {
        let mut order = self.locked_order(id).await?;
        order.status = status;
        self.orders.insert(id, order);
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let InMemoryTransaction {
            tables,
            held,
            products,
            orders,
            items,
            ..
        } = self;

        {
            let mut tables = tables.write().await;
            tables.products.extend(products);
            tables.orders.extend(orders);
            tables.items.extend(items.into_iter().map(|i| (i.id, i)));
        }

        // Locks are released only after the writes are visible.
        drop(held);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        drop(self);
        Ok(())
    }
}
