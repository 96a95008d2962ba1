use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, OrderItemId, OrderStatus, ProductId};
use serde::{Deserialize, Serialize};

/// A catalog product with its current stock level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Current unit price.
    pub price: Money,
    /// Units available for reservation. Never negative.
    pub stock_quantity: i32,
    /// Inactive products cannot be reserved against.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields required to add a product to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: Money,
    pub stock_quantity: i32,
}

impl NewProduct {
    /// Creates a new product definition.
    pub fn new(name: impl Into<String>, price: Money, stock_quantity: i32) -> Self {
        Self {
            name: name.into(),
            price,
            stock_quantity,
        }
    }
}

/// An order header. Items are stored separately and owned by the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    /// Sum of `quantity * price_at_purchase` over the order's items.
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
}

/// A single order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
    /// Unit price captured when the order was placed.
    pub price_at_purchase: Money,
}

impl OrderItem {
    /// Returns `quantity * price_at_purchase`.
    pub fn line_total(&self) -> Money {
        self.price_at_purchase.times(self.quantity)
    }
}

/// Fields required to insert an order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub price_at_purchase: Money,
}

/// An order together with its lines, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderWithItems {
    /// Returns the sum of the line totals.
    pub fn items_total(&self) -> Money {
        self.items.iter().map(OrderItem::line_total).sum()
    }
}
