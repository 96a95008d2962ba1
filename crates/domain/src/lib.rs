//! Domain layer for the order fulfillment system.
//!
//! This crate provides the transactional core:
//! - Inventory reservation: placing an order reserves stock atomically
//! - Order lifecycle: confirming and cancelling orders, restoring stock on cancel
//! - Catalog administration with the non-negative stock guard
//! - The identity contract consumed from the access gateway

pub mod catalog;
pub mod error;
pub mod identity;
pub mod order;
mod unit_of_work;

pub use catalog::{CatalogService, ProductUpdate};
pub use error::OrderError;
pub use identity::{Identity, ParseRoleError, Role};
pub use order::{OrderLine, OrderService, PlaceOrder};
pub use store::{
    CustomerId, Money, NewProduct, Order, OrderId, OrderItem, OrderStatus, OrderWithItems, Page,
    PageRequest, Product, ProductId,
};
