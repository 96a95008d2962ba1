//! Shared types for the order fulfillment system.
//!
//! Identifiers, money and the order status state machine are used by every
//! other crate in the workspace, so they live here with no heavy dependencies.

pub mod money;
pub mod status;
pub mod types;

pub use money::Money;
pub use status::{OrderStatus, ParseOrderStatusError};
pub use types::{CustomerId, OrderId, OrderItemId, ProductId};
