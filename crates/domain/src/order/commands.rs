//! Order commands.

use common::{CustomerId, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;

/// One requested line of a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

impl OrderLine {
    /// Creates a new order line.
    pub fn new(product_id: ProductId, quantity: i32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Command to place a new order.
///
/// Lines are processed in the order given. The same product may appear on
/// more than one line; each line reserves its own quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrder {
    /// The customer placing the order.
    pub customer_id: CustomerId,

    /// Requested lines, at least one.
    pub lines: Vec<OrderLine>,
}

impl PlaceOrder {
    /// Creates a new PlaceOrder command.
    pub fn new(customer_id: CustomerId, lines: Vec<OrderLine>) -> Self {
        Self { customer_id, lines }
    }

    /// Adds a line to the command.
    pub fn line(mut self, product_id: ProductId, quantity: i32) -> Self {
        self.lines.push(OrderLine::new(product_id, quantity));
        self
    }

    /// Returns the product ids referenced by the command, in request order.
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.lines.iter().map(|line| line.product_id).collect()
    }

    /// Checks the request shape before any lock is taken.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.lines.is_empty() {
            return Err(OrderError::Validation(
                "order must contain at least one item".to_string(),
            ));
        }

        if let Some(line) = self.lines.iter().find(|line| line.quantity <= 0) {
            return Err(OrderError::Validation(format!(
                "quantity for product {} must be greater than 0, got {}",
                line.product_id, line.quantity
            )));
        }

        Ok(())
    }
}
