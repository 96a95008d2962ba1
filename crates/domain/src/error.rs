//! Domain error types.

use common::{OrderId, ProductId};
use store::{InvalidPage, StoreError};
use thiserror::Error;

/// Errors that can occur during catalog and order operations.
///
/// Every variant aborts the enclosing transaction. Only [`OrderError::Conflict`]
/// is safe to retry.
#[derive(Debug, Error)]
pub enum OrderError {
    /// A referenced product or order does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The requested transition is not legal for the current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The requested quantity exceeds the stock available at lock time.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },

    /// The caller has no rights over the target.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Lock wait timed out, deadlock or serialization failure. Safe to retry.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The request itself is malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unclassified persistence failure.
    #[error("Storage error: {0}")]
    Storage(#[source] StoreError),
}

impl OrderError {
    pub(crate) fn product_not_found(id: ProductId) -> Self {
        OrderError::NotFound {
            entity: "Product",
            id: id.as_i64(),
        }
    }

    pub(crate) fn order_not_found(id: OrderId) -> Self {
        OrderError::NotFound {
            entity: "Order",
            id: id.as_i64(),
        }
    }

    /// Returns true if the caller may retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrderError::Conflict(_))
    }

    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::NotFound { .. } => "not_found",
            OrderError::InvalidState(_) => "invalid_state",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::Forbidden(_) => "forbidden",
            OrderError::Conflict(_) => "conflict",
            OrderError::Validation(_) => "validation",
            OrderError::Storage(_) => "storage",
        }
    }
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => OrderError::Conflict(msg),
            other => OrderError::Storage(other),
        }
    }
}

impl From<InvalidPage> for OrderError {
    fn from(err: InvalidPage) -> Self {
        OrderError::Validation(err.to_string())
    }
}
