//! Order placement and lifecycle.

mod commands;
mod lifecycle;
mod reservation;
mod service;

pub use commands::{OrderLine, PlaceOrder};
pub use service::OrderService;
