pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod record;
pub mod store;

pub use common::{CustomerId, Money, OrderId, OrderItemId, OrderStatus, ProductId};
pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use query::{InvalidPage, OrderQuery, Page, PageRequest};
pub use record::{NewOrderItem, NewProduct, Order, OrderItem, OrderWithItems, Product};
pub use store::{DEFAULT_LOCK_TIMEOUT, Store, Transaction};
