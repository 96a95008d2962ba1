use serde::{Deserialize, Serialize};

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier from a raw row key.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw row key.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

row_id!(
    /// Identifier of a catalog product.
    ///
    /// Product ids are ordered; row locks on products are always taken in
    /// ascending id order.
    ProductId
);

row_id!(
    /// Identifier of an order.
    OrderId
);

row_id!(
    /// Identifier of a single order line.
    OrderItemId
);

row_id!(
    /// Identifier of the customer owning an order, as resolved by the access gateway.
    CustomerId
);
