//! Caller identity supplied by the access gateway.
//!
//! Credentials are verified upstream; the core trusts the resolved identity
//! and only uses it for ownership and role checks.

use common::CustomerId;
use serde::{Deserialize, Serialize};
use store::Order;
use thiserror::Error;

/// Role of an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returned when a role name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

impl std::str::FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: CustomerId,
    pub role: Role,
}

impl Identity {
    /// Creates an identity for a customer.
    pub fn customer(id: CustomerId) -> Self {
        Self {
            id,
            role: Role::Customer,
        }
    }

    /// Creates an identity for an administrator.
    pub fn admin(id: CustomerId) -> Self {
        Self {
            id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Returns true if the caller is an administrator or owns the order.
    pub fn can_manage(&self, order: &Order) -> bool {
        self.is_admin() || order.customer_id == self.id
    }
}
