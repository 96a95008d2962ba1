//! Caller identity extraction from gateway headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use domain::{CustomerId, Identity, OrderError, Role};

use crate::error::ApiError;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the authenticated user role.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The identity resolved by the access gateway for this request.
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub Identity);

impl Actor {
    /// Rejects non-administrators before the service is called.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.0.is_admin() {
            Ok(())
        } else {
            Err(OrderError::Forbidden("administrator role required".to_string()).into())
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {name} header")))?
        .to_str()
        .map_err(|_| ApiError::Unauthorized(format!("malformed {name} header")))
}

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id: i64 = header(parts, USER_ID_HEADER)?
            .parse()
            .map_err(|_| ApiError::Unauthorized(format!("malformed {USER_ID_HEADER} header")))?;
        let role: Role = header(parts, USER_ROLE_HEADER)?
            .parse()
            .map_err(|e| ApiError::Unauthorized(format!("{e}")))?;

        Ok(Actor(Identity {
            id: CustomerId::new(id),
            role,
        }))
    }
}
