//! HTTP handlers grouped by resource.

pub mod orders;
pub mod products;
pub mod system;

use serde::Deserialize;
use store::PageRequest;

use crate::error::ApiError;

/// `page` and `limit` query parameters shared by list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    pub fn to_request(&self) -> Result<PageRequest, ApiError> {
        Ok(PageRequest::from_params(self.page, self.limit)?)
    }
}
