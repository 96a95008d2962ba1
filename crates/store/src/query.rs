use common::{CustomerId, OrderStatus};
use serde::Serialize;
use thiserror::Error;

/// Page number and size for list queries.
///
/// Pages are 1-based. The page size is capped at [`PageRequest::MAX_LIMIT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

/// Returned when a page request is out of range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPage {
    #[error("page must be at least 1")]
    PageZero,

    #[error("limit must be between 1 and {max}, got {limit}")]
    LimitOutOfRange { limit: u32, max: u32 },
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    /// Creates a validated page request.
    pub fn new(page: u32, limit: u32) -> Result<Self, InvalidPage> {
        if page == 0 {
            return Err(InvalidPage::PageZero);
        }
        if limit == 0 || limit > Self::MAX_LIMIT {
            return Err(InvalidPage::LimitOutOfRange {
                limit,
                max: Self::MAX_LIMIT,
            });
        }
        Ok(Self { page, limit })
    }

    /// Builds a request from optional query parameters, applying defaults.
    pub fn from_params(page: Option<u32>, limit: Option<u32>) -> Result<Self, InvalidPage> {
        Self::new(page.unwrap_or(1), limit.unwrap_or(Self::DEFAULT_LIMIT))
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// One page of results plus the pagination summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total number of matching rows across all pages.
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    /// Number of pages needed to hold `total` rows.
    pub pages: u64,
}

impl<T> Page<T> {
    /// Wraps a page of rows.
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let limit = u64::from(request.limit);
        Self {
            items,
            total,
            page: request.page,
            limit: request.limit,
            pages: total.div_ceil(limit),
        }
    }

    /// Converts the rows while keeping the pagination summary.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            pages: self.pages,
        }
    }
}

/// Filter for listing orders.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Only orders owned by this customer.
    pub customer_id: Option<CustomerId>,

    /// Only orders in this status.
    pub status: Option<OrderStatus>,

    pub page: PageRequest,
}

impl OrderQuery {
    /// Creates a query matching every order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one customer's orders.
    pub fn customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    /// Restricts to one status.
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Selects the page to return.
    pub fn page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_rejects_out_of_range_values() {
        assert_eq!(PageRequest::new(0, 10), Err(InvalidPage::PageZero));
        assert!(matches!(
            PageRequest::new(1, 101),
            Err(InvalidPage::LimitOutOfRange { limit: 101, .. })
        ));
        assert!(PageRequest::new(1, 0).is_err());
        assert!(PageRequest::new(3, 100).is_ok());
    }

    #[test]
    fn page_request_defaults() {
        let request = PageRequest::from_params(None, None).unwrap();
        assert_eq!(request, PageRequest::default());
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn offset_skips_previous_pages() {
        assert_eq!(PageRequest::new(3, 20).unwrap().offset(), 40);
    }

    #[test]
    fn pages_rounds_up() {
        let request = PageRequest::new(1, 10).unwrap();
        assert_eq!(Page::<u8>::new(vec![], 0, request).pages, 0);
        assert_eq!(Page::<u8>::new(vec![], 10, request).pages, 1);
        assert_eq!(Page::<u8>::new(vec![], 11, request).pages, 2);
    }

    #[test]
    fn query_builder_chain() {
        let query = OrderQuery::new()
            .customer(CustomerId::new(4))
            .status(OrderStatus::Confirmed)
            .page(PageRequest::new(2, 5).unwrap());

        assert_eq!(query.customer_id, Some(CustomerId::new(4)));
        assert_eq!(query.status, Some(OrderStatus::Confirmed));
        assert_eq!(query.page.offset(), 5);
    }
}
