//! Page/limit handling for list endpoints

use serde::{Deserialize, Serialize};

/// Default page size when the caller gives none
pub const DEFAULT_PAGE_LIMIT: i64 = 10;

/// Largest page size a caller may request
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Normalized page request (1-based page, clamped limit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Clamp raw query values: page to >= 1, limit to [1, 100], defaulting to 10
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);
        Self { page, limit }
    }

    /// Number of items skipped before this page
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Pagination metadata returned alongside a page of items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(request: PageRequest, total: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + request.limit - 1) / request.limit
        };

        Self {
            page: request.page,
            limit: request.limit,
            total,
            total_pages,
        }
    }
}

/// Slice an already ordered list down to the requested page
pub fn paginate<T>(items: Vec<T>, request: PageRequest) -> (Vec<T>, Pagination) {
    let pagination = Pagination::new(request, items.len() as i64);
    let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(request.limit).unwrap_or(0);

    let page = items.into_iter().skip(offset).take(limit).collect();
    (page, pagination)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults() {
        let request = PageRequest::new(None, None);
        assert_eq!(request.page, 1);
        assert_eq!(request.limit, DEFAULT_PAGE_LIMIT);
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn test_page_request_clamps() {
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { page: 1, limit: 1 });
        assert_eq!(
            PageRequest::new(Some(-3), Some(1000)),
            PageRequest { page: 1, limit: 100 }
        );
    }

    #[test]
    fn test_pagination_total_pages() {
        let request = PageRequest::new(Some(1), Some(10));
        assert_eq!(Pagination::new(request, 0).total_pages, 0);
        assert_eq!(Pagination::new(request, 10).total_pages, 1);
        assert_eq!(Pagination::new(request, 11).total_pages, 2);
        assert_eq!(Pagination::new(request, 25).total_pages, 3);
    }

    #[test]
    fn test_paginate_second_page() {
        let items: Vec<i32> = (1..=25).collect();
        let (page, meta) = paginate(items, PageRequest::new(Some(2), Some(10)));

        assert_eq!(page, (11..=20).collect::<Vec<_>>());
        assert_eq!(meta.total, 25);
        assert_eq!(meta.total_pages, 3);
    }

    #[test]
    fn test_paginate_past_the_end() {
        let items: Vec<i32> = (1..=5).collect();
        let (page, meta) = paginate(items, PageRequest::new(Some(4), Some(10)));

        assert!(page.is_empty());
        assert_eq!(meta.total, 5);
        assert_eq!(meta.page, 4);
    }
}
