use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Validated page/limit pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    /// Applies defaults and rejects values outside `1..` for page and `1..=max_limit` for limit.
    pub fn from_params(
        page: Option<u64>,
        limit: Option<u64>,
        default_limit: u64,
        max_limit: u64,
    ) -> Result<Self, ValidationError> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(default_limit);
        if page < 1 {
            return Err(ValidationError::new("page must be at least 1"));
        }
        if limit < 1 || limit > max_limit {
            return Err(ValidationError::new(format!(
                "limit must be between 1 and {max_limit}"
            )));
        }
        Ok(PageRequest { page, limit })
    }

    /// Items before this page. Saturates, so a huge page yields an empty window.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_items: u64,
    pub items_per_page: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total_items: u64) -> Self {
        let limit = limit.max(1);
        let total_pages = total_items.div_ceil(limit);
        Pagination {
            current_page: page,
            total_pages,
            total_items,
            items_per_page: limit,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }

    pub fn for_request(request: PageRequest, total_items: u64) -> Self {
        Self::new(request.page, request.limit, total_items)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        Page {
            items,
            pagination: Pagination::for_request(request, total_items),
        }
    }

    /// Slices an already ordered collection.
    pub fn slice(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(usize::try_from(request.offset()).unwrap_or(usize::MAX))
            .take(request.limit as usize)
            .collect();
        Page::new(items, request, total)
    }
}
