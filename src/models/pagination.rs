use serde::Serialize;

/// Validated page request (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PageError {
    #[error("page must be >= 1 (got {0})")]
    InvalidPage(i64),
    #[error("page_size must be >= 1 (got {0})")]
    InvalidPageSize(i64),
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Result<Self, PageError> {
        if page < 1 {
            return Err(PageError::InvalidPage(page));
        }
        if page_size < 1 {
            return Err(PageError::InvalidPageSize(page_size));
        }
        Ok(Self { page, page_size })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// One page of results plus the counters clients need for navigation.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: i64) -> Self {
        let total_pages = if total <= 0 {
            0
        } else {
            total / request.page_size + i64::from(total % request.page_size != 0)
        };
        Self {
            items,
            page: request.page,
            page_size: request.page_size,
            total,
            total_pages,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}
