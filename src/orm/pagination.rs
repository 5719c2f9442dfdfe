//! Offset pagination

use crate::error::{ModelError, Result};

/// Page size used when a request doesn't set one.
pub const DEFAULT_PER_PAGE: i64 = 15;

/// Largest page size accepted unless configured otherwise.
pub const MAX_PER_PAGE: i64 = 100;

/// `(page, per_page)` -> `(limit, offset)`.
///
/// Both arguments must be at least 1; nothing is clamped.
pub fn paginate(page: i64, per_page: i64) -> Result<(i64, i64)> {
    let request = PageRequest::new(page, per_page)?;
    Ok((request.limit(), request.offset()))
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: i64,
    per_page: i64,
}

impl PageRequest {
    pub fn new(page: i64, per_page: i64) -> Result<Self> {
        if page < 1 {
            return Err(ModelError::validation(format!(
                "page must be at least 1, got {}",
                page
            )));
        }
        if per_page < 1 {
            return Err(ModelError::validation(format!(
                "page size must be at least 1, got {}",
                per_page
            )));
        }
        if per_page.checked_mul(page - 1).is_none() {
            return Err(ModelError::validation(format!(
                "page {} is out of range for page size {}",
                page, per_page
            )));
        }
        Ok(Self { page, per_page })
    }

    /// Reject page sizes above `max`.
    pub fn within(self, max: i64) -> Result<Self> {
        if self.per_page > max {
            return Err(ModelError::validation(format!(
                "page size {} exceeds the maximum of {}",
                self.per_page, max
            )));
        }
        Ok(self)
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn per_page(&self) -> i64 {
        self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    /// Rows skipped before this page. Checked in `new`.
    pub fn offset(&self) -> i64 {
        self.per_page * (self.page - 1)
    }

    /// Number of pages needed for `total` items
    pub fn page_count(&self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            (total - 1) / self.per_page + 1
        }
    }
}
