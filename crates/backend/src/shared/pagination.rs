use contracts::reports::dto::PageMeta;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct BoundaryError(String);

/// Validated pagination request. `page` and `limit` are 1-based; a filter is
/// an optional case-insensitive substring over the list's display field.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
    pub filter: Option<String>,
}

impl PageRequest {
    pub fn new(page: u64, limit: u64, filter: Option<String>) -> Result<Self, BoundaryError> {
        if page < 1 {
            return Err(BoundaryError(String::from("page must be at least 1")));
        }
        if limit < 1 {
            return Err(BoundaryError(String::from("limit must be at least 1")));
        }
        let filter = filter.filter(|f| !f.is_empty());
        Ok(Self {
            page,
            limit,
            filter,
        })
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1) * self.limit
    }

    pub fn meta(&self, total: u64) -> PageMeta {
        PageMeta {
            total,
            current_page: self.page,
            total_pages: total_pages(total, self.limit),
        }
    }
}

/// `ceil(total / limit)`; callers guarantee `limit >= 1`.
pub fn total_pages(total: u64, limit: u64) -> u64 {
    total.div_ceil(limit)
}

/// Expected window size for a page: `clamp(total - (page-1)*limit, 0, limit)`.
pub fn window_size(total: u64, limit: u64, page: u64) -> u64 {
    total
        .saturating_sub((page - 1) * limit)
        .min(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_page_and_zero_limit() {
        assert!(PageRequest::new(0, 10, None).is_err());
        assert!(PageRequest::new(1, 0, None).is_err());
        assert!(PageRequest::new(1, 1, None).is_ok());
    }

    #[test]
    fn skip_is_page_offset() {
        let request = PageRequest::new(3, 10, None).unwrap();
        assert_eq!(request.skip(), 20);
    }

    #[test]
    fn empty_filter_collapses_to_match_all() {
        let request = PageRequest::new(1, 10, Some(String::new())).unwrap();
        assert!(request.filter.is_none());
    }

    #[test]
    fn total_pages_is_ceiling() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(25, 10), 3);
    }

    #[test]
    fn window_size_clamps_at_boundaries() {
        for (total, limit, page, expected) in [
            (25, 10, 1, 10),
            (25, 10, 2, 10),
            (25, 10, 3, 5),
            (25, 10, 4, 0),
            (0, 10, 1, 0),
            (3, 5, 1, 3),
        ] {
            assert_eq!(window_size(total, limit, page), expected);
        }
    }

    #[test]
    fn meta_reports_correct_totals_past_the_data() {
        let request = PageRequest::new(9, 10, None).unwrap();
        let meta = request.meta(25);
        assert_eq!(meta.total, 25);
        assert_eq!(meta.current_page, 9);
        assert_eq!(meta.total_pages, 3);
    }
}
