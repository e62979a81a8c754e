use serde::Serialize;

/// One page of a listing with "load more" semantics.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub page: i64,
    pub num_pages: i64,
    pub total: i64,
    pub has_next: bool,
}

/// Resolved page window for a listing of `total` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub num_pages: i64,
    pub offset: i64,
    pub limit: i64,
}

impl PageWindow {
    /// Clamp a requested 1-based page into `1..=num_pages`; an empty
    /// listing still has one (empty) page.
    pub fn clamp(requested: i64, page_size: i64, total: i64) -> Self {
        let num_pages = ((total + page_size - 1) / page_size).max(1);
        let page = requested.clamp(1, num_pages);
        Self {
            page,
            num_pages,
            offset: (page - 1) * page_size,
            limit: page_size,
        }
    }

    pub fn into_page<T>(self, results: Vec<T>, total: i64) -> Page<T> {
        Page {
            results,
            page: self.page,
            num_pages: self.num_pages,
            total,
            has_next: self.page < self.num_pages,
        }
    }
}

/// Parse a 1-based page number. Missing or malformed values mean page 1.
pub fn page_number(raw: Option<&str>) -> i64 {
    raw.and_then(|r| r.trim().parse::<i64>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_number_parses_or_defaults() {
        assert_eq!(page_number(None), 1);
        assert_eq!(page_number(Some("abc")), 1);
        assert_eq!(page_number(Some("0")), 1);
        assert_eq!(page_number(Some(" 4 ")), 4);
    }

    #[test]
    fn window_clamps_to_last_page() {
        let w = PageWindow::clamp(10, 6, 8);
        assert_eq!(w.page, 2);
        assert_eq!(w.num_pages, 2);
        assert_eq!(w.offset, 6);
        let page = w.into_page(vec![1, 2], 8);
        assert!(!page.has_next);
    }

    #[test]
    fn empty_listing_has_one_page() {
        let w = PageWindow::clamp(3, 9, 0);
        assert_eq!(w.page, 1);
        assert_eq!(w.offset, 0);
        assert!(!w.into_page(Vec::<i32>::new(), 0).has_next);
    }

    #[test]
    fn first_page_has_next_when_more_rows() {
        let w = PageWindow::clamp(1, 9, 10);
        assert!(w.into_page(vec![0; 9], 10).has_next);
    }
}
