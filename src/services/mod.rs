pub mod carts;
pub mod categories;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod reports;
pub mod stock;

pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// One-based page request.
///
/// The ceiling on `limit` is `api_max_page_size`, applied by the handlers
/// through `AppConfig::clamp_page_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1),
        }
    }

    /// Zero-based page index for sea-orm paginators
    pub fn index(&self) -> u64 {
        self.page - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_has_floor_but_keeps_configured_limit() {
        assert_eq!(PageRequest::new(None, None), PageRequest::default());
        let req = PageRequest::new(Some(0), Some(0));
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, 1);
        assert_eq!(PageRequest::new(Some(1), Some(250)).limit, 250);
        assert_eq!(PageRequest::new(Some(3), Some(10)).index(), 2);
    }
}
