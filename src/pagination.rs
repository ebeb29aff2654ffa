//! This modules defines the common functionality for paging data.

use serde::Deserialize;

/// The config for pagination
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: u64,
    /// The number of items per page when not specified in a request.
    pub default_page_size: u64,
    /// The largest page size a client may ask for.
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

/// The page parameters as sent by a client. Missing values fall back to the
/// [PaginationConfig] defaults.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PageParams {
    /// The 1-based page number.
    pub page: Option<u64>,
    /// The number of items per page.
    pub per_page: Option<u64>,
}

/// A resolved, 1-based page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// The 1-based page number.
    pub page: u64,
    /// The number of items per page.
    pub per_page: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        PageParams::default().resolve(&PaginationConfig::default())
    }
}

impl PageParams {
    /// Fill in missing values from `config` and clamp the page size to
    /// `1..=config.max_page_size`.
    ///
    /// The page is clamped to at least 1 and to at most the last page whose
    /// offset SQLite can still represent as a signed 64-bit integer.
    pub fn resolve(&self, config: &PaginationConfig) -> Pagination {
        let per_page = self
            .per_page
            .unwrap_or(config.default_page_size)
            .clamp(1, config.max_page_size.max(1));
        let last_page = (i64::MAX as u64 / per_page).max(1);

        Pagination {
            page: self
                .page
                .unwrap_or(config.default_page)
                .clamp(1, last_page),
            per_page,
        }
    }
}

impl Pagination {
    /// The SQL `LIMIT` for this page.
    pub fn limit(&self) -> u64 {
        self.per_page
    }

    /// The SQL `OFFSET` for this page.
    pub fn offset(&self) -> u64 {
        self.page
            .saturating_sub(1)
            .saturating_mul(self.per_page)
            .min(i64::MAX as u64)
    }
}
