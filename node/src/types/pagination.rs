use serde::Serialize;

use crate::types::error::TypeError;

pub const DEFAULT_PAGE_SIZE: u64 = 25;

/// Validated `page` / `size` query parameters. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u64,
    pub size: u64,
}

impl Default for PageParams {
    fn default() -> Self {
        Self { page: 1, size: DEFAULT_PAGE_SIZE }
    }
}

impl PageParams {
    /// Parses raw query string values. Missing values fall back to the first
    /// page of [`DEFAULT_PAGE_SIZE`] records.
    pub fn parse(page: Option<&str>, size: Option<&str>) -> Result<Self, TypeError> {
        let page = match page {
            Some(raw) => parse_positive("page", raw)?,
            None => 1,
        };
        let size = match size {
            Some(raw) => parse_positive("size", raw)?,
            None => DEFAULT_PAGE_SIZE,
        };
        Ok(Self { page, size })
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.size)
    }

    pub fn limit(&self) -> u64 {
        self.size
    }
}

fn parse_positive(param: &'static str, raw: &str) -> Result<u64, TypeError> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(TypeError::InvalidPagination { param, value: raw.to_string() }),
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub size: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, params: PageParams) -> Self {
        Self { items, total, page: params.page, size: params.size }
    }

    pub fn has_next(&self) -> bool {
        self.page.saturating_mul(self.size) < self.total
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}
