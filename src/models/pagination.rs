//! 分页相关的数据结构

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PaginationParams {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self { page, per_page }
    }

    pub fn get_page(&self) -> u64 {
        self.page.unwrap_or(1).max(1) as u64
    }

    pub fn get_per_page(&self) -> u64 {
        self.per_page.unwrap_or(20).clamp(1, 100) as u64
    }

    pub fn get_offset(&self) -> u64 {
        (self.get_page() - 1) * self.get_per_page()
    }

    pub fn get_limit(&self) -> u64 {
        self.get_per_page()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, params: &PaginationParams, total: u64) -> Self {
        let page_size = params.get_per_page();
        let total_pages = total.div_ceil(page_size).max(1);
        Self {
            data,
            page: params.get_page(),
            page_size,
            total,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_params() {
        let params = PaginationParams::new(Some(2), Some(10));
        assert_eq!(params.get_page(), 2);
        assert_eq!(params.get_per_page(), 10);
        assert_eq!(params.get_offset(), 10);
        assert_eq!(params.get_limit(), 10);
    }

    #[test]
    fn test_pagination_params_defaults_and_clamp() {
        let params = PaginationParams::new(None, None);
        assert_eq!(params.get_page(), 1);
        assert_eq!(params.get_offset(), 0);
        assert_eq!(params.get_limit(), 20);

        let params = PaginationParams::new(Some(0), Some(1000));
        assert_eq!(params.get_page(), 1);
        assert_eq!(params.get_per_page(), 100);
    }

    #[test]
    fn test_total_pages() {
        let params = PaginationParams::new(Some(1), Some(10));
        assert_eq!(PaginatedResponse::<i64>::new(vec![], &params, 25).total_pages, 3);
        assert_eq!(PaginatedResponse::<i64>::new(vec![], &params, 0).total_pages, 1);
    }
}
