//! Pagination metadata attached to list responses

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub pages: u32,
}

impl PageMeta {
    /// Build metadata the way the server does: `pages = ceil(total / per_page)`
    pub fn derive(page: u32, per_page: u32, total: u64) -> Self {
        Self {
            page,
            per_page,
            total,
            pages: page_count(total, per_page),
        }
    }
}

/// Number of pages needed for `total` items; zero items means zero pages
pub fn page_count(total: u64, per_page: u32) -> u32 {
    if per_page == 0 {
        return 0;
    }
    total.div_ceil(per_page as u64).min(u32::MAX as u64) as u32
}
