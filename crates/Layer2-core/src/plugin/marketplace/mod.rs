//! Marketplace - 원격 플러그인 카탈로그
//!
//! 검색/조회/다운로드/업데이트 확인과 id 기반 인메모리 캐시를 제공합니다.

mod client;
mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::MarketplaceClient;
pub use types::{
    is_update_available, Category, MarketplacePlugin, MarketplaceStats, Pricing, Review,
    SearchRequest, SearchResponse, UpdateInfo,
};
