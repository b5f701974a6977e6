//! Marketplace types - 마켓플레이스 와이어 포맷

use crate::plugin::info::PluginInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// MarketplacePlugin
// ============================================================================

/// 마켓플레이스 플러그인 레코드 (PluginInfo + 마켓플레이스 전용 필드)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplacePlugin {
    #[serde(flatten)]
    pub info: PluginInfo,

    /// 다운로드 URL (절대 경로 또는 base URL 기준 상대 경로)
    #[serde(default)]
    pub download_url: String,

    #[serde(default)]
    pub screenshots: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,

    #[serde(default)]
    pub reviews: Vec<Review>,

    #[serde(default)]
    pub stats: MarketplaceStats,

    #[serde(default)]
    pub featured: bool,

    #[serde(default)]
    pub verified: bool,

    #[serde(default)]
    pub category: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,
}

impl MarketplacePlugin {
    pub fn new(info: PluginInfo) -> Self {
        Self {
            info,
            download_url: String::new(),
            screenshots: Vec::new(),
            documentation_url: None,
            reviews: Vec::new(),
            stats: MarketplaceStats::default(),
            featured: false,
            verified: false,
            category: String::new(),
            pricing: None,
        }
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = url.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn is_free(&self) -> bool {
        self.pricing.as_ref().map_or(true, |p| p.price <= 0.0)
    }
}

/// 사용자 리뷰
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub user_id: String,

    /// 1-5
    pub rating: u8,

    #[serde(default)]
    pub comment: String,

    pub created_at: DateTime<Utc>,

    /// "도움이 됨" 수
    #[serde(default)]
    pub helpful: u32,
}

/// 집계 통계
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceStats {
    #[serde(default)]
    pub downloads: u64,

    #[serde(default)]
    pub rating: f64,

    #[serde(default)]
    pub review_count: u64,

    /// 호환 호스트 버전
    #[serde(default)]
    pub compatibility: Vec<String>,
}

/// 가격 정책
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub price: f64,

    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_days: Option<u32>,
}

fn default_currency() -> String {
    "USD".to_string()
}

// ============================================================================
// Search
// ============================================================================

/// 검색 요청
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,

    pub limit: usize,

    #[serde(default)]
    pub offset: usize,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            category: None,
            tags: Vec::new(),
            min_rating: None,
            max_price: None,
            featured: None,
            verified: None,
            limit: 20,
            offset: 0,
        }
    }
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_min_rating(mut self, rating: f64) -> Self {
        self.min_rating = Some(rating);
        self
    }

    pub fn with_max_price(mut self, price: f64) -> Self {
        self.max_price = Some(price);
        self
    }

    pub fn featured_only(mut self) -> Self {
        self.featured = Some(true);
        self
    }

    pub fn verified_only(mut self) -> Self {
        self.verified = Some(true);
        self
    }

    pub fn with_page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}

/// 검색 응답
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub plugins: Vec<MarketplacePlugin>,

    #[serde(default)]
    pub total: usize,

    #[serde(default)]
    pub limit: usize,

    #[serde(default)]
    pub offset: usize,

    #[serde(default)]
    pub has_more: bool,
}

/// 카테고리
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub plugin_count: usize,
}

// ============================================================================
// Update
// ============================================================================

/// 사용 가능한 업데이트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub plugin_id: String,

    pub current_version: String,

    pub latest_version: String,

    #[serde(default)]
    pub download_url: String,
}

/// 업데이트 여부 판단
///
/// 양쪽 모두 semver면 의미론적 비교, 아니면 문자열 불일치로 판단합니다.
pub fn is_update_available(current: &str, latest: &str) -> bool {
    match (
        semver::Version::parse(current.trim_start_matches('v')),
        semver::Version::parse(latest.trim_start_matches('v')),
    ) {
        (Ok(current), Ok(latest)) => latest > current,
        _ => current != latest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_marketplace_plugin_flattens_info() {
        let plugin: MarketplacePlugin = serde_json::from_value(json!({
            "id": "example.validator",
            "name": "Example Validator",
            "version": "1.1.0",
            "permissions": ["filesystem:read"],
            "downloadUrl": "/downloads/example.validator.so",
            "stats": { "downloads": 42, "rating": 4.5 },
            "featured": true,
            "category": "validation"
        }))
        .unwrap();

        assert_eq!(plugin.id(), "example.validator");
        assert_eq!(plugin.info.version, "1.1.0");
        assert_eq!(plugin.stats.downloads, 42);
        assert!(plugin.featured);
        assert!(plugin.is_free());

        let value = serde_json::to_value(&plugin).unwrap();
        assert_eq!(value["id"], "example.validator");
        assert_eq!(value["downloadUrl"], "/downloads/example.validator.so");
    }

    #[test]
    fn test_search_request_omits_unset_filters() {
        let request = SearchRequest::new("validator").with_category("validation");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["query"], "validator");
        assert_eq!(value["category"], "validation");
        assert_eq!(value["limit"], 20);
        assert!(value.get("minRating").is_none());
        assert!(value.get("tags").is_none());
    }

    #[test]
    fn test_update_comparison() {
        assert!(is_update_available("1.0.0", "1.1.0"));
        assert!(!is_update_available("1.1.0", "1.0.0"));
        assert!(!is_update_available("1.0.0", "1.0.0"));
        assert!(is_update_available("v1.0.0", "1.0.1"));
        // semver가 아니면 문자열 비교
        assert!(is_update_available("nightly-1", "nightly-2"));
        assert!(!is_update_available("nightly-1", "nightly-1"));
    }
}
