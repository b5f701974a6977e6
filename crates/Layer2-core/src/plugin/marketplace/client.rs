//! Marketplace client - 마켓플레이스 HTTP 클라이언트
//!
//! 모든 요청은 JSON over HTTP(S)입니다. 2xx가 아닌 응답과 디코딩 실패는
//! `Error::Marketplace`로 반환하며 자동 재시도하지 않습니다.

use super::types::{
    is_update_available, Category, MarketplacePlugin, SearchRequest, SearchResponse, UpdateInfo,
};
use crate::plugin::info::PluginInfo;
use futures::StreamExt;
use parking_lot::RwLock;
use plugrt_foundation::{Error, MarketplaceSettings, Result};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("plugrt/", env!("CARGO_PKG_VERSION"));

struct CacheEntry {
    plugin: MarketplacePlugin,
    fetched_at: Instant,
}

/// 마켓플레이스 클라이언트
pub struct MarketplaceClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,

    /// id -> 레코드 캐시
    cache: RwLock<HashMap<String, CacheEntry>>,

    /// None이면 프로세스 수명 동안 유지
    cache_ttl: Option<Duration>,
}

impl MarketplaceClient {
    /// 설정에서 생성
    pub fn new(settings: &MarketplaceSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            cache: RwLock::new(HashMap::new()),
            cache_ttl: settings.cache_ttl_secs.map(Duration::from_secs),
        })
    }

    /// base URL만 지정해서 생성 (나머지는 기본값)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let settings = MarketplaceSettings {
            base_url: base_url.into(),
            ..Default::default()
        };
        Self::new(&settings)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ========================================================================
    // API
    // ========================================================================

    /// 플러그인 검색
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        debug!("Searching marketplace: {:?}", request.query);
        let response = self
            .request(Method::POST, "/api/v1/plugins/search")
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let result: SearchResponse = decode(response).await?;
        for plugin in &result.plugins {
            self.cache_put(plugin.clone());
        }
        Ok(result)
    }

    /// 플러그인 조회 (캐시 우선)
    pub async fn get_plugin(&self, id: &str) -> Result<MarketplacePlugin> {
        if let Some(plugin) = self.cache_get(id) {
            debug!("Marketplace cache hit: {}", id);
            return Ok(plugin);
        }
        self.fetch_plugin(id).await
    }

    /// 플러그인 조회 (캐시 무시, 결과로 캐시 갱신)
    pub async fn fetch_plugin(&self, id: &str) -> Result<MarketplacePlugin> {
        let path = format!("/api/v1/plugins/{}", urlencoding::encode(id));
        let response = self
            .request(Method::GET, &path)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let plugin: MarketplacePlugin = decode(response).await?;
        self.cache_put(plugin.clone());
        Ok(plugin)
    }

    /// 카테고리 목록
    pub async fn get_categories(&self) -> Result<Vec<Category>> {
        let response = self
            .request(Method::GET, "/api/v1/categories")
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        decode(response).await
    }

    /// 추천 플러그인
    pub async fn get_featured(&self, limit: usize) -> Result<Vec<MarketplacePlugin>> {
        let response = self
            .request(Method::GET, "/api/v1/plugins/featured")
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let plugins: Vec<MarketplacePlugin> = decode(response).await?;
        for plugin in &plugins {
            self.cache_put(plugin.clone());
        }
        Ok(plugins)
    }

    /// 플러그인 다운로드 (임시 파일에 스트리밍 후 rename)
    ///
    /// 다운로드한 바이트 수를 반환합니다.
    pub async fn download(&self, id: &str, dest: &Path) -> Result<u64> {
        let plugin = self.get_plugin(id).await?;
        if plugin.download_url.is_empty() {
            return Err(Error::Marketplace(format!("plugin {} has no download URL", id)));
        }

        let url = self.resolve(&plugin.download_url);
        info!("Downloading {} from {}", id, url);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::Marketplace(format!(
                "Failed to download {}: HTTP {}",
                id,
                response.status()
            )));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = dest.with_extension("part");
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    let _ = tokio::fs::remove_file(&partial).await;
                    return Err(Error::Http(format!("Download of {} interrupted: {}", id, e)));
                }
            };
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&partial, dest).await?;
        debug!("Downloaded {} bytes to {:?}", written, dest);
        Ok(written)
    }

    /// 설치된 플러그인의 업데이트 확인
    ///
    /// 마켓플레이스에서 조회 실패한 플러그인은 경고 후 건너뜁니다.
    pub async fn check_updates(&self, installed: &[PluginInfo]) -> Result<HashMap<String, UpdateInfo>> {
        let mut updates = HashMap::new();

        for info in installed {
            let latest = match self.fetch_plugin(&info.id).await {
                Ok(plugin) => plugin,
                Err(e) => {
                    warn!("Update check failed for {}: {}", info.id, e);
                    continue;
                }
            };

            if is_update_available(&info.version, &latest.info.version) {
                debug!(
                    "Update available for {}: {} -> {}",
                    info.id, info.version, latest.info.version
                );
                updates.insert(
                    info.id.clone(),
                    UpdateInfo {
                        plugin_id: info.id.clone(),
                        current_version: info.version.clone(),
                        latest_version: latest.info.version.clone(),
                        download_url: latest.download_url.clone(),
                    },
                );
            }
        }

        Ok(updates)
    }

    // ========================================================================
    // Cache
    // ========================================================================

    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }

    fn cache_get(&self, id: &str) -> Option<MarketplacePlugin> {
        let cache = self.cache.read();
        let entry = cache.get(id)?;
        match self.cache_ttl {
            Some(ttl) if entry.fetched_at.elapsed() > ttl => None,
            _ => Some(entry.plugin.clone()),
        }
    }

    fn cache_put(&self, plugin: MarketplacePlugin) {
        self.cache.write().insert(
            plugin.info.id.clone(),
            CacheEntry {
                plugin,
                fetched_at: Instant::now(),
            },
        );
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.base_url, url.trim_start_matches('/'))
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.authorize(self.client.request(method, url))
            .header("Accept", "application/json")
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

/// 상태 코드 확인 후 JSON 디코딩
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Marketplace(format!("HTTP {}: {}", status, body.trim())));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| Error::Marketplace(format!("Failed to decode response: {}", e)))
}
